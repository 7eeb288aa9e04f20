use super::pool::Db;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Apply the schema at startup. Every statement is guarded with an
/// existence check, so re-applying on each boot is safe.
pub async fn run(pool: &Db) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = pool.get().await?;
    let mut applied = 0usize;
    for stmt in SCHEMA.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        conn.execute(stmt, &[]).await?;
        applied += 1;
    }
    tracing::debug!("applied {applied} schema statements");
    Ok(())
}
