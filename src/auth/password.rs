use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;

/// Standalone complexity check, also exposed to pre-flight validation in
/// clients. Minimum length plus upper/lower/digit character classes.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::WeakPassword(
            "must contain an uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AppError::WeakPassword(
            "must contain a lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::WeakPassword("must contain a digit".to_string()));
    }
    Ok(())
}

/// Hashing re-validates even when the handler already did: this function
/// is the security boundary, not the request parser.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing error: {e}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Password1").unwrap();
        assert_ne!(hash, "Password1");
        assert!(verify_password("Password1", &hash).unwrap());
        assert!(!verify_password("Password2", &hash).unwrap());
    }

    #[test]
    fn salted_hashes_differ() {
        let a = hash_password("Password1").unwrap();
        let b = hash_password("Password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn weak_passwords_are_rejected_by_hashing() {
        for weak in ["Pw1", "alllowercase1", "ALLUPPERCASE1", "NoDigitsHere"] {
            assert!(matches!(
                hash_password(weak),
                Err(AppError::WeakPassword(_))
            ));
        }
    }

    #[test]
    fn validator_accepts_a_compliant_password() {
        assert!(validate_password("Password1").is_ok());
    }
}
