use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::error::Result;

/// PHC-encoded argon2 hash of `plain`.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(plain.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Checks `plain` against a stored hash. Accounts without a hash never match.
pub fn verify_password(plain: &str, hashed: Option<&str>) -> Result<bool> {
    let Some(hashed) = hashed else {
        return Ok(false);
    };
    let parsed = PasswordHash::new(hashed)?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trip() {
        let hash = hash_password("123").unwrap();
        assert!(verify_password("123", Some(&hash)).unwrap());
        assert!(!verify_password("1234", Some(&hash)).unwrap());
        assert!(!verify_password("123", None).unwrap());
    }
}
