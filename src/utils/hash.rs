// src/utils/hash.rs

use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::error::AppError;

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Checks `password` against a stored hash.
///
/// A mismatch is an `AuthError`; a malformed stored hash is a server error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AppError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| AppError::InternalServerError(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => {
            Err(AppError::AuthError("Invalid username or password".to_string()))
        }
        Err(e) => Err(AppError::InternalServerError(e.to_string())),
    }
}
