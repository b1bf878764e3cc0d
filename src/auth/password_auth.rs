use crate::constants::ARGON2;
use crate::data::error::ApiError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{PasswordHasher, PasswordVerifier};
use rand::distributions::Alphanumeric;
use rand::Rng;

const TEMP_PASSWORD_LEN: usize = 12;

/// Generate the one-time password handed out with a freshly provisioned
/// AdminPrincipal.
pub fn generate_temp_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Hashes a password using Argon2
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash_string = ARGON2.hash_password(password.as_bytes(), &salt)
        .map_err(|_| ApiError::Other("Failed to hash password".to_string()))?
        .serialize();

    Ok(password_hash_string.to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => ARGON2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
