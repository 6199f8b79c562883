/// Password reset token utilities
///
/// Reset tokens are random alphanumeric strings. Only their SHA-256 hash is
/// stored; the plain token exists solely in the message sent to the actor.
///
/// # Example
///
/// ```
/// use bizacc_shared::auth::reset_token::{generate_reset_token, hash_token, verify_token};
///
/// let (token, hash) = generate_reset_token();
/// assert_eq!(hash, hash_token(&token));
/// assert!(verify_token(&token, &hash));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a reset token
pub const RESET_TOKEN_LENGTH: usize = 48;

/// Generates a token and its hash
pub fn generate_reset_token() -> (String, String) {
    let token = generate_random_string(RESET_TOKEN_LENGTH);
    let hash = hash_token(&token);
    (token, hash)
}

fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// SHA-256 hex of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Whether a token has the expected shape
pub fn validate_token_format(token: &str) -> bool {
    token.len() == RESET_TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Compares a presented token against a stored hash
pub fn verify_token(token: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_token(token), stored_hash)
}

/// Compares two strings without short-circuiting on the first difference
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
