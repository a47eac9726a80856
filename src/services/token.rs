//! Session token generation and hashing
//!
//! Tokens are 18 bytes from the operating system's CSPRNG, encoded as
//! unpadded base64url (24 characters). Only the client ever holds a token;
//! the database stores `hash_session_token(token)`, a lowercase-hex SHA-256
//! digest, which doubles as the session's primary key.

use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use sha2::{Digest, Sha256};

/// Number of random bytes in a session token
pub const TOKEN_BYTES: usize = 18;

/// Failure to obtain randomness for a new token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] getrandom::Error),
}

/// Generate a new opaque session token.
///
/// # Errors
///
/// Returns `TokenError::Entropy` if the OS random source fails. A token is
/// never produced from a weaker fallback.
pub fn generate_session_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)?;
    Ok(BASE64URL_NOPAD.encode(&bytes))
}

/// Derive the storage id of a session from its token.
pub fn hash_session_token(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}
