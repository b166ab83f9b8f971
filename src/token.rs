//! Opaque session token minting and at-rest hashing.
//!
//! Tokens carry no user data: they are 32 bytes from the OS CSPRNG, encoded
//! as URL-safe base64, and looked up by exact match. The database only ever
//! sees the SHA-256 of a token, so a leaked sessions table cannot be
//! replayed as cookies.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Mint a new session token.
///
/// The raw value is only returned to set the cookie; stores accept the
/// [`hash`] of it.
pub fn mint() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
#[must_use]
pub fn hash(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
