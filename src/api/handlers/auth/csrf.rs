//! Session-bound CSRF tokens.
//!
//! Each session carries a secret; rendered forms embed a token derived
//! from it. A token is a random nonce plus a SHA-256 digest of the nonce
//! and the secret, so tokens are single-session and cheap to verify
//! without storing them.

use anyhow::Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Generate a fresh per-session secret.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Issue a token for a form render: `nonce.digest`.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn issue_token(secret: &str) -> Result<String> {
    let mut bytes = [0u8; 8];
    OsRng.try_fill_bytes(&mut bytes)?;
    let nonce = URL_SAFE_NO_PAD.encode(bytes);
    let digest = digest(secret, &nonce);
    Ok(format!("{nonce}.{digest}"))
}

/// Check a submitted token against the session secret.
#[must_use]
pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((nonce, submitted)) = token.split_once('.') else {
        return false;
    };
    if nonce.is_empty() {
        return false;
    }
    digest(secret, nonce) == submitted
}

fn digest(secret: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(b".");
    hasher.update(secret.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
