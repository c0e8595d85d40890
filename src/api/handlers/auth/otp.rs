//! One-time code generation and verification against a user's OTP key.
//!
//! Codes are standard TOTP: SHA-1, six digits, 30 second step, with a
//! one-step skew window so a code sent over SMS survives the boundary.

use anyhow::{Result, anyhow};
use totp_rs::{Algorithm, Secret, TOTP};

const ISSUER: &str = "Selfservice";

fn totp(otp_key: &str, account: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(otp_key.to_string())
        .to_bytes()
        .map_err(|err| anyhow!("invalid OTP key: {err:?}"))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some(ISSUER.to_string()),
        account.to_string(),
    )
    .map_err(|err| anyhow!("failed to build TOTP: {err}"))
}

/// Current code for a user's key, for delivery over SMS.
///
/// # Errors
/// Returns an error if the key is not valid base32 or the clock is
/// unavailable.
pub fn current_code(otp_key: &str, account: &str) -> Result<String> {
    Ok(totp(otp_key, account)?.generate_current()?)
}

/// Check a submitted code, allowing one step of clock skew.
#[must_use]
pub fn verify_code(otp_key: &str, account: &str, code: &str) -> bool {
    match totp(otp_key, account) {
        Ok(totp) => totp.check_current(code).unwrap_or(false),
        Err(_) => false,
    }
}
