//! Fixed-point parsing of user-entered currency amounts.
//!
//! Amounts cross the boundary to the connector as an integer count of pence.
//! Parsing works on digit substrings only; multiplying a float by 100 loses
//! pennies for values like 19.90, so no floating point is involved anywhere.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// Input is not pounds ("10") or pounds and pence ("10.10").
    #[error("amount must be pounds or pounds and pence with two digits")]
    MalformedAmount,
    /// Digits are well formed but the value does not fit in pence.
    #[error("amount out of range")]
    OutOfRange,
}

/// Parse a pounds or pounds-and-pence string into whole pence.
///
/// Accepted shapes are an integer pounds string ("10") or a pounds string
/// with exactly two fractional digits ("19.90"). A single fractional digit
/// ("1.9") is rejected rather than guessed at.
///
/// # Errors
/// Returns `AmountError::MalformedAmount` for any other shape, and
/// `AmountError::OutOfRange` when the value overflows.
pub fn parse_pounds_to_pence(input: &str) -> Result<i64, AmountError> {
    let pattern =
        Regex::new(r"^([0-9]+)(?:\.([0-9]{2}))?$").map_err(|_| AmountError::MalformedAmount)?;

    let captures = pattern
        .captures(input.trim())
        .ok_or(AmountError::MalformedAmount)?;

    let pounds: i64 = captures
        .get(1)
        .ok_or(AmountError::MalformedAmount)?
        .as_str()
        .parse()
        .map_err(|_| AmountError::OutOfRange)?;

    let pence: i64 = match captures.get(2) {
        Some(fraction) => fraction
            .as_str()
            .parse()
            .map_err(|_| AmountError::OutOfRange)?,
        None => 0,
    };

    pounds
        .checked_mul(100)
        .and_then(|value| value.checked_add(pence))
        .ok_or(AmountError::OutOfRange)
}

/// Parse the "amount available for refund, in pence" value echoed back from
/// a previously rendered page. Digits only; leading zeros are fine ("000").
///
/// # Errors
/// Returns `AmountError::MalformedAmount` when the value is not all digits.
pub fn parse_pence(input: &str) -> Result<i64, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(AmountError::MalformedAmount);
    }
    trimmed.parse().map_err(|_| AmountError::OutOfRange)
}
