//! # Currency and Minor-Unit Money Helpers
//!
//! All amounts in Payhold are `i64` minor units (kobo, cents, pesewas).
//! There are no floats anywhere on a money path, and every arithmetic
//! step is checked — overflow surfaces as a typed error rather than a
//! wrapped balance.
//!
//! `Currency` is a closed enum: a wallet or escrow with an unknown
//! currency string cannot be constructed past the parse boundary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;

/// Currencies the platform custodies.
///
/// Closed set — every `match` on `Currency` is exhaustive, so adding a
/// currency forces every consumer to handle it at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    /// Nigerian naira (minor unit: kobo).
    Ngn,
    /// United States dollar (minor unit: cent).
    Usd,
    /// Ghanaian cedi (minor unit: pesewa).
    Ghs,
    /// Kenyan shilling (minor unit: cent).
    Kes,
}

impl Currency {
    /// The canonical ISO 4217 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ngn => "NGN",
            Self::Usd => "USD",
            Self::Ghs => "GHS",
            Self::Kes => "KES",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NGN" => Ok(Self::Ngn),
            "USD" => Ok(Self::Usd),
            "GHS" => Ok(Self::Ghs),
            "KES" => Ok(Self::Kes),
            other => Err(EngineError::Validation(format!(
                "unsupported currency: {other:?}"
            ))),
        }
    }
}

/// Reject non-positive amounts at the component boundary.
pub fn require_positive(amount: i64, field: &str) -> Result<(), EngineError> {
    if amount <= 0 {
        return Err(EngineError::Validation(format!(
            "{field} must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Checked addition of two minor-unit amounts.
pub fn checked_add(a: i64, b: i64) -> Result<i64, EngineError> {
    a.checked_add(b)
        .ok_or_else(|| EngineError::Validation(format!("amount overflow: {a} + {b}")))
}

/// Compute a basis-point fraction of an amount, rounding down.
///
/// Used for platform fee computation (e.g. 500 bps = 5%). The
/// intermediate product is taken in `i128` so no representable amount
/// can overflow.
pub fn basis_points(amount: i64, bps: u32) -> Result<i64, EngineError> {
    require_positive(amount, "amount")?;
    let product = i128::from(amount) * i128::from(bps) / 10_000;
    i64::try_from(product)
        .map_err(|_| EngineError::Validation(format!("fee overflow: {amount} at {bps} bps")))
}
