//! Bridge between the string-encoded decimal storage form and the in-memory
//! `Decimal` used for arithmetic. Stored values are plain base-10 strings so
//! no binary floating-point representation ever crosses the persistence
//! boundary. Conversion back to storage form happens exactly once, at the
//! write boundary, rounded to two decimal places; intermediate aggregation
//! arithmetic stays at full precision.

use crate::errors::{AppError, AppResult};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

pub const MONEY_SCALE: u32 = 2;

/// Rounds to the monetary scale. Applied at the persistence and display
/// boundaries only.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn to_storage(value: Decimal) -> String {
    round_money(value).normalize().to_string()
}

/// Parses a stored decimal string. Scientific notation and anything
/// non-numeric is rejected; a corrupt column is a data-integrity fault and is
/// never coerced to zero.
pub fn from_storage(raw: &str) -> AppResult<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::MalformedDecimal(
            "empty string where a decimal was expected".to_string(),
        ));
    }
    Decimal::from_str(trimmed)
        .map_err(|error| AppError::MalformedDecimal(format!("'{}': {}", trimmed, error)))
}
