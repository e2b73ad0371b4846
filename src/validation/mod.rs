//! Input checks and MSISDN normalization shared by the payment flows.

use sqlx::types::BigDecimal;

use crate::error::AppError;

pub const COUNTRY_CODE: &str = "254";

/// Rewrites a payer phone number into canonical international form:
/// whitespace stripped, a national-trunk `0` prefix rewritten to the
/// country code, a leading `+` sigil dropped. Any other shape passes
/// through unchanged. Idempotent.
pub fn normalize_msisdn(raw: &str) -> String {
    let phone: String = raw.split_whitespace().collect();

    if let Some(rest) = phone.strip_prefix('0') {
        return format!("{}{}", COUNTRY_CODE, rest);
    }
    if let Some(rest) = phone.strip_prefix('+') {
        return rest.to_string();
    }

    phone
}

pub fn require<T>(field: &'static str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or(AppError::MissingField(field))
}

/// An absent or non-positive amount is treated as missing, matching the
/// request contract (`amount: number > 0`).
pub fn require_amount(field: &'static str, value: Option<BigDecimal>) -> Result<BigDecimal, AppError> {
    let amount = require(field, value)?;
    if amount <= BigDecimal::from(0) {
        return Err(AppError::MissingField(field));
    }

    Ok(amount)
}
