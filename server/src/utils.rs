use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Lookup key for case-insensitive names (cities, vehicle types, stations)
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse an ISO-8601 request timestamp. Values without an offset are read as UTC.
pub fn parse_request_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("Invalid timestamp: {}. Expected ISO-8601, e.g. 2024-03-01T12:00:00Z", value))
}

/// Upper bound for an administrative base fee, in euros.
pub const MAX_BASE_FEE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Parse an administrative base fee. Fees must be non-negative and at most
/// [`MAX_BASE_FEE`].
pub fn parse_fee(value: &str) -> Result<Decimal, String> {
    let fee = Decimal::from_str(value.trim())
        .map_err(|_| format!("Invalid fee: {}. Must be a decimal number", value))?;
    if fee.is_sign_negative() && !fee.is_zero() {
        return Err(format!("Invalid fee: {}. Must not be negative", value));
    }
    if fee > MAX_BASE_FEE {
        return Err(format!("Invalid fee: {}. Must not exceed {}", value, MAX_BASE_FEE));
    }
    Ok(fee)
}
