// Token amount conversion module
// This file converts between human-readable decimal amounts and integer
// base units using arbitrary-precision arithmetic
//
// Numan Thabit 2025 Nov

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};
use std::str::FromStr;
use thiserror::Error;

/// Fractional digits in every human-facing amount string.
pub const DISPLAY_DECIMALS: u32 = 6;

/// Largest decimals value accepted for a token.
pub const MAX_DECIMALS: u32 = 64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must be positive")]
    NotPositive,
    #[error("amount {0:?} is not a decimal number")]
    NotANumber(String),
    #[error("amount is smaller than one base unit")]
    BelowBaseUnit,
    #[error("decimals {0} exceeds maximum of {MAX_DECIMALS}")]
    DecimalsOutOfRange(u32),
}

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// Convert a human-readable amount into base units, truncating toward zero.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<BigUint, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::DecimalsOutOfRange(decimals));
    }
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(UnitsError::NotPositive);
    }
    // Plain decimal notation only; exponents would let a short string demand a huge allocation.
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = trimmed.chars().filter(|c| *c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != trimmed.len() {
        return Err(UnitsError::NotANumber(trimmed.to_string()));
    }

    let value = BigDecimal::from_str(trimmed)
        .map_err(|_| UnitsError::NotANumber(trimmed.to_string()))?;
    if value.sign() != Sign::Plus {
        return Err(UnitsError::NotPositive);
    }

    let scaled = value * BigDecimal::from(BigInt::from(pow10(decimals)));
    let (integer, _) = scaled.with_scale(0).into_bigint_and_exponent();
    let base = integer
        .to_biguint()
        .ok_or(UnitsError::NotPositive)?;
    if base == BigUint::from(0u32) {
        return Err(UnitsError::BelowBaseUnit);
    }
    Ok(base)
}

/// Format a base-unit amount as a human string with six fractional digits (truncated).
pub fn format_human(raw: &BigUint, decimals: u32) -> String {
    let scaled = if decimals >= DISPLAY_DECIMALS {
        raw / pow10(decimals - DISPLAY_DECIMALS)
    } else {
        raw * pow10(DISPLAY_DECIMALS - decimals)
    };
    let unit = pow10(DISPLAY_DECIMALS);
    let whole = &scaled / &unit;
    let frac = (&scaled % &unit).to_string();
    format!("{whole}.{frac:0>6}")
}

/// Parse an upstream base-unit integer string. Anything but plain digits is rejected.
pub fn parse_base_units(raw: &str) -> Option<BigUint> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn converts_to_base_units_without_float_loss() {
        let raw = to_base_units("1.5", 24).unwrap();
        assert_eq!(raw.to_string(), "1500000000000000000000000");

        let raw = to_base_units("123456789.123456789123456789", 24).unwrap();
        assert_eq!(raw.to_string(), "123456789123456789123456789000000");
    }

    #[test]
    fn truncates_toward_zero() {
        let raw = to_base_units("1.999", 2).unwrap();
        assert_eq!(raw.to_string(), "199");
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(to_base_units("0", 24), Err(UnitsError::NotPositive));
        assert_eq!(to_base_units("-1", 24), Err(UnitsError::NotPositive));
        assert!(matches!(
            to_base_units("abc", 24),
            Err(UnitsError::NotANumber(_))
        ));
        assert!(matches!(
            to_base_units("1e30", 24),
            Err(UnitsError::NotANumber(_))
        ));
        assert!(matches!(
            to_base_units("1.2.3", 6),
            Err(UnitsError::NotANumber(_))
        ));
        assert_eq!(to_base_units("  ", 6), Err(UnitsError::Empty));
        assert_eq!(to_base_units("0.001", 2), Err(UnitsError::BelowBaseUnit));
        assert_eq!(
            to_base_units("1", MAX_DECIMALS + 1),
            Err(UnitsError::DecimalsOutOfRange(MAX_DECIMALS + 1))
        );
    }

    #[test]
    fn formats_six_places() {
        let raw = BigUint::from_str("1234567890000000000000000").unwrap();
        assert_eq!(format_human(&raw, 24), "1.234567");
        assert_eq!(format_human(&BigUint::from(0u32), 24), "0.000000");
        assert_eq!(format_human(&BigUint::from(5u32), 0), "5.000000");
        assert_eq!(format_human(&BigUint::from(42u32), 6), "0.000042");
    }

    #[test]
    fn parses_only_plain_integers() {
        assert_eq!(parse_base_units("1000"), Some(BigUint::from(1000u32)));
        assert_eq!(parse_base_units("1e3"), None);
        assert_eq!(parse_base_units("-5"), None);
        assert_eq!(parse_base_units(""), None);
    }

    proptest! {
        #[test]
        fn round_trip_within_display_precision(
            whole in 1u64..1_000_000_000_000u64,
            frac in 0u32..1_000_000u32,
            decimals in 0u32..=30u32,
        ) {
            let places = decimals.min(DISPLAY_DECIMALS) as usize;
            let frac_str = format!("{frac:06}");
            let amount = if places == 0 {
                whole.to_string()
            } else {
                format!("{whole}.{}", &frac_str[..places])
            };

            let raw = to_base_units(&amount, decimals).unwrap();
            let back = BigDecimal::from_str(&format_human(&raw, decimals)).unwrap();
            let original = BigDecimal::from_str(&amount).unwrap();
            let tolerance = BigDecimal::from_str("0.000001").unwrap();
            prop_assert!((back - original).abs() <= tolerance);
        }
    }
}
