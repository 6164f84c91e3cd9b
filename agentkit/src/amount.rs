//! Conversion between human-readable token amounts and raw on-chain units
//!
//! "1.5" with 18 decimals is 1500000000000000000.

use ethers::types::U256;

/// Parse a non-negative decimal string into raw units.
/// Fails on signs, exponents, extra dots, or more fraction digits than `decimals`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("Invalid amount: ''. Must be a number.".to_string());
    }

    let (integer_part, decimal_part) = match amount.split_once('.') {
        Some((int_str, dec_str)) => {
            if !int_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Invalid integer part: '{}'", int_str));
            }
            if !dec_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Invalid decimal part: '{}'", dec_str));
            }
            if int_str.is_empty() && dec_str.is_empty() {
                return Err(format!("Invalid amount: '{}'. Must be a number.", amount));
            }
            (if int_str.is_empty() { "0" } else { int_str }, dec_str)
        }
        None => {
            if !amount.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Invalid amount: '{}'. Must be a number.", amount));
            }
            (amount, "")
        }
    };

    let decimals = decimals as usize;
    // Trailing zeros in the fraction carry no precision
    let decimal_part = decimal_part.trim_end_matches('0');
    if decimal_part.len() > decimals {
        return Err(format!(
            "Amount '{}' has {} decimal places but token only has {} decimals. Maximum precision exceeded.",
            amount,
            decimal_part.len(),
            decimals
        ));
    }

    let raw = format!(
        "{}{}{}",
        integer_part,
        decimal_part,
        "0".repeat(decimals - decimal_part.len())
    );
    let raw = raw.trim_start_matches('0');
    if raw.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(raw).map_err(|_| format!("Amount '{}' is too large", amount))
}

/// Ether (18 decimals) to wei
pub fn parse_ether(amount: &str) -> Result<U256, String> {
    parse_units(amount, 18)
}

/// Format raw units as a decimal string without trailing zeros
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

pub fn format_ether(wei: U256) -> String {
    format_units(wei, 18)
}

/// Strictly positive finite decimal, e.g. "0.01"
pub fn is_positive_decimal(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit() || c == '.')
        && value.matches('.').count() <= 1
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| ('1'..='9').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 18).unwrap(), U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(parse_units("100", 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(parse_units(".25", 6).unwrap(), U256::from(250_000u64));
        assert_eq!(parse_units("0.000", 6).unwrap(), U256::zero());
        assert_eq!(parse_units("1.100000", 2).unwrap(), U256::from(110u64));
    }

    #[test]
    fn test_parse_units_rejects() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("1e18", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units(".", 18).is_err());
        assert!(parse_units("0.0000001", 6).unwrap_err().contains("Maximum precision exceeded"));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(42u64), 6), "0.000042");
        assert_eq!(format_units(U256::from(7_000_000u64), 6), "7");
        assert_eq!(format_units(U256::zero(), 18), "0");
        assert_eq!(format_units(U256::from(123u64), 0), "123");
        assert_eq!(format_ether(U256::exp10(18)), "1");
    }

    #[test]
    fn test_is_positive_decimal() {
        assert!(is_positive_decimal("0.01"));
        assert!(is_positive_decimal("3"));
        assert!(!is_positive_decimal("0"));
        assert!(!is_positive_decimal("0.000"));
        assert!(!is_positive_decimal("-1"));
        assert!(!is_positive_decimal("abc"));
        assert!(!is_positive_decimal("."));
    }
}
