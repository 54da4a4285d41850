//! Exchange precision rules for order prices and sizes.
//!
//! The exchange accepts a limit price only when it has at most
//! `max_decimals - sz_decimals` decimal places and at most
//! `max_significant_digits` significant digits. Prices are brought into
//! range in two stages:
//!
//! 1. Truncate the fractional digits to the decimal-place limit.
//! 2. If the result still carries too many significant digits, re-round it
//!    to fewer decimal places (never below zero) and render it as a
//!    fixed-decimal string.
//!
//! The stages must not be merged into a single rounding step: values near a
//! digit boundary (e.g. `100000.123456` at `sz_decimals = 0`) come out
//! differently and the exchange rejects the order.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::decimal::{Price, Size};

/// Perp price decimal budget shared between price and size decimals.
pub const DEFAULT_MAX_DECIMALS: u32 = 6;

/// Maximum significant digits accepted in a price.
pub const DEFAULT_MAX_SIGNIFICANT_DIGITS: u32 = 5;

/// Rounding applied in the second (significant-digit) stage.
///
/// `HalfUp` reproduces the web UI's `toFixed` output: `99999.99999` at one
/// size decimal becomes `100000` there, where `Truncate` gives `99999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Drop the excess digits.
    #[default]
    Truncate,
    /// Round half away from zero.
    HalfUp,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Self::Truncate => RoundingStrategy::ToZero,
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

/// Precision limits used by [`format_price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFormatConfig {
    /// Decimal places shared by price and size (`6` on perps).
    #[serde(default = "default_max_decimals")]
    pub max_decimals: u32,
    /// Maximum significant digits in a price.
    #[serde(default = "default_max_significant_digits")]
    pub max_significant_digits: u32,
    /// Second-stage rounding.
    #[serde(default)]
    pub rounding: RoundingMode,
}

fn default_max_decimals() -> u32 {
    DEFAULT_MAX_DECIMALS
}

fn default_max_significant_digits() -> u32 {
    DEFAULT_MAX_SIGNIFICANT_DIGITS
}

impl Default for PriceFormatConfig {
    fn default() -> Self {
        Self {
            max_decimals: DEFAULT_MAX_DECIMALS,
            max_significant_digits: DEFAULT_MAX_SIGNIFICANT_DIGITS,
            rounding: RoundingMode::default(),
        }
    }
}

/// Result of [`format_price`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedPrice {
    /// Numeric value: the input unchanged, or its truncated form.
    Number(Decimal),
    /// Re-rounded fixed-decimal rendering.
    Fixed(String),
}

impl FormattedPrice {
    /// String sent on the wire.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// True when the significant-digit stage had to re-round.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

impl fmt::Display for FormattedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", value.normalize()),
            Self::Fixed(text) => f.write_str(text),
        }
    }
}

impl Serialize for FormattedPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Format a limit price for the exchange.
///
/// `sz_decimals` is the asset's size precision from the exchange metadata.
/// Prices without a fractional part are returned unchanged.
pub fn format_price(price: Price, sz_decimals: u32, config: &PriceFormatConfig) -> FormattedPrice {
    let value = price.inner().normalize();
    let max_decimal_places = config.max_decimals.saturating_sub(sz_decimals);

    let text = value.to_string();
    let (integer_part, fractional_part) = match text.split_once('.') {
        Some(parts) => parts,
        None => return FormattedPrice::Number(value),
    };
    if fractional_part.bytes().all(|b| b == b'0') {
        return FormattedPrice::Number(value);
    }

    // Stage 1: truncate, never round.
    let kept_len = fractional_part.len().min(max_decimal_places as usize);
    let kept = &fractional_part[..kept_len];
    let truncated = value.round_dp_with_strategy(kept_len as u32, RoundingStrategy::ToZero);

    let significant_integer = integer_part
        .trim_start_matches('-')
        .trim_start_matches('0')
        .len();
    let significant_fraction = kept.trim_end_matches('0').len();
    let significant = (significant_integer + significant_fraction) as i64;
    let max_significant = i64::from(config.max_significant_digits);

    if significant <= max_significant {
        return FormattedPrice::Number(truncated.normalize());
    }

    // Stage 2: drop the excess significant digits from the fractional side.
    let rounding_factor = (kept_len as i64 - (significant - max_significant)).max(0) as u32;
    let rounded = truncated.round_dp_with_strategy(rounding_factor, config.rounding.strategy());
    FormattedPrice::Fixed(format!("{:.*}", rounding_factor as usize, rounded))
}

/// Format an order size with exactly `sz_decimals` decimal places.
pub fn format_size(size: Size, sz_decimals: u32) -> String {
    let rounded = size
        .inner()
        .round_dp_with_strategy(sz_decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", sz_decimals as usize, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fmt(price: Decimal, sz_decimals: u32) -> FormattedPrice {
        format_price(Price::new(price), sz_decimals, &PriceFormatConfig::default())
    }

    #[test]
    fn test_integer_price_unchanged() {
        assert_eq!(fmt(dec!(100000), 0), FormattedPrice::Number(dec!(100000)));
        assert_eq!(fmt(dec!(100000), 0).to_wire(), "100000");
    }

    #[test]
    fn test_zero_fraction_unchanged() {
        // 42.000 normalizes to 42
        assert_eq!(fmt(dec!(42.000), 3).to_wire(), "42");
    }

    #[test]
    fn test_truncate_within_significant_digits() {
        // 6 - 2 = 4 decimals: 1.23456789 -> 1.2345 (5 significant digits)
        let formatted = fmt(dec!(1.23456789), 2);
        assert_eq!(formatted, FormattedPrice::Number(dec!(1.2345)));
        assert!(!formatted.is_fixed());
    }

    #[test]
    fn test_truncate_does_not_round_up() {
        // 0.0199999 truncated to 4 decimals is 0.0199, not 0.0200
        assert_eq!(fmt(dec!(0.0199999), 2).to_wire(), "0.0199");
    }

    #[test]
    fn test_large_integer_part_clamps_to_zero_decimals() {
        let formatted = fmt(dec!(123456.789), 0);
        assert_eq!(formatted, FormattedPrice::Fixed("123456".to_string()));
    }

    #[test]
    fn test_boundary_case_two_stage() {
        // Truncate keeps 6 decimals (12 significant digits), re-round to 0 places
        assert_eq!(fmt(dec!(100000.123456), 0).to_wire(), "100000");
    }

    #[test]
    fn test_second_stage_rounding_keeps_decimals() {
        // 6 - 1 = 5 decimals: 1234.56789 -> 1234.56789, 9 significant digits,
        // rounding factor 5 - 4 = 1 -> "1234.5"
        assert_eq!(fmt(dec!(1234.56789), 1).to_wire(), "1234.5");
    }

    #[test]
    fn test_second_stage_pads_trailing_zeros() {
        // 10.0001 -> 6 significant digits, rounding factor 4 - 1 = 3 -> "10.000"
        assert_eq!(fmt(dec!(10.0001), 2).to_wire(), "10.000");
    }

    #[test]
    fn test_half_up_rounding_mode() {
        let config = PriceFormatConfig {
            rounding: RoundingMode::HalfUp,
            ..Default::default()
        };
        let formatted = format_price(Price::new(dec!(123456.789)), 0, &config);
        assert_eq!(formatted.to_wire(), "123457");
    }

    #[test]
    fn test_half_up_matches_ui_where_truncate_differs() {
        let half_up = PriceFormatConfig {
            rounding: RoundingMode::HalfUp,
            ..Default::default()
        };
        let cases = [
            (dec!(99999.99999), "99999", "100000"),
            (dec!(1234.56789), "1234.5", "1234.6"),
        ];
        for (price, truncated, ui) in cases {
            assert_eq!(fmt(price, 1).to_wire(), truncated);
            assert_eq!(format_price(Price::new(price), 1, &half_up).to_wire(), ui);
        }
    }

    #[test]
    fn test_custom_limits() {
        let config = PriceFormatConfig {
            max_decimals: 8,
            max_significant_digits: 5,
            rounding: RoundingMode::Truncate,
        };
        // 8 - 2 = 6 decimals keeps "000123"; leading fractional zeros count
        // toward the significant digits, so one more digit is dropped
        let formatted = format_price(Price::new(dec!(0.000123456789)), 2, &config);
        assert_eq!(formatted.to_wire(), "0.00012");
    }

    #[test]
    fn test_sz_decimals_above_budget_saturates() {
        // No decimal places allowed at all; fraction is dropped
        assert_eq!(fmt(dec!(12.75), 7).to_wire(), "12");
    }

    #[test]
    fn test_negative_price_sign_is_not_a_digit() {
        assert_eq!(fmt(dec!(-1.23456789), 2).to_wire(), "-1.2345");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(Size::new(dec!(0.0123456)), 4), "0.0123");
        assert_eq!(format_size(Size::new(dec!(2)), 3), "2.000");
        assert_eq!(format_size(Size::new(dec!(1.25)), 1), "1.3");
        assert_eq!(format_size(Size::new(dec!(7.6)), 0), "8");
    }

    #[test]
    fn test_formatted_price_serializes_as_string() {
        let json = serde_json::to_string(&fmt(dec!(1.23456789), 2)).unwrap();
        assert_eq!(json, r#""1.2345""#);
    }
}
