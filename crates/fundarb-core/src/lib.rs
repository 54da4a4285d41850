//! Core domain types for the fundarb exchange client.
//!
//! This crate provides the numeric building blocks shared by the signer,
//! the HTTP client and the CLI:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `PriceFormatConfig`, `format_price`, `format_size`: exchange precision rules

pub mod decimal;
pub mod error;
pub mod format;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use format::{
    format_price, format_size, FormattedPrice, PriceFormatConfig, RoundingMode,
    DEFAULT_MAX_DECIMALS, DEFAULT_MAX_SIGNIFICANT_DIGITS,
};
