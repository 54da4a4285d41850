//! fundarb command-line application.
//!
//! Opens and closes funding-rate arbitrage shorts through a short-lived
//! delegate key:
//! - Mid price and asset metadata from `/info`
//! - Delegate approval signed by the primary wallet
//! - Leverage update and order signed by the delegate

pub mod app;
pub mod config;
pub mod error;

pub use app::{
    plan_close, plan_open, Application, MarketQuote, TradeReport, BRIDGE_PERMIT_TTL_SECS,
};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
