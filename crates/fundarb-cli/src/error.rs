//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precision error: {0}")]
    Core(#[from] fundarb_core::CoreError),

    #[error("Signing error: {0}")]
    Signer(#[from] fundarb_signer::SignerError),

    #[error("Key error: {0}")]
    Key(#[from] fundarb_signer::KeyError),

    #[error("Exchange client error: {0}")]
    Client(#[from] fundarb_client::ClientError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] fundarb_telemetry::TelemetryError),

    #[error("Unknown market: {0}")]
    MarketNotFound(String),

    #[error("No mid price for {0}")]
    MissingMid(String),

    #[error("No open short on {coin} for {account}")]
    NoOpenShort { coin: String, account: String },
}

pub type AppResult<T> = Result<T, AppError>;
