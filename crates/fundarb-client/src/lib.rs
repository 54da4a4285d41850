//! REST client for the exchange.
//!
//! - `POST /exchange`: signed actions ([`ExchangeClient::post_action`])
//! - `POST /info`: account state, mid prices, perp metadata and funding

pub mod client;
pub mod error;
pub mod types;

pub use client::{ExchangeClient, MAINNET_API_URL, TESTNET_API_URL};
pub use error::{ClientError, ClientResult};
pub use types::{
    AssetMeta, AssetPositionData, AssetPositionEntry, ClearinghouseState, CumFunding,
    ExchangeResponse, FundingRate, LeverageInfo, MarginSummary, Meta, MetaAndAssetCtxs,
    OrderStatus, PerpAssetCtx, FUNDING_PERIODS_PER_YEAR,
};
