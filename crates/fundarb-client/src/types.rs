//! Response types for `/exchange` and `/info`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// /exchange
// =============================================================================

/// Raw `/exchange` reply: `{"status":"ok"|"err","response":...}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeResponse {
    pub status: String,
    /// Opaque body; a string message when `status` is `"err"`.
    #[serde(default)]
    pub response: serde_json::Value,
}

/// Per-order outcome inside an `order` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Resting { oid: u64 },
    Filled { oid: u64, total_sz: Decimal, avg_px: Decimal },
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum RawOrderStatus {
    Resting { oid: u64 },
    Filled {
        oid: u64,
        #[serde(rename = "totalSz")]
        total_sz: Decimal,
        #[serde(rename = "avgPx")]
        avg_px: Decimal,
    },
    Error(String),
}

impl From<RawOrderStatus> for OrderStatus {
    fn from(raw: RawOrderStatus) -> Self {
        match raw {
            RawOrderStatus::Resting { oid } => Self::Resting { oid },
            RawOrderStatus::Filled {
                oid,
                total_sz,
                avg_px,
            } => Self::Filled {
                oid,
                total_sz,
                avg_px,
            },
            RawOrderStatus::Error(msg) => Self::Error(msg),
        }
    }
}

impl ExchangeResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Turn a `"err"` status into `ClientError::Rejected`.
    pub fn into_result(self) -> ClientResult<Self> {
        if self.is_ok() {
            return Ok(self);
        }
        let message = match &self.response {
            serde_json::Value::String(msg) => msg.clone(),
            serde_json::Value::Null => format!("status {}", self.status),
            other => other.to_string(),
        };
        Err(ClientError::Rejected(message))
    }

    /// `response.data.statuses` of an order reply. Empty for other action types.
    pub fn order_statuses(&self) -> ClientResult<Vec<OrderStatus>> {
        let Some(statuses) = self.response.pointer("/data/statuses") else {
            return Ok(Vec::new());
        };
        let raw: Vec<RawOrderStatus> = serde_json::from_value(statuses.clone())
            .map_err(|e| ClientError::Parse(format!("order statuses: {e}")))?;
        Ok(raw.into_iter().map(OrderStatus::from).collect())
    }
}

// =============================================================================
// /info clearinghouseState
// =============================================================================

/// Margin summary from clearinghouseState.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarginSummary {
    #[serde(rename = "accountValue")]
    pub account_value: Decimal,
    #[serde(rename = "totalNtlPos")]
    pub total_notional_position: Decimal,
    #[serde(rename = "totalRawUsd")]
    pub total_raw_usd: Decimal,
    #[serde(rename = "totalMarginUsed")]
    pub total_margin_used: Decimal,
}

/// Endpoint: POST /info with `{"type": "clearinghouseState", "user": "<address>"}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClearinghouseState {
    #[serde(rename = "marginSummary")]
    pub margin_summary: Option<MarginSummary>,
    #[serde(rename = "crossMarginSummary")]
    pub cross_margin_summary: Option<MarginSummary>,
    #[serde(rename = "crossMaintenanceMarginUsed")]
    pub cross_maintenance_margin_used: Option<Decimal>,
    pub withdrawable: Option<Decimal>,
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<AssetPositionEntry>,
    /// Exchange time in milliseconds.
    pub time: Option<u64>,
}

impl ClearinghouseState {
    /// Open position in `coin`, if any.
    pub fn position(&self, coin: &str) -> Option<&AssetPositionData> {
        self.asset_positions
            .iter()
            .map(|entry| &entry.position)
            .find(|position| position.coin == coin && !position.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionEntry {
    pub position: AssetPositionData,
    /// "oneWay"
    #[serde(rename = "type")]
    pub position_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetPositionData {
    pub coin: String,
    /// Signed size: positive = long, negative = short.
    pub szi: Decimal,
    #[serde(rename = "entryPx")]
    pub entry_px: Option<Decimal>,
    #[serde(rename = "liquidationPx")]
    pub liquidation_px: Option<Decimal>,
    #[serde(rename = "positionValue")]
    pub position_value: Option<Decimal>,
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(rename = "returnOnEquity")]
    pub return_on_equity: Option<Decimal>,
    pub leverage: Option<LeverageInfo>,
    #[serde(rename = "cumFunding")]
    pub cum_funding: Option<CumFunding>,
    #[serde(rename = "marginUsed")]
    pub margin_used: Option<Decimal>,
}

impl AssetPositionData {
    pub fn is_long(&self) -> bool {
        self.szi > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.szi < Decimal::ZERO
    }

    pub fn is_empty(&self) -> bool {
        self.szi.is_zero()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeverageInfo {
    /// "cross" or "isolated"
    #[serde(rename = "type")]
    pub leverage_type: Option<String>,
    pub value: Option<u32>,
    #[serde(rename = "rawUsd")]
    pub raw_usd: Option<Decimal>,
}

/// Funding paid (positive) or received (negative).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CumFunding {
    #[serde(rename = "allTime")]
    pub all_time: Option<Decimal>,
    #[serde(rename = "sinceOpen")]
    pub since_open: Option<Decimal>,
    #[serde(rename = "sinceChange")]
    pub since_change: Option<Decimal>,
}

// =============================================================================
// /info meta
// =============================================================================

/// Perp universe. The asset index is the position in `universe`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetMeta {
    pub name: String,
    #[serde(rename = "szDecimals")]
    pub sz_decimals: u32,
    #[serde(rename = "maxLeverage")]
    pub max_leverage: u32,
    #[serde(rename = "onlyIsolated", default)]
    pub only_isolated: bool,
    #[serde(rename = "isDelisted", default)]
    pub is_delisted: bool,
}

impl Meta {
    pub fn asset_index(&self, name: &str) -> Option<u32> {
        self.universe
            .iter()
            .position(|asset| asset.name == name)
            .map(|idx| idx as u32)
    }

    /// Index and metadata of `name`.
    pub fn asset(&self, name: &str) -> Option<(u32, &AssetMeta)> {
        self.universe
            .iter()
            .enumerate()
            .find(|(_, asset)| asset.name == name)
            .map(|(idx, asset)| (idx as u32, asset))
    }
}

// =============================================================================
// /info metaAndAssetCtxs
// =============================================================================

/// Funding is settled hourly.
pub const FUNDING_PERIODS_PER_YEAR: u32 = 24 * 365;

/// Reply to `{"type":"metaAndAssetCtxs"}`: `[meta, contexts]`, with one
/// context per `universe` entry in the same order.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaAndAssetCtxs(pub Meta, pub Vec<PerpAssetCtx>);

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpAssetCtx {
    /// Current hourly funding rate. Positive means longs pay shorts.
    pub funding: Decimal,
    pub open_interest: Option<Decimal>,
    pub mark_px: Option<Decimal>,
    /// Null when the book is empty.
    pub mid_px: Option<Decimal>,
    pub oracle_px: Option<Decimal>,
    pub premium: Option<Decimal>,
    pub day_ntl_vlm: Option<Decimal>,
}

/// Funding of one perp, as shown to someone choosing what to short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingRate {
    pub coin: String,
    pub asset_index: u32,
    pub hourly: Decimal,
    /// `hourly * 24 * 365`, in percent.
    pub annualized_pct: Decimal,
}

impl MetaAndAssetCtxs {
    /// Funding per listed perp, highest first. Delisted assets are skipped.
    pub fn funding_rates(&self) -> Vec<FundingRate> {
        let Self(meta, ctxs) = self;
        let annualize = Decimal::from(FUNDING_PERIODS_PER_YEAR) * Decimal::ONE_HUNDRED;

        let mut rates: Vec<FundingRate> = meta
            .universe
            .iter()
            .zip(ctxs)
            .enumerate()
            .filter(|(_, (asset, _))| !asset.is_delisted)
            .map(|(idx, (asset, ctx))| FundingRate {
                coin: asset.name.clone(),
                asset_index: idx as u32,
                hourly: ctx.funding,
                annualized_pct: ctx.funding * annualize,
            })
            .collect();
        rates.sort_by(|a, b| b.hourly.cmp(&a.hourly).then_with(|| a.coin.cmp(&b.coin)));
        rates
    }
}
