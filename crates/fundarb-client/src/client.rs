//! HTTP client for the exchange REST API.

use std::collections::HashMap;
use std::time::Duration;

use fundarb_signer::SignedEnvelope;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::types::{ClearinghouseState, ExchangeResponse, Meta, MetaAndAssetCtxs};

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for the info endpoint.
#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

/// Client for `/exchange` and `/info`.
///
/// Sends each request once; no retries.
pub struct ExchangeClient {
    client: Client,
    base_url: String,
}

impl ExchangeClient {
    /// # Arguments
    /// * `base_url` - API root without trailing path (e.g., "https://api.hyperliquid.xyz")
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn for_network(is_mainnet: bool) -> ClientResult<Self> {
        Self::new(if is_mainnet {
            MAINNET_API_URL
        } else {
            TESTNET_API_URL
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a signed action.
    ///
    /// # Errors
    /// - `ClientError::Http` on transport failure or non-2xx status
    /// - `ClientError::Rejected` when the exchange answers `status: "err"`
    pub async fn post_action(&self, envelope: &SignedEnvelope) -> ClientResult<ExchangeResponse> {
        let kind = envelope.action.kind();
        debug!(kind, nonce = envelope.nonce, "Posting signed action");

        let response: ExchangeResponse = self.post_json("exchange", envelope).await?;
        match response.into_result() {
            Ok(response) => {
                info!(kind, nonce = envelope.nonce, "Exchange accepted action");
                Ok(response)
            }
            Err(e) => {
                warn!(kind, nonce = envelope.nonce, error = %e, "Exchange rejected action");
                Err(e)
            }
        }
    }

    /// Account summary and open positions.
    pub async fn clearinghouse_state(&self, user: &str) -> ClientResult<ClearinghouseState> {
        info!(user = %user, "Fetching clearinghouseState");
        let state: ClearinghouseState = self
            .info(&InfoRequest {
                request_type: "clearinghouseState",
                user: Some(user),
            })
            .await?;
        debug!(positions = state.asset_positions.len(), "Fetched clearinghouseState");
        Ok(state)
    }

    /// Mid price per coin.
    pub async fn all_mids(&self) -> ClientResult<HashMap<String, Decimal>> {
        let raw: HashMap<String, String> = self
            .info(&InfoRequest {
                request_type: "allMids",
                user: None,
            })
            .await?;
        parse_mids(raw)
    }

    /// Perp universe (names, size decimals, max leverage).
    pub async fn meta(&self) -> ClientResult<Meta> {
        let meta: Meta = self
            .info(&InfoRequest {
                request_type: "meta",
                user: None,
            })
            .await?;
        debug!(assets = meta.universe.len(), "Fetched meta");
        Ok(meta)
    }

    /// Perp universe together with live contexts (funding, mark, open interest).
    pub async fn meta_and_asset_ctxs(&self) -> ClientResult<MetaAndAssetCtxs> {
        let response: MetaAndAssetCtxs = self
            .info(&InfoRequest {
                request_type: "metaAndAssetCtxs",
                user: None,
            })
            .await?;
        if response.0.universe.len() != response.1.len() {
            return Err(ClientError::Parse(format!(
                "metaAndAssetCtxs: {} assets but {} contexts",
                response.0.universe.len(),
                response.1.len()
            )));
        }
        debug!(assets = response.1.len(), "Fetched metaAndAssetCtxs");
        Ok(response)
    }

    async fn info<T: DeserializeOwned>(&self, request: &InfoRequest<'_>) -> ClientResult<T> {
        self.post_json("info", request).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let url = format!("{}/{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse /{path} response: {e}")))
    }
}

fn parse_mids(raw: HashMap<String, String>) -> ClientResult<HashMap<String, Decimal>> {
    raw.into_iter()
        .map(|(coin, px)| {
            let mid = px
                .parse::<Decimal>()
                .map_err(|e| ClientError::Parse(format!("mid for {coin}: {px}: {e}")))?;
            Ok((coin, mid))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_info_request_serialization() {
        let request = InfoRequest {
            request_type: "allMids",
            user: None,
        };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"type":"allMids"}"#);

        let request = InfoRequest {
            request_type: "clearinghouseState",
            user: Some("0xabc"),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"type":"clearinghouseState","user":"0xabc"}"#
        );
    }

    #[test]
    fn test_network_urls() {
        assert_eq!(
            ExchangeClient::for_network(true).unwrap().base_url(),
            MAINNET_API_URL
        );
        assert_eq!(
            ExchangeClient::for_network(false).unwrap().base_url(),
            TESTNET_API_URL
        );
        assert_eq!(
            ExchangeClient::new("http://localhost:3001/").unwrap().base_url(),
            "http://localhost:3001"
        );
    }

    #[test]
    fn test_parse_mids() {
        let raw = HashMap::from([
            ("BTC".to_string(), "64123.5".to_string()),
            ("@107".to_string(), "0.00312".to_string()),
        ]);
        let mids = parse_mids(raw).unwrap();
        assert_eq!(mids["BTC"], dec!(64123.5));
        assert_eq!(mids["@107"], dec!(0.00312));

        let bad = HashMap::from([("ETH".to_string(), "n/a".to_string())]);
        assert!(matches!(parse_mids(bad), Err(ClientError::Parse(_))));
    }
}
