//! Exchange action payloads and the L1 action hash.
//!
//! Reference: hyperliquid-python-sdk/hyperliquid/utils/signing.py
//!
//! IMPORTANT: field declaration order is the msgpack key order, and the
//! msgpack bytes are hashed. Reordering a field, adding one, or serializing a
//! `None` as `nil` changes the hash and the exchange rejects the signature.

use alloy::primitives::{keccak256, Address, B256};
use serde::{Serialize, Serializer};

use crate::error::{SignerError, SignerResult};

/// Serialize a u64 as a `0x`-prefixed hex string (`signatureChainId`).
fn serialize_hex_u64<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("0x{value:x}"))
}

fn serialize_address<S: Serializer>(address: &Address, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("0x{}", hex::encode(address.as_slice())))
}

/// One exchange operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Action {
    /// `{"type":"order","orders":[...],"grouping":"na"}`
    #[serde(rename = "order")]
    PlaceOrder(PlaceOrder),
    /// `{"type":"updateLeverage","asset":..,"isCross":..,"leverage":..}`
    #[serde(rename = "updateLeverage")]
    UpdateLeverage(UpdateLeverage),
    /// `{"type":"approveAgent",...}`, signed with the primary wallet.
    #[serde(rename = "approveAgent")]
    ApproveDelegate(ApproveDelegate),
}

impl Action {
    /// Short name used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlaceOrder(_) => "order",
            Self::UpdateLeverage(_) => "updateLeverage",
            Self::ApproveDelegate(_) => "approveAgent",
        }
    }

    /// Single-order action with `"na"` grouping.
    pub fn place_order(request: OrderRequest) -> Self {
        Self::PlaceOrder(PlaceOrder {
            orders: vec![OrderWire::from(request)],
            grouping: "na".to_string(),
        })
    }

    pub fn update_leverage(asset: u32, is_cross: bool, leverage: u32) -> Self {
        Self::UpdateLeverage(UpdateLeverage {
            asset,
            is_cross,
            leverage,
        })
    }
}

/// Order batch.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrder {
    pub orders: Vec<OrderWire>,
    /// "na" for independent orders.
    pub grouping: String,
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeInForce {
    /// Good till cancel.
    #[default]
    Gtc,
    /// Immediate or cancel.
    Ioc,
    /// Add liquidity only.
    Alo,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtc => "Gtc",
            Self::Ioc => "Ioc",
            Self::Alo => "Alo",
        }
    }
}

/// Caller-facing order parameters.
///
/// `limit_price` and `size` must already be formatted to the asset's
/// precision (see `fundarb_core::format_price` / `format_size`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub asset_index: u32,
    pub is_buy: bool,
    pub limit_price: String,
    pub size: String,
    pub reduce_only: bool,
    pub time_in_force: TimeInForce,
}

/// Order wire format.
///
/// Reference: hyperliquid-python-sdk/hyperliquid/utils/types.py - OrderWire
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset index
    #[serde(rename = "a")]
    pub asset: u32,

    /// Buy (true) or Sell (false)
    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price as string
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size as string
    #[serde(rename = "s")]
    pub sz: String,

    /// Reduce-only flag
    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,

    /// Client order ID (omitted when None)
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

impl From<OrderRequest> for OrderWire {
    fn from(request: OrderRequest) -> Self {
        Self {
            asset: request.asset_index,
            is_buy: request.is_buy,
            limit_px: request.limit_price,
            sz: request.size,
            reduce_only: request.reduce_only,
            order_type: OrderTypeWire::limit(request.time_in_force),
            cloid: None,
        }
    }
}

/// `{"limit": {"tif": "Gtc"|"Ioc"|"Alo"}}`
#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitOrderType,
}

impl OrderTypeWire {
    pub fn limit(tif: TimeInForce) -> Self {
        Self {
            limit: LimitOrderType {
                tif: tif.as_str().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitOrderType {
    pub tif: String,
}

/// Leverage update. Key order: asset, isCross, leverage.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateLeverage {
    pub asset: u32,
    #[serde(rename = "isCross")]
    pub is_cross: bool,
    pub leverage: u32,
}

/// Grants a delegate key trading rights on the primary account.
///
/// Signed as EIP-712 typed data by the primary wallet (see `typed`), so the
/// JSON key order is not part of any hash.
#[derive(Debug, Clone, Serialize)]
pub struct ApproveDelegate {
    #[serde(rename = "signatureChainId", serialize_with = "serialize_hex_u64")]
    pub signature_chain_id: u64,
    /// "Mainnet" or "Testnet".
    #[serde(rename = "hyperliquidChain")]
    pub chain_tag: String,
    #[serde(rename = "agentAddress", serialize_with = "serialize_address")]
    pub delegate_address: Address,
    /// Omitted from the request body when unnamed; signed as "".
    #[serde(rename = "agentName", skip_serializing_if = "Option::is_none")]
    pub delegate_label: Option<String>,
    pub nonce: u64,
}

// =============================================================================
// SigningInput and action_hash
// =============================================================================

/// Signing input parameters.
#[derive(Debug, Clone)]
pub struct SigningInput {
    pub action: Action,
    pub nonce: u64,
    /// None = trading on the signer's own account
    pub vault_address: Option<Address>,
    /// Signature expiration (optional)
    pub expires_after: Option<u64>,
}

impl SigningInput {
    pub fn new(action: Action, nonce: u64) -> Self {
        Self {
            action,
            nonce,
            vault_address: None,
            expires_after: None,
        }
    }

    /// Calculate action_hash (SDK action_hash() function compliant).
    ///
    /// ```python
    /// def action_hash(action, vault_address, nonce, expires_after=None):
    ///     data = msgpack.packb(action) + nonce.to_bytes(8, "big") + \
    ///            (b"\x00" if vault_address is None else b"\x01" + bytes.fromhex(vault_address[2:]))
    ///     if expires_after is not None:
    ///         data += b"\x00" + expires_after.to_bytes(8, "big")
    ///     return keccak256(data)
    /// ```
    ///
    /// # Errors
    /// Returns `SignerError::SerializationFailed` if msgpack serialization fails.
    pub fn action_hash(&self) -> SignerResult<B256> {
        // Named (map) encoding, keys in declaration order
        let mut data = rmp_serde::to_vec_named(&self.action)
            .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;

        data.extend_from_slice(&self.nonce.to_be_bytes());

        // Even None has the 0x00 byte
        match &self.vault_address {
            None => data.push(0x00),
            Some(addr) => {
                data.push(0x01);
                data.extend_from_slice(addr.as_slice());
            }
        }

        // Absent expiry adds nothing (unlike the vault tag)
        if let Some(expires) = self.expires_after {
            data.push(0x00);
            data.extend_from_slice(&expires.to_be_bytes());
        }

        Ok(keccak256(&data))
    }
}

/// Hash `action` at `nonce` with no vault and no expiry.
pub fn hash_action(action: &Action, nonce: u64) -> SignerResult<B256> {
    SigningInput::new(action.clone(), nonce).action_hash()
}
