//! Signed request bodies for `POST /exchange`.

use alloy::primitives::{Address, PrimitiveSignature, B256, U256};
use serde::Serialize;

use crate::action::Action;
use crate::error::{SignerError, SignerResult};

/// EIP-712 signature components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSignature {
    /// r component (hex with 0x prefix, e.g., "0x1a2b...").
    pub r: String,
    /// s component (hex with 0x prefix, e.g., "0x3c4d...").
    pub s: String,
    /// v component (recovery id, 27 or 28).
    pub v: u8,
}

impl ActionSignature {
    /// Create from raw signature bytes (65 bytes: r(32) + s(32) + v(1)).
    ///
    /// Normalizes v from parity form (0/1) to 27/28.
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let v_raw = bytes[64];
        let v = if v_raw < 27 { v_raw + 27 } else { v_raw };
        Self {
            r: format!("0x{}", hex::encode(&bytes[0..32])),
            s: format!("0x{}", hex::encode(&bytes[32..64])),
            v,
        }
    }

    pub fn from_signature(signature: &PrimitiveSignature) -> Self {
        Self::from_bytes(&signature.as_bytes())
    }

    /// Rebuild the alloy signature (inverse of [`Self::from_signature`]).
    ///
    /// # Errors
    /// Returns `SignerError::MalformedSignature` for non-hex components or a
    /// `v` outside 27/28.
    pub fn to_signature(&self) -> SignerResult<PrimitiveSignature> {
        let parse = |component: &str| -> SignerResult<U256> {
            let bytes = hex::decode(component.trim_start_matches("0x"))
                .map_err(|e| SignerError::MalformedSignature(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(SignerError::MalformedSignature(format!(
                    "expected 32 bytes, got {}",
                    bytes.len()
                )));
            }
            Ok(U256::from_be_slice(&bytes))
        };
        let y_parity = match self.v {
            27 => false,
            28 => true,
            other => {
                return Err(SignerError::MalformedSignature(format!(
                    "unexpected v: {other}"
                )))
            }
        };
        Ok(PrimitiveSignature::new(
            parse(&self.r)?,
            parse(&self.s)?,
            y_parity,
        ))
    }

    /// Address that produced this signature over `signing_hash`.
    pub fn recover_address(&self, signing_hash: &B256) -> SignerResult<Address> {
        self.to_signature()?
            .recover_address_from_prehash(signing_hash)
            .map_err(|e| SignerError::MalformedSignature(e.to_string()))
    }
}

/// Exact body transmitted to the exchange.
#[derive(Debug, Clone, Serialize)]
pub struct SignedEnvelope {
    pub action: Action,
    pub nonce: u64,
    pub signature: ActionSignature,
    /// Must match the vault tag used when hashing. Omitted for own-account trading.
    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

impl SignedEnvelope {
    pub fn new(action: Action, nonce: u64, signature: ActionSignature) -> Self {
        Self {
            action,
            nonce,
            signature,
            vault_address: None,
        }
    }

    pub fn with_vault_address(mut self, vault_address: Option<Address>) -> Self {
        self.vault_address =
            vault_address.map(|addr| format!("0x{}", hex::encode(addr.as_slice())));
        self
    }
}
