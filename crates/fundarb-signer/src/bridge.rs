//! USDC permit for depositing into the exchange bridge on Arbitrum.
//!
//! Only the signature and the `batchedDepositWithPermit` argument are
//! produced here; submitting the transaction is left to the caller.

use alloy::primitives::{address, Address, U256};
use alloy::signers::Signer as AlloySigner;
use alloy::sol_types::{eip712_domain, Eip712Domain};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::envelope::ActionSignature;
use crate::error::{SignerError, SignerResult};
use crate::typed::{sign_evm_action, word_address, word_u256, TypedAction};

/// Native USDC on Arbitrum One.
pub const USDC_ADDRESS: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");
/// Exchange deposit bridge.
pub const BRIDGE_ADDRESS: Address = address!("2Df1c51E09aECF9cacB7bc98cB1742757f163dF7");
pub const ARBITRUM_CHAIN_ID: u64 = 42161;
pub const USDC_DECIMALS: u32 = 6;

/// `{name:"USD Coin", version:"2", chainId:42161, verifyingContract:USDC}`
pub fn usdc_domain() -> Eip712Domain {
    eip712_domain! {
        name: "USD Coin",
        version: "2",
        chain_id: ARBITRUM_CHAIN_ID,
        verifying_contract: USDC_ADDRESS,
    }
}

/// Convert a USD amount to USDC base units (6 decimals).
///
/// # Errors
/// Negative amounts or amounts with more than 6 decimals are rejected.
pub fn usdc_units(amount: Decimal) -> SignerResult<U256> {
    if amount.is_sign_negative() {
        return Err(SignerError::InvalidAmount(format!("negative amount {amount}")));
    }
    let scaled = amount * Decimal::from(10u64.pow(USDC_DECIMALS));
    if !scaled.fract().is_zero() {
        return Err(SignerError::InvalidAmount(format!(
            "{amount} has more than {USDC_DECIMALS} decimals"
        )));
    }
    let text = scaled.trunc().normalize().to_string();
    U256::from_str_radix(&text, 10).map_err(|e| SignerError::InvalidAmount(e.to_string()))
}

/// ERC-2612 permit letting the bridge pull `value` USDC from `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsdcPermit {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    /// The token's `nonces(owner)`; read from chain by the caller.
    pub nonce: U256,
    /// Unix seconds.
    pub deadline: u64,
}

impl UsdcPermit {
    /// Permit for the bridge, valid for `ttl_secs` from now.
    pub fn for_bridge(owner: Address, usd_amount: Decimal, nonce: U256, ttl_secs: i64) -> SignerResult<Self> {
        let deadline = Utc::now().timestamp().saturating_add(ttl_secs).max(0) as u64;
        Ok(Self {
            owner,
            spender: BRIDGE_ADDRESS,
            value: usdc_units(usd_amount)?,
            nonce,
            deadline,
        })
    }

    /// Sign with the owner's wallet under [`usdc_domain`].
    pub async fn sign<S: AlloySigner + Send + Sync>(&self, wallet: &S) -> SignerResult<ActionSignature> {
        let signature = sign_evm_action(wallet, self, ARBITRUM_CHAIN_ID, Some(usdc_domain())).await?;
        info!(owner = %self.owner, value = %self.value, deadline = self.deadline, "Signed USDC permit");
        Ok(signature)
    }
}

impl TypedAction for UsdcPermit {
    const TYPE: &'static str =
        "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

    fn encode_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(5 * 32);
        data.extend_from_slice(&word_address(&self.owner));
        data.extend_from_slice(&word_address(&self.spender));
        data.extend_from_slice(&word_u256(&self.value));
        data.extend_from_slice(&word_u256(&self.nonce));
        data.extend_from_slice(&word_u256(&U256::from(self.deadline)));
        data
    }
}

/// Signature in the bridge's tuple form: `r` and `s` as decimal integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitSignature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

impl TryFrom<&ActionSignature> for PermitSignature {
    type Error = SignerError;

    fn try_from(signature: &ActionSignature) -> SignerResult<Self> {
        let parsed = signature.to_signature()?;
        Ok(Self {
            r: parsed.r().to_string(),
            s: parsed.s().to_string(),
            v: signature.v,
        })
    }
}

/// One entry of `batchedDepositWithPermit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeDeposit {
    pub user: String,
    /// USDC base units, decimal string.
    pub usd: String,
    pub deadline: u64,
    pub signature: PermitSignature,
}

impl BridgeDeposit {
    pub fn new(permit: &UsdcPermit, signature: &ActionSignature) -> SignerResult<Self> {
        Ok(Self {
            user: format!("0x{}", hex::encode(permit.owner.as_slice())),
            usd: permit.value.to_string(),
            deadline: permit.deadline,
            signature: PermitSignature::try_from(signature)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::typed_signing_hash;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::sol;
    use alloy::sol_types::SolStruct;
    use rust_decimal_macros::dec;

    sol! {
        struct Permit {
            address owner;
            address spender;
            uint256 value;
            uint256 nonce;
            uint256 deadline;
        }
    }

    fn sample_permit() -> UsdcPermit {
        UsdcPermit {
            owner: Address::repeat_byte(0x11),
            spender: BRIDGE_ADDRESS,
            value: U256::from(10_000_000u64),
            nonce: U256::from(3u64),
            deadline: 1_700_003_600,
        }
    }

    #[test]
    fn test_usdc_units() {
        assert_eq!(usdc_units(dec!(10)).unwrap(), U256::from(10_000_000u64));
        assert_eq!(usdc_units(dec!(0.5)).unwrap(), U256::from(500_000u64));
        assert_eq!(usdc_units(dec!(1.000000)).unwrap(), U256::from(1_000_000u64));
        assert!(matches!(
            usdc_units(dec!(0.0000001)),
            Err(SignerError::InvalidAmount(_))
        ));
        assert!(matches!(usdc_units(dec!(-1)), Err(SignerError::InvalidAmount(_))));
    }

    #[test]
    fn test_permit_hash_matches_sol_struct() {
        let permit = sample_permit();
        let generated = Permit {
            owner: permit.owner,
            spender: permit.spender,
            value: permit.value,
            nonce: permit.nonce,
            deadline: U256::from(permit.deadline),
        };
        assert_eq!(
            typed_signing_hash(&permit, &usdc_domain()),
            generated.eip712_signing_hash(&usdc_domain())
        );
    }

    #[test]
    fn test_for_bridge_sets_spender_and_deadline() {
        let before = Utc::now().timestamp() as u64;
        let permit = UsdcPermit::for_bridge(Address::ZERO, dec!(25), U256::ZERO, 3600).unwrap();
        assert_eq!(permit.spender, BRIDGE_ADDRESS);
        assert_eq!(permit.value, U256::from(25_000_000u64));
        assert!(permit.deadline >= before + 3600);
    }

    #[tokio::test]
    async fn test_deposit_signature_decimal_strings() {
        let wallet = PrivateKeySigner::random();
        let mut permit = sample_permit();
        permit.owner = wallet.address();

        let signature = permit.sign(&wallet).await.unwrap();
        let hash = typed_signing_hash(&permit, &usdc_domain());
        assert_eq!(signature.recover_address(&hash).unwrap(), wallet.address());

        let deposit = BridgeDeposit::new(&permit, &signature).unwrap();
        assert_eq!(deposit.usd, "10000000");
        assert!(deposit.signature.r.bytes().all(|b| b.is_ascii_digit()));
        assert!(deposit.signature.s.bytes().all(|b| b.is_ascii_digit()));

        let r_hex = U256::from_str_radix(signature.r.trim_start_matches("0x"), 16).unwrap();
        assert_eq!(deposit.signature.r, r_hex.to_string());

        let json = serde_json::to_value(&deposit).unwrap();
        assert_eq!(json["deadline"], 1_700_003_600u64);
        assert_eq!(json["usd"], "10000000");
    }
}
