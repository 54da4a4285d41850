//! EIP-712 typed-data signing with the primary wallet.
//!
//! User-signed actions (delegate approval, the bridge permit) are signed as
//! typed data rather than through a phantom agent. Their type names contain a
//! `:` which `sol!` cannot express, so struct hashes are encoded by hand via
//! [`TypedAction`].

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::Signer as AlloySigner;
use alloy::sol_types::{eip712_domain, Eip712Domain};
use tracing::{debug, warn};

use crate::action::ApproveDelegate;
use crate::envelope::ActionSignature;
use crate::error::SignerResult;

/// Default domain name for user-signed exchange actions.
pub const USER_DOMAIN_NAME: &str = "HyperliquidSignTransaction";
pub const USER_DOMAIN_VERSION: &str = "1";

/// `signatureChainId` values (Arbitrum One / Arbitrum Sepolia).
pub const MAINNET_SIGNATURE_CHAIN_ID: u64 = 42161;
pub const TESTNET_SIGNATURE_CHAIN_ID: u64 = 421614;

/// A struct that can be hashed per EIP-712 `hashStruct`.
pub trait TypedAction {
    /// Full `encodeType` string, e.g. `Mail(address to,string contents)`.
    const TYPE: &'static str;

    /// `encodeData`: each member as a 32-byte word, in `TYPE` order.
    fn encode_data(&self) -> Vec<u8>;

    fn type_hash() -> B256 {
        keccak256(Self::TYPE.as_bytes())
    }

    /// `keccak256(typeHash ‖ encodeData)`
    fn struct_hash(&self) -> B256 {
        let data = self.encode_data();
        let mut buf = Vec::with_capacity(32 + data.len());
        buf.extend_from_slice(Self::type_hash().as_slice());
        buf.extend_from_slice(&data);
        keccak256(&buf)
    }
}

// 32-byte word encoders for `encode_data`.

pub fn word_string(value: &str) -> [u8; 32] {
    keccak256(value.as_bytes()).0
}

pub fn word_address(value: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(value.as_slice());
    word
}

pub fn word_u64(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes::<32>()
}

pub fn word_u256(value: &U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

pub fn word_b256(value: &B256) -> [u8; 32] {
    value.0
}

/// `{name:"HyperliquidSignTransaction", version:"1", chainId, verifyingContract:0x0}`
pub fn default_domain(chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: USER_DOMAIN_NAME,
        version: USER_DOMAIN_VERSION,
        chain_id: chain_id,
        verifying_contract: Address::ZERO,
    }
}

/// keccak256(0x1901 ‖ domainSeparator ‖ hashStruct(action))
pub fn typed_signing_hash<A: TypedAction>(action: &A, domain: &Eip712Domain) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain.hash_struct().as_slice());
    buf[34..].copy_from_slice(action.struct_hash().as_slice());
    keccak256(buf)
}

/// Sign a typed action with a wallet.
///
/// `domain` defaults to [`default_domain`] for `chain_id`.
///
/// # Errors
/// Returns `SignerError::SigningFailed` if the signer fails.
pub async fn sign_evm_action<S, A>(
    signer: &S,
    action: &A,
    chain_id: u64,
    domain: Option<Eip712Domain>,
) -> SignerResult<ActionSignature>
where
    S: AlloySigner + Send + Sync,
    A: TypedAction,
{
    let domain = domain.unwrap_or_else(|| default_domain(chain_id));
    let signing_hash = typed_signing_hash(action, &domain);

    debug!(
        primary_type = A::TYPE,
        chain_id,
        signer = %signer.address(),
        "Signing typed action"
    );

    match signer.sign_hash(&signing_hash).await {
        Ok(signature) => Ok(ActionSignature::from_signature(&signature)),
        Err(e) => {
            warn!(primary_type = A::TYPE, error = %e, "Typed signing failed");
            Err(e.into())
        }
    }
}

impl ApproveDelegate {
    /// Approval of `delegate_address` for the selected network.
    pub fn for_network(
        is_mainnet: bool,
        delegate_address: Address,
        delegate_label: Option<String>,
        nonce: u64,
    ) -> Self {
        let (signature_chain_id, chain_tag) = if is_mainnet {
            (MAINNET_SIGNATURE_CHAIN_ID, "Mainnet")
        } else {
            (TESTNET_SIGNATURE_CHAIN_ID, "Testnet")
        };
        Self {
            signature_chain_id,
            chain_tag: chain_tag.to_string(),
            delegate_address,
            delegate_label,
            nonce,
        }
    }
}

impl TypedAction for ApproveDelegate {
    const TYPE: &'static str = "HyperliquidTransaction:ApproveAgent(string hyperliquidChain,address agentAddress,string agentName,uint64 nonce)";

    fn encode_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 * 32);
        data.extend_from_slice(&word_string(&self.chain_tag));
        data.extend_from_slice(&word_address(&self.delegate_address));
        // Unnamed delegates are signed with an empty name
        data.extend_from_slice(&word_string(self.delegate_label.as_deref().unwrap_or("")));
        data.extend_from_slice(&word_u64(self.nonce));
        data
    }
}
