//! Phantom agent construction and delegate-key signing of L1 actions.
//!
//! Two-stage process:
//! 1. `action_hash` from action + nonce (+ vault tag)
//! 2. EIP-712 signature over `Agent{source, connectionId}` with the delegate key
//!
//! Reference: hyperliquid-python-sdk/hyperliquid/utils/signing.py

use alloy::primitives::{Address, B256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use tracing::{debug, warn};

use crate::action::SigningInput;
use crate::credential::DelegateCredential;
use crate::envelope::ActionSignature;
use crate::error::SignerResult;

/// EIP-712 domain constants for L1 actions.
pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Domain used for every phantom agent signature.
pub fn l1_domain() -> Eip712Domain {
    eip712_domain! {
        name: EIP712_DOMAIN_NAME,
        version: EIP712_DOMAIN_VERSION,
        chain_id: EIP712_CHAIN_ID,
        verifying_contract: EIP712_VERIFYING_CONTRACT,
    }
}

/// Phantom Agent structure (EIP-712 signing target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomAgent {
    /// "a" (mainnet) or "b" (testnet)
    pub source: String,
    /// action_hash result
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, is_mainnet: bool) -> Self {
        Self {
            source: if is_mainnet { "a" } else { "b" }.to_string(),
            connection_id: action_hash,
        }
    }

    /// keccak256(0x1901 || domain_separator || struct_hash)
    pub fn signing_hash(&self) -> B256 {
        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };
        agent.eip712_signing_hash(&l1_domain())
    }
}

/// Wrap an action hash for the given network.
pub fn build_phantom_message(action_hash: B256, is_mainnet: bool) -> PhantomAgent {
    PhantomAgent::new(action_hash, is_mainnet)
}

/// Sign an L1 action with a delegate credential.
///
/// # Errors
/// Fails when the action cannot be serialized or the credential refuses to
/// sign (not yet authorized, discarded, exhausted). No partial signature is
/// ever returned.
pub async fn sign_agent_action(
    input: &SigningInput,
    is_mainnet: bool,
    credential: &DelegateCredential,
) -> SignerResult<ActionSignature> {
    let action_hash = input.action_hash()?;
    let phantom_agent = build_phantom_message(action_hash, is_mainnet);

    debug!(
        kind = input.action.kind(),
        nonce = input.nonce,
        source = %phantom_agent.source,
        delegate = %credential.address(),
        "Signing L1 action"
    );

    // Do not log the signature
    match credential.sign_hash(&phantom_agent.signing_hash()).await {
        Ok(signature) => Ok(ActionSignature::from_signature(&signature)),
        Err(e) => {
            warn!(kind = input.action.kind(), error = %e, "Delegate signing failed");
            Err(e)
        }
    }
}
