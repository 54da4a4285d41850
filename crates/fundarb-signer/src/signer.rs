//! High-level signer producing ready-to-post envelopes.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::Signer as AlloySigner;
use tracing::debug;

use crate::action::{Action, ApproveDelegate, OrderRequest, SigningInput};
use crate::agent::sign_agent_action;
use crate::credential::DelegateCredential;
use crate::envelope::SignedEnvelope;
use crate::error::SignerResult;
use crate::nonce::{ClockSync, NonceSource};
use crate::typed::sign_evm_action;

/// Signs exchange actions for one account on one network.
///
/// L1 actions are signed by a [`DelegateCredential`]; the delegate approval
/// itself is signed by the primary wallet. Nonces come from the injected
/// [`NonceSource`]. No retries and no validation of trade parameters.
pub struct ExchangeActionSigner {
    is_mainnet: bool,
    vault_address: Option<Address>,
    nonces: Arc<dyn NonceSource>,
}

impl ExchangeActionSigner {
    pub fn new(is_mainnet: bool, nonces: Arc<dyn NonceSource>) -> Self {
        Self {
            is_mainnet,
            vault_address: None,
            nonces,
        }
    }

    /// Trade on behalf of a vault or subaccount.
    #[must_use]
    pub fn with_vault_address(mut self, vault_address: Option<Address>) -> Self {
        self.vault_address = vault_address;
        self
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    pub fn vault_address(&self) -> Option<Address> {
        self.vault_address
    }

    /// Align nonces with the exchange clock before signing a flow.
    pub fn observe_server_time(&self, server_time_ms: u64) -> ClockSync {
        self.nonces.observe_server_time(server_time_ms)
    }

    /// `approveAgent` for `credential`, signed by the primary wallet.
    pub async fn approve_delegate<S: AlloySigner + Send + Sync>(
        &self,
        wallet: &S,
        credential: &DelegateCredential,
        label: Option<String>,
    ) -> SignerResult<SignedEnvelope> {
        let nonce = self.nonces.next_nonce()?;
        let approval =
            ApproveDelegate::for_network(self.is_mainnet, credential.address(), label, nonce);
        let signature =
            sign_evm_action(wallet, &approval, approval.signature_chain_id, None).await?;

        debug!(
            delegate = %credential.address(),
            chain = %approval.chain_tag,
            nonce,
            "Delegate approval signed"
        );
        Ok(SignedEnvelope::new(
            Action::ApproveDelegate(approval),
            nonce,
            signature,
        ))
    }

    pub async fn update_leverage(
        &self,
        credential: &DelegateCredential,
        asset: u32,
        is_cross: bool,
        leverage: u32,
    ) -> SignerResult<SignedEnvelope> {
        self.sign_l1(credential, Action::update_leverage(asset, is_cross, leverage))
            .await
    }

    pub async fn place_order(
        &self,
        credential: &DelegateCredential,
        request: OrderRequest,
    ) -> SignerResult<SignedEnvelope> {
        self.sign_l1(credential, Action::place_order(request)).await
    }

    async fn sign_l1(
        &self,
        credential: &DelegateCredential,
        action: Action,
    ) -> SignerResult<SignedEnvelope> {
        let nonce = self.nonces.next_nonce()?;
        let mut input = SigningInput::new(action, nonce);
        input.vault_address = self.vault_address;

        let signature = sign_agent_action(&input, self.is_mainnet, credential).await?;
        Ok(SignedEnvelope::new(input.action, nonce, signature)
            .with_vault_address(self.vault_address))
    }
}
