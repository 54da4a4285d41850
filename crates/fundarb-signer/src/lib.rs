//! Exchange action signing.
//!
//! # Key Components
//!
//! - [`hash_action`]: msgpack action hash (`action ‖ nonce ‖ vault tag`)
//! - [`sign_agent_action`]: phantom agent signature with a delegate key
//! - [`sign_evm_action`]: EIP-712 typed-data signature with the primary wallet
//! - [`ExchangeActionSigner`]: envelopes for approve / leverage / order
//! - [`DelegateCredential`]: short-lived delegate key with explicit lifecycle
//! - [`ExchangeNonces`]: exchange-clock nonces behind the [`NonceSource`] trait
//! - [`UsdcPermit`] / [`BridgeDeposit`]: bridge deposit authorization

pub mod action;
pub mod agent;
pub mod bridge;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod nonce;
pub mod signer;
pub mod typed;

pub use action::{
    hash_action, Action, ApproveDelegate, OrderRequest, OrderWire, SigningInput, TimeInForce,
    UpdateLeverage,
};
pub use agent::{build_phantom_message, l1_domain, sign_agent_action, PhantomAgent};
pub use bridge::{usdc_domain, usdc_units, BridgeDeposit, PermitSignature, UsdcPermit};
pub use credential::{CredentialState, DelegateCredential, KeySource, WalletKeys};
pub use envelope::{ActionSignature, SignedEnvelope};
pub use error::{KeyError, SignerError, SignerResult};
pub use nonce::{
    check_window, Clock, ClockSync, ExchangeNonces, NonceError, NonceSource, SystemClock,
};
pub use signer::ExchangeActionSigner;
pub use typed::{default_domain, sign_evm_action, typed_signing_hash, TypedAction};
