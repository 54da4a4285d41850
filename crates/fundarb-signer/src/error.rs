//! Signer error types.

use alloy::primitives::Address;
use thiserror::Error;

use crate::nonce::NonceError;

/// Signing errors.
///
/// Every variant is a hard failure: the caller decides whether to try again
/// with a fresh credential or nonce.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Action serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Delegate credential has been discarded")]
    CredentialDiscarded,

    #[error("Delegate credential is not authorized yet")]
    CredentialNotAuthorized,

    #[error("Delegate credential exhausted after {0} actions")]
    CredentialExhausted(u32),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Nonce error: {0}")]
    Nonce(#[from] NonceError),
}

pub type SignerResult<T> = Result<T, SignerError>;

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
