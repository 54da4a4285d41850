//! Signing keys: the primary wallet and short-lived delegate credentials.
//!
//! A delegate credential is generated per session, approved by the primary
//! wallet (`approveAgent`), used for a handful of L1 actions, then
//! discarded. Discarding drops the key; `k256` zeroizes the scalar on drop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use alloy::primitives::{Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{KeyError, SignerError, SignerResult};

// =============================================================================
// DelegateCredential
// =============================================================================

/// Lifecycle of a delegate credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Generated, approval not yet accepted by the exchange.
    Created,
    /// Approved by the primary wallet; may sign L1 actions.
    Authorized,
    /// Key material dropped. Terminal.
    Discarded,
}

/// Ephemeral delegate ("agent") key.
pub struct DelegateCredential {
    signer: Option<PrivateKeySigner>,
    address: Address,
    state: CredentialState,
    actions_signed: AtomicU32,
    max_actions: Option<u32>,
}

impl DelegateCredential {
    /// Fresh random keypair in the `Created` state.
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        debug!(delegate = %address, "Generated delegate credential");
        Self {
            signer: Some(signer),
            address,
            state: CredentialState::Created,
            actions_signed: AtomicU32::new(0),
            max_actions: None,
        }
    }

    /// Limit the number of actions this credential may sign.
    #[must_use]
    pub fn with_max_actions(mut self, max_actions: u32) -> Self {
        self.max_actions = Some(max_actions);
        self
    }

    /// Address the exchange knows the delegate by. Still available after discard.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    /// Record that the exchange accepted the approval. No effect once discarded.
    pub fn mark_authorized(&mut self) {
        if self.state == CredentialState::Created {
            self.state = CredentialState::Authorized;
            debug!(delegate = %self.address, "Delegate credential authorized");
        }
    }

    pub fn actions_signed(&self) -> u32 {
        self.actions_signed.load(Ordering::Acquire)
    }

    pub fn is_discarded(&self) -> bool {
        self.state == CredentialState::Discarded
    }

    /// Sign a 32-byte digest.
    ///
    /// A slot in the action budget is consumed before signing and is not
    /// returned if the signer fails.
    ///
    /// # Errors
    /// - `CredentialDiscarded` after [`Self::discard`]
    /// - `CredentialNotAuthorized` before [`Self::mark_authorized`]
    /// - `CredentialExhausted` once the budget is spent
    /// - `SigningFailed` if the underlying signer errors
    pub async fn sign_hash(&self, hash: &B256) -> SignerResult<PrimitiveSignature> {
        let signer = match (self.state, self.signer.as_ref()) {
            (CredentialState::Discarded, _) | (_, None) => {
                return Err(SignerError::CredentialDiscarded)
            }
            (CredentialState::Created, _) => return Err(SignerError::CredentialNotAuthorized),
            (CredentialState::Authorized, Some(signer)) => signer,
        };

        let max = self.max_actions.unwrap_or(u32::MAX);
        self.actions_signed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(SignerError::CredentialExhausted)?;

        Ok(signer.sign_hash(hash).await?)
    }

    /// Drop the key material. Later signing attempts fail.
    pub fn discard(&mut self) {
        if self.signer.take().is_some() {
            debug!(
                delegate = %self.address,
                actions_signed = self.actions_signed(),
                "Delegate credential discarded"
            );
        }
        self.state = CredentialState::Discarded;
    }
}

impl Drop for DelegateCredential {
    fn drop(&mut self) {
        self.discard();
    }
}

impl std::fmt::Debug for DelegateCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("DelegateCredential")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("actions_signed", &self.actions_signed())
            .field("max_actions", &self.max_actions)
            .finish()
    }
}

// =============================================================================
// KeySource and WalletKeys
// =============================================================================

/// Source of the primary wallet's private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

/// Primary wallet key, used only for typed-data approvals.
///
/// Never log private key material.
pub struct WalletKeys {
    signer: PrivateKeySigner,
}

impl WalletKeys {
    /// Load the key and optionally verify it derives `expected_address`.
    ///
    /// Accepts hex with or without `0x`, surrounding whitespace ignored.
    ///
    /// # Errors
    /// Returns `KeyError` if the variable or file is missing, the hex is
    /// malformed, the key is invalid, or the address does not match.
    pub fn load(source: KeySource, expected_address: Option<Address>) -> Result<Self, KeyError> {
        fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
            let trimmed = hex_str.trim().trim_start_matches("0x");
            Ok(Zeroizing::new(hex::decode(trimmed)?))
        }

        let secret_bytes: Zeroizing<Vec<u8>> = match source {
            KeySource::EnvVar { ref var_name } => {
                let hex = Zeroizing::new(
                    std::env::var(var_name)
                        .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
                );
                parse_hex_key(&hex)?
            }
            KeySource::File { ref path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                parse_hex_key(&content)?
            }
        };

        Self::from_secret_bytes(&secret_bytes, expected_address)
    }

    /// Build from raw 32-byte key material.
    pub fn from_secret_bytes(
        secret_bytes: &[u8],
        expected_address: Option<Address>,
    ) -> Result<Self, KeyError> {
        let signer = PrivateKeySigner::from_slice(secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self { signer })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_key_bytes() -> Vec<u8> {
        hex::decode(TEST_PRIVATE_KEY.trim_start_matches("0x")).unwrap()
    }

    fn test_address() -> Address {
        "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_credential_refuses_to_sign() {
        let credential = DelegateCredential::generate();
        assert_eq!(credential.state(), CredentialState::Created);

        let result = credential.sign_hash(&B256::repeat_byte(1)).await;
        assert!(matches!(result, Err(SignerError::CredentialNotAuthorized)));
        assert_eq!(credential.actions_signed(), 0);
    }

    #[tokio::test]
    async fn test_authorized_signature_recovers_to_delegate() {
        let mut credential = DelegateCredential::generate();
        credential.mark_authorized();

        let hash = B256::repeat_byte(0x5a);
        let signature = credential.sign_hash(&hash).await.unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            credential.address()
        );
        assert_eq!(credential.actions_signed(), 1);
    }

    #[tokio::test]
    async fn test_discarded_credential_fails() {
        let mut credential = DelegateCredential::generate();
        credential.mark_authorized();
        let address = credential.address();

        credential.discard();
        assert!(credential.is_discarded());
        assert_eq!(credential.address(), address);

        let result = credential.sign_hash(&B256::ZERO).await;
        assert!(matches!(result, Err(SignerError::CredentialDiscarded)));

        // Discard is terminal
        credential.mark_authorized();
        assert_eq!(credential.state(), CredentialState::Discarded);
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let mut credential = DelegateCredential::generate().with_max_actions(2);
        credential.mark_authorized();

        credential.sign_hash(&B256::repeat_byte(1)).await.unwrap();
        credential.sign_hash(&B256::repeat_byte(2)).await.unwrap();
        let result = credential.sign_hash(&B256::repeat_byte(3)).await;
        assert!(matches!(result, Err(SignerError::CredentialExhausted(2))));
        assert_eq!(credential.actions_signed(), 2);
    }

    #[test]
    fn test_debug_hides_key() {
        let credential = DelegateCredential::generate();
        let text = format!("{credential:?}");
        assert!(text.contains("address"));
        assert!(!text.contains("signer"));
    }

    #[test]
    fn test_wallet_from_bytes() {
        let wallet = WalletKeys::from_secret_bytes(&test_key_bytes(), Some(test_address())).unwrap();
        assert_eq!(wallet.address(), test_address());
    }

    #[test]
    fn test_wallet_address_mismatch() {
        let result = WalletKeys::from_secret_bytes(&test_key_bytes(), Some(Address::repeat_byte(1)));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_wallet_load_from_env() {
        let var_name = "FUNDARB_TEST_WALLET_KEY_ENV";
        std::env::set_var(var_name, format!("  {TEST_PRIVATE_KEY}\n"));
        let wallet = WalletKeys::load(
            KeySource::EnvVar {
                var_name: var_name.to_string(),
            },
            None,
        )
        .unwrap();
        std::env::remove_var(var_name);
        assert_eq!(wallet.address(), test_address());
    }

    #[test]
    fn test_wallet_load_missing_env() {
        let result = WalletKeys::load(
            KeySource::EnvVar {
                var_name: "FUNDARB_TEST_WALLET_KEY_UNSET".to_string(),
            },
            None,
        );
        assert!(matches!(result, Err(KeyError::EnvVarNotFound(_))));
    }

    #[test]
    fn test_wallet_load_from_file() {
        let path = std::env::temp_dir().join(format!("fundarb-key-{}.hex", std::process::id()));
        std::fs::write(&path, TEST_PRIVATE_KEY.trim_start_matches("0x")).unwrap();
        let wallet = WalletKeys::load(KeySource::File { path: path.clone() }, Some(test_address()));
        std::fs::remove_file(&path).unwrap();
        assert_eq!(wallet.unwrap().address(), test_address());
    }

    #[test]
    fn test_wallet_bad_hex() {
        let result = WalletKeys::from_secret_bytes(&[0u8; 5], None);
        assert!(matches!(result, Err(KeyError::InvalidKey(_))));
    }
}
