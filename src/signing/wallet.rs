use crate::error::{HypercopyError, Result};
use ethers::signers::{LocalWallet, Signer as EthersSigner};
use ethers::types::{Address, Signature, H256};
use tracing::debug;
use zeroize::Zeroizing;

/// Signing key for one trader's exchange actions
///
/// # Security
/// The private key string is only held while the wallet is built and is
/// zeroized afterwards. Debug output shows the address only.
#[derive(Clone)]
pub struct Wallet {
    inner: LocalWallet,
}

impl Wallet {
    /// Create a wallet from a private key hex string (with or without `0x`)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let secure_key = Zeroizing::new(private_key.trim().trim_start_matches("0x").to_string());

        let inner = secure_key
            .parse::<LocalWallet>()
            .map_err(|e| HypercopyError::Wallet(format!("Invalid private key: {}", e)))?;

        debug!("Signer initialized: {:?}", inner.address());
        Ok(Self { inner })
    }

    /// Address derived from the signing key
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Sign a 32-byte digest without any message prefix
    pub fn sign_hash(&self, hash: H256) -> Result<Signature> {
        self.inner
            .sign_hash(hash)
            .map_err(|e| HypercopyError::Signature(format!("Failed to sign hash: {}", e)))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish()
    }
}
