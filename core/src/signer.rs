use std::future::Future;

use alloy::{
    primitives::{Address, B256, Signature},
    signers::{SignerSync, local::PrivateKeySigner},
};

use crate::{error::EngineError, validation::parse_private_key};

/// Signs raw 32-byte digests on behalf of one account.
///
/// Both the delegating account (authorization digest) and the relayer
/// (type-4 signing digest) sign through this trait, so a remote signer can
/// replace the local key without touching the encoders.
pub trait AccountSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_hash(&self, hash: B256) -> impl Future<Output = Result<Signature, EngineError>> + Send;
}

/// Signer backed by an in-memory private key
#[derive(Clone)]
pub struct LocalAccountSigner {
    inner: PrivateKeySigner,
}

impl std::fmt::Debug for LocalAccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccountSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

impl LocalAccountSigner {
    pub fn from_private_key(private_key: &str) -> Result<Self, EngineError> {
        Ok(Self {
            inner: parse_private_key(private_key)?,
        })
    }
}

impl From<PrivateKeySigner> for LocalAccountSigner {
    fn from(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }
}

impl AccountSigner for LocalAccountSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature, EngineError> {
        self.inner.sign_hash_sync(&hash).map_err(|e| {
            tracing::error!(signer = ?self.inner.address(), "Error signing digest: {}", e);
            EngineError::InternalError {
                message: format!("Failed to sign digest: {e}"),
            }
        })
    }
}

impl<T: AccountSigner> AccountSigner for std::sync::Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_hash(&self, hash: B256) -> impl Future<Output = Result<Signature, EngineError>> + Send {
        (**self).sign_hash(hash)
    }
}
