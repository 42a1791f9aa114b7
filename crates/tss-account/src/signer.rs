//! Signer implementations backing an account
//!
//! [`TssAccount`] runs a full signing ceremony per call from local share
//! material. [`DelegatedSigner`] forwards the digest to an external signing
//! function (a wallet SDK, a remote service) and verifies what comes back.

use crate::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tss_core::client::TssClientFactory;
use tss_core::sign::{run_signing, verify_signature};
use tss_core::{AccountParams, PublicKey, Signature, SigningConfig};

/// Produces secp256k1 signatures over 32-byte digests
#[async_trait]
pub trait EcdsaSigner: Send + Sync {
    /// Sign a digest without hashing it again
    async fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature>;

    fn public_key(&self) -> &PublicKey;
}

/// Threshold account signing with the client's raw share
pub struct TssAccount<F> {
    params: AccountParams,
    public_key: PublicKey,
    factory: F,
    config: SigningConfig,
}

impl<F: TssClientFactory> TssAccount<F> {
    pub fn new(params: AccountParams, factory: F) -> Result<Self> {
        let public_key = params.public_key()?;
        Ok(Self {
            params,
            public_key,
            factory,
            config: SigningConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SigningConfig) -> Self {
        self.config = config;
        self
    }

    pub fn params(&self) -> &AccountParams {
        &self.params
    }
}

#[async_trait]
impl<F: TssClientFactory> EcdsaSigner for TssAccount<F> {
    async fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        Ok(run_signing(&self.params, hash, &self.factory, &self.config).await?)
    }

    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Boxed external signing function
pub type SignFn = Arc<dyn Fn([u8; 32]) -> BoxFuture<'static, Result<Signature>> + Send + Sync>;

/// Signer delegating to an external signing function
#[derive(Clone)]
pub struct DelegatedSigner {
    public_key: PublicKey,
    sign_fn: SignFn,
}

impl DelegatedSigner {
    pub fn new<Fun, Fut>(public_key: PublicKey, sign_fn: Fun) -> Self
    where
        Fun: Fn([u8; 32]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Signature>> + Send + 'static,
    {
        Self {
            public_key,
            sign_fn: Arc::new(move |hash| Box::pin(sign_fn(hash))),
        }
    }
}

#[async_trait]
impl EcdsaSigner for DelegatedSigner {
    async fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        let signature = (self.sign_fn)(*hash).await?;
        Ok(verify_signature(hash, &signature, &self.public_key)?)
    }

    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}
