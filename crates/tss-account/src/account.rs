//! Ethereum account over an ECDSA signer

use crate::{keccak256, AccountError, Address, EcdsaSigner, Result, SignedTransaction, Transaction, TypedData};
use tracing::{debug, instrument};
use tss_core::Signature;

/// Ethereum account whose key lives behind an [`EcdsaSigner`]
pub struct EthereumAccount<S> {
    signer: S,
    address: Address,
}

impl<S: EcdsaSigner> EthereumAccount<S> {
    pub fn new(signer: S) -> Self {
        let address = Address::from_public_key(signer.public_key());
        Self { signer, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Sign a 32-byte digest as is
    pub async fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        self.signer.sign_hash(digest).await
    }

    /// Keccak-256 the data, then sign
    pub async fn sign_data(&self, data: &[u8]) -> Result<Signature> {
        self.sign_digest(&keccak256(data)).await
    }

    /// Decode hex (optional `0x`), then hash and sign
    pub async fn sign_hex(&self, hex_data: &str) -> Result<Signature> {
        let data = decode_hex(hex_data)?;
        self.sign_data(&data).await
    }

    /// Sign a hex-encoded 32-byte digest without hashing
    pub async fn sign_hash(&self, hash: &str) -> Result<Signature> {
        let bytes = decode_hex(hash)?;
        let digest: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AccountError::InvalidHex(format!("digest must be 32 bytes, got {}", bytes.len()))
        })?;
        self.sign_digest(&digest).await
    }

    /// Hash the UTF-8 bytes of `message`, then sign
    pub async fn sign_message(&self, message: &str) -> Result<Signature> {
        self.sign_data(message.as_bytes()).await
    }

    /// EIP-191 personal message signature as `0x` hex with `v` in 27/28
    #[instrument(skip_all, fields(address = %self.address, len = message.len()))]
    pub async fn sign_personal_message(&self, message: &[u8]) -> Result<String> {
        let mut payload = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
        payload.extend_from_slice(message);

        let signature = self.sign_data(&payload).await?;
        debug!("Personal message signed");
        Ok(ethereum_hex(&signature))
    }

    /// EIP-712 signature as `0x` hex with `v` in 27/28
    #[instrument(skip_all, fields(address = %self.address, primary_type = %typed_data.primary_type))]
    pub async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String> {
        let hash = typed_data.signable_hash()?;
        let signature = self.sign_digest(&hash).await?;
        debug!("Typed data signed");
        Ok(ethereum_hex(&signature))
    }

    /// Sign a legacy transaction with EIP-155 replay protection
    #[instrument(skip_all, fields(address = %self.address, nonce = transaction.nonce, chain_id = transaction.chain_id))]
    pub async fn sign_transaction(&self, transaction: &Transaction) -> Result<SignedTransaction> {
        let signature = self.sign_digest(&transaction.signing_hash()).await?;
        let signed = transaction.clone().into_signed(signature);
        debug!(hash = %signed.hash_hex(), "Transaction signed");
        Ok(signed)
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(input.strip_prefix("0x").unwrap_or(input))?)
}

/// `r || s || v` with `v` in 27/28, as `0x` hex
fn ethereum_hex(signature: &Signature) -> String {
    let mut bytes = signature.to_bytes();
    bytes[64] = signature.parity() + 27;
    format!("0x{}", hex::encode(bytes))
}
