//! Bitcoin signing over a threshold key

use crate::{AccountError, EcdsaSigner, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use tracing::debug;

const MESSAGE_MAGIC: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Bitcoin account backed by an ECDSA signer
pub struct BitcoinAccount<S> {
    signer: S,
}

impl<S: EcdsaSigner> BitcoinAccount<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    /// SEC1 compressed public key
    pub fn public_key(&self) -> [u8; 33] {
        self.signer.public_key().to_compressed()
    }

    /// Sign a transaction sighash, returning a low-s DER signature
    pub async fn sign_sighash(&self, sighash: &[u8; 32]) -> Result<Vec<u8>> {
        let signature = self.signer.sign_hash(sighash).await?;
        Ok(signature.to_der()?)
    }

    /// Sign a message with the Bitcoin signed-message scheme.
    ///
    /// Returns the base64 of the 65-byte compact signature whose header byte
    /// marks a compressed key.
    pub async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let hash = message_hash(message);
        let signature = self.signer.sign_hash(&hash).await?;

        let mut compact = [0u8; 65];
        compact[0] = 27 + 4 + signature.parity();
        compact[1..33].copy_from_slice(&signature.r);
        compact[33..].copy_from_slice(&signature.s);

        debug!(len = message.len(), "Bitcoin message signed");
        Ok(STANDARD.encode(compact))
    }

    pub async fn schnorr_sign(&self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(AccountError::Unsupported(
            "schnorr signatures are not available for threshold ECDSA keys".into(),
        ))
    }
}

/// Double SHA-256 of the magic prefix, the varint length and the message
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    let mut payload = MESSAGE_MAGIC.to_vec();
    payload.extend(varint(message.len() as u64));
    payload.extend_from_slice(message);
    Sha256::digest(Sha256::digest(&payload)).into()
}

fn varint(n: u64) -> Vec<u8> {
    match n {
        0..=0xfc => vec![n as u8],
        0xfd..=0xffff => {
            let mut out = vec![0xfd];
            out.extend_from_slice(&(n as u16).to_le_bytes());
            out
        }
        0x1_0000..=0xffff_ffff => {
            let mut out = vec![0xfe];
            out.extend_from_slice(&(n as u32).to_le_bytes());
            out
        }
        _ => {
            let mut out = vec![0xff];
            out.extend_from_slice(&n.to_le_bytes());
            out
        }
    }
}
