//! Core types for TSS signing sessions

use crate::{Error, Result};
use k256::ecdsa::{self, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Position of a party in the signing ceremony (servers first, client last)
pub type PartyId = usize;

/// Accepted length range of a public key in hex characters
pub const PUBLIC_KEY_HEX_LEN: std::ops::RangeInclusive<usize> = 128..=130;

/// Parameters identifying a threshold account and authorizing it with the
/// signing nodes. Read-only for the whole duration of a signing call.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct AccountParams {
    /// Uncompressed public key, hex (with or without the 04 prefix)
    #[zeroize(skip)]
    pub public_key: String,

    /// Client-side factor key
    pub factor_key: String,

    /// Version of the current share set
    #[zeroize(skip)]
    pub tss_nonce: u32,

    /// Client's secret share, hex
    pub tss_share: String,

    /// Client's share index, hex
    #[zeroize(skip)]
    pub tss_index: String,

    /// Key namespace tag
    #[zeroize(skip)]
    pub selected_tag: String,

    /// Verifier name of the account owner
    #[zeroize(skip)]
    pub verifier: String,

    /// Identifier of the account owner under the verifier
    #[zeroize(skip)]
    #[serde(rename = "verifierId")]
    pub verifier_id: String,

    /// 1-based DKG indexes of the participating servers; empty selects the
    /// default topology
    #[zeroize(skip)]
    #[serde(default)]
    pub node_indexes: Vec<u32>,

    /// Base URLs of the signing nodes, ordered by DKG index
    #[zeroize(skip)]
    pub tss_endpoints: Vec<String>,

    /// Authorization tokens for this account, one per node
    #[zeroize(skip)]
    #[serde(rename = "authSigs")]
    pub auth_signatures: Vec<String>,
}

impl AccountParams {
    /// Parse the account public key
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_hex(&self.public_key)
    }
}

impl fmt::Debug for AccountParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountParams")
            .field("public_key", &self.public_key)
            .field("factor_key", &"<redacted>")
            .field("tss_nonce", &self.tss_nonce)
            .field("tss_share", &"<redacted>")
            .field("tss_index", &self.tss_index)
            .field("selected_tag", &self.selected_tag)
            .field("verifier", &self.verifier)
            .field("verifier_id", &self.verifier_id)
            .field("node_indexes", &self.node_indexes)
            .field("tss_endpoints", &self.tss_endpoints)
            .field("auth_signatures", &self.auth_signatures.len())
            .finish()
    }
}

/// Validated secp256k1 public key of a threshold account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse an uncompressed public key from hex.
    ///
    /// Accepts 130 characters (`04 || X || Y`) or 128 characters (`X || Y`).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if !PUBLIC_KEY_HEX_LEN.contains(&hex_str.len()) {
            return Err(Error::InvalidPublicKey(format!(
                "expected uncompressed key of 128-130 hex chars, got {}",
                hex_str.len()
            )));
        }

        let bytes = hex::decode(hex_str).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a 64-byte `X || Y` pair or a 65-byte SEC1 uncompressed point
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let sec1 = match bytes.len() {
            64 => {
                let mut full = Vec::with_capacity(65);
                full.push(0x04);
                full.extend_from_slice(bytes);
                full
            }
            65 => bytes.to_vec(),
            n => {
                return Err(Error::InvalidPublicKey(format!(
                    "expected 64 or 65 bytes, got {n}"
                )))
            }
        };

        if sec1[0] != 0x04 {
            return Err(Error::InvalidPublicKey(format!(
                "unexpected point prefix {:#04x}",
                sec1[0]
            )));
        }

        VerifyingKey::from_sec1_bytes(&sec1)
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey("point is not on secp256k1".into()))
    }

    /// SEC1 uncompressed encoding (`04 || X || Y`)
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out.copy_from_slice(self.0.to_encoded_point(false).as_bytes());
        out
    }

    /// Affine coordinates (`X || Y`) without the prefix byte
    pub fn to_xy(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.to_uncompressed()[1..]);
        out
    }

    /// SEC1 compressed encoding
    pub fn to_compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(self.0.to_encoded_point(true).as_bytes());
        out
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

/// ECDSA signature (r, s) with recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component
    pub r: [u8; 32],
    /// S component
    pub s: [u8; 32],
    /// Recovery ID (0 or 1, or 27/28 once normalized for Ethereum)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Parse the 65-byte `r || s || v` encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Error::Deserialization(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self::new(r, s, bytes[64]))
    }

    /// Convert to bytes (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.recovery_id;
        bytes
    }

    /// Recovery id with any Ethereum offset removed
    pub fn parity(&self) -> u8 {
        if self.recovery_id >= 27 {
            self.recovery_id - 27
        } else {
            self.recovery_id
        }
    }

    pub fn to_ecdsa(&self) -> Result<ecdsa::Signature> {
        ecdsa::Signature::from_scalars(
            *k256::FieldBytes::from_slice(&self.r),
            *k256::FieldBytes::from_slice(&self.s),
        )
        .map_err(|_| Error::Deserialization("r or s out of range".into()))
    }

    /// Convert to DER format
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_ecdsa()?.to_der().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    const FIXTURE_PUBLIC_KEY: &str = "04238569d5e12caf57d34fb5b2a0679c7775b5f61fd18cd69db9cc600a651749c3ec13a9367380b7a024a67f5e663f3afd40175c3223da63f6024b05d0bd9f292e";

    #[test]
    fn test_public_key_accepts_both_forms() {
        let full = PublicKey::from_hex(FIXTURE_PUBLIC_KEY).unwrap();
        let stripped = PublicKey::from_hex(&FIXTURE_PUBLIC_KEY[2..]).unwrap();

        assert_eq!(full, stripped);
        assert_eq!(hex::encode(full.to_uncompressed()), FIXTURE_PUBLIC_KEY);
        assert_eq!(hex::encode(full.to_xy()), &FIXTURE_PUBLIC_KEY[2..]);
    }

    #[test]
    fn test_public_key_length_bounds() {
        for len in [0, 66, 127, 131, 140] {
            let input = "a".repeat(len);
            assert!(matches!(
                PublicKey::from_hex(&input),
                Err(Error::InvalidPublicKey(_))
            ));
        }
        // odd length inside the accepted range fails hex decoding
        assert!(PublicKey::from_hex(&FIXTURE_PUBLIC_KEY[1..]).is_err());
    }

    #[test]
    fn test_public_key_rejects_compressed_prefix() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let mut bytes = key.verifying_key().to_encoded_point(false).as_bytes().to_vec();
        bytes[0] = 0x02;
        assert!(PublicKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_signature_bytes() {
        let sig = Signature::new([1u8; 32], [2u8; 32], 1);
        let bytes = sig.to_bytes();

        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[64], 1);
        assert_eq!(Signature::from_bytes(&bytes).unwrap(), sig);
        assert!(Signature::from_bytes(&bytes[..64]).is_err());
    }

    #[test]
    fn test_params_json_and_debug() {
        let json = serde_json::json!({
            "publicKey": FIXTURE_PUBLIC_KEY,
            "factorKey": "3b4af35bc4838471f94825f34c4f649904a258c0907d348bed653eb0c94ec6c0",
            "tssNonce": 0,
            "tssShare": "4f62ddd962fab8b0777bd18a2e6f3992c7e15ff929df79a15a7046da46af5a05",
            "tssIndex": "2",
            "selectedTag": "default",
            "verifier": "google-lrc",
            "verifierId": "hqjang95@gmail.com",
            "tssEndpoints": ["https://sapphire-1.auth.network/tss"],
            "authSigs": ["sig"]
        });
        let params: AccountParams = serde_json::from_value(json).unwrap();

        assert!(params.node_indexes.is_empty());
        assert_eq!(params.verifier_id, "hqjang95@gmail.com");

        let debug = format!("{params:?}");
        assert!(!debug.contains("4f62ddd9"));
        assert!(!debug.contains("3b4af35b"));
    }
}
