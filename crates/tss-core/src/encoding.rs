//! Scalar and point encodings expected by the signing nodes

use crate::{Error, PublicKey, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use k256::{elliptic_curve::PrimeField, FieldBytes, Scalar};
use num_bigint::BigUint;

/// Parse an unsigned big-endian hex string (optional `0x`) into a field element.
///
/// Values at or above the curve order are rejected rather than reduced.
pub fn scalar_from_hex(input: &str) -> Result<Scalar> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    if digits.is_empty() {
        return Err(Error::InvalidShare("empty hex value".into()));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidShare(format!("not a hex number: {input:?}")));
    }

    let value = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::InvalidShare(format!("not a hex number: {input:?}")))?;
    scalar_from_biguint(&value)
}

/// Convert an unsigned integer into a field element
pub fn scalar_from_biguint(value: &BigUint) -> Result<Scalar> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(Error::InvalidShare("value exceeds 256 bits".into()));
    }

    let mut repr = FieldBytes::default();
    repr[32 - bytes.len()..].copy_from_slice(&bytes);
    Option::<Scalar>::from(Scalar::from_repr(repr))
        .ok_or_else(|| Error::InvalidShare("value is not below the curve order".into()))
}

pub fn scalar_to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_be(scalar.to_bytes().as_slice())
}

/// Zero-padded 64-character hex
pub fn scalar_to_hex(scalar: &Scalar) -> String {
    hex::encode(scalar.to_bytes())
}

/// Share encoding handed to the TSS client: base64 of the 32-byte big-endian scalar
pub fn base64_share(share: &Scalar) -> String {
    STANDARD.encode(share.to_bytes())
}

pub fn share_from_base64(encoded: &str) -> Result<Scalar> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Deserialization(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(Error::Deserialization(format!(
            "share must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&bytes)))
        .ok_or_else(|| Error::Deserialization("share out of range".into()))
}

/// Point encoding handed to the TSS client: base64 of the affine `X || Y`
pub fn base64_public_key(public_key: &PublicKey) -> String {
    STANDARD.encode(public_key.to_xy())
}
