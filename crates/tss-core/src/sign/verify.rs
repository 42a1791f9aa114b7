//! Local signature verification

use crate::{Error, PublicKey, Result, Signature};
use k256::ecdsa::{RecoveryId, VerifyingKey};

/// Check that `signature` over `digest` recovers to `public_key`.
///
/// Accepts a recovery id of 0/1 or 27/28. A high-s signature is normalized to
/// low-s with its recovery parity flipped; the returned signature is always
/// low-s with a raw 0/1 recovery id.
pub fn verify_signature(digest: &[u8; 32], signature: &Signature, public_key: &PublicKey) -> Result<Signature> {
    let mut parity = signature.parity();
    if parity > 1 {
        return Err(Error::Verification(format!(
            "unexpected recovery id {}",
            signature.recovery_id
        )));
    }

    let mut ecdsa = signature
        .to_ecdsa()
        .map_err(|e| Error::Verification(e.to_string()))?;
    if let Some(normalized) = ecdsa.normalize_s() {
        ecdsa = normalized;
        parity ^= 1;
    }

    let recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| Error::Verification(format!("invalid recovery id {parity}")))?;
    let recovered = VerifyingKey::recover_from_prehash(digest, &ecdsa, recovery_id)
        .map_err(|e| Error::Verification(e.to_string()))?;

    if &recovered != public_key.verifying_key() {
        return Err(Error::Verification(
            "signature does not recover to the account public key".into(),
        ));
    }

    let (r_bytes, s_bytes) = ecdsa.split_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&r_bytes);
    s.copy_from_slice(&s_bytes);

    Ok(Signature::new(r, s, parity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use sha3::{Digest, Keccak256};

    fn signed(digest: &[u8; 32]) -> (PublicKey, Signature) {
        let key = SigningKey::random(&mut OsRng);
        let (sig, recid) = key.sign_prehash_recoverable(digest).unwrap();
        let bytes = sig.to_bytes();
        let mut raw = [0u8; 65];
        raw[..64].copy_from_slice(&bytes);
        raw[64] = recid.to_byte();
        (
            PublicKey::from(VerifyingKey::from(&key)),
            Signature::from_bytes(&raw).unwrap(),
        )
    }

    fn digest() -> [u8; 32] {
        Keccak256::digest(b"hello world").into()
    }

    #[test]
    fn test_accepts_valid_signature() {
        let digest = digest();
        let (public_key, sig) = signed(&digest);

        let verified = verify_signature(&digest, &sig, &public_key).unwrap();
        assert_eq!(verified, sig);
    }

    #[test]
    fn test_accepts_ethereum_recovery_id() {
        let digest = digest();
        let (public_key, sig) = signed(&digest);
        let eth = Signature::new(sig.r, sig.s, sig.recovery_id + 27);

        let verified = verify_signature(&digest, &eth, &public_key).unwrap();
        assert_eq!(verified.recovery_id, sig.recovery_id);
    }

    #[test]
    fn test_normalizes_high_s() {
        let digest = digest();
        let (public_key, sig) = signed(&digest);

        let ecdsa = sig.to_ecdsa().unwrap();
        let high_s = -*ecdsa.s();
        let mut s = [0u8; 32];
        s.copy_from_slice(&high_s.to_bytes());
        let flipped = Signature::new(sig.r, s, sig.recovery_id ^ 1);

        let verified = verify_signature(&digest, &flipped, &public_key).unwrap();
        assert_eq!(verified, sig);
    }

    #[test]
    fn test_rejects_wrong_key_or_digest() {
        let digest = digest();
        let (public_key, sig) = signed(&digest);
        let (other_key, _) = signed(&digest);

        assert!(matches!(
            verify_signature(&digest, &sig, &other_key),
            Err(Error::Verification(_))
        ));
        assert!(matches!(
            verify_signature(&[7u8; 32], &sig, &public_key),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn test_rejects_bad_recovery_id() {
        let digest = digest();
        let (public_key, sig) = signed(&digest);

        for v in [2u8, 5, 29] {
            let bad = Signature::new(sig.r, sig.s, v);
            assert!(verify_signature(&digest, &bad, &public_key).is_err());
        }
    }
}
