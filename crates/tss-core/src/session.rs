//! Session identifiers for signing ceremonies
//!
//! Every party of one ceremony must agree on the full session string. The
//! string binds the account identity (verifier, verifier id, tag, share-set
//! nonce) to a fresh per-ceremony nonce.

use crate::encoding::scalar_to_biguint;
use crate::topology::PartyTopology;
use crate::{AccountParams, Error, PartyId, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    Scalar,
};
use num_bigint::BigUint;
use rand_core::{OsRng, RngCore};
use sha3::{Digest, Keccak256};
use tracing::debug;

/// Separator between verifier and verifier id
pub const DELIMITER_1: char = '\u{001c}';
/// Separator between verifier id and tag
pub const DELIMITER_2: char = '\u{0015}';
/// Separator between tag and share-set nonce
pub const DELIMITER_3: char = '\u{0016}';
/// Separator between share-set nonce and session nonce
pub const DELIMITER_4: char = '\u{0017}';

/// Generate a fresh session nonce from OS randomness and the wall clock
pub fn generate_session_nonce() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Randomness(e.to_string()))?;

    let random = <Scalar as Reduce<U256>>::reduce_bytes(&bytes.into());
    let timestamp = chrono::Utc::now().timestamp().max(0) as u64;

    Ok(session_nonce(&random, timestamp))
}

/// Derive a session nonce from a random scalar and a Unix timestamp.
///
/// The timestamp is added to the scalar as an integer (no modular
/// reduction), the decimal representation hashed with Keccak-256, and the
/// digest encoded as unpadded base64url.
pub fn session_nonce(random: &Scalar, timestamp: u64) -> String {
    let value = scalar_to_biguint(random) + BigUint::from(timestamp);
    let digest = Keccak256::digest(value.to_string().as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Assemble the full session string agreed on by all parties
pub fn assemble_full_session(
    verifier: &str,
    verifier_id: &str,
    tag: &str,
    tss_nonce: &str,
    session_nonce: &str,
) -> String {
    format!(
        "{verifier}{DELIMITER_1}{verifier_id}{DELIMITER_2}{tag}{DELIMITER_3}{tss_nonce}{DELIMITER_4}{session_nonce}"
    )
}

/// Ephemeral state of one signing ceremony.
///
/// Built at the start of a signing call and dropped at its end; a session is
/// never shared between calls.
#[derive(Debug, Clone)]
pub struct SigningSession {
    /// Per-ceremony nonce
    pub session_nonce: String,
    /// Full session string
    pub session: String,
    /// Resolved parties and endpoints
    pub topology: PartyTopology,
}

impl SigningSession {
    /// Build a session for `params` with a freshly generated nonce
    pub fn new(params: &AccountParams) -> Result<Self> {
        let topology = PartyTopology::resolve(&params.node_indexes, &params.tss_endpoints)?;
        let session_nonce = generate_session_nonce()?;
        Ok(Self::with_nonce(params, topology, session_nonce))
    }

    pub fn with_nonce(params: &AccountParams, topology: PartyTopology, session_nonce: String) -> Self {
        let session = assemble_full_session(
            &params.verifier,
            &params.verifier_id,
            &params.selected_tag,
            &params.tss_nonce.to_string(),
            &session_nonce,
        );

        debug!(
            nonce_prefix = &session_nonce[..8.min(session_nonce.len())],
            parties = topology.parties,
            "Signing session built"
        );

        Self {
            session_nonce,
            session,
            topology,
        }
    }

    pub fn client_index(&self) -> PartyId {
        self.topology.client_index
    }
}
