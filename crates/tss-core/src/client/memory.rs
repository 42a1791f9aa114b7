//! In-memory signing nodes for local testing
//!
//! The network holds one share per server DKG index and plays every server
//! party of a session inside the process. Server inputs are formed exactly
//! like real nodes form them (coefficient times share) and the parties'
//! inputs are combined with the protocol's own `1..=N` interpolation, so a
//! wrong coefficient or denormalization yields a signature that fails
//! verification.

use super::{async_trait, ClientConfig, TssClient, TssClientFactory};
use crate::coefficients::lagrange_coefficient;
use crate::encoding::{base64_public_key, scalar_from_hex, scalar_to_hex, share_from_base64};
use crate::{Error, PublicKey, Result, ServerCoefficients, Signature};
use base64::{engine::general_purpose::STANDARD, Engine};
use dashmap::DashMap;
use k256::{
    ecdsa::{SigningKey, VerifyingKey},
    elliptic_curve::Field,
    NonZeroScalar, Scalar,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Misbehaviour injected into every session of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// `check_connected` never reports true
    NeverConnect,
    /// `is_ready` never reports true
    NeverReady,
    /// Precompute is rejected by the servers
    RejectPrecompute,
    /// Servers return a signature over a different digest
    CorruptSignature,
    /// Cleanup is rejected by the servers
    FailCleanup,
}

/// Serializable description of an in-memory network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFixture {
    /// Uncompressed public key, hex
    pub public_key: String,
    /// Server share per DKG index, hex
    pub server_shares: BTreeMap<u32, String>,
}

/// Client-side share material produced by [`MemoryTssNetwork::deal`]
#[derive(Debug, Clone)]
pub struct DealtShare {
    /// Uncompressed public key, hex
    pub public_key: String,
    /// Client share, hex
    pub tss_share: String,
    /// Client share index, hex
    pub tss_index: String,
}

struct NetworkState {
    public_key: PublicKey,
    server_shares: BTreeMap<u32, Scalar>,
    fault: RwLock<Fault>,
    active: DashMap<String, ()>,
    seen: DashMap<String, ()>,
    created: AtomicUsize,
    cleanups: AtomicUsize,
}

impl NetworkState {
    fn fault(&self) -> Fault {
        *self.fault.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Set of simulated signing nodes
#[derive(Clone)]
pub struct MemoryTssNetwork {
    state: Arc<NetworkState>,
}

impl MemoryTssNetwork {
    /// Create a network from server shares keyed by DKG index
    pub fn new(public_key: PublicKey, server_shares: BTreeMap<u32, Scalar>) -> Self {
        Self {
            state: Arc::new(NetworkState {
                public_key,
                server_shares,
                fault: RwLock::new(Fault::None),
                active: DashMap::new(),
                seen: DashMap::new(),
                created: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
            }),
        }
    }

    /// Deal a fresh key: `servers` nodes sharing their point with the given
    /// threshold, and a client share at `user_index`.
    pub fn deal<R: RngCore + CryptoRng>(
        rng: &mut R,
        servers: u32,
        threshold: usize,
        user_index: u64,
    ) -> Result<(Self, DealtShare)> {
        if threshold == 0 || threshold > servers as usize {
            return Err(Error::Topology(format!(
                "threshold {threshold} invalid for {servers} servers"
            )));
        }
        if user_index < 2 {
            return Err(Error::InvalidShare(format!(
                "client index {user_index} collides with a reserved point"
            )));
        }

        let secret = *NonZeroScalar::random(&mut *rng);
        let slope = Scalar::random(&mut *rng);
        let server_master = secret + slope;
        let user_share = secret + slope * Scalar::from(user_index);

        let mut polynomial = vec![server_master];
        polynomial.extend((1..threshold).map(|_| Scalar::random(&mut *rng)));

        let server_shares = (1..=servers)
            .map(|index| (index, evaluate_polynomial(&polynomial, &Scalar::from(index as u64))))
            .collect();

        let signing_key = signing_key_from(&secret)?;
        let public_key = PublicKey::from(VerifyingKey::from(&signing_key));

        let dealt = DealtShare {
            public_key: hex::encode(public_key.to_uncompressed()),
            tss_share: scalar_to_hex(&user_share),
            tss_index: format!("{user_index:x}"),
        };

        Ok((Self::new(public_key, server_shares), dealt))
    }

    pub fn from_fixture(fixture: &NetworkFixture) -> Result<Self> {
        let public_key = PublicKey::from_hex(&fixture.public_key)?;
        let server_shares = fixture
            .server_shares
            .iter()
            .map(|(index, share)| Ok((*index, scalar_from_hex(share)?)))
            .collect::<Result<_>>()?;
        Ok(Self::new(public_key, server_shares))
    }

    pub fn to_fixture(&self) -> NetworkFixture {
        NetworkFixture {
            public_key: hex::encode(self.state.public_key.to_uncompressed()),
            server_shares: self
                .state
                .server_shares
                .iter()
                .map(|(index, share)| (*index, scalar_to_hex(share)))
                .collect(),
        }
    }

    /// Inject a fault into subsequent calls
    pub fn set_fault(&self, fault: Fault) {
        *self.state.fault.write().unwrap_or_else(PoisonError::into_inner) = fault;
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.state.public_key
    }

    /// Number of clients created
    pub fn created_count(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Number of cleanup calls received
    pub fn cleanup_count(&self) -> usize {
        self.state.cleanups.load(Ordering::SeqCst)
    }

    /// Sessions created and not yet cleaned up
    pub fn active_sessions(&self) -> usize {
        self.state.active.len()
    }

    /// Every session string ever created
    pub fn seen_sessions(&self) -> Vec<String> {
        self.state.seen.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl TssClientFactory for MemoryTssNetwork {
    type Client = MemoryTssClient;

    async fn create(&self, config: ClientConfig) -> Result<MemoryTssClient> {
        self.state.created.fetch_add(1, Ordering::SeqCst);

        let n = config.parties.len();
        if n < 2 || config.endpoints.len() != n || config.socket_endpoints.len() != n {
            return Err(Error::Transport("party and endpoint lists are not aligned".into()));
        }
        if config.index != n - 1 {
            return Err(Error::Transport(format!(
                "client must be the last party, got {}",
                config.index
            )));
        }
        let servers_reachable = (0..n - 1)
            .all(|p| config.endpoints[p].is_some() && config.socket_endpoints[p].is_some());
        if !servers_reachable {
            return Err(Error::Transport("missing server endpoint".into()));
        }
        if config.public_key != base64_public_key(&self.state.public_key) {
            return Err(Error::Transport("public key does not belong to this network".into()));
        }

        let share = share_from_base64(&config.share)?;

        if self.state.seen.insert(config.session.clone(), ()).is_some() {
            return Err(Error::Transport("session already used".into()));
        }
        self.state.active.insert(config.session.clone(), ());

        debug!(parties = n, "Memory TSS client created");

        Ok(MemoryTssClient {
            config,
            share,
            state: self.state.clone(),
            precomputed: AtomicBool::new(false),
        })
    }
}

/// Precompute output of the in-memory network
pub struct MemoryPrecompute {
    signing_key: SigningKey,
}

/// Client bound to one session of a [`MemoryTssNetwork`]
pub struct MemoryTssClient {
    config: ClientConfig,
    share: Scalar,
    state: Arc<NetworkState>,
    precomputed: AtomicBool,
}

#[async_trait]
impl TssClient for MemoryTssClient {
    type Precompute = MemoryPrecompute;

    async fn check_connected(&self) -> Result<bool> {
        Ok(self.state.fault() != Fault::NeverConnect)
    }

    async fn precompute(
        &self,
        coefficients: &ServerCoefficients,
        signatures: &[String],
    ) -> Result<MemoryPrecompute> {
        if signatures.is_empty() {
            return Err(Error::Transport("missing auth signatures".into()));
        }
        if self.state.fault() == Fault::RejectPrecompute {
            return Err(Error::Transport("precompute rejected".into()));
        }

        let n = self.config.parties.len();
        if coefficients.len() != n - 1 {
            return Err(Error::Transport(format!(
                "expected {} server coefficients, got {}",
                n - 1,
                coefficients.len()
            )));
        }

        // server coefficients iterate in ascending DKG order, which is party order
        let mut inputs = Vec::with_capacity(n);
        for (index, coefficient) in coefficients.iter() {
            let share = self
                .state
                .server_shares
                .get(&index)
                .ok_or_else(|| Error::Transport(format!("unknown node {index}")))?;
            inputs.push(*coefficient * share);
        }
        inputs.push(self.share);

        let indexes: Vec<Scalar> = (1..=n as u64).map(Scalar::from).collect();
        let mut key = Scalar::ZERO;
        for (party, input) in inputs.iter().enumerate() {
            key += lagrange_coefficient(&indexes, &indexes[party], &Scalar::ZERO)? * input;
        }

        self.precomputed.store(true, Ordering::SeqCst);
        debug!(parties = n, "Memory precompute finished");

        Ok(MemoryPrecompute {
            signing_key: signing_key_from(&key)?,
        })
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(self.state.fault() != Fault::NeverReady && self.precomputed.load(Ordering::SeqCst))
    }

    async fn sign(
        &self,
        message: &str,
        hash_only: bool,
        precompute: &MemoryPrecompute,
        signatures: &[String],
    ) -> Result<Signature> {
        if !hash_only {
            return Err(Error::Transport("only digest signing is supported".into()));
        }
        if signatures.is_empty() {
            return Err(Error::Transport("missing auth signatures".into()));
        }
        if !self.state.active.contains_key(&self.config.session) {
            return Err(Error::Transport("session is not active".into()));
        }

        let mut digest = STANDARD
            .decode(message)
            .map_err(|e| Error::Transport(e.to_string()))?;
        if self.state.fault() == Fault::CorruptSignature {
            digest = Keccak256::digest(&digest).to_vec();
        }

        let (signature, recovery_id) = precompute
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| Error::Transport(e.to_string()))?;

        let (r_bytes, s_bytes) = signature.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);

        Ok(Signature::new(r, s, recovery_id.to_byte()))
    }

    async fn cleanup(&self, _signatures: &[String]) -> Result<()> {
        self.state.cleanups.fetch_add(1, Ordering::SeqCst);
        self.state.active.remove(&self.config.session);

        if self.state.fault() == Fault::FailCleanup {
            return Err(Error::Cleanup("cleanup rejected".into()));
        }
        Ok(())
    }
}

fn evaluate_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;

    for coef in coefficients {
        result += *coef * x_power;
        x_power *= x;
    }

    result
}

fn signing_key_from(scalar: &Scalar) -> Result<SigningKey> {
    Option::<NonZeroScalar>::from(NonZeroScalar::new(*scalar))
        .map(SigningKey::from)
        .ok_or_else(|| Error::Transport("combined key is zero".into()))
}
