//! TSS session client abstraction
//!
//! The multi-party network protocol is implemented outside this crate. A
//! client is created for exactly one session, driven through its phases by
//! the signing orchestrator and released with [`TssClient::cleanup`].

use crate::{PartyId, Result, ServerCoefficients, Signature};
use zeroize::Zeroizing;

pub use ::async_trait::async_trait;

/// Everything a client needs to join one signing session
#[derive(Clone)]
pub struct ClientConfig {
    /// Full session string
    pub session: String,
    /// Client party position
    pub index: PartyId,
    /// All party positions, servers first
    pub parties: Vec<PartyId>,
    /// HTTP endpoint per party (`None` for the client)
    pub endpoints: Vec<Option<String>>,
    /// Socket endpoint per party (`None` for the client)
    pub socket_endpoints: Vec<Option<String>>,
    /// Denormalized share, base64 of the 32-byte scalar
    pub share: Zeroizing<String>,
    /// Public key, base64 of `X || Y`
    pub public_key: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("session", &self.session)
            .field("index", &self.index)
            .field("parties", &self.parties)
            .field("endpoints", &self.endpoints)
            .field("socket_endpoints", &self.socket_endpoints)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// One client's view of a running TSS session
#[async_trait]
pub trait TssClient: Send + Sync {
    /// Opaque precompute material produced by [`TssClient::precompute`]
    type Precompute: Send + Sync;

    /// Whether sockets to every server party are connected
    async fn check_connected(&self) -> Result<bool>;

    /// Start the precompute phase
    async fn precompute(
        &self,
        coefficients: &ServerCoefficients,
        signatures: &[String],
    ) -> Result<Self::Precompute>;

    /// Whether precompute has completed on every party
    async fn is_ready(&self) -> Result<bool>;

    /// Sign a base64-encoded message.
    ///
    /// With `hash_only` set the message is already a digest and must not be
    /// hashed again by the protocol.
    async fn sign(
        &self,
        message: &str,
        hash_only: bool,
        precompute: &Self::Precompute,
        signatures: &[String],
    ) -> Result<Signature>;

    /// Release server-side session state
    async fn cleanup(&self, signatures: &[String]) -> Result<()>;
}

/// Creates a client bound to one session
#[async_trait]
pub trait TssClientFactory: Send + Sync {
    type Client: TssClient;

    async fn create(&self, config: ClientConfig) -> Result<Self::Client>;
}

/// In-memory signing nodes for testing
pub mod memory;

pub use memory::{Fault, MemoryTssNetwork};
