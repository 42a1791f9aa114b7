//! # TSS Core
//!
//! Client-side orchestration of a threshold ECDSA signing ceremony.
//!
//! The client holds one share of a secp256k1 key that is otherwise split
//! across a fixed set of remote signing nodes. This crate provides:
//! - Session identifiers shared by every party of one ceremony
//! - Party topology resolution (party indexes and node endpoints)
//! - Lagrange coefficients and share denormalization
//! - The signing orchestrator driving connect/precompute/sign/cleanup
//!
//! The network protocol itself lives behind the [`client::TssClient`] trait.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_core::{sign, AccountParams, SigningConfig};
//!
//! let params: AccountParams = serde_json::from_str(&json)?;
//! let signature = sign::run_signing(&params, &digest, &factory, &SigningConfig::default()).await?;
//! ```

pub mod client;
pub mod coefficients;
pub mod encoding;
pub mod error;
pub mod session;
pub mod sign;
pub mod topology;
pub mod types;

pub use coefficients::{CoefficientSet, ServerCoefficients};
pub use error::{Error, Result, Step};
pub use session::SigningSession;
pub use sign::SigningConfig;
pub use topology::PartyTopology;
pub use types::{AccountParams, PartyId, PublicKey, Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of parties (servers plus client) used when an account carries no
/// explicit node indexes.
// FIXME: accounts should carry their topology instead of relying on this fallback
pub const DEFAULT_PARTIES: usize = 4;
