//! Error types for signing sessions

use std::fmt;
use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol phase driven through the TSS client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Connect,
    Precompute,
    Ready,
    Sign,
    Cleanup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Create => "create",
            Step::Connect => "connect",
            Step::Precompute => "precompute",
            Step::Ready => "ready",
            Step::Sign => "sign",
            Step::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while preparing or running a signing session
#[derive(Debug, Error)]
pub enum Error {
    /// Public key is not an uncompressed secp256k1 point
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Share or share index is not a valid field element
    #[error("Invalid share: {0}")]
    InvalidShare(String),

    /// Message is not a 32-byte digest
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Node indexes and endpoints do not describe a usable topology
    #[error("Invalid topology: {0}")]
    Topology(String),

    /// OS randomness unavailable
    #[error("Randomness unavailable: {0}")]
    Randomness(String),

    /// Sockets to the signing nodes did not connect
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Precompute did not complete
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A TSS client call failed
    #[error("{step} failed: {source}")]
    Protocol {
        step: Step,
        #[source]
        source: Box<Error>,
    },

    /// Failure reported by a client implementation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Produced signature does not verify against the public key
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// Server-side session state could not be released
    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Attribute this error to a protocol step
    pub fn at(self, step: Step) -> Self {
        match self {
            Error::Protocol { .. } => self,
            other => Error::Protocol {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Step at which a protocol failure occurred
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Protocol { step, .. } => Some(*step),
            Error::Connection(_) => Some(Step::Connect),
            Error::NotReady(_) => Some(Step::Ready),
            Error::Cleanup(_) => Some(Step::Cleanup),
            _ => None,
        }
    }

    /// Caller-side input errors, detected before any network call
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidPublicKey(_)
                | Error::InvalidShare(_)
                | Error::InvalidMessage(_)
                | Error::Topology(_)
        )
    }

    /// Whether the whole signing call may be retried with a new session
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::NotReady(_) | Error::Protocol { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_keeps_first_step() {
        let err = Error::Transport("socket closed".into())
            .at(Step::Sign)
            .at(Step::Cleanup);

        assert_eq!(err.step(), Some(Step::Sign));
        assert_eq!(err.to_string(), "sign failed: Transport error: socket closed");
    }

    #[test]
    fn test_classification() {
        assert!(Error::InvalidPublicKey("short".into()).is_invalid_input());
        assert!(!Error::InvalidPublicKey("short".into()).is_retryable());
        assert!(Error::Connection("timeout".into()).is_retryable());
        assert!(!Error::Verification("mismatch".into()).is_retryable());
        assert!(!Error::Randomness("os".into()).is_retryable());
    }
}
