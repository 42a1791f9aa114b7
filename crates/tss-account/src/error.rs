//! Error types for account operations

use thiserror::Error;

/// Result type alias for account operations
pub type Result<T> = std::result::Result<T, AccountError>;

/// Errors raised by the account facade
#[derive(Debug, Error)]
pub enum AccountError {
    /// Failure in the signing ceremony
    #[error(transparent)]
    Tss(#[from] tss_core::Error),

    /// Input is not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Malformed or mis-checksummed address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// EIP-712 payload cannot be encoded
    #[error("Invalid typed data: {0}")]
    TypedData(String),

    /// Amount cannot be converted between units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Operation not available for this signer
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<hex::FromHexError> for AccountError {
    fn from(e: hex::FromHexError) -> Self {
        AccountError::InvalidHex(e.to_string())
    }
}
