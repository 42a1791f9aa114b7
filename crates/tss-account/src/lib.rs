//! # TSS Account
//!
//! Account facade over a threshold ECDSA key: Ethereum signing (raw data,
//! personal messages, EIP-712 typed data, legacy transactions) and Bitcoin
//! message signing, backed by any [`EcdsaSigner`].

pub mod account;
pub mod address;
pub mod bitcoin;
pub mod eip712;
pub mod error;
pub mod rlp;
pub mod signer;
pub mod transaction;
pub mod units;

pub use account::EthereumAccount;
pub use address::Address;
pub use bitcoin::BitcoinAccount;
pub use eip712::TypedData;
pub use error::{AccountError, Result};
pub use signer::{DelegatedSigner, EcdsaSigner, TssAccount};
pub use transaction::{SignedTransaction, Transaction};

use sha3::{Digest, Keccak256};

/// Keccak-256 digest
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}
