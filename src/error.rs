//! Error types for TallyChain

use crate::network::PeerError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The node is in STOP fault mode and refuses every data operation.
    #[error("Node stopped")]
    Unavailable,
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid fault mode: {0}")]
    InvalidFaultMode(String),
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    /// The chain tip moved while a proof was being searched.
    #[error("Chain tip changed while mining")]
    StaleTip,
    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
