//! TallyChain - a small multi-node proof-of-work ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger and chain validation
//! - [`transaction`] - Transaction types and kind checks
//! - [`mempool`] - Pending transactions
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work search and verification
//! - [`consensus`] - Majority / longest-chain peer reconciliation
//! - [`peers`] - Peer set and reliability counters
//! - [`fault`] - Crash and lying-peer simulation
//!
//! ## Networking & Node
//! - [`network`] - Peer client used to fetch chains
//! - [`node`] - Shared node state, operations and background ticks
//! - `api` - HTTP routes (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`crypto`] - Hashing helpers
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod fault;
pub mod miner;
pub mod peers;

// ============================================================================
// Networking & Node
// ============================================================================
pub mod network;
pub mod node;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod crypto;
pub mod error;
