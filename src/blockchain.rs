// Thin re-export module: implementation is in `blockchain/core.rs` so that
// block sealing, chain management and validation live in separate files.

pub mod core;
pub use self::core::*;
