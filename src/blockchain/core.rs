// core.rs splits ledger responsibilities into submodules: block and chain
// management, chain-state snapshots, and structural validation.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
