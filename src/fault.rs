//! Fault-mode simulation at the node's response boundary.
//!
//! The injector only changes what a node *reports*. Chain, mempool and
//! reliability state are never touched, so switching back to NORMAL restores
//! honest behaviour immediately.

use crate::blockchain::Block;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value written over the second block's `previous_hash` in BYZANTINE mode.
pub const CORRUPTED_HASH: &str = "corrupted_hash";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaultMode {
    #[default]
    Normal,
    /// Crash simulation: every data operation reports unavailable.
    Stop,
    /// Lying peer: the reported chain has a broken link at block 2.
    Byzantine,
}

impl FaultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultMode::Normal => "NORMAL",
            FaultMode::Stop => "STOP",
            FaultMode::Byzantine => "BYZANTINE",
        }
    }
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultMode {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(FaultMode::Normal),
            "STOP" => Ok(FaultMode::Stop),
            "BYZANTINE" => Ok(FaultMode::Byzantine),
            other => Err(ChainError::InvalidFaultMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    mode: FaultMode,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> FaultMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FaultMode) {
        self.mode = mode;
    }

    pub fn is_stopped(&self) -> bool {
        self.mode == FaultMode::Stop
    }

    /// Gate for every externally observable operation.
    pub fn check(&self) -> Result<(), ChainError> {
        if self.is_stopped() {
            return Err(ChainError::Unavailable);
        }
        Ok(())
    }

    /// The chain as this node reports it to the outside world.
    pub fn report_chain(&self, chain: &[Block]) -> Result<Vec<Block>, ChainError> {
        self.check()?;
        let mut reported = chain.to_vec();
        if self.mode == FaultMode::Byzantine {
            if let Some(second) = reported.get_mut(1) {
                second.previous_hash = CORRUPTED_HASH.to_string();
            }
        }
        Ok(reported)
    }
}
