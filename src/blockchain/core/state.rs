use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::chain::Block;
use crate::transaction::Transaction;

/// Cheap chain identity: length plus the hash of the tip block.
///
/// Two chains with equal fingerprints are treated as content-identical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub length: usize,
    pub tip_hash: String,
}

impl Fingerprint {
    /// Fingerprint of an arbitrary chain; `None` when it is empty.
    pub fn of(chain: &[Block]) -> Option<Self> {
        chain.last().map(|tip| Fingerprint {
            length: chain.len(),
            tip_hash: tip.hash(),
        })
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.length, self.tip_hash)
    }
}

/// Snapshot taken before an unlocked proof-of-work search.
///
/// It records everything the commit step needs to decide whether the chain
/// moved underneath the search.
#[derive(Debug, Clone)]
pub struct MiningTemplate {
    pub index: u64,
    pub previous_hash: String,
    pub previous_proof: u64,
    pub difficulty: usize,
    pub transactions: Vec<Transaction>,
}

impl MiningTemplate {
    pub fn transaction_ids(&self) -> HashSet<String> {
        self.transactions.iter().map(|tx| tx.id.clone()).collect()
    }
}
