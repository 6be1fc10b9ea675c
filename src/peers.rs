//! Peer set and per-peer reliability counters.
//!
//! The tracker's key set *is* the configured peer set: registering a peer
//! creates its zeroed record. Counters only grow and are consulted solely to
//! break ties between equally long candidate chains.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub ok_count: u64,
    pub fail_count: u64,
}

/// Peer address together with its reliability record, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub peer: String,
    #[serde(flatten)]
    pub record: PeerRecord,
}

#[derive(Debug, Clone, Default)]
pub struct ReliabilityTracker {
    records: BTreeMap<String, PeerRecord>,
}

impl ReliabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer with zeroed counters. Returns false if it was already known.
    pub fn register(&mut self, peer: &str) -> bool {
        if self.records.contains_key(peer) {
            return false;
        }
        self.records.insert(peer.to_string(), PeerRecord::default());
        true
    }

    pub fn record_success(&mut self, peer: &str) {
        self.records.entry(peer.to_string()).or_default().ok_count += 1;
    }

    pub fn record_failure(&mut self, peer: &str) {
        let record = self.records.entry(peer.to_string()).or_default();
        record.fail_count += 1;
        tracing::debug!(peer, fail_count = record.fail_count, "peer.failure");
    }

    pub fn get(&self, peer: &str) -> Option<PeerRecord> {
        self.records.get(peer).copied()
    }

    /// Failure count used for tie-breaking; unknown peers count as zero.
    pub fn fail_count(&self, peer: &str) -> u64 {
        self.get(peer).map_or(0, |r| r.fail_count)
    }

    /// Configured peers in sorted order.
    pub fn peers(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<PeerSummary> {
        self.records
            .iter()
            .map(|(peer, record)| PeerSummary {
                peer: peer.clone(),
                record: *record,
            })
            .collect()
    }
}
