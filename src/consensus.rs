//! Peer conflict resolution.
//!
//! A round polls every configured peer, keeps the chains that decode and
//! validate, and tallies them by [`Fingerprint`]. A fingerprint backed by a
//! majority of the *configured* peer set wins outright. Otherwise the longest
//! candidate wins, ties going to the peer with the fewest recorded failures.
//! Either way the winner must still pass [`Ledger::replace_chain`], so a chain
//! that is not strictly longer than ours is never adopted.

use crate::blockchain::{check_chain, Block, Fingerprint, Ledger};
use crate::network::{PeerClient, PeerError};
use crate::peers::ReliabilityTracker;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Votes needed for a fingerprint to win: `floor(total / 2) + 1`.
pub fn majority_threshold(total_peers: usize) -> usize {
    total_peers / 2 + 1
}

/// A peer's chain that decoded and passed structural validation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub peer: String,
    pub chain: Vec<Block>,
    pub fingerprint: Fingerprint,
}

impl Candidate {
    pub fn new(peer: impl Into<String>, chain: Vec<Block>) -> Option<Self> {
        let fingerprint = Fingerprint::of(&chain)?;
        Some(Candidate {
            peer: peer.into(),
            chain,
            fingerprint,
        })
    }
}

/// Outcome of polling one peer.
#[derive(Debug, Clone)]
pub struct PeerPoll {
    pub peer: String,
    pub result: Result<Candidate, PeerError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Majority { votes: usize },
    Longest,
}

#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub candidate: &'a Candidate,
    pub decision: Decision,
}

/// Pick the chain this round should try to adopt.
///
/// `candidates` must be in peer order; that order settles any tie that
/// reliability does not.
pub fn select_chain<'a>(
    candidates: &'a [Candidate],
    total_peers: usize,
    reliability: &ReliabilityTracker,
) -> Option<Selection<'a>> {
    let mut tally: BTreeMap<&Fingerprint, Vec<&'a Candidate>> = BTreeMap::new();
    for candidate in candidates {
        tally.entry(&candidate.fingerprint).or_default().push(candidate);
    }

    let threshold = majority_threshold(total_peers);
    if let Some(voters) = tally.values().find(|voters| voters.len() >= threshold) {
        return Some(Selection {
            candidate: voters[0],
            decision: Decision::Majority { votes: voters.len() },
        });
    }

    let longest = candidates.iter().map(|c| c.chain.len()).max()?;
    let mut best: Option<&Candidate> = None;
    for candidate in candidates.iter().filter(|c| c.chain.len() == longest) {
        let better = match best {
            None => true,
            Some(current) => reliability.fail_count(&candidate.peer) < reliability.fail_count(&current.peer),
        };
        if better {
            best = Some(candidate);
        }
    }

    best.map(|candidate| Selection {
        candidate,
        decision: Decision::Longest,
    })
}

/// Summary of one consensus round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub replaced: bool,
    pub adopted_from: Option<String>,
    pub decision: Option<Decision>,
    pub responded: usize,
    pub failed: usize,
}

/// Record every poll against the tracker, select a winner and hand it to the
/// ledger's fork-choice rule. Runs under the node's exclusive lock.
pub fn apply_round(
    ledger: &mut Ledger,
    reliability: &mut ReliabilityTracker,
    polls: Vec<PeerPoll>,
    total_peers: usize,
) -> RoundOutcome {
    let mut outcome = RoundOutcome::default();
    let mut candidates = Vec::with_capacity(polls.len());

    for poll in polls {
        match poll.result {
            Ok(candidate) => {
                reliability.record_success(&poll.peer);
                outcome.responded += 1;
                candidates.push(candidate);
            }
            Err(e) => {
                warn!(peer = %poll.peer, error = %e, "consensus.peer_failed");
                reliability.record_failure(&poll.peer);
                outcome.failed += 1;
            }
        }
    }

    let Some(selection) = select_chain(&candidates, total_peers, reliability) else {
        debug!("consensus.no_candidates");
        return outcome;
    };

    outcome.decision = Some(selection.decision);
    let candidate = selection.candidate;
    if ledger.replace_chain(candidate.chain.clone()) {
        info!(
            peer = %candidate.peer,
            fingerprint = %candidate.fingerprint,
            decision = ?selection.decision,
            "consensus.chain_replaced"
        );
        outcome.replaced = true;
        outcome.adopted_from = Some(candidate.peer.clone());
    } else {
        debug!(
            peer = %candidate.peer,
            length = candidate.chain.len(),
            local_length = ledger.len(),
            "consensus.kept_local_chain"
        );
    }
    outcome
}

/// Polls peers through a [`PeerClient`] with a bounded per-peer timeout.
#[derive(Clone)]
pub struct ConsensusResolver {
    client: Arc<dyn PeerClient>,
    peer_timeout: Duration,
}

impl ConsensusResolver {
    pub fn new(client: Arc<dyn PeerClient>, peer_timeout: Duration) -> Self {
        Self { client, peer_timeout }
    }

    /// Fetch and vet one peer's chain. Never retries.
    pub async fn poll_peer(&self, peer: &str, difficulty: usize) -> PeerPoll {
        let result = match tokio::time::timeout(self.peer_timeout, self.client.fetch_chain(peer)).await {
            Err(_) => Err(PeerError::Timeout(self.peer_timeout)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(chain)) => match check_chain(&chain, difficulty) {
                Err(defect) => Err(PeerError::InvalidChain(defect.to_string())),
                Ok(()) => Candidate::new(peer, chain)
                    .ok_or_else(|| PeerError::InvalidChain("chain is empty".to_string())),
            },
        };
        PeerPoll {
            peer: peer.to_string(),
            result,
        }
    }

    /// Poll all `peers` concurrently. Results come back in the order of `peers`.
    ///
    /// Must be called without holding the node lock.
    pub async fn poll_peers(&self, peers: &[String], difficulty: usize) -> Vec<PeerPoll> {
        let mut tasks = JoinSet::new();
        for (position, peer) in peers.iter().enumerate() {
            let resolver = self.clone();
            let peer = peer.clone();
            tasks.spawn(async move { (position, resolver.poll_peer(&peer, difficulty).await) });
        }

        let mut slots: Vec<Option<PeerPoll>> = vec![None; peers.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, poll)) => slots[position] = Some(poll),
                Err(e) => warn!(error = %e, "consensus.poll_task_failed"),
            }
        }

        slots
            .into_iter()
            .zip(peers)
            .map(|(slot, peer)| {
                slot.unwrap_or_else(|| PeerPoll {
                    peer: peer.clone(),
                    result: Err(PeerError::Transport("poll task aborted".to_string())),
                })
            })
            .collect()
    }
}
