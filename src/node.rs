//! A running ledger node.
//!
//! [`Node`] owns the whole mutable state (ledger, peer table, fault mode)
//! behind one `tokio::sync::RwLock`, exposes the operations the request layer
//! maps to routes, and drives the periodic miner and consensus ticks.

use crate::blockchain::{Block, Ledger};
use crate::config::Config;
use crate::consensus::{apply_round, ConsensusResolver, RoundOutcome};
use crate::error::{ChainError, Result};
use crate::fault::{FaultInjector, FaultMode};
use crate::miner::proof_of_work;
use crate::network::{HttpPeerClient, PeerClient};
use crate::peers::{PeerSummary, ReliabilityTracker};
use crate::transaction::{Transaction, TxKind};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Everything a node mutates. Only reachable through [`Node`]'s lock.
#[derive(Debug)]
pub struct NodeState {
    pub ledger: Ledger,
    pub peers: ReliabilityTracker,
    pub faults: FaultInjector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "block", rename_all = "snake_case")]
pub enum MineOutcome {
    Mined(Block),
    NothingToMine,
    /// The chain advanced during the proof search; the work was discarded.
    Stale,
}

/// Result of [`Node::run_consensus_once`].
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusReport {
    #[serde(flatten)]
    pub outcome: RoundOutcome,
    pub chain: Vec<Block>,
}

#[derive(Clone)]
pub struct Node {
    id: String,
    state: Arc<RwLock<NodeState>>,
    resolver: ConsensusResolver,
}

impl Node {
    pub fn new(id: impl Into<String>, difficulty: usize, resolver: ConsensusResolver) -> Self {
        Self::with_peers(id, difficulty, resolver, ReliabilityTracker::new())
    }

    fn with_peers(
        id: impl Into<String>,
        difficulty: usize,
        resolver: ConsensusResolver,
        peers: ReliabilityTracker,
    ) -> Self {
        let id = id.into();
        let state = NodeState {
            ledger: Ledger::with_difficulty(id.clone(), difficulty),
            peers,
            faults: FaultInjector::new(),
        };
        Self {
            id,
            state: Arc::new(RwLock::new(state)),
            resolver,
        }
    }

    /// Build a node that reaches its peers over HTTP, with the configured
    /// peers already registered.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(config.network.peer_timeout())?);
        let resolver = ConsensusResolver::new(client, config.network.peer_timeout());
        let mut peers = ReliabilityTracker::new();
        for peer in &config.network.peers {
            peers.register(peer);
        }
        Ok(Self::with_peers(config.node.id.clone(), config.miner.difficulty, resolver, peers))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read the true internal state, bypassing the fault boundary.
    pub async fn inspect<R>(&self, f: impl FnOnce(&NodeState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn fault_mode(&self) -> FaultMode {
        self.state.read().await.faults.mode()
    }

    pub async fn get_chain(&self) -> Result<Vec<Block>> {
        let state = self.state.read().await;
        state.faults.report_chain(state.ledger.chain())
    }

    pub async fn mine_now(&self) -> Result<MineOutcome> {
        self.state.read().await.faults.check()?;
        self.mine_round().await
    }

    pub async fn submit_transaction(&self, text: impl Into<String>) -> Result<String> {
        let mut state = self.state.write().await;
        state.faults.check()?;
        let tx = state.ledger.add_transaction(text, TxKind::Tx, None)?;
        debug!(tx_id = %tx.id, "transaction.submitted");
        Ok(tx.id)
    }

    pub async fn list_pending(&self) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        state.faults.check()?;
        Ok(state.ledger.mempool().get_all_transactions())
    }

    pub async fn list_all(&self) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        state.faults.check()?;
        Ok(state.ledger.all_transactions())
    }

    pub async fn update_transaction(&self, id: &str, text: impl Into<String>) -> Result<Transaction> {
        let mut state = self.state.write().await;
        state.faults.check()?;
        state.ledger.update_transaction(id, text)
    }

    /// Merge `peers` into the peer set. Returns the full, sorted peer list.
    pub async fn register_peers<S: AsRef<str>>(&self, peers: &[S]) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        state.faults.check()?;
        for peer in peers.iter().map(|p| p.as_ref().trim()).filter(|p| !p.is_empty()) {
            if state.peers.register(peer) {
                info!(peer, "peer.registered");
            }
        }
        Ok(state.peers.peers())
    }

    pub async fn list_peers(&self) -> Result<Vec<PeerSummary>> {
        let state = self.state.read().await;
        state.faults.check()?;
        Ok(state.peers.snapshot())
    }

    pub async fn run_consensus_once(&self) -> Result<ConsensusReport> {
        self.state.read().await.faults.check()?;
        let outcome = self.consensus_round().await;
        let state = self.state.read().await;
        Ok(ConsensusReport {
            outcome,
            chain: state.ledger.chain().to_vec(),
        })
    }

    /// Switch fault mode. Accepted in every mode, including STOP.
    pub async fn set_fault_mode(&self, mode: &str) -> Result<FaultMode> {
        let mode: FaultMode = mode.parse()?;
        self.state.write().await.faults.set_mode(mode);
        info!(node = %self.id, mode = %mode, "fault.mode_changed");
        Ok(mode)
    }

    /// Snapshot under a read lock, search the proof on a blocking thread with
    /// no lock held, then commit only if the tip did not move.
    async fn mine_round(&self) -> Result<MineOutcome> {
        let template = self.state.read().await.ledger.prepare_mining();
        let Some(template) = template else {
            return Ok(MineOutcome::NothingToMine);
        };

        let (previous_proof, difficulty) = (template.previous_proof, template.difficulty);
        let proof = tokio::task::spawn_blocking(move || proof_of_work(previous_proof, difficulty))
            .await
            .map_err(|e| ChainError::Task(e.to_string()))?;

        let mut state = self.state.write().await;
        match state.ledger.commit_mined(&template, proof) {
            Ok(block) => {
                info!(
                    node = %self.id,
                    index = block.index,
                    transactions = block.transactions.len(),
                    proof = block.proof,
                    "block.mined"
                );
                Ok(MineOutcome::Mined(block))
            }
            Err(ChainError::StaleTip) => {
                debug!(node = %self.id, index = template.index, "block.stale");
                Ok(MineOutcome::Stale)
            }
            Err(e) => Err(e),
        }
    }

    /// One consensus round. Peers are polled with the lock released.
    async fn consensus_round(&self) -> RoundOutcome {
        let (peers, difficulty) = {
            let state = self.state.read().await;
            (state.peers.peers(), state.ledger.difficulty())
        };
        if peers.is_empty() {
            return RoundOutcome::default();
        }

        let polls = self.resolver.poll_peers(&peers, difficulty).await;

        let mut state = self.state.write().await;
        let NodeState { ledger, peers: tracker, .. } = &mut *state;
        apply_round(ledger, tracker, polls, peers.len())
    }

    /// Periodic miner body. Skipped (`None`) while the node is stopped.
    pub async fn miner_tick(&self) -> Result<Option<MineOutcome>> {
        if self.state.read().await.faults.is_stopped() {
            return Ok(None);
        }
        self.mine_round().await.map(Some)
    }

    /// Periodic consensus body. Skipped (`None`) while the node is stopped.
    pub async fn consensus_tick(&self) -> Result<Option<RoundOutcome>> {
        if self.state.read().await.faults.is_stopped() {
            return Ok(None);
        }
        Ok(Some(self.consensus_round().await))
    }

    /// Spawn the miner and consensus ticks. A `None` or zero period leaves
    /// that activity off. Dropping or shutting down the handle stops both.
    pub fn start_background(&self, miner_every: Option<Duration>, consensus_every: Option<Duration>) -> BackgroundTasks {
        let miner_every = nonzero_period("miner", miner_every);
        let consensus_every = nonzero_period("consensus", consensus_every);
        let (shutdown, _) = watch::channel(false);
        let mut handles = Vec::new();

        if let Some(period) = miner_every {
            let node = self.clone();
            handles.push(spawn_periodic("miner", period, shutdown.subscribe(), move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.miner_tick().await {
                        warn!(node = %node.id, error = %e, "miner.tick_failed");
                    }
                }
            }));
        }

        if let Some(period) = consensus_every {
            let node = self.clone();
            handles.push(spawn_periodic("consensus", period, shutdown.subscribe(), move || {
                let node = node.clone();
                async move {
                    if let Err(e) = node.consensus_tick().await {
                        warn!(node = %node.id, error = %e, "consensus.tick_failed");
                    }
                }
            }));
        }

        BackgroundTasks { shutdown, handles }
    }

    /// Start the background ticks with the periods from `config`.
    pub fn start_background_from_config(&self, config: &Config) -> BackgroundTasks {
        self.start_background(config.miner.period(), config.consensus.period())
    }
}

/// Handle on the running periodic tasks.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every task and wait until each has left its loop. A tick in
    /// progress finishes first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background.join_failed");
            }
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

fn nonzero_period(name: &'static str, period: Option<Duration>) -> Option<Duration> {
    match period {
        Some(p) if p.is_zero() => {
            warn!(task = name, "background.zero_period_ignored");
            None
        }
        other => other,
    }
}

fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, tick: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first run happens one period in.
        interval.tick().await;
        debug!(task = name, period_ms = period.as_millis() as u64, "background.started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => tick().await,
            }
        }
        debug!(task = name, "background.stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::PeerError;
    use async_trait::async_trait;

    struct NoPeers;

    #[async_trait]
    impl PeerClient for NoPeers {
        async fn fetch_chain(&self, _peer: &str) -> std::result::Result<Vec<Block>, PeerError> {
            Err(PeerError::Transport("offline".to_string()))
        }
    }

    fn node(id: &str) -> Node {
        let resolver = ConsensusResolver::new(Arc::new(NoPeers), Duration::from_millis(100));
        Node::new(id, 2, resolver)
    }

    #[tokio::test]
    async fn test_submit_and_mine() {
        let node = node("n1");
        let id = node.submit_transaction("hello").await.unwrap();
        assert_eq!(node.list_pending().await.unwrap()[0].id, id);

        let outcome = node.mine_now().await.unwrap();
        let MineOutcome::Mined(block) = outcome else {
            panic!("expected a mined block, got {:?}", outcome);
        };
        assert_eq!(block.index, 2);
        assert!(node.list_pending().await.unwrap().is_empty());
        assert_eq!(node.mine_now().await.unwrap(), MineOutcome::NothingToMine);
    }

    #[tokio::test]
    async fn test_concurrent_mines_never_double_include() {
        let node = node("n1");
        for i in 0..3 {
            node.submit_transaction(format!("tx-{}", i)).await.unwrap();
        }
        let (a, b) = tokio::join!(node.mine_now(), node.mine_now());
        let mined = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|o| matches!(o, MineOutcome::Mined(_)))
            .count();
        assert!(mined >= 1);

        let chain = node.get_chain().await.unwrap();
        let included: usize = chain[1..].iter().map(|b| b.transactions.len()).sum();
        assert_eq!(included, 3);
        assert!(node.inspect(|s| s.ledger.is_valid(s.ledger.chain())).await);
    }

    #[tokio::test]
    async fn test_set_fault_mode_rejects_unknown() {
        let node = node("n1");
        assert!(matches!(
            node.set_fault_mode("CHAOS").await,
            Err(ChainError::InvalidFaultMode(_))
        ));
        assert_eq!(node.fault_mode().await, FaultMode::Normal);
    }

    #[tokio::test]
    async fn test_ticks_are_skipped_when_stopped() {
        let node = node("n1");
        node.submit_transaction("pending").await.unwrap();
        node.set_fault_mode("STOP").await.unwrap();

        assert_eq!(node.miner_tick().await.unwrap(), None);
        assert!(node.consensus_tick().await.unwrap().is_none());
        assert_eq!(node.inspect(|s| s.ledger.mempool().len()).await, 1);
    }

    #[tokio::test]
    async fn test_register_peers_merges_and_initializes() {
        let node = node("n1");
        let peers = node.register_peers(&["b:1", "a:1", " ", "b:1"]).await.unwrap();
        assert_eq!(peers, vec!["a:1", "b:1"]);

        let summary = node.list_peers().await.unwrap();
        assert_eq!(summary.len(), 2);
        assert!(summary.iter().all(|s| s.record.ok_count == 0 && s.record.fail_count == 0));
    }

    #[tokio::test]
    async fn test_consensus_with_unreachable_peers_keeps_chain() {
        let node = node("n1");
        node.register_peers(&["a:1", "b:1"]).await.unwrap();
        let report = node.run_consensus_once().await.unwrap();
        assert!(!report.outcome.replaced);
        assert_eq!(report.outcome.failed, 2);
        assert_eq!(report.chain.len(), 1);

        let summary = node.list_peers().await.unwrap();
        assert!(summary.iter().all(|s| s.record.fail_count == 1));
    }

    #[tokio::test]
    async fn test_zero_period_leaves_activity_off() {
        let node = node("n1");
        let tasks = node.start_background(Some(Duration::ZERO), Some(Duration::ZERO));
        assert!(tasks.is_empty());
        tasks.shutdown().await;

        let tasks = node.start_background(Some(Duration::ZERO), Some(Duration::from_secs(60)));
        assert_eq!(tasks.len(), 1);
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_background_miner_runs_and_stops() {
        let node = node("n1");
        node.submit_transaction("background").await.unwrap();
        let tasks = node.start_background(Some(Duration::from_millis(20)), None);
        assert_eq!(tasks.len(), 1);

        tokio::time::timeout(Duration::from_secs(10), async {
            while node.inspect(|s| s.ledger.len()).await < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background miner never produced a block");

        tokio::time::timeout(Duration::from_secs(5), tasks.shutdown())
            .await
            .expect("background tasks did not stop");

        node.submit_transaction("after shutdown").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(node.inspect(|s| s.ledger.len()).await, 2);
    }
}
