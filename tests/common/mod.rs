//! In-process cluster used by the integration tests.
//!
//! Peers are addressed by node id and answer `fetch_chain` by calling the
//! target node's `get_chain` directly, so fault modes apply exactly as they
//! would over HTTP.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tallychain::blockchain::Block;
use tallychain::consensus::ConsensusResolver;
use tallychain::error::ChainError;
use tallychain::network::{PeerClient, PeerError};
use tallychain::node::Node;

pub const DIFFICULTY: usize = 2;

#[derive(Clone, Default)]
pub struct LocalNetwork {
    nodes: Arc<Mutex<HashMap<String, Node>>>,
}

#[async_trait]
impl PeerClient for LocalNetwork {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let target = self.nodes.lock().unwrap().get(peer).cloned();
        let Some(node) = target else {
            return Err(PeerError::Transport(format!("no route to {}", peer)));
        };
        match node.get_chain().await {
            Ok(chain) => Ok(chain),
            Err(ChainError::Unavailable) => Err(PeerError::Status(503)),
            Err(e) => Err(PeerError::Transport(e.to_string())),
        }
    }
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node attached to this network.
    pub fn spawn(&self, id: &str) -> Node {
        let resolver = ConsensusResolver::new(Arc::new(self.clone()), Duration::from_millis(500));
        let node = Node::new(id, DIFFICULTY, resolver);
        self.nodes.lock().unwrap().insert(id.to_string(), node.clone());
        node
    }
}

/// Submit `count` transactions and mine each into its own block.
pub async fn grow(node: &Node, count: usize) {
    for i in 0..count {
        node.submit_transaction(format!("{}-entry-{}", node.id(), i))
            .await
            .unwrap();
        node.mine_now().await.unwrap();
    }
}

pub async fn chain_len(node: &Node) -> usize {
    node.inspect(|s| s.ledger.len()).await
}
