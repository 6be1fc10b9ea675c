//! Peer-to-peer transport used by consensus.
//!
//! Consensus only needs one remote call: fetch a peer's chain. It is
//! abstracted behind [`PeerClient`] so rounds can be driven against real HTTP
//! peers or in-process fakes.

use crate::blockchain::Block;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default per-peer timeout for a chain fetch.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer did not answer within {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("undecodable chain: {0}")]
    Decode(String),
    #[error("structurally invalid chain: {0}")]
    InvalidChain(String),
}

/// Body of `GET /chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        ChainResponse { chain, length }
    }
}

/// Fetches the chain a peer currently reports.
///
/// Implementations should not retry; the caller applies its own timeout and
/// treats any error as a failed poll.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;
}

/// [`PeerClient`] speaking the node's JSON HTTP API (`GET http://{peer}/chain`).
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Transport(e.to_string()))?;
        Ok(HttpPeerClient { client, timeout })
    }

    fn chain_url(peer: &str) -> String {
        if peer.starts_with("http://") || peer.starts_with("https://") {
            format!("{}/chain", peer.trim_end_matches('/'))
        } else {
            format!("http://{}/chain", peer)
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let response = self
            .client
            .get(Self::chain_url(peer))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PeerError::Timeout(self.timeout)
                } else {
                    PeerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status(status.as_u16()));
        }

        let body: ChainResponse = response
            .json()
            .await
            .map_err(|e| PeerError::Decode(e.to_string()))?;
        Ok(body.chain)
    }
}
