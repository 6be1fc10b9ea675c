//! Configuration management for TallyChain

use crate::error::ChainError;
use crate::miner::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::network::DEFAULT_PEER_TIMEOUT;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default config file looked up by [`load_config`].
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variable holding extra comma-separated peers.
pub const PEERS_ENV: &str = "PEERS";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_id")]
    pub id: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_miner_interval")]
    pub interval_secs: u64,
    /// Leading zero hex digits a proof hash must have.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_consensus_interval")]
    pub interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            api_port: default_api_port(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            peer_timeout_ms: default_peer_timeout_ms(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_miner_interval(),
            difficulty: default_difficulty(),
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_consensus_interval(),
        }
    }
}

impl NetworkConfig {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

impl MinerConfig {
    /// Tick period, or `None` when the background miner is disabled.
    pub fn period(&self) -> Option<Duration> {
        self.enabled.then(|| Duration::from_secs(self.interval_secs))
    }
}

impl ConsensusConfig {
    pub fn period(&self) -> Option<Duration> {
        self.enabled.then(|| Duration::from_secs(self.interval_secs))
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge peers from a comma-separated list, skipping blanks and duplicates.
    pub fn merge_peers(&mut self, list: &str) {
        for peer in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if !self.network.peers.iter().any(|known| known == peer) {
                self.network.peers.push(peer.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.node.id.trim().is_empty() {
            return Err(ChainError::Config("node.id must not be empty".to_string()));
        }
        if self.miner.difficulty == 0 || self.miner.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "miner.difficulty must be between 1 and {}",
                MAX_DIFFICULTY
            )));
        }
        if self.network.peer_timeout_ms == 0 {
            return Err(ChainError::Config("network.peer_timeout_ms must be positive".to_string()));
        }
        if self.miner.enabled && self.miner.interval_secs == 0 {
            return Err(ChainError::Config("miner.interval_secs must be positive".to_string()));
        }
        if self.consensus.enabled && self.consensus.interval_secs == 0 {
            return Err(ChainError::Config("consensus.interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Load configuration from `path` (or `config.toml`), falling back to
/// defaults when the file is absent, then merge peers from `$PEERS`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ChainError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let mut config = if path.exists() {
        Config::from_toml_str(&fs::read_to_string(path)?)?
    } else {
        // Provide sane defaults when the config file is absent
        Config::default()
    };

    if let Ok(peers) = std::env::var(PEERS_ENV) {
        config.merge_peers(&peers);
    }

    config.validate()?;
    Ok(config)
}

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_peer_timeout_ms() -> u64 {
    DEFAULT_PEER_TIMEOUT.as_millis() as u64
}

fn default_enabled() -> bool {
    true
}

fn default_miner_interval() -> u64 {
    10
}

fn default_consensus_interval() -> u64 {
    30
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node.api_port, 5000);
        assert_eq!(config.miner.difficulty, 4);
        assert_eq!(config.miner.period(), Some(Duration::from_secs(10)));
        assert_eq!(config.consensus.period(), Some(Duration::from_secs(30)));
        assert_eq!(config.network.peer_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [node]
            id = "node-b"

            [network]
            peers = ["127.0.0.1:5000", "127.0.0.1:5002"]

            [consensus]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.node.id, "node-b");
        assert_eq!(config.node.api_port, 5000);
        assert_eq!(config.network.peers.len(), 2);
        assert_eq!(config.consensus.period(), None);
        assert_eq!(config.miner.interval_secs, 10);
    }

    #[test]
    fn test_rejects_bad_difficulty() {
        let err = Config::from_toml_str("[miner]\ndifficulty = 0\n").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
        assert!(Config::from_toml_str("[miner]\ndifficulty = 65\n").is_err());
    }

    #[test]
    fn test_merge_peers_skips_blanks_and_duplicates() {
        let mut config = Config::default();
        config.network.peers.push("a:1".to_string());
        config.merge_peers(" a:1 , b:2,, c:3 ");
        assert_eq!(config.network.peers, vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[node]\nid = \"file-node\"\napi_port = 5007").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.node.id, "file-node");
        assert_eq!(config.node.api_port, 5007);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.node.id, "node-1");
    }
}
