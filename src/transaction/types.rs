/// Transaction types for TallyChain
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Fixed id of the single ROOT transaction sealed into every genesis block.
pub const ROOT_TX_ID: &str = "root";

/// Payload of the ROOT transaction.
pub const ROOT_TX_TEXT: &str = "ROOT: network initialized";

/// Timestamp shared by the ROOT transaction and the genesis block so that
/// independently booted nodes agree on genesis content (2023-01-01T00:00:00Z).
pub const GENESIS_TIMESTAMP: i64 = 1_672_531_200;

/// What a transaction does to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    /// Plain entry.
    Tx,
    /// Supersedes the text of an already mined transaction.
    Update,
    /// Genesis marker; exactly one exists network-wide.
    Root,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Tx => "TX",
            TxKind::Update => "UPDATE",
            TxKind::Root => "ROOT",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry. Field names on the wire follow the node's JSON API
/// (`type`, `origin_node`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub replaces: Option<String>,
    #[serde(rename = "origin_node")]
    pub origin: String,
}

impl Transaction {
    /// Create a transaction with a fresh unique id stamped with the current time.
    pub fn new(
        text: impl Into<String>,
        kind: TxKind,
        replaces: Option<String>,
        origin: impl Into<String>,
    ) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp(),
            replaces,
            origin: origin.into(),
        }
    }

    /// The genesis ROOT transaction. Its id and timestamp are fixed.
    pub fn root(origin: impl Into<String>) -> Self {
        Transaction {
            id: ROOT_TX_ID.to_string(),
            kind: TxKind::Root,
            text: ROOT_TX_TEXT.to_string(),
            timestamp: GENESIS_TIMESTAMP,
            replaces: None,
            origin: origin.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == TxKind::Root
    }

    /// Canonical JSON form used as hash input. Keys are written in
    /// lexicographic order.
    pub fn canonical_value(&self) -> Value {
        json!({
            "id": self.id,
            "origin_node": self.origin,
            "replaces": self.replaces,
            "text": self.text,
            "timestamp": self.timestamp,
            "type": self.kind.as_str(),
        })
    }
}
