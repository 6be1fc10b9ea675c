use crate::crypto::sha256_hex;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{proof_of_work, valid_proof, DEFAULT_DIFFICULTY};
use crate::transaction::{Transaction, TxKind, GENESIS_TIMESTAMP};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::state::{Fingerprint, MiningTemplate};
use super::validation::{check_chain, validate_chain, ChainDefect};

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Seed proof of the genesis block. It is not derived by proof-of-work.
pub const GENESIS_PROOF: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Seal a block at the current time.
    pub fn seal(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Block {
            index,
            timestamp: chrono::Utc::now().timestamp(),
            transactions,
            proof,
            previous_hash: previous_hash.into(),
        }
    }

    /// The fixed first block. Nodes sharing an id convention produce
    /// byte-identical genesis blocks.
    pub fn genesis(node_id: &str) -> Self {
        Block {
            index: GENESIS_INDEX,
            timestamp: GENESIS_TIMESTAMP,
            transactions: vec![Transaction::root(node_id)],
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    /// Canonical JSON form: keys in lexicographic order, transactions in
    /// block order, each in its own canonical form.
    pub fn canonical_value(&self) -> Value {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(Transaction::canonical_value)
            .collect();
        json!({
            "index": self.index,
            "previous_hash": self.previous_hash,
            "proof": self.proof,
            "timestamp": self.timestamp,
            "transactions": transactions,
        })
    }

    /// Canonical encoding exchanged between peers and used as hash input.
    pub fn encode(&self) -> String {
        self.canonical_value().to_string()
    }

    pub fn decode(encoded: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(encoded)
    }

    /// Hex SHA-256 of the canonical encoding.
    pub fn hash(&self) -> String {
        sha256_hex(self.encode().as_bytes())
    }
}

/// Block history plus pending transactions for one node.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    mempool: Mempool,
    node_id: String,
    difficulty: usize,
}

impl Ledger {
    /// Create a ledger holding only the genesis block, at the default difficulty.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::with_difficulty(node_id, DEFAULT_DIFFICULTY)
    }

    pub fn with_difficulty(node_id: impl Into<String>, difficulty: usize) -> Self {
        let node_id = node_id.into();
        Ledger {
            chain: vec![Block::genesis(&node_id)],
            mempool: Mempool::new(),
            node_id,
            difficulty,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: the chain holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tip(&self) -> &Block {
        // The chain is seeded with genesis and only ever replaced by a
        // validated, longer chain, so it is never empty.
        &self.chain[self.chain.len() - 1]
    }

    /// Queue a new transaction originating from this node.
    pub fn add_transaction(
        &mut self,
        text: impl Into<String>,
        kind: TxKind,
        replaces: Option<String>,
    ) -> Result<Transaction, ChainError> {
        if kind == TxKind::Root {
            return Err(ChainError::InvalidTransaction(
                "ROOT transactions only exist in the genesis block".to_string(),
            ));
        }
        let tx = Transaction::new(text, kind, replaces, self.node_id.clone());
        tx.validate_kind_pairing()?;
        self.mempool.add_transaction(tx.clone());
        Ok(tx)
    }

    /// Look a transaction up in the mempool first, then in the chain.
    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        self.mempool.get_transaction(id).or_else(|| {
            self.chain
                .iter()
                .flat_map(|block| block.transactions.iter())
                .find(|tx| tx.id == id)
        })
    }

    /// Edit a pending transaction in place, or queue an UPDATE for a mined one.
    pub fn update_transaction(&mut self, id: &str, new_text: impl Into<String>) -> Result<Transaction, ChainError> {
        let new_text = new_text.into();
        if let Some(pending) = self.mempool.get_transaction_mut(id) {
            pending.text = new_text;
            return Ok(pending.clone());
        }
        if self.find_transaction(id).is_none() {
            return Err(ChainError::TransactionNotFound(id.to_string()));
        }
        self.add_transaction(new_text, TxKind::Update, Some(id.to_string()))
    }

    pub fn proof_of_work(&self, previous_proof: u64) -> u64 {
        proof_of_work(previous_proof, self.difficulty)
    }

    pub fn valid_proof(&self, previous_proof: u64, proof: u64) -> bool {
        valid_proof(previous_proof, proof, self.difficulty)
    }

    /// Snapshot the mempool and tip for a proof search. `None` when there is
    /// nothing to mine.
    pub fn prepare_mining(&self) -> Option<MiningTemplate> {
        if self.mempool.is_empty() {
            return None;
        }
        let tip = self.tip();
        Some(MiningTemplate {
            index: self.chain.len() as u64 + 1,
            previous_hash: tip.hash(),
            previous_proof: tip.proof,
            difficulty: self.difficulty,
            transactions: self.mempool.get_all_transactions(),
        })
    }

    /// Seal and append a block for `template` if the tip is unchanged.
    ///
    /// Only the snapshotted transactions leave the mempool, in their current
    /// form; anything queued after the snapshot waits for the next round.
    pub fn commit_mined(&mut self, template: &MiningTemplate, proof: u64) -> Result<Block, ChainError> {
        let tip_moved =
            self.chain.len() as u64 + 1 != template.index || self.tip().hash() != template.previous_hash;
        if tip_moved {
            return Err(ChainError::StaleTip);
        }
        if !valid_proof(template.previous_proof, proof, self.difficulty) {
            return Err(ChainError::InvalidProofOfWork);
        }

        let transactions = self.mempool.drain_ids(&template.transaction_ids());
        let block = Block::seal(template.index, transactions, proof, template.previous_hash.clone());
        self.chain.push(block.clone());
        Ok(block)
    }

    /// Mine the whole mempool into one block. `None` when the mempool is empty.
    pub fn mine(&mut self) -> Option<Block> {
        let template = self.prepare_mining()?;
        let proof = self.proof_of_work(template.previous_proof);
        self.commit_mined(&template, proof).ok()
    }

    pub fn is_valid(&self, candidate: &[Block]) -> bool {
        validate_chain(candidate, self.difficulty)
    }

    pub fn check(&self, candidate: &[Block]) -> Result<(), ChainDefect> {
        check_chain(candidate, self.difficulty)
    }

    /// Adopt `candidate` if it is strictly longer than the current chain and
    /// structurally valid. Pending transactions already contained in the
    /// adopted chain are dropped from the mempool.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        if let Err(defect) = self.check(&candidate) {
            debug!(length = candidate.len(), %defect, "chain.candidate_rejected");
            return false;
        }
        self.chain = candidate;

        let mined: std::collections::HashSet<String> = self
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter().map(|tx| tx.id.clone()))
            .collect();
        self.mempool.drain_ids(&mined);
        true
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            length: self.chain.len(),
            tip_hash: self.tip().hash(),
        }
    }

    /// Every mined transaction in chain order, followed by the mempool.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter().cloned())
            .chain(self.mempool.iter().cloned())
            .collect()
    }
}
