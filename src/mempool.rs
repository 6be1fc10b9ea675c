//! Pending transactions, kept in insertion order.

use crate::transaction::Transaction;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    pub fn get_transaction_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|tx| tx.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_transaction(id).is_some()
    }

    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Remove every transaction whose id is in `ids` and return the removed
    /// entries in mempool order. Everything else stays queued.
    pub fn drain_ids(&mut self, ids: &HashSet<String>) -> Vec<Transaction> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transactions)
            .into_iter()
            .partition(|tx| ids.contains(&tx.id));
        self.transactions = kept;
        taken
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
