/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::{Transaction, TxKind};

impl Transaction {
    /// Check that `replaces` is present exactly when the kind is UPDATE.
    ///
    /// This is the only check performed when a transaction enters the
    /// mempool; ledger-wide consistency is enforced by the chain validator.
    pub fn validate_kind_pairing(&self) -> Result<(), ChainError> {
        match (self.kind, &self.replaces) {
            (TxKind::Update, None) => Err(ChainError::InvalidTransaction(
                "UPDATE transaction must reference the transaction it replaces".to_string(),
            )),
            (TxKind::Update, Some(target)) if target.is_empty() => Err(
                ChainError::InvalidTransaction("UPDATE transaction has an empty replaces id".to_string()),
            ),
            (TxKind::Tx | TxKind::Root, Some(_)) => Err(ChainError::InvalidTransaction(format!(
                "{} transaction cannot carry a replaces reference",
                self.kind
            ))),
            _ => Ok(()),
        }
    }
}
