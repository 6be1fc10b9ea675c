//! Ledger transactions: the record types and their kind checks.

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;

    #[test]
    fn test_new_transactions_get_unique_ids() {
        let a = Transaction::new("hello", TxKind::Tx, None, "node-a");
        let b = Transaction::new("hello", TxKind::Tx, None, "node-a");
        assert_ne!(a.id, b.id);
        assert_eq!(a.origin, "node-a");
        assert!(a.timestamp > GENESIS_TIMESTAMP);
    }

    #[test]
    fn test_root_transaction_is_fixed() {
        let root = Transaction::root("node-a");
        assert_eq!(root.id, ROOT_TX_ID);
        assert_eq!(root.kind, TxKind::Root);
        assert_eq!(root.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(root, Transaction::root("node-a"));
    }

    #[test]
    fn test_serde_uses_wire_field_names() {
        let tx = Transaction::new("payload", TxKind::Update, Some("abc".to_string()), "node-b");
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "UPDATE");
        assert_eq!(value["origin_node"], "node-b");
        assert_eq!(value["replaces"], "abc");
        assert_eq!(value, tx.canonical_value());

        let decoded: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_missing_replaces_decodes_as_none() {
        let decoded: Transaction = serde_json::from_str(
            r#"{"id":"x","type":"TX","text":"t","timestamp":5,"origin_node":"n"}"#,
        )
        .unwrap();
        assert_eq!(decoded.replaces, None);
        assert_eq!(decoded.timestamp, 5);
    }

    #[test]
    fn test_kind_pairing() {
        let ok = Transaction::new("t", TxKind::Tx, None, "n");
        assert!(ok.validate_kind_pairing().is_ok());

        let update = Transaction::new("t", TxKind::Update, Some("orig".to_string()), "n");
        assert!(update.validate_kind_pairing().is_ok());

        let dangling = Transaction::new("t", TxKind::Update, None, "n");
        assert!(matches!(
            dangling.validate_kind_pairing(),
            Err(ChainError::InvalidTransaction(_))
        ));

        let stray = Transaction::new("t", TxKind::Tx, Some("orig".to_string()), "n");
        assert!(stray.validate_kind_pairing().is_err());
    }
}
