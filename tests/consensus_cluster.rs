//! Multi-node consensus scenarios over an in-process network.

mod common;

use common::{chain_len, grow, LocalNetwork};
use tallychain::consensus::Decision;

#[tokio::test]
async fn test_follower_adopts_longer_chain() {
    let net = LocalNetwork::new();
    let a = net.spawn("a");
    let b = net.spawn("b");
    grow(&a, 3).await;

    b.register_peers(&["a"]).await.unwrap();
    let report = b.run_consensus_once().await.unwrap();

    assert!(report.outcome.replaced);
    assert_eq!(report.outcome.adopted_from.as_deref(), Some("a"));
    assert_eq!(report.chain, a.get_chain().await.unwrap());
    assert_eq!(chain_len(&b).await, 4);
}

#[tokio::test]
async fn test_equal_length_chain_is_not_adopted() {
    let net = LocalNetwork::new();
    let a = net.spawn("a");
    let b = net.spawn("b");
    grow(&a, 2).await;
    grow(&b, 2).await;
    let before = b.get_chain().await.unwrap();

    b.register_peers(&["a"]).await.unwrap();
    let report = b.run_consensus_once().await.unwrap();

    assert!(!report.outcome.replaced);
    assert_eq!(b.get_chain().await.unwrap(), before);
}

#[tokio::test]
async fn test_majority_beats_longer_minority_chain() {
    let net = LocalNetwork::new();
    let leader = net.spawn("leader");
    let f1 = net.spawn("f1");
    let f2 = net.spawn("f2");
    let outlier = net.spawn("outlier");
    let observer = net.spawn("observer");

    grow(&leader, 2).await;
    for follower in [&f1, &f2] {
        follower.register_peers(&["leader"]).await.unwrap();
        assert!(follower.run_consensus_once().await.unwrap().outcome.replaced);
    }
    grow(&outlier, 4).await;

    observer.register_peers(&["f1", "f2", "outlier"]).await.unwrap();
    let report = observer.run_consensus_once().await.unwrap();

    assert!(report.outcome.replaced);
    assert_eq!(report.outcome.decision, Some(Decision::Majority { votes: 2 }));
    assert_eq!(report.outcome.adopted_from.as_deref(), Some("f1"));
    assert_eq!(report.chain, leader.get_chain().await.unwrap());
}

#[tokio::test]
async fn test_byzantine_peer_is_rejected_and_penalized() {
    let net = LocalNetwork::new();
    let liar = net.spawn("liar");
    let honest = net.spawn("honest");
    let observer = net.spawn("observer");

    grow(&liar, 5).await;
    grow(&honest, 2).await;
    liar.set_fault_mode("BYZANTINE").await.unwrap();

    observer.register_peers(&["liar", "honest"]).await.unwrap();
    let report = observer.run_consensus_once().await.unwrap();

    assert_eq!(report.outcome.failed, 1);
    assert_eq!(report.outcome.adopted_from.as_deref(), Some("honest"));
    assert_eq!(chain_len(&observer).await, 3);

    let peers = observer.list_peers().await.unwrap();
    let liar_record = peers.iter().find(|p| p.peer == "liar").unwrap().record;
    let honest_record = peers.iter().find(|p| p.peer == "honest").unwrap().record;
    assert_eq!((liar_record.ok_count, liar_record.fail_count), (0, 1));
    assert_eq!((honest_record.ok_count, honest_record.fail_count), (1, 0));

    // The liar's own chain is untouched.
    assert_eq!(chain_len(&liar).await, 6);
    assert!(liar.inspect(|s| s.ledger.is_valid(s.ledger.chain())).await);
}

#[tokio::test]
async fn test_stopped_peer_counts_as_failure() {
    let net = LocalNetwork::new();
    let down = net.spawn("down");
    let observer = net.spawn("observer");
    grow(&down, 3).await;
    down.set_fault_mode("STOP").await.unwrap();

    observer.register_peers(&["down", "missing"]).await.unwrap();
    let report = observer.run_consensus_once().await.unwrap();

    assert!(!report.outcome.replaced);
    assert_eq!(report.outcome.failed, 2);
    assert_eq!(chain_len(&observer).await, 1);

    // Recovery makes the peer useful again.
    down.set_fault_mode("NORMAL").await.unwrap();
    let report = observer.run_consensus_once().await.unwrap();
    assert!(report.outcome.replaced);
    assert_eq!(chain_len(&observer).await, 4);
}

#[tokio::test]
async fn test_adoption_keeps_local_pending_entries() {
    let net = LocalNetwork::new();
    let a = net.spawn("a");
    let b = net.spawn("b");
    grow(&a, 1).await;
    let local_only = b.submit_transaction("only on b").await.unwrap();

    b.register_peers(&["a"]).await.unwrap();
    assert!(b.run_consensus_once().await.unwrap().outcome.replaced);

    let pending = b.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, local_only);
}
