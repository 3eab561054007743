//! # comprehensive paxos tests
//!
//! why: verify the replication protocol end to end on in-process clusters
//! relations: tests paxos-core over LocalNetwork, with paxos-storage backends
//! what: quorum arithmetic, acceptor rules, mutation rounds, quorum reads, read-repair, crashes

use std::sync::Arc;

use paxos_core::{
    quorum_size, ClusterConfig, CrashAfter, CrashMode, FailureInjector, LocalNetwork, NoFaults,
    PaxosNode, Procedure, ProposalMessage, RandomFaults, Status, Transport, TransportError,
};
use paxos_storage::{FileStore, InMemoryStore};

const A: &str = "node-a";
const B: &str = "node-b";
const C: &str = "node-c";

fn peers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// builds one node per name, all wired through the same network
fn cluster_with(
    names: &[&str],
    network: Arc<LocalNetwork>,
    transport: Arc<dyn Transport>,
    injector_for: impl Fn(&str) -> FailureInjector,
) -> Vec<Arc<PaxosNode>> {
    names
        .iter()
        .map(|name| {
            let config = ClusterConfig::new(peers(names), *name).unwrap();
            let node = Arc::new(PaxosNode::with_parts(
                config,
                transport.clone(),
                Box::new(InMemoryStore::new()),
                injector_for(name),
            ));
            network.register(&node);
            node
        })
        .collect()
}

fn cluster(names: &[&str]) -> (Arc<LocalNetwork>, Vec<Arc<PaxosNode>>) {
    let network = LocalNetwork::new();
    let nodes = cluster_with(names, network.clone(), network.clone(), |_| {
        FailureInjector::disabled()
    });
    (network, nodes)
}

fn three_nodes() -> (Arc<LocalNetwork>, Vec<Arc<PaxosNode>>) {
    cluster(&[A, B, C])
}

// =============================================================================
// SECTION 1: QUORUM ARITHMETIC
// =============================================================================

mod quorum {
    use super::*;

    #[test]
    fn quorum_for_odd_cluster_sizes() {
        assert_eq!(quorum_size(1), 1);
        assert_eq!(quorum_size(3), 2);
        assert_eq!(quorum_size(5), 3);
        assert_eq!(quorum_size(7), 4);
    }

    #[test]
    fn quorum_for_even_cluster_sizes() {
        assert_eq!(quorum_size(2), 2);
        assert_eq!(quorum_size(4), 3);
    }

    #[test]
    fn cluster_config_reports_quorum() {
        let config = ClusterConfig::new(peers(&["1", "2", "3", "4", "5"]), "3").unwrap();
        assert_eq!(config.peer_count(), 5);
        assert_eq!(config.quorum_size(), 3);
    }
}

// =============================================================================
// SECTION 2: ACCEPTOR RULES THROUGH THE NODE
// =============================================================================

mod acceptor_rules {
    use super::*;

    #[test]
    fn stale_prepare_is_nacked_and_state_unchanged() {
        let (_network, nodes) = three_nodes();
        let node = &nodes[1];
        node.prepare(&ProposalMessage::put(1, 1).with_clock(5)).unwrap();
        let before = node.acceptor_state();

        let reply = node.prepare(&ProposalMessage::put(2, 2).with_clock(4)).unwrap();

        assert_eq!(reply.status, Status::Nack);
        assert_eq!(reply.logical_clock, 5);
        assert_eq!(node.acceptor_state(), before);
    }

    #[test]
    fn promise_clock_is_monotonic() {
        let (_network, nodes) = three_nodes();
        let node = &nodes[0];

        for clock in [3, 1, 7, 2, 7, 9, 4] {
            let _ = node.prepare(&ProposalMessage::put(0, 0).with_clock(clock)).unwrap();
        }

        assert_eq!(node.acceptor_state().highest_promised, Some(9));
    }

    #[test]
    fn accept_does_not_touch_value_store() {
        let (_network, nodes) = three_nodes();
        let node = &nodes[0];
        let proposal = ProposalMessage::put(5, 42).with_clock(1);
        node.prepare(&proposal).unwrap();

        let reply = node.accept(&proposal).unwrap();

        assert_eq!(reply.status, Status::Accept);
        assert_eq!(node.local_value(5), None);
    }

    #[test]
    fn stale_accept_is_nacked() {
        let (_network, nodes) = three_nodes();
        let node = &nodes[0];
        node.prepare(&ProposalMessage::put(5, 1).with_clock(10)).unwrap();

        let reply = node.accept(&ProposalMessage::put(5, 2).with_clock(9)).unwrap();

        assert_eq!(reply.status, Status::Nack);
        assert_eq!(reply.logical_clock, 10);
        assert_eq!(reply.value, 1);
    }
}

// =============================================================================
// SECTION 3: MUTATION PATH
// =============================================================================

mod mutation {
    use super::*;

    #[test]
    fn put_replicates_to_every_node() {
        let (_network, nodes) = three_nodes();

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Ok);
        assert_eq!((reply.key, reply.value), (5, 42));
        for node in &nodes {
            assert_eq!(node.local_value(5), Some(42));
        }
    }

    #[test]
    fn later_put_overwrites() {
        let (_network, nodes) = three_nodes();

        nodes[0].put(5, 1).unwrap();
        nodes[2].put(5, 2).unwrap();

        for node in &nodes {
            assert_eq!(node.local_value(5), Some(2));
        }
    }

    #[test]
    fn delete_removes_everywhere() {
        let (_network, nodes) = three_nodes();
        nodes[0].put(5, 42).unwrap();

        let reply = nodes[1].delete(5).unwrap();

        assert_eq!(reply.status, Status::Ok);
        for node in &nodes {
            assert_eq!(node.local_value(5), None);
        }
    }

    #[test]
    fn delete_of_missing_key_is_nack() {
        let (_network, nodes) = three_nodes();
        let reply = nodes[0].delete(77).unwrap();
        assert_eq!(reply.status, Status::Nack);
    }

    #[test]
    fn each_round_ticks_the_clock() {
        let (_network, nodes) = three_nodes();

        nodes[0].put(1, 1).unwrap();
        nodes[0].put(2, 2).unwrap();
        nodes[0].get(1).unwrap();

        assert_eq!(nodes[0].clock(), 3);
    }

    #[test]
    fn promise_quorum_failure_leaves_stores_untouched() {
        let (network, nodes) = three_nodes();
        network.take_offline(B);
        network.take_offline(C);

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Nack);
        for node in &nodes {
            assert_eq!(node.local_value(5), None);
        }
    }

    #[test]
    fn higher_promise_elsewhere_fails_round_and_raises_clock() {
        let (_network, nodes) = three_nodes();
        for node in &nodes[1..] {
            node.prepare(&ProposalMessage::put(9, 9).with_clock(100)).unwrap();
        }

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Nack);
        assert_eq!(nodes[0].clock(), 100);
        assert_eq!(nodes[0].local_value(5), None);

        // the next round starts above the observed clock and wins
        let retry = nodes[0].put(5, 42).unwrap();
        assert_eq!(retry.status, Status::Ok);
        assert_eq!(retry.logical_clock, 101);
        assert_eq!(nodes[2].local_value(5), Some(42));
    }

    #[test]
    fn sequential_rounds_from_different_nodes_use_distinct_clocks() {
        let (_network, nodes) = three_nodes();

        let first = nodes[0].put(5, 42).unwrap();
        let second = nodes[1].put(5, 99).unwrap();

        assert_eq!((first.status, second.status), (Status::Ok, Status::Ok));
        assert!(second.logical_clock > first.logical_clock);
        assert_eq!(nodes[1].acceptor_state().highest_promised, Some(first.logical_clock));
        for node in &nodes {
            assert_eq!(node.local_value(5), Some(99));
        }
    }

    #[test]
    fn inbound_consensus_calls_raise_the_clock() {
        let (_network, nodes) = three_nodes();

        nodes[1].prepare(&ProposalMessage::put(1, 1).with_clock(7)).unwrap();
        nodes[2].learn(&ProposalMessage::get(1).with_clock(12)).unwrap();

        assert_eq!(nodes[1].clock(), 7);
        assert_eq!(nodes[2].clock(), 12);
        assert_eq!(nodes[1].put(1, 2).unwrap().logical_clock, 8);
    }

    /// delivers each prepare, then lets a rival proposal with the same clock
    /// reach the same acceptor before the proposer's accept does
    struct RivalPrepare {
        network: Arc<LocalNetwork>,
    }

    impl Transport for RivalPrepare {
        fn call(
            &self,
            peer: &str,
            procedure: Procedure,
            message: &ProposalMessage,
        ) -> Result<ProposalMessage, TransportError> {
            let reply = self.network.call(peer, procedure, message)?;
            if procedure == Procedure::Prepare {
                let rival = ProposalMessage::put(message.key, message.value + 1)
                    .with_clock(message.logical_clock);
                for target in [B, C] {
                    self.network.call(target, Procedure::Prepare, &rival)?;
                }
            }
            Ok(reply)
        }
    }

    #[test]
    fn accept_with_conflicting_content_does_not_count() {
        let network = LocalNetwork::new();
        let interleaving: Arc<dyn Transport> = Arc::new(RivalPrepare {
            network: network.clone(),
        });
        let nodes = cluster_with(&[A, B, C], network.clone(), interleaving, |_| {
            FailureInjector::disabled()
        });

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Nack);
        for node in &nodes {
            assert_eq!(node.local_value(5), None);
        }
        assert_eq!(nodes[1].acceptor_state().highest_proposal.map(|p| p.value), Some(43));
    }
}

// =============================================================================
// SECTION 4: READ PATH
// =============================================================================

mod read_path {
    use super::*;

    #[test]
    fn read_your_write_from_every_node() {
        let (_network, nodes) = three_nodes();
        nodes[1].put(5, 42).unwrap();

        for node in &nodes {
            let reply = node.get(5).unwrap();
            assert_eq!(reply.status, Status::Ok);
            assert_eq!(reply.value, 42);
        }
    }

    #[test]
    fn get_of_unknown_key_is_nack() {
        let (_network, nodes) = three_nodes();
        let reply = nodes[0].get(5).unwrap();
        assert_eq!(reply.status, Status::Nack);
    }

    #[test]
    fn divergent_values_have_no_quorum() {
        let (_network, nodes) = three_nodes();
        for (value, node) in nodes.iter().enumerate() {
            node.learn(&ProposalMessage::put(5, value as i32)).unwrap();
        }

        let reply = nodes[0].get(5).unwrap();

        assert_eq!(reply.status, Status::Nack);
        assert_eq!(nodes[0].local_value(5), Some(0));
    }

    #[test]
    fn stale_local_value_is_repaired() {
        let (_network, nodes) = three_nodes();
        nodes[0].learn(&ProposalMessage::put(5, 7)).unwrap();
        nodes[1].learn(&ProposalMessage::put(5, 7)).unwrap();
        nodes[2].learn(&ProposalMessage::put(5, 1)).unwrap();

        let reply = nodes[2].get(5).unwrap();

        assert_eq!((reply.status, reply.value), (Status::Ok, 7));
        assert_eq!(nodes[2].local_value(5), Some(7));
    }

    #[test]
    fn missing_local_value_is_repaired() {
        let (_network, nodes) = three_nodes();
        nodes[0].learn(&ProposalMessage::put(5, 7)).unwrap();
        nodes[1].learn(&ProposalMessage::put(5, 7)).unwrap();

        nodes[2].get(5).unwrap();

        assert_eq!(nodes[2].local_value(5), Some(7));
    }

    #[test]
    fn read_path_never_prepares() {
        let (_network, nodes) = three_nodes();
        nodes[0].put(5, 42).unwrap();
        let before: Vec<_> = nodes.iter().map(|n| n.acceptor_state()).collect();

        nodes[2].get(5).unwrap();

        let after: Vec<_> = nodes.iter().map(|n| n.acceptor_state()).collect();
        assert_eq!(before, after);
    }
}

// =============================================================================
// SECTION 5: FAULT INJECTION
// =============================================================================

mod faults {
    use super::*;

    #[test]
    fn minority_crash_mid_round_still_commits() {
        let network = LocalNetwork::new();
        let nodes = cluster_with(&[A, B, C], network.clone(), network.clone(), |name| {
            if name == B {
                FailureInjector::new(CrashAfter::new(1), CrashMode::StopResponding)
            } else {
                FailureInjector::new(NoFaults, CrashMode::StopResponding)
            }
        });

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Ok);
        assert!(nodes[1].is_crashed());
        assert_eq!(nodes[0].local_value(5), Some(42));
        assert_eq!(nodes[2].local_value(5), Some(42));
        assert_eq!(nodes[1].local_value(5), None);
    }

    #[test]
    fn majority_crash_fails_round() {
        let network = LocalNetwork::new();
        let nodes = cluster_with(&[A, B, C], network.clone(), network.clone(), |name| {
            if name == A {
                FailureInjector::disabled()
            } else {
                FailureInjector::new(RandomFaults::seeded(100, 1), CrashMode::StopResponding)
            }
        });

        let reply = nodes[0].put(5, 42).unwrap();

        assert_eq!(reply.status, Status::Nack);
        assert!(nodes[1].is_crashed() && nodes[2].is_crashed());
        assert_eq!(nodes[0].local_value(5), None);
    }

    #[test]
    fn crashed_node_rejects_client_calls() {
        let network = LocalNetwork::new();
        let nodes = cluster_with(&[A, B, C], network.clone(), network.clone(), |name| {
            if name == C {
                FailureInjector::new(CrashAfter::new(1), CrashMode::StopResponding)
            } else {
                FailureInjector::disabled()
            }
        });
        nodes[2].learn(&ProposalMessage::put(1, 1)).unwrap_err();

        assert!(nodes[2].get(1).is_err());
        assert!(nodes[2].put(1, 2).is_err());
    }
}

// =============================================================================
// SECTION 6: END-TO-END SCENARIOS
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn three_nodes_no_failures() {
        let (_network, nodes) = three_nodes();

        assert_eq!(nodes[0].put(5, 42).unwrap().status, Status::Ok);

        for node in &nodes {
            let reply = node.get(5).unwrap();
            assert_eq!((reply.status, reply.value), (Status::Ok, 42));
        }
    }

    #[test]
    fn offline_node_catches_up_through_read_repair() {
        let (network, nodes) = three_nodes();
        network.take_offline(C);

        assert_eq!(nodes[0].put(5, 42).unwrap().status, Status::Ok);
        assert_eq!(nodes[2].local_value(5), None);

        network.bring_online(C);
        let reply = nodes[2].get(5).unwrap();

        assert_eq!((reply.status, reply.value), (Status::Ok, 42));
        assert_eq!(nodes[2].local_value(5), Some(42));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (_network, nodes) = three_nodes();
        nodes[0].put(5, 42).unwrap();

        assert_eq!(nodes[1].delete(5).unwrap().status, Status::Ok);

        for node in &nodes[..2] {
            assert_eq!(node.get(5).unwrap().status, Status::Nack);
        }
    }

    #[test]
    fn five_nodes_survive_two_offline() {
        let names = ["n1", "n2", "n3", "n4", "n5"];
        let (network, nodes) = cluster(&names);
        network.take_offline("n2");
        network.take_offline("n4");

        assert_eq!(nodes[0].put(1, 11).unwrap().status, Status::Ok);

        let reply = nodes[4].get(1).unwrap();
        assert_eq!((reply.status, reply.value), (Status::Ok, 11));
    }

    #[test]
    fn concurrent_clients_on_different_keys() {
        let (_network, nodes) = three_nodes();

        let handles: Vec<_> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let node = node.clone();
                std::thread::spawn(move || {
                    for round in 0..20 {
                        let key = (i as i32) * 100 + round;
                        let _ = node.put(key, round);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // whatever committed reads back the same from any node
        for key in [0, 100, 200] {
            let first = nodes[0].get(key).unwrap();
            if first.status == Status::Ok {
                assert_eq!(nodes[1].get(key).unwrap().value, first.value);
            }
        }
    }

    #[test]
    fn file_backed_node_keeps_learned_values() {
        let dir = tempfile::tempdir().unwrap();
        let network = LocalNetwork::new();
        let config = ClusterConfig::new(peers(&[A]), A).unwrap();
        let node = Arc::new(PaxosNode::with_parts(
            config,
            network.clone(),
            Box::new(FileStore::open(dir.path()).unwrap()),
            FailureInjector::disabled(),
        ));
        network.register(&node);

        node.put(3, 33).unwrap();
        drop(node);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(paxos_storage::ValueStore::get(&reopened, 3).unwrap(), 33);
    }
}
