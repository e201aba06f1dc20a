//! Several nodes on one simulated bus.
//!
//! Every test is deterministic: the bus faults come from a seeded generator
//! or are scripted, and time only moves when the network steps.

use std::sync::Arc;

use bytes::Bytes;
use canlink_core::{Outbox, ResponseCallback, ResponseMessage};
use canlink_harness::{ComponentTable, FaultConfig, SimNetwork};
use canlink_proto::Header;
use parking_lot::Mutex;
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Callback that records every response payload it sees.
fn recorder() -> (Arc<Mutex<Vec<Bytes>>>, ResponseCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback = ResponseCallback::new(move |message: &ResponseMessage<'_>, _: &mut Outbox| {
        sink.lock().push(message.payload.clone());
    });
    (seen, callback)
}

/// Node 0 hosts component 1, node 1 hosts component 2 which echoes stream 7.
fn two_nodes(network: &mut SimNetwork) {
    network.add_node(ComponentTable::new().with_component(1));
    network.add_node(ComponentTable::new().echo(2, 7));
}

fn deliveries(network: &SimNetwork, node: usize) -> usize {
    network.node(node).unwrap().postman().deliveries().len()
}

#[test]
fn remote_call_with_callback() {
    init_tracing();
    let mut network = SimNetwork::new(1);
    two_nodes(&mut network);

    let (seen, callback) = recorder();
    network
        .node_mut(0)
        .unwrap()
        .post_action_call_with_callback(Header::request(1, 2, 7), Bytes::from_static(b"ping"), callback)
        .unwrap();

    assert!(network.run_until(50, SimNetwork::is_idle));
    assert_eq!(*seen.lock(), vec![Bytes::from_static(b"ping")]);
    assert_eq!(deliveries(&network, 1), 1);
    assert_eq!(network.bus().stats().dropped, 0);
}

#[test]
fn fragmented_payloads_both_ways() {
    init_tracing();
    let mut network = SimNetwork::new(2);
    two_nodes(&mut network);

    let payload = Bytes::from((0..48).collect::<Vec<u8>>());
    let (seen, callback) = recorder();
    network
        .node_mut(0)
        .unwrap()
        .post_action_call_with_callback(Header::request(1, 2, 7), payload.clone(), callback)
        .unwrap();

    assert!(network.run_until(100, SimNetwork::is_idle));
    assert_eq!(*seen.lock(), vec![payload.clone()]);

    let delivered = &network.node(1).unwrap().postman().deliveries()[0];
    assert_eq!(delivered.payload, payload);
}

#[test]
fn lost_call_is_retransmitted() {
    init_tracing();
    let mut network = SimNetwork::new(3);
    two_nodes(&mut network);

    let (seen, callback) = recorder();
    network
        .node_mut(0)
        .unwrap()
        .post_action_call_with_callback(Header::request(1, 2, 7), Bytes::from_static(b"x"), callback)
        .unwrap();
    network.bus().drop_next(1);

    network.run(100);
    assert!(seen.lock().is_empty(), "no retry before the timeout");
    assert_eq!(deliveries(&network, 1), 0);

    assert!(network.run_until(50, SimNetwork::is_idle));
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(deliveries(&network, 1), 1);
    assert_eq!(network.bus().stats().dropped, 1);
}

#[test]
fn retransmission_across_tick_wrap() {
    init_tracing();
    let mut network = SimNetwork::new(4);
    two_nodes(&mut network);
    network.env().advance(u32::MAX - 30);

    network.node_mut(0).unwrap().post_action_call(Header::request(1, 2, 9), Bytes::new()).unwrap();
    network.bus().drop_next(1);

    assert!(network.run_until(200, SimNetwork::is_idle));
    assert_eq!(deliveries(&network, 1), 1);
}

#[test]
fn lost_ack_repeated_without_redelivery() {
    init_tracing();
    let mut network = SimNetwork::new(5);
    two_nodes(&mut network);
    network.node_mut(0).unwrap().post_action_call(Header::request(1, 2, 9), Bytes::new()).unwrap();

    // Node 0 sends the call, then the acknowledgment from node 1 is lost.
    network.node_mut(0).unwrap().update();
    network.bus().drop_next(1);
    network.node_mut(1).unwrap().update();
    network.env().advance(1);

    assert!(network.run_until(200, SimNetwork::is_idle));
    assert_eq!(deliveries(&network, 1), 1);
    // One acknowledgment per copy of the call.
    assert_eq!(network.node(1).unwrap().connector().stats().frames_sent, 2);
}

#[test]
fn response_closes_call_whose_ack_was_lost() {
    init_tracing();
    let mut network = SimNetwork::new(6);
    two_nodes(&mut network);

    let (seen, callback) = recorder();
    network
        .node_mut(0)
        .unwrap()
        .post_action_call_with_callback(Header::request(1, 2, 7), Bytes::new(), callback)
        .unwrap();

    network.node_mut(0).unwrap().update();
    network.bus().drop_next(1);
    network.node_mut(1).unwrap().update();
    network.env().advance(1);

    assert!(network.run_until(20, SimNetwork::is_idle));
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(deliveries(&network, 1), 1);
}

#[test]
fn events_reach_every_node() {
    init_tracing();
    let mut network = SimNetwork::new(7);
    for address in 1..=3 {
        network.add_node(ComponentTable::new().with_component(address));
    }

    network.node_mut(0).unwrap().post_event(Header::event(1, 5), Bytes::from_static(b"boot")).unwrap();
    assert!(network.run_until(10, SimNetwork::is_idle));

    for node in 0..3 {
        let events: Vec<_> = network.node(node).unwrap().postman().events().cloned().collect();
        assert_eq!(events.len(), 1, "node {node}");
        assert_eq!(events[0].payload, Bytes::from_static(b"boot"));
    }
    // Events are never acknowledged.
    assert_eq!(network.bus().stats().sent, 1);
}

#[test]
fn unanswered_calls_abandoned_without_receiver() {
    init_tracing();
    let mut network = SimNetwork::new(8);
    network.add_node(ComponentTable::new().with_component(1));
    network.add_node(ComponentTable::new().with_component(3));

    network.node_mut(0).unwrap().post_action_call(Header::request(1, 2, 9), Bytes::new()).unwrap();

    network.run(500);
    assert_eq!(network.node(0).unwrap().pending(), 0);
    // First send plus three retransmissions.
    assert_eq!(network.bus().stats().sent, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn call_and_callback_run_at_most_once_under_faults(
        seed in any::<u64>(),
        len in 0usize..=48,
    ) {
        let faults = FaultConfig { drop_rate: 0.1, duplicate_rate: 0.1 };
        let mut network = SimNetwork::with_faults(seed, faults);
        two_nodes(&mut network);

        let payload = Bytes::from(vec![0xA5; len]);
        let (seen, callback) = recorder();
        network
            .node_mut(0)
            .unwrap()
            .post_action_call_with_callback(Header::request(1, 2, 7), payload.clone(), callback)
            .unwrap();

        network.run(1_000);

        prop_assert!(deliveries(&network, 1) <= 1);
        let seen = seen.lock();
        prop_assert!(seen.len() <= 1);
        if let Some(response) = seen.first() {
            prop_assert_eq!(response, &payload);
        }
    }
}
