//! Property tests for round-trip delivery, loss and reordering.

use packet_tunnel::{PacketTunnelEngine, TunnelConfig};
use packet_tunnel_testing::{drain_packets, feed_packets};
use proptest::{
    collection::vec,
    prelude::{Strategy, any},
    prop_assert,
    prop_assert_eq,
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner},
};

const MTU: usize = 128;

fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn engine() -> PacketTunnelEngine<u8> {
    PacketTunnelEngine::new(TunnelConfig::default().with_max_transfer_unit(MTU))
}

fn message(max_len: usize) -> impl Strategy<Value = Vec<u8>> { vec(any::<u8>(), 0..=max_len) }

/// A message spanning at least two packets, plus a packet index to tamper
/// with.
fn fragmented_message() -> impl Strategy<Value = (Vec<u8>, usize)> {
    vec(any::<u8>(), MTU..=10 * MTU).prop_flat_map(|payload| {
        let max_index = payload.len().div_ceil(MTU - 20) - 1;
        (proptest::strategy::Just(payload), 0..=max_index)
    })
}

#[test]
fn any_message_round_trips() {
    deterministic_runner(128)
        .run(&message(10 * MTU), |payload| {
            let mut sender = engine();
            let mut receiver = engine();
            sender.enqueue_outgoing(payload.clone()).expect("enqueue");

            let packets = drain_packets(&mut sender);
            prop_assert!(packets.iter().all(|packet| packet.len() <= MTU));

            let delivered = feed_packets(&mut receiver, &packets, 1);
            prop_assert_eq!(delivered.len(), 1);
            prop_assert_eq!(delivered[0].payload(), payload.as_slice());
            prop_assert_eq!(receiver.tracked_endpoints(), 0);
            Ok(())
        })
        .expect("round trip property failed");
}

#[test]
fn batched_messages_round_trip_in_order() {
    deterministic_runner(64)
        .run(&vec(message(3 * MTU), 1..12), |payloads| {
            let mut sender = engine();
            let mut receiver = engine();
            for payload in &payloads {
                sender.enqueue_outgoing(payload.clone()).expect("enqueue");
            }

            let packets = drain_packets(&mut sender);
            let delivered: Vec<Vec<u8>> = feed_packets(&mut receiver, &packets, 1)
                .into_iter()
                .map(|message| message.payload().to_vec())
                .collect();
            prop_assert_eq!(delivered, payloads);
            Ok(())
        })
        .expect("batching property failed");
}

#[test]
fn losing_any_fragment_loses_the_whole_message() {
    deterministic_runner(128)
        .run(&fragmented_message(), |(payload, lost)| {
            let mut sender = engine();
            let mut receiver = engine();
            sender.enqueue_outgoing(payload).expect("enqueue");

            let mut packets = drain_packets(&mut sender);
            prop_assert!(packets.len() > lost);
            packets.remove(lost);

            prop_assert!(feed_packets(&mut receiver, &packets, 1).is_empty());
            Ok(())
        })
        .expect("loss property failed");
}

#[test]
fn reordered_fragments_never_complete() {
    deterministic_runner(128)
        .run(&fragmented_message(), |(payload, moved)| {
            let mut sender = engine();
            let mut receiver = engine();
            sender.enqueue_outgoing(payload).expect("enqueue");

            let mut packets = drain_packets(&mut sender);
            // Rotate so the chosen packet arrives first; every packet still
            // arrives exactly once.
            let last = packets.len() - 1;
            let target = if moved == 0 { last } else { moved };
            let packet = packets.remove(target);
            packets.insert(0, packet);

            prop_assert!(feed_packets(&mut receiver, &packets, 1).is_empty());
            Ok(())
        })
        .expect("reordering property failed");
}

#[test]
fn loss_in_one_message_spares_the_next() {
    deterministic_runner(64)
        .run(&(fragmented_message(), message(2 * MTU)), |((first, lost), second)| {
            let mut sender = engine();
            let mut receiver = engine();
            sender.enqueue_outgoing(first).expect("enqueue");
            let mut packets = drain_packets(&mut sender);
            packets.remove(lost);
            sender.enqueue_outgoing(second.clone()).expect("enqueue");
            packets.extend(drain_packets(&mut sender));

            let delivered = feed_packets(&mut receiver, &packets, 1);
            prop_assert_eq!(delivered.len(), 1);
            prop_assert_eq!(delivered[0].payload(), second.as_slice());
            Ok(())
        })
        .expect("isolation property failed");
}
