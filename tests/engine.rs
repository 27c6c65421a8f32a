//! End-to-end tests for `PacketTunnelEngine` batching, fragmentation and
//! inbound filtering.

use bytes::Bytes;
use packet_tunnel::{
    FragmentHeader,
    FragmentIndex,
    MessageId,
    PacketTunnelEngine,
    TunnelConfig,
    wire::{DEFAULT_MAGIC, HEADER_SIZE},
};
use packet_tunnel_testing::{deliver, drain_packets, feed_packets};
use rstest::{fixture, rstest};

type Engine = PacketTunnelEngine<&'static str>;

const PEER: &str = "peer";

fn engine(mtu: usize) -> Engine {
    PacketTunnelEngine::new(TunnelConfig::default().with_max_transfer_unit(mtu))
}

#[fixture]
fn small_mtu() -> (Engine, Engine) { (engine(64), engine(64)) }

#[rstest]
fn hundred_byte_message_round_trips_in_three_packets(small_mtu: (Engine, Engine)) {
    let (mut sender, mut receiver) = small_mtu;
    let payload: Vec<u8> = (0..100).collect();
    sender.enqueue_outgoing(payload.clone()).expect("enqueue");

    let packets = drain_packets(&mut sender);
    assert_eq!(
        packets.iter().map(Bytes::len).collect::<Vec<_>>(),
        vec![64, 64, HEADER_SIZE + 12]
    );

    let delivered = feed_packets(&mut receiver, &packets, PEER);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), payload.as_slice());
    assert_eq!(delivered[0].source(), &PEER);
    assert_eq!(receiver.tracked_endpoints(), 0);
}

#[rstest]
fn small_messages_are_batched(small_mtu: (Engine, Engine)) {
    let (mut sender, mut receiver) = small_mtu;
    sender.enqueue_outgoing(vec![1_u8; 5]).expect("enqueue");
    sender.enqueue_outgoing(vec![2_u8; 8]).expect("enqueue");
    assert_eq!(sender.pending_messages(), 2);

    let packets = drain_packets(&mut sender);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), 53);

    let delivered = feed_packets(&mut receiver, &packets, PEER);
    let payloads: Vec<&[u8]> = delivered.iter().map(|m| m.payload()).collect();
    assert_eq!(payloads, vec![&[1_u8; 5][..], &[2_u8; 8][..]]);
}

#[test]
fn two_ten_byte_messages_share_a_default_sized_packet() {
    let mut sender = engine(1400);
    sender.enqueue_outgoing(vec![0_u8; 10]).expect("enqueue");
    sender.enqueue_outgoing(vec![1_u8; 10]).expect("enqueue");

    assert_eq!(drain_packets(&mut sender).len(), 1);
}

#[rstest]
#[case::exact_budget(0, 1)]
#[case::one_byte_over(1, 2)]
fn budget_boundary(#[case] extra: usize, #[case] expected_packets: usize) {
    let mut sender = engine(1400);
    let mut receiver = engine(1400);
    let payload = vec![0xAB_u8; 1400 - HEADER_SIZE + extra];
    sender.enqueue_outgoing(payload.clone()).expect("enqueue");

    let packets = drain_packets(&mut sender);
    assert_eq!(packets.len(), expected_packets);
    assert!(packets.iter().all(|p| p.len() <= 1400));

    let delivered = feed_packets(&mut receiver, &packets, PEER);
    assert_eq!(delivered[0].payload(), payload.as_slice());
}

#[test]
fn empty_message_is_a_header_only_packet() {
    let mut sender = engine(64);
    let mut receiver = engine(64);
    sender.enqueue_outgoing(Bytes::new()).expect("enqueue");

    let packets = drain_packets(&mut sender);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), HEADER_SIZE);

    let delivered = feed_packets(&mut receiver, &packets, PEER);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].payload().is_empty());
}

#[test]
fn tiny_transfer_unit_is_clamped() {
    let mut sender = engine(0);
    assert_eq!(sender.maximum_transfer_unit(), HEADER_SIZE + 1);
    sender.set_maximum_transfer_unit(5);
    assert_eq!(sender.maximum_transfer_unit(), HEADER_SIZE + 1);

    let mut receiver = engine(0);
    sender.enqueue_outgoing(&b"abc"[..]).expect("enqueue");
    let packets = drain_packets(&mut sender);
    assert_eq!(packets.len(), 3);
    assert_eq!(feed_packets(&mut receiver, &packets, PEER)[0].payload(), b"abc");
}

#[test]
fn excluded_packets_are_dropped() {
    let tagged = |id| Engine::new(TunnelConfig::default().with_source_exclusion_id(id));
    let mut sender = tagged(7);
    let mut receiver = tagged(7);
    let mut other = tagged(8);

    sender.enqueue_outgoing(&b"loopback"[..]).expect("enqueue");
    let packets = drain_packets(&mut sender);

    assert!(feed_packets(&mut receiver, &packets, PEER).is_empty());
    assert_eq!(feed_packets(&mut other, &packets, PEER).len(), 1);
}

#[test]
fn zero_exclusion_id_never_filters() {
    let mut sender = engine(1400);
    let mut receiver = engine(1400);
    sender.enqueue_outgoing(&b"hi"[..]).expect("enqueue");

    assert_eq!(
        deliver(&mut sender, &mut receiver, PEER),
        vec![Bytes::from_static(b"hi")]
    );
}

#[rstest]
#[case::short(vec![1, 2, 3])]
#[case::foreign_magic(vec![0xEE; 32])]
fn non_tunnel_data_is_dropped_by_default(#[case] packet: Vec<u8>) {
    let mut receiver = engine(1400);

    let delivered = receiver.on_packet_received(&packet, PEER).expect("receive");

    assert!(delivered.is_empty());
}

#[rstest]
#[case::short(vec![1, 2, 3])]
#[case::foreign_magic(vec![0xEE; 32])]
fn non_tunnel_data_passes_through_when_allowed(#[case] packet: Vec<u8>) {
    let mut receiver = engine(1400);
    receiver.set_allow_misc_incoming_data(true);

    let delivered = receiver.on_packet_received(&packet, PEER).expect("receive");

    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].is_raw());
    assert_eq!(delivered[0].payload(), packet.as_slice());
}

#[rstest]
#[case::misc_data_allowed(true)]
#[case::misc_data_refused(false)]
fn empty_datagrams_are_ignored(#[case] allow_misc: bool) {
    let mut receiver = engine(1400);
    receiver.set_allow_misc_incoming_data(allow_misc);

    let delivered = receiver.on_packet_received(&[], PEER).expect("receive");

    assert!(delivered.is_empty());
}

#[test]
fn tunnel_data_is_still_decoded_when_misc_data_is_allowed() {
    let mut sender = engine(1400);
    let mut receiver = engine(1400);
    receiver.set_allow_misc_incoming_data(true);
    sender.enqueue_outgoing(&b"framed"[..]).expect("enqueue");

    let delivered = feed_packets(&mut receiver, &drain_packets(&mut sender), PEER);

    assert!(!delivered[0].is_raw());
    assert_eq!(delivered[0].payload(), b"framed");
}

#[test]
fn mismatched_magic_is_dropped() {
    let mut sender = Engine::new(TunnelConfig::default().with_magic(1));
    let mut receiver = Engine::new(TunnelConfig::default().with_magic(2));
    sender.enqueue_outgoing(&b"x"[..]).expect("enqueue");

    assert!(deliver(&mut sender, &mut receiver, PEER).is_empty());
}

#[test]
fn truncated_chunk_keeps_earlier_messages() {
    let mut sender = engine(1400);
    let mut receiver = engine(1400);
    sender.enqueue_outgoing(&b"first"[..]).expect("enqueue");
    sender.enqueue_outgoing(&b"second"[..]).expect("enqueue");
    let packet = drain_packets(&mut sender).remove(0);

    let cut = &packet[..packet.len() - 2];
    let delivered = receiver.on_packet_received(cut, PEER).expect("receive");

    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), b"first");
}

#[test]
fn interleaved_endpoints_reassemble_independently() {
    let mut alice = engine(64);
    let mut bob = engine(64);
    let mut receiver = engine(64);
    alice.enqueue_outgoing(vec![b'a'; 120]).expect("enqueue");
    bob.enqueue_outgoing(vec![b'b'; 90]).expect("enqueue");
    let from_alice = drain_packets(&mut alice);
    let from_bob = drain_packets(&mut bob);

    let mut delivered = Vec::new();
    for index in 0..from_alice.len().max(from_bob.len()) {
        if let Some(packet) = from_alice.get(index) {
            delivered.extend(receiver.on_packet_received(packet, "alice").expect("receive"));
        }
        if let Some(packet) = from_bob.get(index) {
            delivered.extend(receiver.on_packet_received(packet, "bob").expect("receive"));
        }
    }

    assert_eq!(delivered.len(), 2);
    let bob_message = delivered.iter().find(|m| m.source() == &"bob").expect("bob");
    let alice_message = delivered.iter().find(|m| m.source() == &"alice").expect("alice");
    assert_eq!(bob_message.payload(), &[b'b'; 90][..]);
    assert_eq!(alice_message.payload(), &[b'a'; 120][..]);
}

#[test]
fn partial_state_is_visible_and_discardable() {
    let mut sender = engine(64);
    let mut receiver = engine(64);
    sender.enqueue_outgoing(vec![0_u8; 100]).expect("enqueue");
    let packets = drain_packets(&mut sender);

    assert!(feed_packets(&mut receiver, &packets[..1], PEER).is_empty());
    let state = receiver.reassembly_state(&PEER).expect("state");
    assert_eq!(state.next_expected_fragment_index(), FragmentIndex::new(1));
    assert_eq!(state.accumulated_len(), 44);

    assert!(receiver.discard_endpoint(&PEER));
    assert!(feed_packets(&mut receiver, &packets[1..], PEER).is_empty());
}

#[test]
fn incoming_size_cap_drops_large_messages() {
    let mut sender = engine(64);
    let mut receiver = engine(64);
    receiver.set_max_incoming_message_size(50);
    sender.enqueue_outgoing(vec![0_u8; 100]).expect("enqueue");
    sender.enqueue_outgoing(vec![1_u8; 50]).expect("enqueue");

    let delivered = deliver(&mut sender, &mut receiver, PEER);

    assert_eq!(delivered, vec![Bytes::from(vec![1_u8; 50])]);
}

#[test]
fn hand_built_packet_is_accepted() {
    let mut receiver = engine(1400);
    let header = FragmentHeader::new(DEFAULT_MAGIC, MessageId::new(99))
        .with_fragment(FragmentIndex::zero(), 1)
        .with_payload_len(3);
    let mut packet = header.encode().to_vec();
    packet.extend_from_slice(b"abc");

    let delivered = receiver.on_packet_received(&packet, PEER).expect("receive");

    assert_eq!(delivered[0].message_id(), Some(MessageId::new(99)));
    assert_eq!(delivered[0].payload(), b"abc");
}
