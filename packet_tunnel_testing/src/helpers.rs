//! Helpers for moving packets between engines in tests.

use std::{fmt::Debug, hash::Hash};

use bytes::Bytes;
use packet_tunnel::{CompletedMessage, PacketTunnelEngine};

/// Collect every packet `engine` currently has to send.
///
/// # Panics
///
/// Panics if the engine fails to allocate a packet.
pub fn drain_packets<E>(engine: &mut PacketTunnelEngine<E>) -> Vec<Bytes>
where
    E: Clone + Debug + Eq + Hash,
{
    let mut packets = Vec::new();
    while let Some(packet) = engine
        .produce_next_packet()
        .expect("packet production failed")
    {
        packets.push(packet);
    }
    packets
}

/// Feed `packets`, in order, to `engine` as if they came from `from`.
///
/// # Panics
///
/// Panics if the engine fails to allocate a message buffer.
pub fn feed_packets<E, P>(
    engine: &mut PacketTunnelEngine<E>,
    packets: &[P],
    from: E,
) -> Vec<CompletedMessage<E>>
where
    E: Clone + Debug + Eq + Hash,
    P: AsRef<[u8]>,
{
    packets
        .iter()
        .flat_map(|packet| {
            engine
                .on_packet_received(packet.as_ref(), from.clone())
                .expect("packet processing failed")
        })
        .collect()
}

/// Drain `sender` and feed its packets to `receiver`, returning the
/// delivered payloads.
pub fn deliver<E>(
    sender: &mut PacketTunnelEngine<E>,
    receiver: &mut PacketTunnelEngine<E>,
    from: E,
) -> Vec<Bytes>
where
    E: Clone + Debug + Eq + Hash,
{
    let packets = drain_packets(sender);
    feed_packets(receiver, &packets, from)
        .into_iter()
        .map(CompletedMessage::into_payload)
        .collect()
}
