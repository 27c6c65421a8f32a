//! Metric helpers for `packet_tunnel`.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled every helper compiles to a no-op.

use crate::fragment::DiscardReason;

/// Name of the counter tracking packets produced or received.
pub const PACKETS_TOTAL: &str = "packet_tunnel_packets_total";
/// Name of the counter tracking whole messages queued or delivered.
pub const MESSAGES_TOTAL: &str = "packet_tunnel_messages_total";
/// Name of the counter tracking dropped incoming data, labelled by reason.
pub const DISCARDS_TOTAL: &str = "packet_tunnel_discards_total";
/// Name of the counter tracking outgoing messages dropped before sending.
pub const OUTGOING_DROPPED_TOTAL: &str = "packet_tunnel_outgoing_dropped_total";

/// Direction of packet or message flow.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Received from a remote endpoint.
    Inbound,
    /// Sent towards the transport.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "used only by metrics"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a packet for the given direction.
pub fn inc_packets(direction: Direction) {
    #[cfg(feature = "metrics")]
    metrics::counter!(PACKETS_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a message for the given direction.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    metrics::counter!(MESSAGES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a discarded chunk or packet.
pub fn inc_discards(reason: DiscardReason) {
    #[cfg(feature = "metrics")]
    metrics::counter!(DISCARDS_TOTAL, "reason" => reason.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record an outgoing message dropped before any of it was sent.
pub fn inc_outgoing_dropped() {
    #[cfg(feature = "metrics")]
    metrics::counter!(OUTGOING_DROPPED_TOTAL).increment(1);
}
