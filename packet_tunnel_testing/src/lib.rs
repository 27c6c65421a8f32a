//! Utilities for exercising a
//! [`PacketTunnelEngine`](packet_tunnel::PacketTunnelEngine) in tests.
//!
//! The helpers move packets between engines without any sockets, optionally
//! dropping or reordering them, and provide an in-memory datagram transport
//! for driving a [`TunnelDriver`](packet_tunnel::TunnelDriver).
//!
//! ```rust
//! use packet_tunnel::PacketTunnelEngine;
//! use packet_tunnel_testing::{drain_packets, feed_packets};
//!
//! let mut sender: PacketTunnelEngine<&str> = PacketTunnelEngine::default();
//! let mut receiver: PacketTunnelEngine<&str> = PacketTunnelEngine::default();
//! sender.enqueue_outgoing(&b"hello"[..]).unwrap();
//!
//! let packets = drain_packets(&mut sender);
//! let messages = feed_packets(&mut receiver, &packets, "peer");
//! assert_eq!(messages[0].payload(), b"hello");
//! ```

pub mod helpers;
pub mod logging;
pub mod transport;

pub use helpers::{deliver, drain_packets, feed_packets};
pub use logging::{LoggerHandle, logger};
pub use transport::{MemoryTransport, memory_pair};
