#![doc(html_root_url = "https://docs.rs/packet_tunnel/latest")]
//! Public API for the `packet_tunnel` library.
//!
//! This crate tunnels arbitrarily sized messages over bounded, lossy,
//! unordered datagram transports such as UDP. Outgoing messages are batched
//! into shared packets when small and split into numbered fragments when
//! large; incoming packets are reassembled per sending endpoint, and any
//! message that lost a fragment is dropped whole. There is no retransmission.
//!
//! The synchronous [`PacketTunnelEngine`] performs no I/O. The async
//! [`TunnelDriver`] pairs it with a [`DatagramTransport`] for hosts running
//! on tokio.

pub mod byte_order;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod message;
pub mod metrics;
pub mod transport;
pub mod wire;

pub use config::TunnelConfig;
pub use driver::TunnelDriver;
pub use engine::PacketTunnelEngine;
pub use error::{Result, TunnelError};
pub use fragment::{
    CompletedMessage,
    DiscardReason,
    FragmentError,
    FragmentHeader,
    FragmentIndex,
    FragmentSeries,
    FragmentStatus,
    FragmentationError,
    FrameError,
    MessageId,
    OutgoingAssembler,
    ReassemblyState,
    ReassemblyTable,
};
pub use message::Message;
pub use transport::{DatagramTransport, UdpTransport};
