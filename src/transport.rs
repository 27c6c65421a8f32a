//! Datagram transport boundary consumed by [`TunnelDriver`](crate::TunnelDriver).
//!
//! The engine never touches sockets. Anything that can send and receive
//! whole datagrams, and name the sender of each one, can carry the tunnel.

use std::{fmt::Debug, hash::Hash, io, net::SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Abstraction over a bounded, unordered, lossy datagram channel.
///
/// Implementations must be cancellation-safe: dropping a pending
/// `receive()` future must not lose a datagram that was already read.
#[async_trait]
pub trait DatagramTransport: Send {
    /// Identity of a remote sender.
    type Endpoint: Clone + Debug + Eq + Hash + Send;

    /// Transmit one datagram, returning the number of bytes written.
    async fn send(&mut self, packet: &[u8]) -> io::Result<usize>;

    /// Wait for one datagram, copying it into `buf`.
    ///
    /// Returns the number of bytes stored and the sender. Datagrams longer
    /// than `buf` are truncated.
    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, Self::Endpoint)>;
}

/// UDP socket sending every packet to one fixed destination.
///
/// The destination may be a unicast peer or a broadcast address; in the
/// latter case the socket must have broadcast enabled by its owner.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpTransport {
    /// Wrap an already bound socket.
    #[must_use]
    pub fn new(socket: UdpSocket, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }

    /// Address packets are sent to.
    #[must_use]
    pub fn destination(&self) -> SocketAddr { self.destination }

    /// Local address of the wrapped socket.
    ///
    /// # Errors
    ///
    /// Propagates the socket's error.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.socket.local_addr() }

    /// Unwrap the socket.
    #[must_use]
    pub fn into_inner(self) -> UdpSocket { self.socket }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    type Endpoint = SocketAddr;

    async fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send_to(packet, self.destination).await
    }

    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
