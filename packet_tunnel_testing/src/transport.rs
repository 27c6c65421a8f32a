//! In-memory datagram transport for driving a
//! [`TunnelDriver`](packet_tunnel::TunnelDriver) without sockets.

use std::{fmt, io};

use async_trait::async_trait;
use packet_tunnel::DatagramTransport;
use tokio::sync::mpsc;

type Datagram = (Vec<u8>, &'static str);
type LossFn = Box<dyn FnMut(usize) -> bool + Send>;

/// One end of an in-memory datagram link.
///
/// Endpoints are identified by a static name. Sent packets are numbered
/// from zero; a loss function may drop any of them by number.
pub struct MemoryTransport {
    name: &'static str,
    outbox: mpsc::UnboundedSender<Datagram>,
    inbox: mpsc::UnboundedReceiver<Datagram>,
    loss: Option<LossFn>,
    sent: usize,
    short_writes: bool,
}

/// Create two connected transports named `a` and `b`.
#[must_use]
pub fn memory_pair(a: &'static str, b: &'static str) -> (MemoryTransport, MemoryTransport) {
    let (to_b, from_a) = mpsc::unbounded_channel();
    let (to_a, from_b) = mpsc::unbounded_channel();
    (
        MemoryTransport::new(a, to_b, from_b),
        MemoryTransport::new(b, to_a, from_a),
    )
}

impl MemoryTransport {
    fn new(
        name: &'static str,
        outbox: mpsc::UnboundedSender<Datagram>,
        inbox: mpsc::UnboundedReceiver<Datagram>,
    ) -> Self {
        Self {
            name,
            outbox,
            inbox,
            loss: None,
            sent: 0,
            short_writes: false,
        }
    }

    /// Drop every sent packet for which `loss` returns `true`.
    #[must_use]
    pub fn with_loss(mut self, loss: impl FnMut(usize) -> bool + Send + 'static) -> Self {
        self.loss = Some(Box::new(loss));
        self
    }

    /// Report one byte fewer than was written on every send.
    #[must_use]
    pub fn with_short_writes(mut self) -> Self {
        self.short_writes = true;
        self
    }

    /// Name this end is known by on the other end.
    #[must_use]
    pub fn name(&self) -> &'static str { self.name }

    /// Number of packets passed to `send`, dropped ones included.
    #[must_use]
    pub fn sent(&self) -> usize { self.sent }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .field("sent", &self.sent)
            .field("lossy", &self.loss.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatagramTransport for MemoryTransport {
    type Endpoint = &'static str;

    async fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        let number = self.sent;
        self.sent += 1;
        let dropped = self.loss.as_mut().is_some_and(|loss| loss(number));
        if !dropped {
            self.outbox
                .send((packet.to_vec(), self.name))
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        }
        if self.short_writes {
            Ok(packet.len().saturating_sub(1))
        } else {
            Ok(packet.len())
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, &'static str)> {
        let (packet, from) = self
            .inbox
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionAborted))?;
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok((len, from))
    }
}
