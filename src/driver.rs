//! Async pump moving packets between a [`PacketTunnelEngine`] and a
//! [`DatagramTransport`].

use bytes::Bytes;
use log::warn;

use crate::{
    config::TunnelConfig,
    engine::PacketTunnelEngine,
    error::{Result, TunnelError},
    fragment::CompletedMessage,
    message::Message,
    transport::DatagramTransport,
    wire::RETAINED_BUFFER_LIMIT,
};

/// Owns an engine and the transport its packets travel over.
#[derive(Debug)]
pub struct TunnelDriver<T: DatagramTransport> {
    engine: PacketTunnelEngine<T::Endpoint>,
    transport: T,
    outbound: Vec<u8>,
    inbound: Vec<u8>,
}

impl<T: DatagramTransport> TunnelDriver<T> {
    /// Create a driver with a fresh engine configured by `config`.
    #[must_use]
    pub fn new(config: TunnelConfig, transport: T) -> Self {
        Self::with_engine(PacketTunnelEngine::new(config), transport)
    }

    /// Create a driver around an existing engine.
    #[must_use]
    pub fn with_engine(engine: PacketTunnelEngine<T::Endpoint>, transport: T) -> Self {
        Self {
            engine,
            transport,
            outbound: Vec::new(),
            inbound: Vec::new(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &PacketTunnelEngine<T::Endpoint> { &self.engine }

    pub fn engine_mut(&mut self) -> &mut PacketTunnelEngine<T::Endpoint> { &mut self.engine }

    #[must_use]
    pub fn transport(&self) -> &T { &self.transport }

    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Consume the driver, returning the engine and the transport.
    #[must_use]
    pub fn into_parts(self) -> (PacketTunnelEngine<T::Endpoint>, T) { (self.engine, self.transport) }

    /// Queue a flat message; call [`Self::flush`] to transmit it.
    ///
    /// # Errors
    ///
    /// See [`PacketTunnelEngine::enqueue_outgoing`].
    pub fn enqueue(&mut self, message: impl Into<Bytes>) -> Result<()> {
        self.engine.enqueue_outgoing(message)
    }

    /// Flatten and queue a typed message; call [`Self::flush`] to transmit it.
    ///
    /// # Errors
    ///
    /// See [`PacketTunnelEngine::enqueue_message`].
    pub fn enqueue_message<M: Message>(&mut self, message: &M) -> Result<()> {
        self.engine.enqueue_message(message)
    }

    /// Queue `message` and transmit every pending packet.
    ///
    /// # Errors
    ///
    /// See [`Self::enqueue`] and [`Self::flush`].
    pub async fn send_message(&mut self, message: impl Into<Bytes>) -> Result<usize> {
        self.enqueue(message)?;
        self.flush().await
    }

    /// Transmit every pending packet, returning the number of bytes written.
    ///
    /// A packet the transport fails to send is lost, like any other dropped
    /// datagram; the error is returned and the rest stay queued.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Io`] when the transport fails and
    /// [`TunnelError::Allocation`] when the packet buffer cannot grow.
    pub async fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        while self.engine.produce_next_packet_into(&mut self.outbound)? {
            let sent = self.transport.send(&self.outbound).await?;
            if sent != self.outbound.len() {
                warn!("short write ({sent}/{} bytes)", self.outbound.len());
            }
            written += sent;
        }
        release_if_oversized(&mut self.outbound, self.engine.maximum_transfer_unit());
        Ok(written)
    }

    /// Wait for one datagram and return the messages it completed.
    ///
    /// The receive buffer is one maximum transfer unit long, so datagrams
    /// from peers using a larger unit arrive truncated and are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Io`] when the transport fails and
    /// [`TunnelError::Allocation`] when a buffer cannot grow.
    pub async fn receive(&mut self) -> Result<Vec<CompletedMessage<T::Endpoint>>> {
        let mtu = self.engine.maximum_transfer_unit();
        release_if_oversized(&mut self.inbound, mtu);
        if self.inbound.len() != mtu {
            self.inbound
                .try_reserve_exact(mtu.saturating_sub(self.inbound.len()))
                .map_err(|err| TunnelError::allocation("receive buffer", mtu, err))?;
            self.inbound.resize(mtu, 0);
        }

        let (len, from) = self.transport.receive(&mut self.inbound).await?;
        let packet = self.inbound.get(..len).unwrap_or_default();
        self.engine.on_packet_received(packet, from)
    }
}

/// Free `buffer` once it is past the retention threshold and larger than one
/// transfer unit, which every packet fits in.
fn release_if_oversized(buffer: &mut Vec<u8>, mtu: usize) {
    if buffer.capacity() > RETAINED_BUFFER_LIMIT.max(mtu) {
        *buffer = Vec::new();
    }
}
