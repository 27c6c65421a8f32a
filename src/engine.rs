//! The packet tunnel engine.
//!
//! [`PacketTunnelEngine`] combines the outbound
//! [`OutgoingAssembler`](crate::fragment::OutgoingAssembler) and the inbound
//! [`ReassemblyTable`](crate::fragment::ReassemblyTable) behind one
//! synchronous, I/O-free API. A host event loop feeds it messages and raw
//! packets and moves the packets it produces onto a datagram transport.
//!
//! The engine mutates internal buffers on every call; hosts sharing one
//! engine between threads must serialise access themselves.

use std::{fmt::Debug, hash::Hash, net::SocketAddr};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    config::TunnelConfig,
    error::{Result, TunnelError},
    fragment::{
        CompletedMessage,
        DiscardReason,
        FragmentHeader,
        HeaderStamp,
        OutgoingAssembler,
        ReassemblyState,
        ReassemblyTable,
        reassembler::record_discard,
    },
    message::Message,
    metrics::{self, Direction},
    wire::HEADER_SIZE,
};

/// Fragmenting, batching and reassembling engine for one local socket.
///
/// `E` identifies remote endpoints; it defaults to [`SocketAddr`].
///
/// # Examples
///
/// ```
/// use std::net::SocketAddr;
///
/// use packet_tunnel::{PacketTunnelEngine, TunnelConfig};
///
/// let mut sender: PacketTunnelEngine = PacketTunnelEngine::new(
///     TunnelConfig::default().with_max_transfer_unit(64),
/// );
/// let mut receiver: PacketTunnelEngine = PacketTunnelEngine::new(
///     TunnelConfig::default().with_max_transfer_unit(64),
/// );
/// let from: SocketAddr = "192.0.2.1:9999".parse().expect("address");
///
/// sender.enqueue_outgoing(vec![7_u8; 100]).expect("enqueue");
/// let mut delivered = Vec::new();
/// while let Some(packet) = sender.produce_next_packet().expect("produce") {
///     delivered.extend(receiver.on_packet_received(&packet, from).expect("receive"));
/// }
/// assert_eq!(delivered.len(), 1);
/// assert_eq!(delivered[0].payload(), &[7_u8; 100][..]);
/// ```
#[derive(Debug)]
pub struct PacketTunnelEngine<E = SocketAddr> {
    config: TunnelConfig,
    assembler: OutgoingAssembler,
    table: ReassemblyTable<E>,
}

impl<E> Default for PacketTunnelEngine<E> {
    fn default() -> Self {
        Self {
            config: TunnelConfig::default(),
            assembler: OutgoingAssembler::new(),
            table: ReassemblyTable::default(),
        }
    }
}

impl<E> PacketTunnelEngine<E>
where
    E: Clone + Debug + Eq + Hash,
{
    /// Create an engine using `config`.
    #[must_use]
    pub fn new(config: TunnelConfig) -> Self {
        Self {
            config,
            assembler: OutgoingAssembler::new(),
            table: ReassemblyTable::new(config.max_incoming_message_size()),
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &TunnelConfig { &self.config }

    /// Set the largest packet the engine emits.
    ///
    /// Values below `HEADER_SIZE + 1` are raised to it. A message already
    /// being fragmented keeps the transfer unit it started with.
    pub fn set_maximum_transfer_unit(&mut self, mtu: usize) {
        self.config = self.config.with_max_transfer_unit(mtu);
    }

    /// Largest packet the engine emits.
    #[must_use]
    pub const fn maximum_transfer_unit(&self) -> usize { self.config.max_transfer_unit() }

    /// Set the largest message the engine will reassemble.
    pub fn set_max_incoming_message_size(&mut self, size: usize) {
        self.config = self.config.with_max_incoming_message_size(size);
        self.table.set_max_message_size(size);
    }

    /// Largest message the engine will reassemble.
    #[must_use]
    pub const fn max_incoming_message_size(&self) -> usize {
        self.config.max_incoming_message_size()
    }

    /// Deliver non-tunnel packets as raw messages instead of dropping them.
    pub fn set_allow_misc_incoming_data(&mut self, allow: bool) {
        self.config = self.config.with_allow_misc_incoming_data(allow);
    }

    /// Whether non-tunnel packets are delivered as raw messages.
    #[must_use]
    pub const fn allow_misc_incoming_data(&self) -> bool {
        self.config.allow_misc_incoming_data()
    }

    /// Tag outgoing chunks with `id` and ignore incoming chunks carrying it.
    /// Zero disables the filter.
    pub fn set_source_exclusion_id(&mut self, id: u32) {
        self.config = self.config.with_source_exclusion_id(id);
    }

    /// Current source exclusion id.
    #[must_use]
    pub const fn source_exclusion_id(&self) -> u32 { self.config.source_exclusion_id() }

    /// Queue a flat message for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Fragmentation`] when the message needs more
    /// fragments than the header can number at the current transfer unit.
    pub fn enqueue_outgoing(&mut self, message: impl Into<Bytes>) -> Result<()> {
        self.assembler
            .enqueue(message.into(), self.config.max_transfer_unit())?;
        metrics::inc_messages(Direction::Outbound);
        Ok(())
    }

    /// Flatten and queue a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Encode`] when serialisation fails, or the
    /// errors of [`Self::enqueue_outgoing`].
    pub fn enqueue_message<M: Message>(&mut self, message: &M) -> Result<()> {
        let bytes = message.to_bytes()?;
        self.enqueue_outgoing(bytes)
    }

    /// Report whether any queued or partially sent message remains.
    #[must_use]
    pub fn has_pending_output(&self) -> bool { self.assembler.has_pending_output() }

    /// Number of whole messages waiting to be packetised.
    #[must_use]
    pub fn pending_messages(&self) -> usize { self.assembler.pending_messages() }

    /// Produce the next packet to transmit, or `None` when idle.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] if the packet buffer cannot grow.
    pub fn produce_next_packet(&mut self) -> Result<Option<Bytes>> {
        let packet = self
            .assembler
            .produce_next_packet(self.stamp(), self.config.max_transfer_unit())?;
        if packet.is_some() {
            metrics::inc_packets(Direction::Outbound);
        }
        Ok(packet.map(Bytes::from))
    }

    /// Fill the caller's scratch buffer with the next packet.
    ///
    /// Returns `false`, leaving `out` empty, when there is nothing to send.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] if `out` cannot grow.
    pub fn produce_next_packet_into(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        let produced =
            self.assembler
                .produce_into(self.stamp(), self.config.max_transfer_unit(), out)?;
        if produced {
            metrics::inc_packets(Direction::Outbound);
        }
        Ok(produced)
    }

    /// Process a packet received from `from`, returning every message it
    /// completed.
    ///
    /// Malformed, foreign, excluded, out-of-order and oversized data is
    /// dropped silently; see [`DiscardReason`]. Empty datagrams are ignored
    /// even when misc data is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] when a message buffer cannot grow.
    /// Only the partial message from `from` is affected. If earlier chunks of
    /// the same packet already completed messages, those are returned instead
    /// and the failure is logged.
    pub fn on_packet_received(
        &mut self,
        packet: &[u8],
        from: E,
    ) -> Result<Vec<CompletedMessage<E>>> {
        if packet.is_empty() {
            record_discard(&from, DiscardReason::ShortPacket);
            return Ok(Vec::new());
        }
        metrics::inc_packets(Direction::Inbound);
        let magic = self.config.magic();
        let framed =
            packet.len() >= HEADER_SIZE && FragmentHeader::peek_magic(packet) == Some(magic);

        if !framed {
            if self.config.allow_misc_incoming_data() {
                return Ok(vec![Self::pass_through(packet, from)?]);
            }
            let reason = if packet.len() < HEADER_SIZE {
                DiscardReason::ShortPacket
            } else {
                DiscardReason::MagicMismatch
            };
            record_discard(&from, reason);
            return Ok(Vec::new());
        }

        let mut completed = Vec::new();
        let mut rest = packet;
        while !rest.is_empty() {
            let Ok(header) = FragmentHeader::decode(rest) else {
                debug!(endpoint = ?from, trailing = rest.len(), "ignoring trailing bytes");
                record_discard(&from, DiscardReason::ShortPacket);
                break;
            };
            if header.magic() != magic {
                record_discard(&from, DiscardReason::MagicMismatch);
                break;
            }

            let body = rest.get(HEADER_SIZE..).unwrap_or_default();
            let len = usize::try_from(header.payload_len()).unwrap_or(usize::MAX);
            let Some((chunk, tail)) = body.split_at_checked(len) else {
                record_discard(&from, DiscardReason::Truncated);
                break;
            };
            rest = tail;

            if self.is_excluded(&header) {
                record_discard(&from, DiscardReason::SourceExcluded);
                continue;
            }
            match self.table.accept(&from, &header, chunk) {
                Ok(Some(message)) => {
                    metrics::inc_messages(Direction::Inbound);
                    completed.push(message);
                }
                Ok(None) => {}
                Err(err) => return keep_completed(&from, completed, err),
            }
        }
        Ok(completed)
    }

    /// Number of endpoints with a partial message in progress.
    #[must_use]
    pub fn tracked_endpoints(&self) -> usize { self.table.tracked_endpoints() }

    /// Inspect the partial message in progress for `endpoint`.
    #[must_use]
    pub fn reassembly_state(&self, endpoint: &E) -> Option<&ReassemblyState> {
        self.table.state(endpoint)
    }

    /// Drop any partial message in progress for `endpoint`.
    pub fn discard_endpoint(&mut self, endpoint: &E) -> bool { self.table.discard(endpoint) }

    fn stamp(&self) -> HeaderStamp {
        HeaderStamp {
            magic: self.config.magic(),
            source_exclusion_id: self.config.source_exclusion_id(),
        }
    }

    fn is_excluded(&self, header: &FragmentHeader) -> bool {
        let own = self.config.source_exclusion_id();
        own != 0 && header.source_exclusion_id() == own
    }

    fn pass_through(packet: &[u8], from: E) -> Result<CompletedMessage<E>> {
        let mut payload = Vec::new();
        payload
            .try_reserve_exact(packet.len())
            .map_err(|err| TunnelError::allocation("raw message", packet.len(), err))?;
        payload.extend_from_slice(packet);
        metrics::inc_messages(Direction::Inbound);
        Ok(CompletedMessage::raw(from, Bytes::from(payload)))
    }
}

/// Hand back the messages a packet completed before `err`, or `err` itself
/// when there are none.
fn keep_completed<E: Debug>(
    from: &E,
    completed: Vec<CompletedMessage<E>>,
    err: TunnelError,
) -> Result<Vec<CompletedMessage<E>>> {
    if completed.is_empty() {
        return Err(err);
    }
    warn!(
        endpoint = ?from,
        delivered = completed.len(),
        error = %err,
        "abandoning rest of packet"
    );
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tracing_test::traced_test;

    use super::keep_completed;
    use crate::{TunnelError, fragment::CompletedMessage};

    fn allocation_failure() -> TunnelError {
        let err = Vec::<u8>::new()
            .try_reserve(usize::MAX)
            .expect_err("reserving usize::MAX bytes must fail");
        TunnelError::allocation("reassembly buffer", usize::MAX, err)
    }

    #[test]
    fn failure_before_any_message_is_reported() {
        let result = keep_completed::<u8>(&1, Vec::new(), allocation_failure());

        assert!(matches!(result, Err(TunnelError::Allocation { .. })));
    }

    #[traced_test]
    #[test]
    fn messages_completed_before_a_failure_are_kept() {
        let earlier = vec![CompletedMessage::raw(1_u8, Bytes::from_static(b"kept"))];

        let delivered = keep_completed(&1, earlier, allocation_failure()).expect("kept");

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].payload(), b"kept");
        assert!(logs_contain("abandoning rest of packet"));
    }
}
