//! Engine configuration.
//!
//! [`TunnelConfig`] collects the tunable knobs of a
//! [`PacketTunnelEngine`](crate::PacketTunnelEngine). Two engines interoperate
//! only when they agree on the magic number; the other settings are local.

use crate::wire::{DEFAULT_MAGIC, DEFAULT_MAX_TRANSFER_UNIT, NO_LIMIT, clamp_transfer_unit};

/// Settings applied to a tunnel engine.
///
/// # Examples
///
/// ```
/// use packet_tunnel::{TunnelConfig, wire::HEADER_SIZE};
///
/// let config = TunnelConfig::default()
///     .with_max_transfer_unit(8)
///     .with_source_exclusion_id(42);
/// assert_eq!(config.max_transfer_unit(), HEADER_SIZE + 1);
/// assert_eq!(config.source_exclusion_id(), 42);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TunnelConfig {
    max_transfer_unit: usize,
    magic: u32,
    max_incoming_message_size: usize,
    allow_misc_incoming_data: bool,
    source_exclusion_id: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            max_transfer_unit: DEFAULT_MAX_TRANSFER_UNIT,
            magic: DEFAULT_MAGIC,
            max_incoming_message_size: NO_LIMIT,
            allow_misc_incoming_data: false,
            source_exclusion_id: 0,
        }
    }
}

impl TunnelConfig {
    /// Largest packet the engine emits, header included. Values below
    /// `HEADER_SIZE + 1` are raised to it.
    #[must_use]
    pub const fn with_max_transfer_unit(mut self, mtu: usize) -> Self {
        self.max_transfer_unit = clamp_transfer_unit(mtu);
        self
    }

    /// Protocol magic number stamped on and expected in every chunk.
    #[must_use]
    pub const fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Largest message the engine will reassemble.
    #[must_use]
    pub const fn with_max_incoming_message_size(mut self, size: usize) -> Self {
        self.max_incoming_message_size = size;
        self
    }

    /// Deliver packets that are not in tunnel format as raw messages instead
    /// of dropping them.
    #[must_use]
    pub const fn with_allow_misc_incoming_data(mut self, allow: bool) -> Self {
        self.allow_misc_incoming_data = allow;
        self
    }

    /// Tag outgoing chunks with `id` and ignore incoming chunks carrying it.
    /// Zero disables the filter.
    #[must_use]
    pub const fn with_source_exclusion_id(mut self, id: u32) -> Self {
        self.source_exclusion_id = id;
        self
    }

    #[must_use]
    pub const fn max_transfer_unit(&self) -> usize { self.max_transfer_unit }

    #[must_use]
    pub const fn magic(&self) -> u32 { self.magic }

    #[must_use]
    pub const fn max_incoming_message_size(&self) -> usize { self.max_incoming_message_size }

    #[must_use]
    pub const fn allow_misc_incoming_data(&self) -> bool { self.allow_misc_incoming_data }

    #[must_use]
    pub const fn source_exclusion_id(&self) -> u32 { self.source_exclusion_id }
}
