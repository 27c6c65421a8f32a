use derive_more::{Display, From, Into};

/// Identifier shared by every fragment of one logical message.
///
/// Identifiers are assigned by the sending engine from a wrapping counter, so
/// they are unique per sender only until the counter wraps.
///
/// # Examples
///
/// ```
/// use packet_tunnel::fragment::MessageId;
/// let id = MessageId::new(u32::MAX);
/// assert_eq!(id.get(), u32::MAX);
/// assert_eq!(id.wrapping_next(), MessageId::new(0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{_0}")]
pub struct MessageId(u32);

impl MessageId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Return the inner numeric identifier.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Return the identifier that follows this one, wrapping at `u32::MAX`.
    #[must_use]
    pub const fn wrapping_next(self) -> Self { Self(self.0.wrapping_add(1)) }
}
