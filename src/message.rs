//! Typed application messages carried through the tunnel.
//!
//! The engine moves opaque bytes; this trait is the boundary that flattens a
//! typed message before it is queued and rebuilds it once reassembled.

use bincode::{
    BorrowDecode,
    Encode,
    borrow_decode_from_slice,
    config,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};

/// Application message that can be flattened into a tunnel payload.
///
/// Any type deriving [`Encode`] and [`BorrowDecode`] implements this trait
/// through the blanket implementation, using bincode's standard
/// configuration.
///
/// # Examples
///
/// ```
/// use bincode::{BorrowDecode, Encode};
/// use packet_tunnel::Message;
///
/// #[derive(Debug, PartialEq, Encode, BorrowDecode)]
/// struct Ping(u32);
///
/// let bytes = Ping(7).to_bytes().expect("encode");
/// assert_eq!(Ping::from_bytes(&bytes).expect("decode"), Ping(7));
/// ```
pub trait Message: Encode + for<'de> BorrowDecode<'de, ()> {
    /// Flatten the message into a payload.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> { encode_to_vec(self, config::standard()) }

    /// Rebuild a message from a complete payload.
    ///
    /// A reassembled payload holds exactly one message, so trailing bytes
    /// are rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if deserialization fails or bytes remain
    /// after the message.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized,
    {
        let (message, consumed) = borrow_decode_from_slice(bytes, config::standard())?;
        if consumed != bytes.len() {
            return Err(DecodeError::OtherString(format!(
                "{} trailing bytes after message",
                bytes.len() - consumed
            )));
        }
        Ok(message)
    }
}

impl<T> Message for T where for<'de> T: Encode + BorrowDecode<'de, ()> {}
