//! AgentX primitive encoding (RFC 2741 §5).
//!
//! Fixed-width integers, padded octet strings and object identifiers. Every
//! field is a multiple of four bytes. The encoder always writes network byte
//! order; the decoder follows whatever order the header flags announce.

mod decode;
mod encode;

pub use decode::Decoder;
pub use encode::EncodeBuf;

/// Byte order of multi-byte integers in a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Network byte order, flagged by `NETWORK_BYTE_ORDER` in the header.
    #[default]
    BigEndian,
    LittleEndian,
}

/// Number of zero bytes needed to pad `len` up to a four byte boundary.
pub(crate) fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}
