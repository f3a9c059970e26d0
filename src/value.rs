//! AgentX value types.
//!
//! The `Value` enum covers every varbind data type of RFC 2741 §5.4,
//! including the three exception values.

use crate::codec::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::util::encode_hex;
use bytes::Bytes;

/// Varbind type codes (RFC 2741 §5.4).
pub mod value_type {
    pub const INTEGER: u16 = 2;
    pub const OCTET_STRING: u16 = 4;
    pub const NULL: u16 = 5;
    pub const OBJECT_IDENTIFIER: u16 = 6;
    pub const IP_ADDRESS: u16 = 64;
    pub const COUNTER32: u16 = 65;
    pub const GAUGE32: u16 = 66;
    pub const TIME_TICKS: u16 = 67;
    pub const OPAQUE: u16 = 68;
    pub const COUNTER64: u16 = 70;
    pub const NO_SUCH_OBJECT: u16 = 128;
    pub const NO_SUCH_INSTANCE: u16 = 129;
    pub const END_OF_MIB_VIEW: u16 = 130;
}

/// AgentX varbind value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// Integer (signed 32-bit)
    Integer(i32),

    /// Octet String (arbitrary bytes)
    OctetString(Bytes),

    /// Null
    Null,

    /// Object Identifier
    ObjectIdentifier(Oid),

    /// IpAddress (4 bytes, carried as an Octet String on the wire)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 / Unsigned32
    Gauge32(u32),

    /// TimeTicks (hundredths of seconds)
    TimeTicks(u32),

    /// Opaque (legacy, arbitrary bytes)
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit, wrapping)
    Counter64(u64),

    /// noSuchObject exception
    NoSuchObject,

    /// noSuchInstance exception
    NoSuchInstance,

    /// endOfMibView exception
    EndOfMibView,
}

impl Value {
    /// Try to get as i32.
    ///
    /// ```
    /// use async_agentx::Value;
    ///
    /// assert_eq!(Value::Integer(-100).as_i32(), Some(-100));
    /// assert_eq!(Value::Counter32(42).as_i32(), None);
    /// ```
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32.
    ///
    /// Returns `Some(u32)` for [`Value::Counter32`], [`Value::Gauge32`],
    /// [`Value::TimeTicks`], or non-negative [`Value::Integer`].
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Try to get as bytes ([`Value::OctetString`] or [`Value::Opaque`]).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Check if this is an exception value.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Varbind type code for this value.
    pub fn type_code(&self) -> u16 {
        use value_type::*;
        match self {
            Value::Integer(_) => INTEGER,
            Value::OctetString(_) => OCTET_STRING,
            Value::Null => NULL,
            Value::ObjectIdentifier(_) => OBJECT_IDENTIFIER,
            Value::IpAddress(_) => IP_ADDRESS,
            Value::Counter32(_) => COUNTER32,
            Value::Gauge32(_) => GAUGE32,
            Value::TimeTicks(_) => TIME_TICKS,
            Value::Opaque(_) => OPAQUE,
            Value::Counter64(_) => COUNTER64,
            Value::NoSuchObject => NO_SUCH_OBJECT,
            Value::NoSuchInstance => NO_SUCH_INSTANCE,
            Value::EndOfMibView => END_OF_MIB_VIEW,
        }
    }

    /// Encode the data portion of a varbind (everything after the name).
    pub(crate) fn encode_data(&self, buf: &mut EncodeBuf) -> Result<()> {
        match self {
            Value::Integer(v) => buf.push_u32(*v as u32),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => buf.push_u32(*v),
            Value::Counter64(v) => buf.push_u64(*v),
            Value::OctetString(data) | Value::Opaque(data) => buf.push_octet_string(data)?,
            Value::IpAddress(addr) => buf.push_octet_string(addr)?,
            Value::ObjectIdentifier(oid) => buf.push_oid(oid, false)?,
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {}
        }
        Ok(())
    }

    /// Decode the data portion of a varbind given its type code.
    pub(crate) fn decode_data(type_code: u16, decoder: &mut Decoder) -> Result<Self> {
        use value_type::*;
        let offset = decoder.offset();
        let value = match type_code {
            INTEGER => Value::Integer(decoder.read_u32()? as i32),
            OCTET_STRING => Value::OctetString(decoder.read_octet_string()?),
            NULL => Value::Null,
            OBJECT_IDENTIFIER => Value::ObjectIdentifier(decoder.read_oid()?.0),
            IP_ADDRESS => {
                let data = decoder.read_octet_string()?;
                let addr: [u8; 4] = data[..].try_into().map_err(|_| {
                    Error::framing(
                        offset,
                        DecodeErrorKind::InvalidIpAddressLength { length: data.len() },
                    )
                })?;
                Value::IpAddress(addr)
            }
            COUNTER32 => Value::Counter32(decoder.read_u32()?),
            GAUGE32 => Value::Gauge32(decoder.read_u32()?),
            TIME_TICKS => Value::TimeTicks(decoder.read_u32()?),
            OPAQUE => Value::Opaque(decoder.read_octet_string()?),
            COUNTER64 => Value::Counter64(decoder.read_u64()?),
            NO_SUCH_OBJECT => Value::NoSuchObject,
            NO_SUCH_INSTANCE => Value::NoSuchInstance,
            END_OF_MIB_VIEW => Value::EndOfMibView,
            other => {
                return Err(Error::framing(
                    offset,
                    DecodeErrorKind::UnknownValueType(other),
                ));
            }
        };
        Ok(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "{}", s)
                } else {
                    write!(f, "0x{}", encode_hex(data))
                }
            }
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => {
                write!(f, "{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
            }
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{}d {}h {}m {}s", days, hours, mins, s)
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", encode_hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}
