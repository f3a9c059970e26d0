//! Error types for async-agentx.
//!
//! This module provides:
//!
//! - [`Error`] - The main error type for every client, session and codec operation
//! - [`ErrorStatus`] - `res.error` codes returned by the master agent (RFC 2741 §6.2.16)
//! - [`DecodeErrorKind`] / [`EncodeErrorKind`] - detail for framing and marshal failures
//!
//! # Error Handling
//!
//! Errors are boxed for efficiency: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use async_agentx::{Error, Result};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(()) => println!("Success"),
//!         Err(e) => match &*e {
//!             Error::Timeout { packet_id, elapsed } => {
//!                 println!("packet {} unanswered after {:?}", packet_id, elapsed);
//!             }
//!             Error::ConnectionClosed => println!("master went away"),
//!             _ => println!("Error: {}", e),
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Framing error kinds.
///
/// Any of these on the receive path desynchronises the byte stream, so the
/// reader treats them as fatal to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Fewer bytes available than a field needs.
    InsufficientData { needed: usize, available: usize },
    /// A body decoder finished with bytes left over.
    TrailingData { remaining: usize },
    /// Header carries a protocol version other than 1.
    UnknownVersion(u8),
    /// Varbind carries an unknown value type.
    UnknownValueType(u16),
    /// OID claims more sub-identifiers than allowed.
    OidTooLong { count: usize, max: usize },
    /// IpAddress value that is not 4 octets.
    InvalidIpAddressLength { length: usize },
    /// `payload_length` disagrees with the bytes handed to the decoder.
    LengthMismatch { declared: usize, actual: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::TrailingData { remaining } => {
                write!(f, "{} unconsumed bytes after body", remaining)
            }
            Self::UnknownVersion(v) => write!(f, "unknown AgentX version: {}", v),
            Self::UnknownValueType(t) => write!(f, "unknown varbind type: {}", t),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} sub-identifiers, maximum is {}", count, max)
            }
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::LengthMismatch { declared, actual } => {
                write!(
                    f,
                    "payload length {} does not match body of {} bytes",
                    declared, actual
                )
            }
        }
    }
}

/// Marshal error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// OID has more sub-identifiers than the wire format allows.
    OidTooLong { count: usize, max: usize },
    /// Octet string longer than a u32 length prefix can express.
    OctetStringTooLong { length: usize },
    /// A context was supplied for a PDU type that carries none.
    ContextNotAllowed(u8),
    /// Encoded body exceeds the u32 payload length field.
    PayloadTooLarge { length: usize },
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} sub-identifiers, maximum is {}", count, max)
            }
            Self::OctetStringTooLong { length } => {
                write!(f, "octet string of {} bytes is too long", length)
            }
            Self::ContextNotAllowed(t) => {
                write!(f, "PDU type {} does not carry a context", t)
            }
            Self::PayloadTooLarge { length } => {
                write!(f, "payload of {} bytes exceeds u32 length field", length)
            }
        }
    }
}

/// The main error type for all async-agentx operations.
///
/// # Common Patterns
///
/// ```
/// use async_agentx::Error;
///
/// fn connection_lost(error: &Error) -> bool {
///     matches!(error,
///         Error::ConnectionClosed |
///         Error::Io { .. } |
///         Error::Framing { .. }
///     )
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket-level failure (connect refused, reset, write failure).
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },

    /// The connection was torn down while the call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// No reply arrived before the request deadline.
    #[error("timeout after {elapsed:?} waiting for packet {packet_id}")]
    Timeout { packet_id: u32, elapsed: Duration },

    /// Malformed or truncated bytes on the wire.
    #[error("framing error at offset {offset}: {kind}")]
    Framing { offset: usize, kind: DecodeErrorKind },

    /// An in-memory packet could not be marshaled.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Packet type code this client does not understand.
    #[error("unsupported packet type {0}")]
    UnsupportedType(u8),

    /// Peer announced a payload larger than the configured limit.
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The master answered with a non-zero `res.error`.
    #[error("master returned {status} at index {index}")]
    Agentx { status: ErrorStatus, index: u16 },

    /// A reply arrived with the wrong PDU type.
    #[error("expected {expected} PDU, got {actual}")]
    UnexpectedPdu {
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID format.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub(crate) fn framing(offset: usize, kind: DecodeErrorKind) -> Box<Self> {
        tracing::debug!(target: "async_agentx::codec", { agentx.offset = offset, %kind }, "framing error");
        Self::Framing { offset, kind }.boxed()
    }

    pub(crate) fn encode(kind: EncodeErrorKind) -> Box<Self> {
        tracing::debug!(target: "async_agentx::codec", { %kind }, "encode error");
        Self::Encode { kind }.boxed()
    }

    pub(crate) fn io(source: std::io::Error) -> Box<Self> {
        Self::Io { source }.boxed()
    }

    /// Whether this error means the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ConnectionClosed
                | Self::Framing { .. }
                | Self::PayloadTooLarge { .. }
        )
    }
}

/// `res.error` codes carried in a Response PDU (RFC 2741 §6.2.16).
///
/// Values 0-18 mirror the SNMP error-status codes of RFC 3416; 256-268 are
/// AgentX administrative errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// No error (0).
    #[default]
    NoError,
    /// Response too large (1).
    TooBig,
    /// Object not found (2).
    NoSuchName,
    /// Invalid value (3).
    BadValue,
    /// Read-only object (4).
    ReadOnly,
    /// Unspecified error (5).
    GenErr,
    /// Access denied (6).
    NoAccess,
    /// Wrong ASN.1 type (7).
    WrongType,
    /// Wrong length (8).
    WrongLength,
    /// Wrong encoding (9).
    WrongEncoding,
    /// Value out of range (10).
    WrongValue,
    /// Row creation not supported (11).
    NoCreation,
    /// Inconsistent with other objects (12).
    InconsistentValue,
    /// Resource unavailable (13).
    ResourceUnavailable,
    /// Commit phase failed (14).
    CommitFailed,
    /// Undo phase failed (15).
    UndoFailed,
    /// Authorization error (16).
    AuthorizationError,
    /// Object not writable (17).
    NotWritable,
    /// Name cannot be created (18).
    InconsistentName,
    /// Session could not be opened (256).
    OpenFailed,
    /// Session is not open (257).
    NotOpen,
    /// Index value has the wrong type (258).
    IndexWrongType,
    /// Index value already allocated (259).
    IndexAlreadyAllocated,
    /// No index value available (260).
    IndexNoneAvailable,
    /// Index value was not allocated (261).
    IndexNotAllocated,
    /// Context not supported (262).
    UnsupportedContext,
    /// Subtree already registered (263).
    DuplicateRegistration,
    /// Subtree not registered (264).
    UnknownRegistration,
    /// Agent capabilities not known (265).
    UnknownAgentCaps,
    /// PDU could not be parsed (266).
    ParseError,
    /// Request denied (267).
    RequestDenied,
    /// Processing error (268).
    ProcessingError,
    /// Unknown or future error code.
    Unknown(u16),
}

impl ErrorStatus {
    /// Create from raw `res.error` code.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            256 => Self::OpenFailed,
            257 => Self::NotOpen,
            258 => Self::IndexWrongType,
            259 => Self::IndexAlreadyAllocated,
            260 => Self::IndexNoneAvailable,
            261 => Self::IndexNotAllocated,
            262 => Self::UnsupportedContext,
            263 => Self::DuplicateRegistration,
            264 => Self::UnknownRegistration,
            265 => Self::UnknownAgentCaps,
            266 => Self::ParseError,
            267 => Self::RequestDenied,
            268 => Self::ProcessingError,
            other => {
                tracing::warn!(target: "async_agentx::error", { agentx.res_error = other }, "unknown AgentX error status");
                Self::Unknown(other)
            }
        }
    }

    /// Convert to raw `res.error` code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::OpenFailed => 256,
            Self::NotOpen => 257,
            Self::IndexWrongType => 258,
            Self::IndexAlreadyAllocated => 259,
            Self::IndexNoneAvailable => 260,
            Self::IndexNotAllocated => 261,
            Self::UnsupportedContext => 262,
            Self::DuplicateRegistration => 263,
            Self::UnknownRegistration => 264,
            Self::UnknownAgentCaps => 265,
            Self::ParseError => 266,
            Self::RequestDenied => 267,
            Self::ProcessingError => 268,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noAgentXError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::OpenFailed => write!(f, "openFailed"),
            Self::NotOpen => write!(f, "notOpen"),
            Self::IndexWrongType => write!(f, "indexWrongType"),
            Self::IndexAlreadyAllocated => write!(f, "indexAlreadyAllocated"),
            Self::IndexNoneAvailable => write!(f, "indexNoneAvailable"),
            Self::IndexNotAllocated => write!(f, "indexNotAllocated"),
            Self::UnsupportedContext => write!(f, "unsupportedContext"),
            Self::DuplicateRegistration => write!(f, "duplicateRegistration"),
            Self::UnknownRegistration => write!(f, "unknownRegistration"),
            Self::UnknownAgentCaps => write!(f, "unknownAgentCaps"),
            Self::ParseError => write!(f, "parseError"),
            Self::RequestDenied => write!(f, "requestDenied"),
            Self::ProcessingError => write!(f, "processingError"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}
