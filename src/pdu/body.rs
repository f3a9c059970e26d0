//! Type-specific PDU bodies (RFC 2741 §6.2).
//!
//! Each body knows its own layout. Context handling and the header live in
//! the parent module; everything here starts after the optional context.

use std::time::Duration;

use bytes::Bytes;

use crate::codec::{Decoder, EncodeBuf};
use crate::error::{ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// One-byte timeout in seconds. Zero asks the master to use its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timeout(u8);

impl Timeout {
    /// Use the master's (or the session's) default timeout.
    pub const DEFAULT: Timeout = Timeout(0);

    pub const fn from_secs(secs: u8) -> Self {
        Timeout(secs)
    }

    pub const fn as_secs(self) -> u8 {
        self.0
    }

    /// The timeout as a `Duration`, or `None` for the default.
    pub fn as_duration(self) -> Option<Duration> {
        (self.0 != 0).then(|| Duration::from_secs(u64::from(self.0)))
    }

    /// Whole seconds covering `duration`: rounded up, capped at 255. Only a
    /// zero duration becomes [`Timeout::DEFAULT`].
    pub fn saturating_from(duration: Duration) -> Self {
        let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        Timeout(u8::try_from(secs).unwrap_or(u8::MAX))
    }
}

impl TryFrom<Duration> for Timeout {
    type Error = Box<crate::Error>;

    fn try_from(duration: Duration) -> Result<Self> {
        u8::try_from(duration.as_secs())
            .map(Timeout)
            .map_err(|_| {
                crate::Error::Config(
                    format!("timeout {:?} does not fit in one byte of seconds", duration).into(),
                )
                .boxed()
            })
    }
}

/// A `(start, end)` OID bound used by the Get family.
///
/// `include` travels in the start OID's include byte. An empty `end` means
/// no upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRange {
    pub start: Oid,
    pub end: Oid,
    pub include: bool,
}

impl SearchRange {
    pub fn new(start: Oid, end: Oid, include: bool) -> Self {
        Self {
            start,
            end,
            include,
        }
    }

    /// Range covering a single object (`start` included, no end bound).
    pub fn exact(start: Oid) -> Self {
        Self::new(start, Oid::empty(), true)
    }

    /// Whether `oid` falls inside this range.
    pub fn contains(&self, oid: &Oid) -> bool {
        let above_start = if self.include {
            oid >= &self.start
        } else {
            oid > &self.start
        };
        above_start && (self.end.is_empty() || oid < &self.end)
    }

    fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_oid(&self.start, self.include)?;
        buf.push_oid(&self.end, false)
    }

    fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (start, include) = decoder.read_oid()?;
        let (end, _) = decoder.read_oid()?;
        Ok(Self {
            start,
            end,
            include,
        })
    }
}

/// Ordered search ranges; fills the rest of the body.
pub type Ranges = Vec<SearchRange>;

fn encode_ranges(buf: &mut EncodeBuf, ranges: &[SearchRange]) -> Result<()> {
    for range in ranges {
        range.encode(buf)?;
    }
    Ok(())
}

fn decode_ranges(decoder: &mut Decoder) -> Result<Ranges> {
    let mut ranges = Vec::new();
    while !decoder.is_empty() {
        ranges.push(SearchRange::decode(decoder)?);
    }
    Ok(ranges)
}

/// agentx-Open-PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub timeout: Timeout,
    /// Identifies the subagent (usually its sysObjectID).
    pub id: Oid,
    pub description: Bytes,
}

impl Open {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.timeout.as_secs());
        buf.push_reserved(3);
        buf.push_oid(&self.id, false)?;
        buf.push_octet_string(&self.description)
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let timeout = Timeout::from_secs(decoder.read_u8()?);
        decoder.skip(3)?;
        let (id, _) = decoder.read_oid()?;
        let description = decoder.read_octet_string()?;
        Ok(Self {
            timeout,
            id,
            description,
        })
    }
}

/// Reason carried by a Close PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    Other,
    ParseError,
    ProtocolError,
    Timeouts,
    Shutdown,
    ByManager,
    Unknown(u8),
}

impl CloseReason {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Other,
            2 => Self::ParseError,
            3 => Self::ProtocolError,
            4 => Self::Timeouts,
            5 => Self::Shutdown,
            6 => Self::ByManager,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Other => 1,
            Self::ParseError => 2,
            Self::ProtocolError => 3,
            Self::Timeouts => 4,
            Self::Shutdown => 5,
            Self::ByManager => 6,
            Self::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other => write!(f, "reasonOther"),
            Self::ParseError => write!(f, "reasonParseError"),
            Self::ProtocolError => write!(f, "reasonProtocolError"),
            Self::Timeouts => write!(f, "reasonTimeouts"),
            Self::Shutdown => write!(f, "reasonShutdown"),
            Self::ByManager => write!(f, "reasonByManager"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// agentx-Close-PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Close {
    pub reason: CloseReason,
}

impl Close {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.reason.as_u8());
        buf.push_reserved(3);
        Ok(())
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let reason = CloseReason::from_u8(decoder.read_u8()?);
        decoder.skip(3)?;
        Ok(Self { reason })
    }
}

/// Range registration: sub-identifier `subid` of the subtree varies up to
/// `upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    /// 1-based position in the subtree OID. Never zero.
    pub subid: u8,
    pub upper_bound: u32,
}

/// agentx-Register-PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub timeout: Timeout,
    pub priority: u8,
    pub subtree: Oid,
    pub range: Option<RegisterRange>,
}

/// Default registration priority (RFC 2741 §6.2.3).
pub const DEFAULT_PRIORITY: u8 = 127;

impl Register {
    /// Register `subtree` with default timeout and priority.
    pub fn new(subtree: Oid) -> Self {
        Self {
            timeout: Timeout::DEFAULT,
            priority: DEFAULT_PRIORITY,
            subtree,
            range: None,
        }
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn range(mut self, subid: u8, upper_bound: u32) -> Self {
        self.range = (subid != 0).then_some(RegisterRange { subid, upper_bound });
        self
    }

    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.timeout.as_secs());
        buf.push_u8(self.priority);
        buf.push_u8(self.range.map_or(0, |r| r.subid));
        buf.push_reserved(1);
        buf.push_oid(&self.subtree, false)?;
        if let Some(range) = self.range {
            buf.push_u32(range.upper_bound);
        }
        Ok(())
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let timeout = Timeout::from_secs(decoder.read_u8()?);
        let priority = decoder.read_u8()?;
        let range_subid = decoder.read_u8()?;
        decoder.skip(1)?;
        let (subtree, _) = decoder.read_oid()?;
        let range = if range_subid != 0 {
            Some(RegisterRange {
                subid: range_subid,
                upper_bound: decoder.read_u32()?,
            })
        } else {
            None
        };
        Ok(Self {
            timeout,
            priority,
            subtree,
            range,
        })
    }
}

/// agentx-Unregister-PDU.
///
/// Same layout as Register. The timeout byte is reserved by RFC 2741 but
/// many masters echo whatever the Register carried, so it is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregister {
    pub timeout: Timeout,
    pub priority: u8,
    pub subtree: Oid,
    pub range: Option<RegisterRange>,
}

impl Unregister {
    pub fn new(subtree: Oid) -> Self {
        Self {
            timeout: Timeout::DEFAULT,
            priority: DEFAULT_PRIORITY,
            subtree,
            range: None,
        }
    }

    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.timeout.as_secs());
        buf.push_u8(self.priority);
        buf.push_u8(self.range.map_or(0, |r| r.subid));
        buf.push_reserved(1);
        buf.push_oid(&self.subtree, false)?;
        if let Some(range) = self.range {
            buf.push_u32(range.upper_bound);
        }
        Ok(())
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let Register {
            timeout,
            priority,
            subtree,
            range,
        } = Register::decode(decoder)?;
        Ok(Self {
            timeout,
            priority,
            subtree,
            range,
        })
    }
}

impl From<&Register> for Unregister {
    fn from(register: &Register) -> Self {
        Self {
            timeout: register.timeout,
            priority: register.priority,
            subtree: register.subtree.clone(),
            range: register.range,
        }
    }
}

/// agentx-Get-PDU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Get {
    pub ranges: Ranges,
}

/// agentx-GetNext-PDU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetNext {
    pub ranges: Ranges,
}

macro_rules! ranges_body {
    ($($ty:ident),*) => {$(
        impl $ty {
            pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
                encode_ranges(buf, &self.ranges)
            }

            pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
                Ok(Self {
                    ranges: decode_ranges(decoder)?,
                })
            }
        }
    )*};
}

ranges_body!(Get, GetNext);

/// agentx-GetBulk-PDU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetBulk {
    pub non_repeaters: u16,
    pub max_repetitions: u16,
    pub ranges: Ranges,
}

impl GetBulk {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u16(self.non_repeaters);
        buf.push_u16(self.max_repetitions);
        encode_ranges(buf, &self.ranges)
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        Ok(Self {
            non_repeaters: decoder.read_u16()?,
            max_repetitions: decoder.read_u16()?,
            ranges: decode_ranges(decoder)?,
        })
    }
}

/// agentx-TestSet-PDU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestSet {
    pub varbinds: Vec<VarBind>,
}

/// agentx-Notify-PDU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Notify {
    pub varbinds: Vec<VarBind>,
}

/// agentx-IndexAllocate-PDU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexAllocate {
    pub varbinds: Vec<VarBind>,
}

/// agentx-IndexDeallocate-PDU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexDeallocate {
    pub varbinds: Vec<VarBind>,
}

macro_rules! varbinds_body {
    ($($ty:ident),*) => {$(
        impl $ty {
            pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
                encode_varbind_list(buf, &self.varbinds)
            }

            pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
                Ok(Self {
                    varbinds: decode_varbind_list(decoder)?,
                })
            }
        }
    )*};
}

varbinds_body!(TestSet, Notify, IndexAllocate, IndexDeallocate);

/// agentx-AddAgentCaps-PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddAgentCaps {
    pub id: Oid,
    pub description: Bytes,
}

impl AddAgentCaps {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_oid(&self.id, false)?;
        buf.push_octet_string(&self.description)
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (id, _) = decoder.read_oid()?;
        let description = decoder.read_octet_string()?;
        Ok(Self { id, description })
    }
}

/// agentx-RemoveAgentCaps-PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveAgentCaps {
    pub id: Oid,
}

impl RemoveAgentCaps {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_oid(&self.id, false)
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (id, _) = decoder.read_oid()?;
        Ok(Self { id })
    }
}

/// agentx-Response-PDU.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    /// Master's sysUpTime in hundredths of a second (zero from subagents).
    pub sys_uptime: u32,
    pub error: ErrorStatus,
    /// 1-based index of the varbind that caused `error`.
    pub index: u16,
    pub varbinds: Vec<VarBind>,
}

impl Response {
    /// Successful response carrying `varbinds`.
    pub fn new(varbinds: Vec<VarBind>) -> Self {
        Self {
            varbinds,
            ..Self::default()
        }
    }

    /// Error response with no varbinds.
    pub fn error(error: ErrorStatus, index: u16) -> Self {
        Self {
            error,
            index,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error != ErrorStatus::NoError
    }

    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u32(self.sys_uptime);
        buf.push_u16(self.error.as_u16());
        buf.push_u16(self.index);
        encode_varbind_list(buf, &self.varbinds)
    }

    pub(crate) fn decode(decoder: &mut Decoder) -> Result<Self> {
        Ok(Self {
            sys_uptime: decoder.read_u32()?,
            error: ErrorStatus::from_u16(decoder.read_u16()?),
            index: decoder.read_u16()?,
            varbinds: decode_varbind_list(decoder)?,
        })
    }
}
