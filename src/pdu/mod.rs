//! AgentX Protocol Data Units.
//!
//! A [`HeaderPacket`] is the unit exchanged with the transport: the fixed
//! [`Header`], the optional non-default context, and one [`Pdu`] variant.
//! Bodies are always encoded in network byte order; decoding follows the
//! `NETWORK_BYTE_ORDER` flag of the received header.

mod body;
mod header;

pub use body::{
    AddAgentCaps, Close, CloseReason, DEFAULT_PRIORITY, Get, GetBulk, GetNext, IndexAllocate,
    IndexDeallocate, Notify, Open, Ranges, Register, RegisterRange, RemoveAgentCaps, Response,
    SearchRange, TestSet, Timeout, Unregister,
};
pub use header::{Flags, HEADER_SIZE, Header, VERSION};

use bytes::{Bytes, BytesMut};

use crate::codec::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, EncodeErrorKind, Error, Result};

/// PDU type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    Open = 1,
    Close = 2,
    Register = 3,
    Unregister = 4,
    Get = 5,
    GetNext = 6,
    GetBulk = 7,
    TestSet = 8,
    CommitSet = 9,
    UndoSet = 10,
    CleanupSet = 11,
    Notify = 12,
    Ping = 13,
    IndexAllocate = 14,
    IndexDeallocate = 15,
    AddAgentCaps = 16,
    RemoveAgentCaps = 17,
    Response = 18,
}

impl PduType {
    /// Create from the header type byte.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Open,
            2 => Self::Close,
            3 => Self::Register,
            4 => Self::Unregister,
            5 => Self::Get,
            6 => Self::GetNext,
            7 => Self::GetBulk,
            8 => Self::TestSet,
            9 => Self::CommitSet,
            10 => Self::UndoSet,
            11 => Self::CleanupSet,
            12 => Self::Notify,
            13 => Self::Ping,
            14 => Self::IndexAllocate,
            15 => Self::IndexDeallocate,
            16 => Self::AddAgentCaps,
            17 => Self::RemoveAgentCaps,
            18 => Self::Response,
            _ => return None,
        })
    }

    /// Get the type byte.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this type may carry a non-default context.
    pub fn has_context(self) -> bool {
        !matches!(
            self,
            Self::Open
                | Self::Close
                | Self::CommitSet
                | Self::UndoSet
                | Self::CleanupSet
                | Self::Response
        )
    }

    /// Name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Close => "Close",
            Self::Register => "Register",
            Self::Unregister => "Unregister",
            Self::Get => "Get",
            Self::GetNext => "GetNext",
            Self::GetBulk => "GetBulk",
            Self::TestSet => "TestSet",
            Self::CommitSet => "CommitSet",
            Self::UndoSet => "UndoSet",
            Self::CleanupSet => "CleanupSet",
            Self::Notify => "Notify",
            Self::Ping => "Ping",
            Self::IndexAllocate => "IndexAllocate",
            Self::IndexDeallocate => "IndexDeallocate",
            Self::AddAgentCaps => "AddAgentCaps",
            Self::RemoveAgentCaps => "RemoveAgentCaps",
            Self::Response => "Response",
        }
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One AgentX PDU body, keyed by type.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    Open(Open),
    Close(Close),
    Register(Register),
    Unregister(Unregister),
    Get(Get),
    GetNext(GetNext),
    GetBulk(GetBulk),
    TestSet(TestSet),
    CommitSet,
    UndoSet,
    CleanupSet,
    Notify(Notify),
    Ping,
    IndexAllocate(IndexAllocate),
    IndexDeallocate(IndexDeallocate),
    AddAgentCaps(AddAgentCaps),
    RemoveAgentCaps(RemoveAgentCaps),
    Response(Response),
}

impl Pdu {
    /// The type code this variant is sent with.
    pub fn pdu_type(&self) -> PduType {
        match self {
            Self::Open(_) => PduType::Open,
            Self::Close(_) => PduType::Close,
            Self::Register(_) => PduType::Register,
            Self::Unregister(_) => PduType::Unregister,
            Self::Get(_) => PduType::Get,
            Self::GetNext(_) => PduType::GetNext,
            Self::GetBulk(_) => PduType::GetBulk,
            Self::TestSet(_) => PduType::TestSet,
            Self::CommitSet => PduType::CommitSet,
            Self::UndoSet => PduType::UndoSet,
            Self::CleanupSet => PduType::CleanupSet,
            Self::Notify(_) => PduType::Notify,
            Self::Ping => PduType::Ping,
            Self::IndexAllocate(_) => PduType::IndexAllocate,
            Self::IndexDeallocate(_) => PduType::IndexDeallocate,
            Self::AddAgentCaps(_) => PduType::AddAgentCaps,
            Self::RemoveAgentCaps(_) => PduType::RemoveAgentCaps,
            Self::Response(_) => PduType::Response,
        }
    }

    fn encode_body(&self, buf: &mut EncodeBuf) -> Result<()> {
        match self {
            Self::Open(p) => p.encode(buf),
            Self::Close(p) => p.encode(buf),
            Self::Register(p) => p.encode(buf),
            Self::Unregister(p) => p.encode(buf),
            Self::Get(p) => p.encode(buf),
            Self::GetNext(p) => p.encode(buf),
            Self::GetBulk(p) => p.encode(buf),
            Self::TestSet(p) => p.encode(buf),
            Self::Notify(p) => p.encode(buf),
            Self::IndexAllocate(p) => p.encode(buf),
            Self::IndexDeallocate(p) => p.encode(buf),
            Self::AddAgentCaps(p) => p.encode(buf),
            Self::RemoveAgentCaps(p) => p.encode(buf),
            Self::Response(p) => p.encode(buf),
            Self::CommitSet | Self::UndoSet | Self::CleanupSet | Self::Ping => Ok(()),
        }
    }

    fn decode_body(pdu_type: PduType, decoder: &mut Decoder) -> Result<Self> {
        Ok(match pdu_type {
            PduType::Open => Self::Open(Open::decode(decoder)?),
            PduType::Close => Self::Close(Close::decode(decoder)?),
            PduType::Register => Self::Register(Register::decode(decoder)?),
            PduType::Unregister => Self::Unregister(Unregister::decode(decoder)?),
            PduType::Get => Self::Get(Get::decode(decoder)?),
            PduType::GetNext => Self::GetNext(GetNext::decode(decoder)?),
            PduType::GetBulk => Self::GetBulk(GetBulk::decode(decoder)?),
            PduType::TestSet => Self::TestSet(TestSet::decode(decoder)?),
            PduType::CommitSet => Self::CommitSet,
            PduType::UndoSet => Self::UndoSet,
            PduType::CleanupSet => Self::CleanupSet,
            PduType::Notify => Self::Notify(Notify::decode(decoder)?),
            PduType::Ping => Self::Ping,
            PduType::IndexAllocate => Self::IndexAllocate(IndexAllocate::decode(decoder)?),
            PduType::IndexDeallocate => Self::IndexDeallocate(IndexDeallocate::decode(decoder)?),
            PduType::AddAgentCaps => Self::AddAgentCaps(AddAgentCaps::decode(decoder)?),
            PduType::RemoveAgentCaps => Self::RemoveAgentCaps(RemoveAgentCaps::decode(decoder)?),
            PduType::Response => Self::Response(Response::decode(decoder)?),
        })
    }
}

macro_rules! impl_from_body {
    ($($ty:ident),*) => {$(
        impl From<$ty> for Pdu {
            fn from(body: $ty) -> Self {
                Pdu::$ty(body)
            }
        }
    )*};
}

impl_from_body!(
    Open,
    Close,
    Register,
    Unregister,
    Get,
    GetNext,
    GetBulk,
    TestSet,
    Notify,
    IndexAllocate,
    IndexDeallocate,
    AddAgentCaps,
    RemoveAgentCaps,
    Response
);

/// A header, optional context and PDU: one frame on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPacket {
    pub header: Header,
    /// Non-default context. Only valid for types where
    /// [`PduType::has_context`] holds.
    pub context: Option<Bytes>,
    pub pdu: Pdu,
}

impl HeaderPacket {
    /// Wrap `pdu` with a fresh network-byte-order header.
    pub fn new(pdu: impl Into<Pdu>) -> Self {
        let pdu = pdu.into();
        Self {
            header: Header::new(pdu.pdu_type()),
            context: None,
            pdu,
        }
    }

    /// Set the session id.
    pub fn session(mut self, session_id: u32) -> Self {
        self.header.session_id = session_id;
        self
    }

    /// Attach a non-default context.
    pub fn context(mut self, context: impl Into<Bytes>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add header flags (e.g. [`Flags::INSTANCE_REGISTRATION`]).
    pub fn flags(mut self, flags: Flags) -> Self {
        self.header.flags.insert(flags);
        self
    }

    /// Build the reply to this packet, copying the session, transaction
    /// and packet ids.
    pub fn reply(&self, response: Response) -> HeaderPacket {
        let mut header = Header::new(PduType::Response);
        header.session_id = self.header.session_id;
        header.transaction_id = self.header.transaction_id;
        header.packet_id = self.header.packet_id;
        HeaderPacket {
            header,
            context: None,
            pdu: Pdu::Response(response),
        }
    }

    /// Encode header and body into one frame.
    ///
    /// The header's type, `payload_length`, `NON_DEFAULT_CONTEXT` and
    /// `NETWORK_BYTE_ORDER` are derived from the packet; ids and the other
    /// flags are taken as given.
    pub fn encode(&self) -> Result<Bytes> {
        let pdu_type = self.pdu.pdu_type();

        let mut body = EncodeBuf::new();
        if let Some(context) = &self.context {
            if !pdu_type.has_context() {
                return Err(Error::encode(EncodeErrorKind::ContextNotAllowed(
                    pdu_type.code(),
                )));
            }
            body.push_octet_string(context)?;
        }
        self.pdu.encode_body(&mut body)?;
        let body = body.finish();

        let payload_length = u32::try_from(body.len())
            .map_err(|_| Error::encode(EncodeErrorKind::PayloadTooLarge { length: body.len() }))?;

        let mut header = self.header;
        header.version = VERSION;
        header.type_code = pdu_type.code();
        header.payload_length = payload_length;
        header.flags.insert(Flags::NETWORK_BYTE_ORDER);
        header
            .flags
            .set(Flags::NON_DEFAULT_CONTEXT, self.context.is_some());

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&body);
        Ok(frame.freeze())
    }

    /// Decode the body that followed `header` on the wire.
    ///
    /// Returns [`Error::UnsupportedType`] for unknown type codes; the caller
    /// has already consumed the body so the stream stays framed.
    pub fn decode(header: Header, body: Bytes) -> Result<Self> {
        if body.len() != header.payload_length as usize {
            return Err(Error::framing(
                HEADER_SIZE,
                DecodeErrorKind::LengthMismatch {
                    declared: header.payload_length as usize,
                    actual: body.len(),
                },
            ));
        }
        let pdu_type = header
            .pdu_type()
            .ok_or_else(|| Error::UnsupportedType(header.type_code).boxed())?;

        let mut decoder = Decoder::new(body, header.byte_order());
        let context = if pdu_type.has_context() && header.flags.contains(Flags::NON_DEFAULT_CONTEXT)
        {
            Some(decoder.read_octet_string()?)
        } else {
            None
        };
        let pdu = Pdu::decode_body(pdu_type, &mut decoder)?;
        decoder.finish()?;

        Ok(Self {
            header,
            context,
            pdu,
        })
    }

    /// Decode a complete frame (header followed by its body).
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(Error::framing(
                0,
                DecodeErrorKind::InsufficientData {
                    needed: HEADER_SIZE,
                    available: frame.len(),
                },
            ));
        }
        let header = Header::decode(&frame[..HEADER_SIZE])?;
        Self::decode(header, Bytes::copy_from_slice(&frame[HEADER_SIZE..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorStatus;
    use crate::oid;
    use crate::util::decode_hex;
    use crate::value::Value;
    use crate::varbind::VarBind;

    fn roundtrip(packet: &HeaderPacket) -> HeaderPacket {
        let bytes = packet.encode().unwrap();
        HeaderPacket::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_pdu_type_codes() {
        for code in 1..=18 {
            assert_eq!(PduType::from_u8(code).unwrap().code(), code);
        }
        assert_eq!(PduType::from_u8(0), None);
        assert_eq!(PduType::from_u8(19), None);
    }

    #[test]
    fn test_get_next_scenario_bytes() {
        let mut packet = HeaderPacket::new(GetNext {
            ranges: vec![SearchRange::new(oid!(1, 3, 6, 1), oid!(1, 3, 6, 1, 1), true)],
        });
        packet.header.packet_id = 7;
        let bytes = packet.encode().unwrap();
        let expected = decode_hex(
            "01 06 10 00 00000000 00000000 00000007 00000018
             04 00 01 00 00000001 00000003 00000006 00000001
             00 01 00 00",
        )
        .unwrap();
        assert_eq!(bytes.to_vec(), expected);
    }

    #[test]
    fn test_payload_length_matches_body() {
        let packet = HeaderPacket::new(Notify {
            varbinds: vec![VarBind::new(oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0), Value::from("x"))],
        });
        let bytes = packet.encode().unwrap();
        let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.payload_length as usize, bytes.len() - HEADER_SIZE);
    }

    #[test]
    fn test_context_roundtrip() {
        let packet = HeaderPacket::new(Register::new(oid!(1, 3, 6, 1, 4, 1, 99)))
            .session(3)
            .context(Bytes::from_static(b"vrf-blue"));
        let decoded = roundtrip(&packet);
        assert!(decoded.header.flags.contains(Flags::NON_DEFAULT_CONTEXT));
        assert_eq!(decoded.context.as_deref(), Some(&b"vrf-blue"[..]));
        assert_eq!(decoded.pdu, packet.pdu);
        assert_eq!(decoded.header.session_id, 3);
    }

    #[test]
    fn test_context_rejected_on_response() {
        let packet = HeaderPacket::new(Response::default()).context(Bytes::from_static(b"c"));
        let err = packet.encode().unwrap_err();
        assert!(matches!(
            *err,
            Error::Encode {
                kind: EncodeErrorKind::ContextNotAllowed(18)
            }
        ));
    }

    #[test]
    fn test_empty_response_body() {
        let bytes = decode_hex("01 12 10 00 00000000 00000000 00000007 00000000").unwrap();
        let packet = HeaderPacket::from_bytes(&bytes).unwrap();
        assert_eq!(packet.header.packet_id, 7);
        assert!(matches!(packet.pdu, Pdu::Response(_)));
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = HeaderPacket::new(Pdu::Ping).encode().unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let err = HeaderPacket::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            *err,
            Error::Framing {
                kind: DecodeErrorKind::LengthMismatch {
                    declared: 0,
                    actual: 4
                },
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_bytes_in_close() {
        let mut bytes = HeaderPacket::new(Close {
            reason: CloseReason::Shutdown,
        })
        .encode()
        .unwrap()
        .to_vec();
        bytes[19] = 8;
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let err = HeaderPacket::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            *err,
            Error::Framing {
                kind: DecodeErrorKind::TrailingData { remaining: 4 },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_type() {
        let bytes = decode_hex("01 63 10 00 00000000 00000000 00000001 00000000").unwrap();
        let err = HeaderPacket::from_bytes(&bytes).unwrap_err();
        assert!(matches!(*err, Error::UnsupportedType(0x63)));
    }

    #[test]
    fn test_reply_copies_ids() {
        let mut request = HeaderPacket::new(Get::default()).session(9);
        request.header.transaction_id = 4;
        request.header.packet_id = 12;
        let reply = request.reply(Response::error(ErrorStatus::ProcessingError, 0));
        assert_eq!(reply.header.session_id, 9);
        assert_eq!(reply.header.transaction_id, 4);
        assert_eq!(reply.header.packet_id, 12);
        assert_eq!(reply.pdu.pdu_type(), PduType::Response);
    }

    #[test]
    fn test_little_endian_get_with_context() {
        // Get, no NETWORK_BYTE_ORDER, NON_DEFAULT_CONTEXT set
        let bytes = decode_hex(
            "01 05 08 00 01000000 02000000 03000000 28000000
             02000000 6162 0000
             00 02 01 00 00 00 00 00
             04 00 00 00 01000000 03000000 06000000 01000000 00 00 00 00",
        )
        .unwrap();
        let packet = HeaderPacket::from_bytes(&bytes).unwrap();
        assert_eq!(packet.header.session_id, 1);
        assert_eq!(packet.context.as_deref(), Some(&b"ab"[..]));
        let Pdu::Get(get) = packet.pdu else {
            panic!("expected Get");
        };
        assert_eq!(get.ranges.len(), 2);
        assert_eq!(get.ranges[0].start, oid!(1, 3, 6, 1, 2));
        assert!(get.ranges[0].include);
        assert!(get.ranges[0].end.is_empty());
    }
}
