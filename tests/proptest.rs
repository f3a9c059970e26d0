//! Property-based tests for the AgentX wire codec.
//!
//! Every PDU variant round-trips through `HeaderPacket::encode` and
//! `HeaderPacket::from_bytes`, headers round-trip in both byte orders, and
//! arbitrary input never panics the decoder.

use async_agentx::oid::Oid;
use async_agentx::pdu::{
    AddAgentCaps, Close, CloseReason, Get, GetBulk, GetNext, HEADER_SIZE, Header, IndexAllocate,
    IndexDeallocate, Notify, Open, Register, RegisterRange, RemoveAgentCaps, Response,
    SearchRange, TestSet, Timeout, Unregister,
};
use async_agentx::value::Value;
use async_agentx::varbind::VarBind;
use async_agentx::{ErrorStatus, Flags, HeaderPacket, Pdu};
use bytes::Bytes;
use proptest::prelude::*;

// =============================================================================
// Arbitrary Implementations
// =============================================================================

/// Strategy for OIDs within the 128 sub-identifier limit.
///
/// Half of the generated OIDs start with 1.3.6.1 so that the prefix
/// compression path is exercised as often as the plain one.
fn arb_oid() -> impl Strategy<Value = Oid> {
    prop_oneof![
        Just(Oid::empty()),
        prop::collection::vec(any::<u32>(), 1..=128).prop_map(|arcs| Oid::new(arcs)),
        (any::<u8>(), prop::collection::vec(any::<u32>(), 0..=123)).prop_map(|(prefix, rest)| {
            let mut arcs = vec![1, 3, 6, 1, u32::from(prefix)];
            arcs.extend(rest);
            Oid::new(arcs)
        }),
    ]
}

/// Strategy for generating arbitrary byte data (for OctetString, Opaque, contexts).
fn arb_bytes() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=64).prop_map(Bytes::from)
}

/// Strategy for every Value variant, exceptions included.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        arb_bytes().prop_map(Value::OctetString),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        arb_bytes().prop_map(Value::Opaque),
        any::<u64>().prop_map(Value::Counter64),
        Just(Value::NoSuchObject),
        Just(Value::NoSuchInstance),
        Just(Value::EndOfMibView),
    ]
}

fn arb_varbind() -> impl Strategy<Value = VarBind> {
    (arb_oid(), arb_value()).prop_map(|(oid, value)| VarBind::new(oid, value))
}

fn arb_varbinds() -> impl Strategy<Value = Vec<VarBind>> {
    prop::collection::vec(arb_varbind(), 0..=8)
}

fn arb_ranges() -> impl Strategy<Value = Vec<SearchRange>> {
    prop::collection::vec(
        (arb_oid(), arb_oid(), any::<bool>())
            .prop_map(|(start, end, include)| SearchRange::new(start, end, include)),
        0..=8,
    )
}

fn arb_register_range() -> impl Strategy<Value = Option<RegisterRange>> {
    prop::option::of(
        (1u8..=u8::MAX, any::<u32>())
            .prop_map(|(subid, upper_bound)| RegisterRange { subid, upper_bound }),
    )
}

/// Strategy covering all 18 PDU variants.
fn arb_pdu() -> impl Strategy<Value = Pdu> {
    prop_oneof![
        (any::<u8>(), arb_oid(), arb_bytes()).prop_map(|(secs, id, description)| {
            Pdu::Open(Open {
                timeout: Timeout::from_secs(secs),
                id,
                description,
            })
        }),
        any::<u8>().prop_map(|r| Pdu::Close(Close {
            reason: CloseReason::from_u8(r)
        })),
        (any::<u8>(), any::<u8>(), arb_oid(), arb_register_range()).prop_map(
            |(secs, priority, subtree, range)| Pdu::Register(Register {
                timeout: Timeout::from_secs(secs),
                priority,
                subtree,
                range,
            })
        ),
        (any::<u8>(), any::<u8>(), arb_oid(), arb_register_range()).prop_map(
            |(secs, priority, subtree, range)| Pdu::Unregister(Unregister {
                timeout: Timeout::from_secs(secs),
                priority,
                subtree,
                range,
            })
        ),
        arb_ranges().prop_map(|ranges| Pdu::Get(Get { ranges })),
        arb_ranges().prop_map(|ranges| Pdu::GetNext(GetNext { ranges })),
        (any::<u16>(), any::<u16>(), arb_ranges()).prop_map(
            |(non_repeaters, max_repetitions, ranges)| Pdu::GetBulk(GetBulk {
                non_repeaters,
                max_repetitions,
                ranges,
            })
        ),
        arb_varbinds().prop_map(|varbinds| Pdu::TestSet(TestSet { varbinds })),
        Just(Pdu::CommitSet),
        Just(Pdu::UndoSet),
        Just(Pdu::CleanupSet),
        arb_varbinds().prop_map(|varbinds| Pdu::Notify(Notify { varbinds })),
        Just(Pdu::Ping),
        arb_varbinds().prop_map(|varbinds| Pdu::IndexAllocate(IndexAllocate { varbinds })),
        arb_varbinds().prop_map(|varbinds| Pdu::IndexDeallocate(IndexDeallocate { varbinds })),
        (arb_oid(), arb_bytes())
            .prop_map(|(id, description)| Pdu::AddAgentCaps(AddAgentCaps { id, description })),
        arb_oid().prop_map(|id| Pdu::RemoveAgentCaps(RemoveAgentCaps { id })),
        (any::<u32>(), any::<u16>(), any::<u16>(), arb_varbinds()).prop_map(
            |(sys_uptime, error, index, varbinds)| Pdu::Response(Response {
                sys_uptime,
                error: ErrorStatus::from_u16(error),
                index,
                varbinds,
            })
        ),
    ]
}

/// A packet with arbitrary ids and, where the type allows it, a context.
fn arb_packet() -> impl Strategy<Value = HeaderPacket> {
    (
        arb_pdu(),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        prop::option::of(arb_bytes()),
    )
        .prop_map(|(pdu, session_id, transaction_id, packet_id, context)| {
            let allows_context = pdu.pdu_type().has_context();
            let mut packet = HeaderPacket::new(pdu).session(session_id);
            packet.header.transaction_id = transaction_id;
            packet.header.packet_id = packet_id;
            match context {
                Some(context) if allows_context => packet.context(context),
                _ => packet,
            }
        })
}

// =============================================================================
// Codec round-trip tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn packet_roundtrip(packet in arb_packet()) {
        let bytes = packet.encode().expect("encode");
        let decoded = HeaderPacket::from_bytes(&bytes).expect("decode");

        prop_assert_eq!(&decoded.pdu, &packet.pdu);
        prop_assert_eq!(&decoded.context, &packet.context);
        prop_assert_eq!(decoded.header.session_id, packet.header.session_id);
        prop_assert_eq!(decoded.header.transaction_id, packet.header.transaction_id);
        prop_assert_eq!(decoded.header.packet_id, packet.header.packet_id);
        prop_assert_eq!(decoded.header.payload_length as usize, bytes.len() - HEADER_SIZE);
        prop_assert!(decoded.header.flags.contains(Flags::NETWORK_BYTE_ORDER));
        prop_assert_eq!(
            decoded.header.flags.contains(Flags::NON_DEFAULT_CONTEXT),
            packet.context.is_some()
        );
    }

    #[test]
    fn packet_encoding_is_aligned(packet in arb_packet()) {
        let bytes = packet.encode().expect("encode");
        prop_assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn header_roundtrip(
        type_code in any::<u8>(),
        flags in any::<u8>(),
        session_id in any::<u32>(),
        transaction_id in any::<u32>(),
        packet_id in any::<u32>(),
        payload_length in any::<u32>(),
    ) {
        let header = Header {
            version: 1,
            type_code,
            flags: Flags::from_bits(flags),
            session_id,
            transaction_id,
            packet_id,
            payload_length,
        };
        let bytes = header.encode();
        prop_assert_eq!(Header::decode(&bytes).expect("decode"), header);
    }

    #[test]
    fn oid_display_parse_roundtrip(oid in arb_oid()) {
        let parsed = Oid::parse(&oid.to_string()).expect("parse should succeed");
        prop_assert_eq!(oid, parsed);
    }
}

// =============================================================================
// Robustness
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn decode_arbitrary_bytes_no_panic(data in prop::collection::vec(any::<u8>(), 0..=256)) {
        let _ = HeaderPacket::from_bytes(&data);
    }

    #[test]
    fn decode_valid_header_random_body_no_panic(
        type_code in 1u8..=18,
        flags in any::<u8>(),
        body in prop::collection::vec(any::<u8>(), 0..=128),
    ) {
        let header = Header {
            version: 1,
            type_code,
            flags: Flags::from_bits(flags),
            session_id: 1,
            transaction_id: 0,
            packet_id: 1,
            payload_length: body.len() as u32,
        };
        let _ = HeaderPacket::decode(header, Bytes::from(body));
    }

    #[test]
    fn truncated_packet_is_rejected(packet in arb_packet(), cut in 1usize..=16) {
        let bytes = packet.encode().expect("encode");
        let cut = cut.min(bytes.len() - HEADER_SIZE);
        prop_assume!(cut > 0);
        prop_assert!(HeaderPacket::from_bytes(&bytes[..bytes.len() - cut]).is_err());
    }
}
