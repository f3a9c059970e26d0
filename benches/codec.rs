//! AgentX codec and request round-trip benchmarks.
//!
//! Encoding and decoding sit on the hot path of every request and every
//! master-initiated query; the round-trip group adds the dispatcher and
//! transport tasks on top.

use async_agentx::pdu::{Get, Response, SearchRange};
use async_agentx::testing::MockMaster;
use async_agentx::{Client, ClientConfig, HeaderPacket, Oid, Pdu, Value, VarBind, oid};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio::runtime::Runtime;

/// Responses of increasing size, as a master would send for a Get.
fn responses() -> Vec<(usize, HeaderPacket)> {
    [1usize, 10, 50]
        .into_iter()
        .map(|n| {
            let varbinds = (0..n as u32)
                .map(|i| {
                    VarBind::new(
                        oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, i),
                        Value::Counter64(u64::from(i) * 1_000_003),
                    )
                })
                .collect();
            let mut packet = HeaderPacket::new(Response::new(varbinds)).session(7);
            packet.header.packet_id = n as u32;
            (n, packet)
        })
        .collect()
}

fn bench_oid_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("oid_parse");

    let oid_strings = [
        ("short", "1.3.6.1"),
        ("medium", "1.3.6.1.2.1.1.1.0"),
        ("long", "1.3.6.1.4.1.9.9.42.1.2.3.4.5.6.7.8.9.10"),
    ];

    for (name, s) in oid_strings {
        group.bench_with_input(BenchmarkId::new("parse", name), s, |b, s| {
            b.iter(|| black_box(Oid::parse(s).unwrap()))
        });
    }

    group.finish();
}

fn bench_packet_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode");

    for (n, packet) in responses() {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("response", n), &packet, |b, packet| {
            b.iter(|| black_box(packet.encode().unwrap()))
        });
    }

    let get = HeaderPacket::new(Get {
        ranges: vec![SearchRange::exact(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))],
    })
    .session(7)
    .context("vrf-red");
    group.bench_function("get_with_context", |b| b.iter(|| black_box(get.encode().unwrap())));

    group.finish();
}

fn bench_packet_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");

    for (n, packet) in responses() {
        let frame = packet.encode().unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("response", n), &frame, |b, frame| {
            b.iter(|| black_box(HeaderPacket::from_bytes(frame).unwrap()))
        });
    }

    group.finish();
}

/// Ping round-trip through the dispatcher against an in-memory master.
fn bench_request_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let client = rt.block_on(async {
        let (stream, mut master) = MockMaster::pair();
        tokio::spawn(async move {
            while let Ok(request) = master.recv().await {
                if master.ack(&request).await.is_err() {
                    break;
                }
            }
        });
        Client::from_stream(stream, ClientConfig::default())
    });

    c.bench_function("request_roundtrip/ping", |b| {
        b.to_async(&rt).iter(|| async {
            let reply = client.request(HeaderPacket::new(Pdu::Ping)).await.unwrap();
            black_box(reply)
        })
    });

    client.close();
}

criterion_group!(
    benches,
    bench_oid_parse,
    bench_packet_encode,
    bench_packet_decode,
    bench_request_roundtrip,
);
criterion_main!(benches);
