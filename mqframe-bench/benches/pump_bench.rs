//! Write path and end-to-end pump benchmarks.

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mqframe_buffer::{BufferPort, RingBuffer};
use mqframe_protocol::{Packet, Publish, QoS};
use mqframe_server::{Connection, ConnectionConfig, FrameWriter, Transport};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;

fn publish(payload_size: usize) -> Packet {
    Publish::new("bench/topic", QoS::AtMostOnce, Bytes::from(vec![7u8; payload_size])).into()
}

fn bench_writer(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("frame_writer");

    for size in [64, 1024, 16384] {
        let packet = publish(size);
        group.throughput(Throughput::Bytes(packet.encoded_len() as u64));

        // Ring is drained after every write, so each frame is encoded in place.
        let output = Arc::new(RingBuffer::new(256 * 1024));
        let writer = FrameWriter::new(output.clone());
        group.bench_with_input(BenchmarkId::new("in_place", size), &packet, |b, packet| {
            b.to_async(&rt).iter(|| {
                let (writer, output) = (&writer, &output);
                async move {
                    writer.write(packet).await.unwrap();
                    let mut sink = tokio::io::sink();
                    output.write_to(&mut sink).await.unwrap();
                }
            });
        });

        // A ring just larger than one frame, with three bytes always left
        // behind, so the tail shifts every round and most writes wrap.
        let len = packet.encoded_len();
        let output = Arc::new(RingBuffer::new(len + 7));
        rt.block_on(output.write(&[0u8; 3])).unwrap();
        let writer = FrameWriter::new(output.clone());
        group.bench_with_input(BenchmarkId::new("wrapped", size), &packet, |b, packet| {
            b.to_async(&rt).iter(|| {
                let (writer, output) = (&writer, &output);
                async move {
                    writer.write(packet).await.unwrap();
                    let mut chunk = [0u8; 4096];
                    let mut left = len;
                    while left > 0 {
                        left -= output.read(&mut chunk[..left.min(4096)]).await.unwrap();
                    }
                }
            });
        });
    }

    group.finish();
}

fn bench_duplex_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("duplex_roundtrip");

    for size in [64, 4096] {
        let packet = publish(size);
        let encoded = packet.to_bytes().unwrap();
        group.throughput(Throughput::Elements(1));

        let config = ConnectionConfig {
            keep_alive_secs: 0,
            ..Default::default()
        };
        let (conn, mut reader, mut client) = rt.block_on(async {
            let (conn, reader) = Connection::new(&config);
            let (server, client) = tokio::io::duplex(64 * 1024);
            conn.start(Transport::Stream(server)).unwrap();
            (conn, reader, client)
        });

        // client -> receiver -> reader, then writer -> sender -> client
        let mut echoed = vec![0u8; encoded.len()];
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                rt.block_on(async {
                    client.write_all(&encoded).await.unwrap();
                    let inbound = reader.next_packet().await.unwrap();
                    conn.write_packet(&inbound).await.unwrap();
                    client.read_exact(&mut echoed).await.unwrap();
                })
            });
        });

        conn.close();
    }

    group.finish();
}

criterion_group!(benches, bench_writer, bench_duplex_roundtrip);
criterion_main!(benches);
