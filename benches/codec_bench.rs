//! Performance benchmarks for SensorLineCodec.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fpgate_core::FingerprintId;
use fpgate_protocol::{Command, SensorLineCodec, parse_line};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

/// Output of a full verify exchange as the firmware prints it.
const VERIFY_EXCHANGE: &[u8] = b"V - Verify Fingerprint\r\n\
Place finger to verify...\r\n\
Image taken\r\n\
Image converted\r\n\
R,S,3,142,Fingerprint matched\r\n\
R,Y,0,0,Ready for next command\r\n";

/// Benchmark encoding a command.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    let command = Command::Enroll(FingerprintId::new(42).unwrap());

    group.bench_function("encode_enroll", |b| {
        b.iter(|| {
            let mut codec = SensorLineCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(command), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark parsing single lines of each class.
fn bench_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("response", &b"R,S,3,142,Fingerprint matched"[..]),
        ("info", &b"Place finger to verify..."[..]),
        ("discard", &b"Remove finger"[..]),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| black_box(parse_line(black_box(line))));
        });
    }

    group.finish();
}

/// Benchmark decoding a whole exchange from one buffer.
fn bench_decode_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_exchange");
    group.throughput(Throughput::Bytes(VERIFY_EXCHANGE.len() as u64));

    group.bench_function("verify_exchange", |b| {
        b.iter(|| {
            let mut codec = SensorLineCodec::new();
            let mut buffer = BytesMut::from(VERIFY_EXCHANGE);
            while let Some(outcome) = codec.decode(&mut buffer).unwrap() {
                black_box(outcome);
            }
        });
    });

    group.finish();
}

/// Benchmark decoding with the exchange arriving in small serial reads.
fn bench_decode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chunked");

    for chunk_size in [1usize, 8, 64].iter() {
        group.throughput(Throughput::Bytes(VERIFY_EXCHANGE.len() as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut codec = SensorLineCodec::new();
                    let mut buffer = BytesMut::new();
                    for chunk in VERIFY_EXCHANGE.chunks(chunk_size) {
                        buffer.extend_from_slice(chunk);
                        while let Some(outcome) = codec.decode(&mut buffer).unwrap() {
                            black_box(outcome);
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_parse_line,
    bench_decode_exchange,
    bench_decode_chunked
);
criterion_main!(benches);
