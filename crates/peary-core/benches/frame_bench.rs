//! Criterion benchmarks for the peary frame codec.
//!
//! Measures encoding and decoding latency for typical command and response
//! sizes, with and without the CRC-32 trailer.
//!
//! Run with:
//! ```bash
//! cargo bench --package peary-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use peary_core::protocol::{decode_frame, encode_frame, IntegrityMode, STATUS_OK};

// ── Payload fixtures ──────────────────────────────────────────────────────────

fn payloads() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("keep_alive", Vec::new()),
        ("command", b"device.power_on 0".to_vec()),
        ("device_list", b"alpha beta gamma delta epsilon".to_vec()),
        ("daq_block", vec![0xA5; 4088]),
    ]
}

const MODES: [(&str, IntegrityMode); 2] = [
    ("none", IntegrityMode::None),
    ("crc32", IntegrityMode::Crc32),
];

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_frame` for each payload size and integrity mode.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    for (mode_name, mode) in MODES {
        for (name, payload) in payloads() {
            group.bench_with_input(BenchmarkId::new(mode_name, name), &payload, |b, payload| {
                b.iter(|| {
                    encode_frame(black_box(payload), black_box(1), STATUS_OK, mode)
                        .expect("encode must succeed")
                })
            });
        }
    }
    group.finish();
}

/// Benchmarks `decode_frame` from pre-encoded bytes.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    for (mode_name, mode) in MODES {
        for (name, payload) in payloads() {
            let bytes = encode_frame(&payload, 1, STATUS_OK, mode)
                .expect("encode must succeed for benchmark setup");
            group.bench_with_input(BenchmarkId::new(mode_name, name), &bytes, |b, bytes| {
                b.iter(|| decode_frame(black_box(bytes), mode).expect("decode must succeed"))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
