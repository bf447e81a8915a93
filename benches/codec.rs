//! Benchmarks for record encoding and decoding
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mimic_rs::{codec, Angles, Bookmark, CorrectionEntry, CorrectionFlags, Frame, Record, Vec3};

/// Build a record resembling a real run: an origin correction every
/// `interval` frames and a weapon switch every 500.
fn synthetic_record(frames: usize, interval: usize) -> Record {
    let mut out = Vec::with_capacity(frames);
    let mut corrections = Vec::new();

    for i in 0..frames {
        let t = i as f32;
        let origin = Vec3::new(t * 3.9, (t * 0.05).sin() * 40.0, 64.0);
        let mut frame = Frame {
            buttons: (i as u64) & 0x1f,
            actual_velocity: Vec3::new(250.0, 0.0, 0.0),
            predicted_velocity: Vec3::new(250.0, 0.0, 0.0),
            predicted_angles: Angles::new(0.0, t * 0.1, 0.0),
            origin,
            seed: i as i32,
            ..Default::default()
        };
        if i % 500 == 0 {
            frame.new_weapon = Some(if i % 1000 == 0 { "weapon_ak47" } else { "weapon_knife" }.into());
        }
        if i % interval == 0 {
            frame.correction = CorrectionFlags::ORIGIN;
            corrections.push(CorrectionEntry::origin_only(origin));
        }
        out.push(frame);
    }

    let bookmarks = vec![Bookmark {
        frame: 0,
        correction_index: 0,
        name: "start".into(),
    }];
    Record::new("bench", 1_700_000_000, Vec3::ZERO, Angles::default(), out, corrections, bookmarks)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for frames in [640, 6_400, 64_000].iter() {
        let record = synthetic_record(*frames, 64);
        group.throughput(Throughput::Elements(*frames as u64));
        group.bench_with_input(BenchmarkId::new("record", frames), &record, |b, record| {
            b.iter(|| black_box(codec::encode(record).ok()));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for frames in [640, 6_400, 64_000].iter() {
        let Ok(bytes) = codec::encode(&synthetic_record(*frames, 64)) else {
            continue;
        };
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("full", frames), &bytes, |b, bytes| {
            b.iter(|| black_box(codec::decode(bytes).ok()));
        });
        group.bench_with_input(BenchmarkId::new("header", frames), &bytes, |b, bytes| {
            b.iter(|| black_box(codec::decode_header(bytes).ok()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
