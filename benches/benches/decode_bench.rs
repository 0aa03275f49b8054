use std::io::Cursor;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use palraw_core::{decode_body, decode_bytes, BodyEncoder, BodyLayout, FrameReader, HeaderBuilder};
use palraw_types::{CompressionMode, FileVariant, Triplet};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Сутки записи при 20 Гц: покой с короткими всплесками движения.
fn day_body() -> (Vec<u8>, u64) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut enc = BodyEncoder::new(CompressionMode::RunLength, FileVariant::Datx).unwrap();
    let rest = Triplet::new(127, 127, 190);

    for _ in 0..24 * 3600 * 20 {
        let t = if rng.gen_bool(0.05) {
            Triplet::new(rng.gen(), rng.gen(), rng.gen())
        } else {
            rest
        };
        enc.push(t).unwrap();
    }

    let samples = enc.samples();
    (enc.finish(), samples)
}

fn decode_performance(c: &mut Criterion) {
    let (body, samples) = day_body();
    let layout = BodyLayout::run_length();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(samples));

    group.bench_function("bulk", |b| {
        b.iter(|| decode_body(black_box(&body), &layout).unwrap().len())
    });

    group.bench_function("lazy", |b| {
        b.iter(|| {
            FrameReader::new(Cursor::new(black_box(&body[..])), layout)
                .filter_map(Result::ok)
                .count()
        })
    });

    group.finish();
}

fn load_performance(c: &mut Criterion) {
    let (body, _) = day_body();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let mut raw = HeaderBuilder::new(FileVariant::Datx, 20, start)
        .build()
        .unwrap();
    raw.extend_from_slice(&body);

    c.bench_function("decode_bytes_with_timestamps", |b| {
        b.iter_batched(
            || raw.clone(),
            |raw| decode_bytes(&raw, FileVariant::Datx).unwrap(),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, decode_performance, load_performance);
criterion_main!(benches);
