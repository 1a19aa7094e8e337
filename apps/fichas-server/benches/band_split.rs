//! Band Splitting Benchmarks
//!
//! Decode + crop + JPEG encode of one scanned sheet, and the storage
//! re-encode of one band.
//!
//! Run with: `cargo bench --bench band_split`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use std::time::Duration;

use fichas_server::imaging::{split_into_bands, StorageEncoding};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Synthetic scan with some texture so JPEG has work to do
fn create_scan(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = ((x * 7 + y * 13) % 255) as u8;
        Rgb([v, 255 - v, (x % 255) as u8])
    });

    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("Failed to encode scan");
    buffer
}

/// Benchmark splitting sheets of increasing size
fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("band_split");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for (width, height) in [(620u32, 877u32), (1240, 1754)] {
        let scan = create_scan(width, height);
        group.throughput(Throughput::Bytes(scan.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("split_into_bands", format!("{}x{}", width, height)),
            &scan,
            |b, data| {
                b.iter(|| {
                    let bands = split_into_bands(black_box(data), 92).expect("Failed to split");
                    black_box(bands)
                })
            },
        );
    }

    group.finish();
}

/// Benchmark re-encoding one band for storage
fn bench_storage_encoding(c: &mut Criterion) {
    let scan = create_scan(1240, 1754);
    let band = split_into_bands(&scan, 92).expect("Failed to split")[0].data.clone();

    let mut group = c.benchmark_group("storage_encoding");
    group.throughput(Throughput::Bytes(band.len() as u64));

    for encoding in [StorageEncoding::Jpeg { quality: 80 }, StorageEncoding::Webp] {
        group.bench_with_input(
            BenchmarkId::new("reencode", encoding.extension()),
            &band,
            |b, data| {
                b.iter(|| {
                    let out = encoding.reencode(black_box(data)).expect("Failed to encode");
                    black_box(out)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_split, bench_storage_encoding);
criterion_main!(benches);
