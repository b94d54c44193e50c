use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oabkit::CancelToken;
use oabkit::lzx::{decompress_full, decompress_patch};
use oabkit::oab::OabDecoder;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{LzxMode, full_container, patch_container, sample_directory};

fn bench_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzx_full");
    for records in [1_000usize, 10_000] {
        let oab = sample_directory(records).build();
        for (name, mode) in [
            ("stored", None),
            ("uncompressed", Some(LzxMode::Uncompressed)),
            ("verbatim", Some(LzxMode::Verbatim)),
        ] {
            let file = full_container(&oab, 0x8000, mode);
            group.throughput(Throughput::Bytes(oab.len() as u64));
            group.bench_with_input(BenchmarkId::new(name, records), &file, |b, file| {
                b.iter(|| decompress_full(black_box(file)).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzx_patch");
    for records in [1_000usize, 10_000] {
        let old = sample_directory(records).build();
        let new = sample_directory(records + records / 20).build();
        let patch = patch_container(&old, &new, LzxMode::Verbatim);
        group.throughput(Throughput::Bytes(new.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("verbatim", records),
            &(old, patch),
            |b, (old, patch)| {
                b.iter(|| decompress_patch(black_box(old), black_box(patch)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("oab_records");
    for records in [1_000usize, 10_000] {
        let oab = sample_directory(records).build();
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::new("decode", records), &oab, |b, oab| {
            b.iter(|| {
                let mut decoder = OabDecoder::from_bytes(oab.clone());
                let mut uids = 0usize;
                decoder
                    .decode(
                        |_, _| true,
                        |rec| {
                            uids += usize::from(rec.contact.uid().is_some());
                            Ok(())
                        },
                        &CancelToken::new(),
                    )
                    .unwrap();
                black_box(uids)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full, bench_patch, bench_records);
criterion_main!(benches);
