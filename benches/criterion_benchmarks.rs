use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxibsdiff::compress::CompressorType;
use oxibsdiff::diff::{self, DiffOptions};
use oxibsdiff::patch;
use oxibsdiff::suffix::{SuffixArrayIndex, SuffixCache};
use oxibsdiff::writer::{BsdiffPatchWriter, WriterOptions};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn make_patch(old: &[u8], new: &[u8], options: WriterOptions) -> Vec<u8> {
    diff::diff_to_vec(old, new, &options).unwrap()
}

fn backends() -> Vec<WriterOptions> {
    let mut out = vec![WriterOptions::default()];
    for kind in [
        CompressorType::None,
        CompressorType::Zlib,
        CompressorType::Brotli,
        CompressorType::Lzma,
    ] {
        if kind.is_available() {
            out.push(WriterOptions::bsdf2(kind));
        }
    }
    out
}

fn write_ratio_snapshot() {
    let old = gen_data(1024 * 1024, 123);
    let new = mutate(&old, 4096);
    let mut csv = String::from("format,compressor,patch_bytes,new_bytes,ratio\n");
    for options in backends() {
        let delta = make_patch(&old, &new, options);
        let ratio = delta.len() as f64 / new.len() as f64;
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            options.format,
            options.compressor,
            delta.len(),
            new.len(),
            ratio
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_suffix_array(c: &mut Criterion) {
    let mut g = c.benchmark_group("suffix_array_build");
    for size in [64 * 1024usize, 1024 * 1024, 4 * 1024 * 1024] {
        let old = gen_data(size, 1);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(SuffixArrayIndex::build(black_box(&old)).unwrap()));
        });
    }
    g.finish();
}

fn bench_diff_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_speed_mb_s");
    g.sample_size(10);
    for size in [64 * 1024usize, 1024 * 1024, 4 * 1024 * 1024] {
        let old = gen_data(size, 2);
        let new = mutate(&old, 1024);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let delta = make_patch(black_box(&old), black_box(&new), WriterOptions::default());
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_diff_cached_index(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_with_cached_index");
    g.sample_size(10);
    let old = gen_data(1024 * 1024, 3);
    let new = mutate(&old, 1024);
    let index = SuffixArrayIndex::build(&old).unwrap();
    let options = WriterOptions::bsdf2(CompressorType::None);
    g.throughput(Throughput::Bytes(new.len() as u64));
    g.bench_function("borrowed_index", |b| {
        b.iter(|| {
            let mut writer = BsdiffPatchWriter::new(Vec::new(), options).unwrap();
            diff::bsdiff(
                &old,
                &new,
                &mut writer,
                SuffixCache::Borrowed(&index),
                &DiffOptions::default(),
            )
            .unwrap();
            black_box(writer.into_inner());
        });
    });
    g.finish();
}

fn bench_patch_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("patch_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 4 * 1024 * 1024] {
        let old = gen_data(size, 4);
        let new = mutate(&old, 2048);
        let delta = make_patch(&old, &new, WriterOptions::default());
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = patch::apply(black_box(&old), black_box(&delta)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_backends(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("diff_by_backend");
    g.sample_size(10);
    let old = gen_data(1024 * 1024, 5);
    let new = mutate(&old, 4096);
    for options in backends() {
        let label = format!("{}_{}", options.format, options.compressor);
        g.bench_function(label, |b| {
            b.iter(|| {
                let delta = make_patch(&old, &new, options);
                let ratio = delta.len() as f64 / new.len() as f64;
                black_box(ratio);
            });
        });
    }
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    g.sample_size(10);
    let scenarios = [
        ("software_update", 2 * 1024 * 1024usize, 1024usize),
        ("document_versioning", 512 * 1024usize, 256usize),
        ("database_snapshot", 4 * 1024 * 1024usize, 4096usize),
    ];

    for (name, size, stride) in scenarios {
        let old = gen_data(size, size as u64);
        let new = mutate(&old, stride);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let delta = make_patch(&old, &new, WriterOptions::default());
                let out = patch::apply(&old, &delta).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_suffix_array,
    bench_diff_speed,
    bench_diff_cached_index,
    bench_patch_speed,
    bench_backends,
    bench_real_world_scenarios
);
criterion_main!(benches);
