//! Sleet benchmark suite.
//!
//! Benchmarks for key operations:
//! - Chunked CSV extraction
//! - The transform stage (de-duplication, conversion, tagging)
//! - Staging a partition to disk

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

mod bench_utils;

use sleet::config::{Destination, SourceConfig};
use sleet::load::BatchStager;
use sleet::partition::partition;
use sleet::source::{CsvExtractor, CsvExtractorConfig};
use sleet::transform::TransformJob;

/// Benchmarks for CSV extraction at different chunk sizes.
fn extract_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let size = 50_000;
    let (dir, name) = bench_utils::generate_csv_file(size);
    group.throughput(Throughput::Elements(size as u64));

    for chunk_size in [1_000, 10_000, 100_000] {
        let source = SourceConfig {
            input_dir: dir.path().to_path_buf(),
            chunk_size,
            ..SourceConfig::default()
        };
        let extractor = CsvExtractor::new(CsvExtractorConfig::from(&source));

        group.bench_with_input(
            BenchmarkId::new("chunked", chunk_size),
            &name,
            |b, name| {
                b.iter(|| extractor.extract(name).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmarks for the transform stage.
///
/// Each iteration runs on a fresh copy of the extracted set since the
/// cleaners mutate it in place.
fn transform_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let schema = bench_utils::benchmark_schema();

    for size in [1_000, 10_000, 100_000] {
        let records = bench_utils::generate_record_set(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("run", size), &records, |b, records| {
            b.iter_batched(
                || records.clone(),
                |mut set| {
                    TransformJob::new(&schema).run(&mut set).unwrap();
                    set
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmarks for staging the valid partition.
fn staging_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("staging");
    let schema = bench_utils::benchmark_schema();
    let destination = Destination {
        table_name: "users".to_string(),
        field_list: schema.fields.keys().cloned().collect(),
        separator: ',',
    };
    let dir = tempfile::TempDir::new().unwrap();

    for size in [10_000, 100_000] {
        let mut records = bench_utils::generate_record_set(size);
        TransformJob::new(&schema).run(&mut records).unwrap();
        let valid = partition(records).valid;
        group.throughput(Throughput::Elements(valid.len() as u64));

        for chunk_size in [1_000, 100_000] {
            let stager = BatchStager::new(dir.path(), chunk_size);
            group.bench_with_input(
                BenchmarkId::new(format!("chunk_{chunk_size}"), size),
                &valid,
                |b, valid| {
                    b.iter(|| stager.stage("valid", valid, &destination).unwrap());
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    extract_benchmarks,
    transform_benchmarks,
    staging_benchmarks,
);
criterion_main!(benches);
