//! Benchmark utilities for generating test data.

use rand::Rng;
use sleet::config::{FieldKind, FieldRule, SchemaConfig};
use sleet::record::{Record, RecordSet, Value};
use std::io::Write;

/// Columns of the generated data, in header order.
pub const COLUMNS: [&str; 5] = ["id", "email", "country", "signup", "last_seen"];

/// Returns a realistic schema for benchmarking.
///
/// - email: plain, not null
/// - signup: date `%Y-%m-%d`, not null
/// - last_seen: datetime `%Y-%m-%d %H:%M:%S`, nullable
pub fn benchmark_schema() -> SchemaConfig {
    SchemaConfig {
        fields: [
            ("id".to_string(), FieldRule::plain(false)),
            ("email".to_string(), FieldRule::plain(true)),
            (
                "signup".to_string(),
                FieldRule::typed(FieldKind::Date, "%Y-%m-%d", true),
            ),
            (
                "last_seen".to_string(),
                FieldRule::typed(FieldKind::Datetime, "%Y-%m-%d %H:%M:%S", false),
            ),
        ]
        .into_iter()
        .collect(),
    }
}

/// Generate rows of raw cells matching [`COLUMNS`].
///
/// About 5% of emails are missing, 2% of dates are malformed, and dates
/// repeat heavily so the converter cache sees realistic hit rates.
pub fn generate_rows(count: usize) -> Vec<[String; 5]> {
    let mut rng = rand::thread_rng();
    let countries = ["DE", "FR", "NL", "SG", "US"];

    (0..count)
        .map(|i| {
            let email = if rng.gen_bool(0.05) {
                String::new()
            } else {
                format!("user{i}@example.com")
            };
            let signup = if rng.gen_bool(0.02) {
                "not a date".to_string()
            } else {
                format!(
                    "2024-{:02}-{:02}",
                    rng.gen_range(1..=12),
                    rng.gen_range(1..=28)
                )
            };
            let last_seen = format!(
                "2025-01-{:02} {:02}:{:02}:{:02}",
                rng.gen_range(1..=31),
                rng.gen_range(0..24),
                rng.gen_range(0..60),
                rng.gen_range(0..60)
            );
            [
                i.to_string(),
                email,
                countries[rng.gen_range(0..countries.len())].to_string(),
                signup,
                last_seen,
            ]
        })
        .collect()
}

/// Build an extracted record set from generated rows.
pub fn generate_record_set(count: usize) -> RecordSet {
    let mut set = RecordSet::new(COLUMNS.iter().map(|c| c.to_string()).collect());
    for row in generate_rows(count) {
        let values = row
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::from(cell.as_str())
                }
            })
            .collect();
        set.push(Record::new(values));
    }
    set
}

/// Write generated rows as a CSV file with a header row.
/// Returns the temporary directory and the file name inside it.
pub fn generate_csv_file(count: usize) -> (tempfile::TempDir, String) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let name = "bench.csv".to_string();
    let mut file =
        std::fs::File::create(dir.path().join(&name)).expect("Failed to create bench file");

    writeln!(file, "{}", COLUMNS.join(",")).expect("Failed to write header");
    for row in generate_rows(count) {
        writeln!(file, "{}", row.join(",")).expect("Failed to write row");
    }
    (dir, name)
}
