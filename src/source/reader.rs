//! Chunked CSV extractor.
//!
//! Reads the input file `chunk_size` rows at a time so the reader's own
//! buffers stay bounded, appending every chunk to a single record set.

use snafu::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::emit;
use crate::error::{ExtractError, OpenInputSnafu, ReadCsvSnafu, ReservedColumnSnafu};
use crate::metrics::events::{ExtractCompleted, RecordsExtracted};
use crate::record::{Record, RecordSet, VALIDITY_FIELD, Value};

/// Configuration for the CSV extractor.
#[derive(Debug, Clone)]
pub struct CsvExtractorConfig {
    /// Directory input file names are resolved against.
    pub input_dir: PathBuf,
    /// Field delimiter.
    pub delimiter: u8,
    /// Rows per chunk.
    pub chunk_size: usize,
    /// Cell contents read as null.
    pub null_values: HashSet<String>,
}

impl From<&SourceConfig> for CsvExtractorConfig {
    fn from(config: &SourceConfig) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            // validated as ASCII when the config was loaded
            delimiter: config.delimiter as u8,
            chunk_size: config.chunk_size.max(1),
            null_values: config.null_values.iter().cloned().collect(),
        }
    }
}

/// Reads a delimited file with a header row into a [`RecordSet`].
pub struct CsvExtractor {
    config: CsvExtractorConfig,
}

impl CsvExtractor {
    pub fn new(config: CsvExtractorConfig) -> Self {
        Self { config }
    }

    /// Path `file_name` resolves to.
    pub fn input_path(&self, file_name: &str) -> PathBuf {
        self.config.input_dir.join(file_name)
    }

    /// Read `file_name` from the input directory.
    pub fn extract(&self, file_name: &str) -> Result<RecordSet, ExtractError> {
        self.extract_path(&self.input_path(file_name))
    }

    /// Read the file at `path`.
    pub fn extract_path(&self, path: &Path) -> Result<RecordSet, ExtractError> {
        let shown = path.display().to_string();
        let start = Instant::now();

        let file = File::open(path).context(OpenInputSnafu { path: &shown })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .context(ReadCsvSnafu { path: &shown })?
            .iter()
            .map(String::from)
            .collect();
        if let Some(column) = columns.iter().find(|c| *c == VALIDITY_FIELD) {
            return ReservedColumnSnafu {
                column,
                path: shown,
            }
            .fail();
        }

        let mut records = RecordSet::new(columns);
        let mut row = csv::StringRecord::new();
        let mut chunks = 0usize;
        loop {
            let mut chunk = Vec::with_capacity(self.config.chunk_size);
            while chunk.len() < self.config.chunk_size
                && reader
                    .read_record(&mut row)
                    .context(ReadCsvSnafu { path: &shown })?
            {
                chunk.push(Record::new(row.iter().map(|cell| self.cell(cell)).collect()));
            }

            if chunk.is_empty() {
                break;
            }
            chunks += 1;
            let read = chunk.len();
            emit!(RecordsExtracted { count: read as u64 });
            debug!("[chunk {}] {} rows from {}", chunks, read, shown);
            records.extend(chunk);

            if read < self.config.chunk_size {
                break;
            }
        }

        emit!(ExtractCompleted {
            duration: start.elapsed()
        });
        info!(
            "Extracted {} records ({} columns, {} chunks) from {}",
            records.len(),
            records.columns().len(),
            chunks,
            shown
        );
        Ok(records)
    }

    fn cell(&self, raw: &str) -> Value {
        if self.config.null_values.contains(raw) {
            Value::Null
        } else {
            Value::Text(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn extractor(dir: &TempDir, chunk_size: usize) -> CsvExtractor {
        let source = SourceConfig {
            input_dir: dir.path().to_path_buf(),
            chunk_size,
            ..SourceConfig::default()
        };
        CsvExtractor::new(CsvExtractorConfig::from(&source))
    }

    fn write(dir: &TempDir, name: &str, content: &str) {
        let mut file = File::create(dir.path().join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_chunks_concatenate_in_order() {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("id,name\n");
        for i in 0..7 {
            content.push_str(&format!("{i},user{i}\n"));
        }
        write(&dir, "users.csv", &content);

        let set = extractor(&dir, 3).extract("users.csv").unwrap();
        assert_eq!(set.len(), 7);
        assert_eq!(set.columns(), ["id", "name"]);
        for i in 0..7 {
            assert_eq!(set.value(i, "id"), Some(&Value::Text(i.to_string())));
        }
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let dir = TempDir::new().unwrap();
        write(&dir, "four.csv", "a\n1\n2\n3\n4\n");
        assert_eq!(extractor(&dir, 2).extract("four.csv").unwrap().len(), 4);
    }

    #[test]
    fn test_null_markers() {
        let dir = TempDir::new().unwrap();
        write(&dir, "nulls.csv", "a,b,c\n,NA,\"\"\nx,null,keep\n");

        let set = extractor(&dir, 100).extract("nulls.csv").unwrap();
        assert!(set.value(0, "a").unwrap().is_null());
        assert!(set.value(0, "b").unwrap().is_null());
        assert!(set.value(0, "c").unwrap().is_null());
        assert_eq!(set.value(1, "a"), Some(&Value::from("x")));
        assert!(set.value(1, "b").unwrap().is_null());
        assert_eq!(set.value(1, "c"), Some(&Value::from("keep")));
    }

    #[test]
    fn test_header_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "empty.csv", "id,email\n");

        let set = extractor(&dir, 100).extract("empty.csv").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.columns(), ["id", "email"]);
    }

    #[test]
    fn test_reserved_column_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "tagged.csv", "id,_is_valid\n1,true\n");

        let err = extractor(&dir, 100).extract("tagged.csv").unwrap_err();
        assert!(matches!(err, ExtractError::ReservedColumn { .. }));
    }

    #[test]
    fn test_ragged_row_is_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ragged.csv", "a,b\n1,2\n3\n");

        let err = extractor(&dir, 100).extract("ragged.csv").unwrap_err();
        assert!(matches!(err, ExtractError::ReadCsv { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = extractor(&dir, 100).extract("nope.csv").unwrap_err();
        assert!(matches!(err, ExtractError::OpenInput { .. }));
    }
}
