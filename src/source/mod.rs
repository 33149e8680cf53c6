//! Extraction of the input file into a record set.
//!
//! Reads a delimited file with a header row in fixed-size chunks and
//! concatenates the chunks into one ordered [`RecordSet`](crate::record::RecordSet).

pub mod reader;

pub use reader::{CsvExtractor, CsvExtractorConfig};
