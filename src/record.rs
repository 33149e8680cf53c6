//! In-memory record set threaded through every stage of a run.
//!
//! A [`RecordSet`] holds the input header and one [`Record`] per data row.
//! Every record carries the synthetic validity tag next to its values; the
//! tag is not a column and is never serialized.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Identifier reserved for the validity tag.
///
/// Neither schema fields nor input columns may use it.
pub const VALIDITY_FIELD: &str = "_is_valid";

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Text(String),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as it is written to a staged batch.
    ///
    /// Nulls are empty. Timestamps only carry fractional seconds when they
    /// have some.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Text(text) => Cow::Borrowed(text),
            Value::Timestamp(ts) if ts.nanosecond() == 0 => {
                Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            Value::Timestamp(ts) => Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::TimestampTz(ts) if ts.nanosecond() == 0 => {
                Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S%:z").to_string())
            }
            Value::TimestampTz(ts) => {
                Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
            }
            Value::Date(date) => Cow::Owned(date.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<Option<&str>> for Value {
    fn from(text: Option<&str>) -> Self {
        text.map_or(Value::Null, Value::from)
    }
}

/// One row of the record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<Value>,
    valid: bool,
    failed_fields: Vec<String>,
}

impl Record {
    /// A record with the validity tag at its default of `true`.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            valid: true,
            failed_fields: Vec::new(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The validity tag.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `not_null` fields that were null for this record, in rule order.
    pub fn failed_fields(&self) -> &[String] {
        &self.failed_fields
    }

    /// Flip the tag to `false`. There is no way back to `true`.
    pub fn mark_invalid(&mut self, field: &str) {
        self.valid = false;
        self.failed_fields.push(field.to_string());
    }

    pub(crate) fn value_mut(&mut self, index: usize) -> &mut Value {
        &mut self.values[index]
    }
}

/// Ordered collection of uniform records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    /// An empty record set over `columns`.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build a record set from raw rows, treating `None` as null.
    ///
    /// # Panics
    ///
    /// Panics if a row does not have one value per column.
    pub fn from_rows<I, R>(columns: &[&str], rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Option<&'static str>>,
    {
        let mut set = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            let values: Vec<Value> = row.into_iter().map(Value::from).collect();
            assert_eq!(values.len(), set.columns.len(), "row width mismatch");
            set.records.push(Record::new(values));
        }
        set
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `name` in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Positions of `names` in the header, `None` for names that are absent.
    pub fn column_indices<'a>(&self, names: &'a [String]) -> Vec<(&'a str, Option<usize>)> {
        let lookup: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        names
            .iter()
            .map(|n| (n.as_str(), lookup.get(n.as_str()).copied()))
            .collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Value of `column` in the record at `row`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.records.get(row).map(|r| &r.values[index])
    }

    /// Append a record. Its width must match the header.
    pub fn push(&mut self, record: Record) {
        debug_assert_eq!(record.values.len(), self.columns.len());
        self.records.push(record);
    }

    /// Append every record of `chunk`, which must share this header.
    pub fn extend(&mut self, chunk: Vec<Record>) {
        self.records.extend(chunk);
    }

    /// Collapse records whose values are identical across every column to
    /// their first occurrence. Returns the number of records dropped.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.records.len();
        let keep: Vec<bool> = {
            let mut seen: HashSet<&[Value]> = HashSet::with_capacity(before);
            self.records
                .iter()
                .map(|r| seen.insert(r.values.as_slice()))
                .collect()
        };

        let mut keep = keep.into_iter();
        self.records.retain(|_| keep.next().unwrap_or(true));
        before - self.records.len()
    }

    /// Split into records tagged valid and records tagged invalid.
    ///
    /// Both halves keep the header and the relative order of their records.
    pub fn split_by_validity(self) -> (RecordSet, RecordSet) {
        let (valid, invalid): (Vec<Record>, Vec<Record>) =
            self.records.into_iter().partition(Record::is_valid);
        (
            RecordSet {
                columns: self.columns.clone(),
                records: valid,
            },
            RecordSet {
                columns: self.columns,
                records: invalid,
            },
        )
    }
}
