//! Field converters for temporal columns.
//!
//! Converters rewrite one column in place. A value that does not match the
//! format becomes null instead of failing the run; the number of such
//! coercions is returned to the caller.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;

use crate::config::FieldKind;
use crate::record::{RecordSet, Value};

/// Outcome of converting one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conversion {
    /// Non-null values that failed to parse and were set to null.
    pub coerced: usize,
    /// Distinct raw strings that were parsed.
    pub parsed_distinct: usize,
}

/// Convert `column` of `records` according to `kind`.
///
/// Plain fields are left untouched.
pub fn convert(records: &mut RecordSet, column: usize, kind: FieldKind, format: &str) -> Conversion {
    match kind {
        FieldKind::Datetime => DateTimeConverter::new(format).convert(records, column),
        FieldKind::Date => DateConverter::new(format).convert(records, column),
        FieldKind::Plain => Conversion::default(),
    }
}

/// Parses a column into timestamps with a strftime-style format.
///
/// Identical raw strings are parsed once per conversion.
pub struct DateTimeConverter<'a> {
    format: &'a str,
    with_offset: bool,
    cache: HashMap<String, Value>,
}

impl<'a> DateTimeConverter<'a> {
    pub fn new(format: &'a str) -> Self {
        Self {
            format,
            with_offset: has_offset(format),
            cache: HashMap::new(),
        }
    }

    pub fn convert(mut self, records: &mut RecordSet, column: usize) -> Conversion {
        let mut coerced = 0;
        for record in records.records_mut() {
            let value = record.value_mut(column);
            let converted = self.convert_value(value);
            if converted.is_null() && !value.is_null() {
                coerced += 1;
            }
            *value = converted;
        }
        Conversion {
            coerced,
            parsed_distinct: self.cache.len(),
        }
    }

    /// Convert one value. Temporal values pass through unchanged.
    fn convert_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Text(raw) => {
                if let Some(hit) = self.cache.get(raw) {
                    return hit.clone();
                }
                let parsed = self.parse(raw);
                self.cache.insert(raw.clone(), parsed.clone());
                parsed
            }
            Value::Date(date) => Value::Timestamp(date.and_time(NaiveTime::MIN)),
            other => other.clone(),
        }
    }

    fn parse(&self, raw: &str) -> Value {
        if self.with_offset {
            return DateTime::<FixedOffset>::parse_from_str(raw, self.format)
                .map_or(Value::Null, Value::TimestampTz);
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, self.format) {
            return Value::Timestamp(ts);
        }
        // Date-only formats carry no time of day; they mean midnight.
        NaiveDate::parse_from_str(raw, self.format)
            .map_or(Value::Null, |d| Value::Timestamp(d.and_time(NaiveTime::MIN)))
    }
}

/// Parses a column as timestamps, then truncates to the calendar date.
pub struct DateConverter<'a> {
    inner: DateTimeConverter<'a>,
}

impl<'a> DateConverter<'a> {
    pub fn new(format: &'a str) -> Self {
        Self {
            inner: DateTimeConverter::new(format),
        }
    }

    pub fn convert(self, records: &mut RecordSet, column: usize) -> Conversion {
        let conversion = self.inner.convert(records, column);
        for record in records.records_mut() {
            let value = record.value_mut(column);
            *value = truncate_to_date(value);
        }
        conversion
    }
}

fn truncate_to_date(value: &Value) -> Value {
    match value {
        Value::Timestamp(ts) => Value::Date(ts.date()),
        Value::TimestampTz(ts) => Value::Date(ts.date_naive()),
        other => other.clone(),
    }
}

/// Whether `format` contains an offset specifier (`%z`, `%:z`, `%::z`,
/// `%:::z` or `%#z`). Escaped `%%` is a literal percent sign.
fn has_offset(format: &str) -> bool {
    let mut rest = format;
    while let Some(at) = rest.find('%') {
        let spec = &rest[at + 1..];
        if let Some(after) = spec.strip_prefix('%') {
            rest = after;
            continue;
        }
        let unflagged = spec.trim_start_matches(':');
        let unflagged = unflagged.strip_prefix('#').unwrap_or(unflagged);
        if unflagged.starts_with('z') {
            return true;
        }
        rest = spec;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn column(raw: &[Option<&'static str>]) -> RecordSet {
        RecordSet::from_rows(&["ts"], raw.iter().map(|v| [*v]))
    }

    fn values(set: &RecordSet) -> Vec<Value> {
        set.records().iter().map(|r| r.values()[0].clone()).collect()
    }

    #[test]
    fn test_datetime_parses_and_coerces() {
        let mut set = column(&[
            Some("2024-01-05 10:15:00"),
            Some("not a date"),
            None,
            Some("2024-01-05 10:15:00"),
        ]);

        let conversion = DateTimeConverter::new("%Y-%m-%d %H:%M:%S").convert(&mut set, 0);
        assert_eq!(conversion.coerced, 1);
        assert_eq!(conversion.parsed_distinct, 2);

        let out = values(&set);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(out[0], Value::Timestamp(expected));
        assert_eq!(out[1], Value::Null);
        assert_eq!(out[2], Value::Null);
        assert_eq!(out[3], out[0]);
    }

    #[test]
    fn test_trailing_input_is_coerced() {
        let mut set = column(&[Some("2024-01-05 10:15:00 extra")]);
        let conversion = DateTimeConverter::new("%Y-%m-%d %H:%M:%S").convert(&mut set, 0);
        assert_eq!(conversion.coerced, 1);
        assert!(values(&set)[0].is_null());
    }

    #[test]
    fn test_date_only_format_means_midnight() {
        let mut set = column(&[Some("05/01/2024")]);
        DateTimeConverter::new("%d/%m/%Y").convert(&mut set, 0);
        match &values(&set)[0] {
            Value::Timestamp(ts) => {
                assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
                assert_eq!(ts.time(), NaiveTime::MIN);
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_offset_format_keeps_offset() {
        let mut set = column(&[Some("2024-01-05 23:30:00 +0200")]);
        DateTimeConverter::new("%Y-%m-%d %H:%M:%S %z").convert(&mut set, 0);
        assert_eq!(values(&set)[0].render(), "2024-01-05 23:30:00+02:00");
    }

    #[test]
    fn test_offset_detection() {
        assert!(has_offset("%Y-%m-%d %H:%M:%S %z"));
        assert!(has_offset("%Y-%m-%dT%H:%M:%S%:z"));
        assert!(has_offset("%H %::z"));
        assert!(has_offset("%H %#z"));
        assert!(has_offset("100%% %z"));
        assert!(!has_offset("%Y-%m-%d %%z"));
        assert!(!has_offset("%Y-%m-%d %H:%M:%S"));
        assert!(!has_offset("%%%%z"));
    }

    #[test]
    fn test_escaped_percent_z_is_literal() {
        let mut set = column(&[Some("2024-01-05 %z")]);
        let conversion = DateTimeConverter::new("%Y-%m-%d %%z").convert(&mut set, 0);
        assert_eq!(conversion.coerced, 0);
        match &values(&set)[0] {
            Value::Timestamp(ts) => {
                assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_date_truncates_time_of_day() {
        let mut set = column(&[Some("2024-02-29T18:45:00"), Some("2024-02-30T00:00:00")]);
        let conversion = DateConverter::new("%Y-%m-%dT%H:%M:%S").convert(&mut set, 0);
        assert_eq!(conversion.coerced, 1);

        let out = values(&set);
        match &out[0] {
            Value::Date(d) => assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 29)),
            other => panic!("expected date, got {other:?}"),
        }
        assert!(out[1].is_null());
    }

    #[test]
    fn test_date_with_offset_keeps_local_date() {
        let mut set = column(&[Some("2024-01-05 23:30:00 -0500")]);
        DateConverter::new("%Y-%m-%d %H:%M:%S %z").convert(&mut set, 0);
        assert_eq!(values(&set)[0].render(), "2024-01-05");
    }

    #[test]
    fn test_other_columns_untouched() {
        let mut set = RecordSet::from_rows(
            &["id", "ts"],
            [[Some("x"), Some("bad")], [Some("2024-01-01"), Some("2024-01-01")]],
        );
        convert(&mut set, 1, FieldKind::Date, "%Y-%m-%d");
        assert_eq!(set.value(0, "id"), Some(&Value::from("x")));
        assert_eq!(set.value(1, "id"), Some(&Value::from("2024-01-01")));
        assert!(set.value(0, "ts").unwrap().is_null());
    }

    #[test]
    fn test_plain_is_noop() {
        let mut set = column(&[Some("anything")]);
        assert_eq!(convert(&mut set, 0, FieldKind::Plain, ""), Conversion::default());
        assert_eq!(values(&set)[0], Value::from("anything"));
    }
}
