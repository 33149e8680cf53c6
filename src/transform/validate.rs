//! Validation engine.
//!
//! Applies the schema's field rules in declaration order: convert the
//! column if its kind asks for it, then flip the validity tag of every
//! record whose value is null under a `not_null` rule.

use indexmap::IndexMap;
use snafu::prelude::*;
use tracing::debug;

use crate::config::{FieldRule, SchemaConfig};
use crate::emit;
use crate::error::{MissingFieldSnafu, TransformError};
use crate::metrics::events::{RecordStatus, RecordsTagged, ValuesCoerced};
use crate::record::RecordSet;

use super::convert::convert;

/// Per-field counts gathered while validating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldReport {
    /// Values that failed to parse and were set to null.
    pub coerced: usize,
    /// Null values seen by a `not_null` rule.
    pub nulls_rejected: usize,
}

/// Summary of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub fields: IndexMap<String, FieldReport>,
    pub valid: usize,
    pub invalid: usize,
}

impl ValidationReport {
    /// Total coerced values across all fields.
    pub fn coerced(&self) -> usize {
        self.fields.values().map(|f| f.coerced).sum()
    }
}

/// Applies field rules to a record set.
pub struct ValidationEngine<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    /// Check that every schema field exists in `records`.
    pub fn check_columns(&self, records: &RecordSet) -> Result<(), TransformError> {
        for name in self.schema.fields.keys() {
            ensure!(
                records.column_index(name).is_some(),
                MissingFieldSnafu { field: name }
            );
        }
        Ok(())
    }

    /// Convert and tag `records` in place.
    pub fn apply(&self, records: &mut RecordSet) -> Result<ValidationReport, TransformError> {
        self.check_columns(records)?;

        let mut report = ValidationReport::default();
        for (name, rule) in &self.schema.fields {
            let field = apply_rule(records, name, rule)?;
            debug!(
                "Field {}: {} coerced, {} null under not_null",
                name, field.coerced, field.nulls_rejected
            );
            if field.coerced > 0 {
                emit!(ValuesCoerced {
                    field: name.clone(),
                    count: field.coerced as u64,
                });
            }
            report.fields.insert(name.clone(), field);
        }

        report.invalid = records.records().iter().filter(|r| !r.is_valid()).count();
        report.valid = records.len() - report.invalid;
        emit!(RecordsTagged {
            status: RecordStatus::Valid,
            count: report.valid as u64,
        });
        emit!(RecordsTagged {
            status: RecordStatus::Invalid,
            count: report.invalid as u64,
        });

        Ok(report)
    }
}

/// Apply one rule to its column.
fn apply_rule(
    records: &mut RecordSet,
    name: &str,
    rule: &FieldRule,
) -> Result<FieldReport, TransformError> {
    let column = records
        .column_index(name)
        .context(MissingFieldSnafu { field: name })?;

    let mut field = FieldReport::default();
    if let Some(format) = rule.format.as_deref()
        && rule.kind.requires_format()
    {
        field.coerced = convert(records, column, rule.kind, format).coerced;
    }

    if rule.not_null {
        for record in records.records_mut() {
            if record.values()[column].is_null() {
                record.mark_invalid(name);
                field.nulls_rejected += 1;
            }
        }
    }

    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, FieldRule};
    use crate::record::Value;

    fn schema(fields: &[(&str, FieldRule)]) -> SchemaConfig {
        SchemaConfig {
            fields: fields
                .iter()
                .map(|(n, r)| (n.to_string(), r.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_not_null_after_conversion() {
        let schema = schema(&[
            ("signup", FieldRule::typed(FieldKind::Date, "%Y-%m-%d", true)),
            ("note", FieldRule::plain(false)),
        ]);
        let mut set = RecordSet::from_rows(
            &["signup", "note"],
            [
                [Some("2024-01-01"), None],
                [Some("garbage"), Some("x")],
                [None, Some("y")],
            ],
        );

        let report = ValidationEngine::new(&schema).apply(&mut set).unwrap();

        let tags: Vec<bool> = set.records().iter().map(|r| r.is_valid()).collect();
        assert_eq!(tags, vec![true, false, false]);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.fields["signup"].coerced, 1);
        assert_eq!(report.fields["signup"].nulls_rejected, 2);
        assert_eq!(report.fields["note"], FieldReport::default());
    }

    #[test]
    fn test_nullable_coercion_keeps_record_valid() {
        let schema = schema(&[(
            "seen_at",
            FieldRule::typed(FieldKind::Datetime, "%Y-%m-%d %H:%M", false),
        )]);
        let mut set = RecordSet::from_rows(&["seen_at"], [[Some("yesterday")]]);

        let report = ValidationEngine::new(&schema).apply(&mut set).unwrap();
        assert_eq!(report.valid, 1);
        assert_eq!(report.coerced(), 1);
        assert_eq!(set.value(0, "seen_at"), Some(&Value::Null));
    }

    #[test]
    fn test_unregistered_fields_never_flip_tag() {
        let schema = schema(&[("email", FieldRule::plain(true))]);
        let mut set = RecordSet::from_rows(&["email", "extra"], [[Some("a@x.io"), None]]);

        ValidationEngine::new(&schema).apply(&mut set).unwrap();
        assert!(set.records()[0].is_valid());
    }

    #[test]
    fn test_failed_fields_recorded_in_rule_order() {
        let schema = schema(&[("a", FieldRule::plain(true)), ("b", FieldRule::plain(true))]);
        let mut set = RecordSet::from_rows(&["b", "a"], [[None, None]]);

        ValidationEngine::new(&schema).apply(&mut set).unwrap();
        assert_eq!(set.records()[0].failed_fields(), ["a", "b"]);
    }

    #[test]
    fn test_tagging_independent_of_rule_order() {
        let rows = [
            [Some("1"), None],
            [None, Some("2")],
            [Some("3"), Some("4")],
        ];
        let forward = schema(&[("a", FieldRule::plain(true)), ("b", FieldRule::plain(true))]);
        let backward = schema(&[("b", FieldRule::plain(true)), ("a", FieldRule::plain(true))]);

        let mut first = RecordSet::from_rows(&["a", "b"], rows);
        let mut second = RecordSet::from_rows(&["a", "b"], rows);
        ValidationEngine::new(&forward).apply(&mut first).unwrap();
        ValidationEngine::new(&backward).apply(&mut second).unwrap();

        let tags = |s: &RecordSet| s.records().iter().map(|r| r.is_valid()).collect::<Vec<_>>();
        assert_eq!(tags(&first), tags(&second));
        assert_eq!(tags(&first), vec![false, false, true]);
    }

    #[test]
    fn test_missing_schema_field_is_error() {
        let schema = schema(&[("email", FieldRule::plain(true))]);
        let mut set = RecordSet::from_rows(&["mail"], [[Some("a@x.io")]]);

        let err = ValidationEngine::new(&schema).apply(&mut set).unwrap_err();
        assert!(matches!(err, TransformError::MissingField { field } if field == "email"));
    }

    #[test]
    fn test_empty_input() {
        let schema = schema(&[("email", FieldRule::plain(true))]);
        let mut set = RecordSet::new(vec!["email".to_string()]);

        let report = ValidationEngine::new(&schema).apply(&mut set).unwrap();
        assert_eq!((report.valid, report.invalid), (0, 0));
    }
}
