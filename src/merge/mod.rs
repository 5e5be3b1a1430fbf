// src/merge/mod.rs

use serde_json::Value;

use crate::normalize::{Series, Value as Reading};
use crate::store::Record;

/// Where in a record a series is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTarget {
    /// `record[container][MonthName][field] = value` for each month already
    /// present in `container`.
    Monthly { container: String, field: String },
    /// `record[key] = { period_key: value, ... }`, replacing any previous value.
    TopLevel { key: String },
}

impl MergeTarget {
    pub fn monthly(container: &str, field: &str) -> Self {
        MergeTarget::Monthly {
            container: container.to_string(),
            field: field.to_string(),
        }
    }

    pub fn top_level(key: &str) -> Self {
        MergeTarget::TopLevel {
            key: key.to_string(),
        }
    }
}

/// Periods written versus periods that had nowhere to go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub written: usize,
    pub skipped: usize,
}

/// Write `series` into `record` at `target`. Absent values are written as
/// `null`. Fields outside the target are left alone and existing keys keep
/// their position, so merging the same series twice is a no-op.
pub fn merge(record: &mut Record, series: &Series, target: &MergeTarget) -> MergeReport {
    match target {
        MergeTarget::Monthly { container, field } => {
            let months = match record
                .fields_mut()
                .get_mut(container)
                .and_then(Value::as_object_mut)
            {
                Some(months) => months,
                None => {
                    return MergeReport {
                        written: 0,
                        skipped: series.len(),
                    }
                }
            };

            let mut report = MergeReport::default();
            for (period, value) in series.iter() {
                match months.get_mut(&period.key()).and_then(Value::as_object_mut) {
                    Some(month) => {
                        month.insert(field.clone(), json_value(*value));
                        report.written += 1;
                    }
                    None => report.skipped += 1,
                }
            }
            report
        }
        MergeTarget::TopLevel { key } => {
            set_field(record, key, Value::Object(series.to_json()));
            MergeReport {
                written: series.len(),
                skipped: 0,
            }
        }
    }
}

/// Set a scalar field. An existing key keeps its position; a new key goes last.
pub fn set_field(record: &mut Record, key: &str, value: Value) {
    record.fields_mut().insert(key.to_string(), value);
}

fn json_value(v: Option<Reading>) -> Value {
    v.map(Reading::to_json).unwrap_or(Value::Null)
}
