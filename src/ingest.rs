//! Ingestion boundary: the one place loosely-typed appointment rows become
//! typed `AppointmentRecord`s.
//!
//! Rows arrive from two directions: JSON payloads (webhook exports, the CLI
//! `import` command) and SQLite rows whose column affinity does not stop a
//! writer from storing `"false"` in an integer column. Both are lifted into
//! `RawValue` and coerced here, so nothing downstream branches on raw types.
//!
//! Coercions never fail: money degrades to `0.0`, flags degrade to `false`.
//! Only a missing identifier rejects a row.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AppointmentId, AppointmentRecord, CoverageType, PatientId};

#[derive(Error, Debug, PartialEq)]
pub enum IngestError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid identifier for {field}: {value}")]
    InvalidIdentifier { field: String, value: String },
}

// ═══════════════════════════════════════════
// Raw values
// ═══════════════════════════════════════════

/// A single untyped cell from any upstream source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Real).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::Text(s),
            // Arrays and objects carry no meaning for a scalar column.
            _ => Self::Null,
        }
    }
}

impl From<rusqlite::types::Value> for RawValue {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value;
        match value {
            Value::Null => Self::Null,
            Value::Integer(i) => Self::Integer(i),
            Value::Real(f) => Self::Real(f),
            Value::Text(s) => Self::Text(s),
            Value::Blob(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Self::Text(s),
                Err(_) => Self::Null,
            },
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Text spellings accepted as `true`. Everything else is `false`.
const TRUTHY: &[&str] = &["true", "t", "1", "yes", "y", "sim", "s"];

/// Coerce any raw cell into a flag. Null, unknown text and NaN are `false`.
pub fn coerce_bool(value: &RawValue) -> bool {
    match value {
        RawValue::Null => false,
        RawValue::Bool(b) => *b,
        RawValue::Integer(i) => *i != 0,
        RawValue::Real(f) => !f.is_nan() && *f != 0.0,
        RawValue::Text(s) => {
            let s = s.trim();
            TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(s))
        }
    }
}

/// Coerce any raw cell into a non-negative amount.
pub fn coerce_money(value: &RawValue) -> f64 {
    let amount = match value {
        RawValue::Null | RawValue::Bool(_) => 0.0,
        RawValue::Integer(i) => *i as f64,
        RawValue::Real(f) => *f,
        RawValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
    };
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

// Whole floats in [-2^63, 2^63) convert to i64 exactly.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn coerce_identifier(field: &str, value: &RawValue) -> Result<String, IngestError> {
    match value {
        RawValue::Text(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        RawValue::Integer(i) => Ok(i.to_string()),
        RawValue::Real(f) if f.fract() == 0.0 && *f >= I64_LOWER && *f < I64_UPPER => {
            Ok(format!("{}", *f as i64))
        }
        RawValue::Null | RawValue::Text(_) => Err(IngestError::MissingField {
            field: field.to_string(),
        }),
        other => Err(IngestError::InvalidIdentifier {
            field: field.to_string(),
            value: format!("{other:?}"),
        }),
    }
}

fn coerce_text(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Integer(i) => i.to_string(),
        RawValue::Real(f) => f.to_string(),
        RawValue::Text(s) => s.trim().to_string(),
    }
}

fn coerce_time(value: &RawValue) -> Option<NaiveTime> {
    let text = coerce_text(value);
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&text, fmt).ok())
}

// ═══════════════════════════════════════════
// Rows
// ═══════════════════════════════════════════

/// An appointment row before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawAppointment {
    pub appointment_id: RawValue,
    pub patient_id: RawValue,
    pub date: RawValue,
    pub time: RawValue,
    pub payment_amount: RawValue,
    pub attended: RawValue,
    pub is_first_appointment: RawValue,
    pub coverage_type: RawValue,
    pub canceled: RawValue,
}

/// Column aliases recognized in JSON exports, checked in order.
const APPOINTMENT_ID_KEYS: &[&str] = &["appointment_id", "Appointment ID", "ID Consulta", "id"];
const PATIENT_ID_KEYS: &[&str] = &["patient_id", "Patient ID", "ID Paciente"];
const DATE_KEYS: &[&str] = &["date", "Date", "Data"];
const TIME_KEYS: &[&str] = &["time", "Time", "Hora"];
const PAYMENT_KEYS: &[&str] = &["payment_amount", "Payment Status", "Pagamento"];
const ATTENDED_KEYS: &[&str] = &["attended", "Attended", "Compareceu"];
const FIRST_KEYS: &[&str] = &["is_first_appointment", "First Appointment", "Primeira Consulta"];
const COVERAGE_KEYS: &[&str] = &["coverage_type", "Insurance", "Convênio"];
const CANCELED_KEYS: &[&str] = &["canceled", "Canceled", "Cancelou"];

impl RawAppointment {
    /// Lift a JSON object into a raw row. Non-object values yield an empty row,
    /// which normalization then rejects for its missing identifiers.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let pick = |keys: &[&str]| -> RawValue {
            keys.iter()
                .find_map(|k| obj.get(*k))
                .cloned()
                .map(RawValue::from)
                .unwrap_or_default()
        };
        Self {
            appointment_id: pick(APPOINTMENT_ID_KEYS),
            patient_id: pick(PATIENT_ID_KEYS),
            date: pick(DATE_KEYS),
            time: pick(TIME_KEYS),
            payment_amount: pick(PAYMENT_KEYS),
            attended: pick(ATTENDED_KEYS),
            is_first_appointment: pick(FIRST_KEYS),
            coverage_type: pick(COVERAGE_KEYS),
            canceled: pick(CANCELED_KEYS),
        }
    }
}

/// Normalize one raw row into a typed record.
pub fn normalize(raw: &RawAppointment) -> Result<AppointmentRecord, IngestError> {
    let appointment_id = coerce_identifier("appointment_id", &raw.appointment_id)?;
    let patient_id = coerce_identifier("patient_id", &raw.patient_id)?;

    Ok(AppointmentRecord {
        appointment_id: AppointmentId(appointment_id),
        patient_id: PatientId(patient_id),
        date: coerce_text(&raw.date),
        time: coerce_time(&raw.time),
        payment_amount: coerce_money(&raw.payment_amount),
        attended: coerce_bool(&raw.attended),
        is_first_appointment: coerce_bool(&raw.is_first_appointment),
        coverage_type: match &raw.coverage_type {
            RawValue::Null => CoverageType::Unspecified,
            other => CoverageType::from_label(&coerce_text(other)),
        },
        canceled: coerce_bool(&raw.canceled),
    })
}

/// A row that could not be normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    pub index: usize,
    pub reason: String,
}

/// Result of normalizing a batch of rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestBatch {
    pub records: Vec<AppointmentRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Normalize a batch. Rejected rows are logged and reported, never fatal.
pub fn normalize_batch<I>(rows: I) -> IngestBatch
where
    I: IntoIterator<Item = RawAppointment>,
{
    let mut batch = IngestBatch::default();
    for (index, raw) in rows.into_iter().enumerate() {
        match normalize(&raw) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!(row = index, error = %e, "Rejected appointment row");
                batch.rejected.push(RejectedRow {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    batch
}

/// Normalize a JSON array of appointment objects.
pub fn normalize_json(value: &serde_json::Value) -> IngestBatch {
    match value.as_array() {
        Some(rows) => normalize_batch(rows.iter().map(RawAppointment::from_json)),
        None => normalize_batch(std::iter::once(RawAppointment::from_json(value))),
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_coercion_handles_mixed_sources() {
        assert!(coerce_bool(&RawValue::Bool(true)));
        assert!(coerce_bool(&"true".into()));
        assert!(coerce_bool(&" TRUE ".into()));
        assert!(coerce_bool(&"1".into()));
        assert!(coerce_bool(&RawValue::Integer(1)));
        assert!(!coerce_bool(&"false".into()));
        assert!(!coerce_bool(&"0".into()));
        assert!(!coerce_bool(&RawValue::Null));
        assert!(!coerce_bool(&RawValue::Real(f64::NAN)));
        assert!(!coerce_bool(&"maybe".into()));
    }

    #[test]
    fn money_coercion_degrades_to_zero() {
        assert_eq!(coerce_money(&RawValue::Real(150.5)), 150.5);
        assert_eq!(coerce_money(&RawValue::Integer(200)), 200.0);
        assert_eq!(coerce_money(&" 99.90 ".into()), 99.9);
        assert_eq!(coerce_money(&"abc".into()), 0.0);
        assert_eq!(coerce_money(&RawValue::Null), 0.0);
        assert_eq!(coerce_money(&RawValue::Real(-10.0)), 0.0);
        assert_eq!(coerce_money(&RawValue::Real(f64::INFINITY)), 0.0);
    }

    #[test]
    fn normalize_json_row_with_snake_case_keys() {
        let row = json!({
            "appointment_id": "a-1",
            "patient_id": "p-1",
            "date": "2024-01-05",
            "time": "09:30",
            "payment_amount": "200",
            "attended": "1",
            "is_first_appointment": true,
            "coverage_type": "Unimed",
            "canceled": null
        });
        let record = normalize(&RawAppointment::from_json(&row)).unwrap();
        assert_eq!(record.appointment_id.as_str(), "a-1");
        assert_eq!(record.patient_id.as_str(), "p-1");
        assert_eq!(record.date, "2024-01-05");
        assert_eq!(record.time, NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(record.payment_amount, 200.0);
        assert!(record.attended);
        assert!(record.is_first_appointment);
        assert_eq!(record.coverage_type, CoverageType::Plan("Unimed".into()));
        assert!(!record.canceled);
    }

    #[test]
    fn normalize_json_row_with_legacy_column_names() {
        let row = json!({
            "Appointment ID": 7,
            "Patient ID": 3,
            "Date": "2024-02-10",
            "Payment Status": 150.0,
            "Attended": "false",
            "Insurance": "Private",
            "Canceled": 0
        });
        let record = normalize(&RawAppointment::from_json(&row)).unwrap();
        assert_eq!(record.appointment_id.as_str(), "7");
        assert_eq!(record.patient_id.as_str(), "3");
        assert!(!record.attended);
        assert_eq!(record.coverage_type, CoverageType::Private);
        assert_eq!(record.time, None);
    }

    #[test]
    fn missing_coverage_is_unspecified() {
        let row = json!({ "appointment_id": 1, "patient_id": 1, "date": "2024-01-01" });
        let record = normalize(&RawAppointment::from_json(&row)).unwrap();
        assert_eq!(record.coverage_type, CoverageType::Unspecified);
        assert_eq!(record.payment_amount, 0.0);
    }

    #[test]
    fn missing_patient_id_is_rejected() {
        let row = json!({ "appointment_id": "a-1", "date": "2024-01-01" });
        let err = normalize(&RawAppointment::from_json(&row)).unwrap_err();
        assert_eq!(
            err,
            IngestError::MissingField {
                field: "patient_id".into()
            }
        );
    }

    #[test]
    fn whole_float_ids_become_integer_text() {
        let row = json!({ "appointment_id": 42.0, "patient_id": -7.0, "date": "2024-01-01" });
        let record = normalize(&RawAppointment::from_json(&row)).unwrap();
        assert_eq!(record.appointment_id.as_str(), "42");
        assert_eq!(record.patient_id.as_str(), "-7");
    }

    #[test]
    fn out_of_range_float_ids_are_rejected_not_merged() {
        for id in [1e20, 2e20, -1e20, 9_223_372_036_854_775_808.0] {
            let raw = RawAppointment {
                appointment_id: RawValue::Real(id),
                patient_id: RawValue::Integer(1),
                date: RawValue::from("2024-01-01"),
                ..Default::default()
            };
            assert!(
                matches!(
                    normalize(&raw),
                    Err(IngestError::InvalidIdentifier { ref field, .. }) if field == "appointment_id"
                ),
                "id {id} should be rejected"
            );
        }
    }

    #[test]
    fn fractional_float_ids_are_rejected() {
        let raw = RawAppointment {
            appointment_id: RawValue::Real(1.5),
            patient_id: RawValue::Integer(1),
            ..Default::default()
        };
        assert!(matches!(normalize(&raw), Err(IngestError::InvalidIdentifier { .. })));
    }

    #[test]
    fn unparseable_date_is_kept_for_the_engine() {
        let row = json!({ "appointment_id": 1, "patient_id": 1, "date": "not a date" });
        let record = normalize(&RawAppointment::from_json(&row)).unwrap();
        assert_eq!(record.date, "not a date");
    }

    #[test]
    fn batch_reports_rejected_rows_without_failing() {
        let rows = json!([
            { "appointment_id": 1, "patient_id": 1, "date": "2024-01-01" },
            { "appointment_id": 2, "date": "2024-01-02" },
            "garbage",
            { "appointment_id": 4, "patient_id": 2, "date": "2024-01-03" }
        ]);
        let batch = normalize_json(&rows);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected[0].index, 1);
        assert_eq!(batch.rejected[1].index, 2);
    }

    #[test]
    fn sqlite_values_lift_into_raw_values() {
        use rusqlite::types::Value;
        assert_eq!(RawValue::from(Value::Integer(1)), RawValue::Integer(1));
        assert_eq!(RawValue::from(Value::Text("x".into())), RawValue::Text("x".into()));
        assert_eq!(RawValue::from(Value::Blob(vec![0xff, 0xfe])), RawValue::Null);
    }
}
