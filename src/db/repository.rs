use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::analytics::parse_record_date;
use crate::ingest::{self, RawAppointment, RawValue};
use crate::models::*;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ═══════════════════════════════════════════
// Patient Repository
// ═══════════════════════════════════════════

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, phone, email, referral_source, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.as_str(),
            patient.name,
            patient.phone,
            patient.email,
            patient.referral_source.as_str(),
            patient.registered_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &PatientId) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, phone, email, referral_source, registered_at
             FROM patients WHERE id = ?1",
            params![id.as_str()],
            patient_row,
        )
        .optional()?;

    row.map(patient_from_row).transpose()
}

/// All patients, oldest registration first.
pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, email, referral_source, registered_at
         FROM patients ORDER BY registered_at ASC, name ASC",
    )?;
    let rows = stmt.query_map([], patient_row)?;

    rows.map(|r| patient_from_row(r?)).collect()
}

// Internal row type for Patient mapping
struct PatientRow {
    id: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    referral_source: String,
    registered_at: String,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        referral_source: row.get(4)?,
        registered_at: row.get(5)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    let registered_at = NaiveDateTime::parse_from_str(&row.registered_at, DATETIME_FORMAT)
        .map_err(|_| DatabaseError::ConstraintViolation(format!(
            "patient {} has invalid registered_at '{}'",
            row.id, row.registered_at
        )))?;

    Ok(Patient {
        id: PatientId(row.id),
        name: row.name,
        phone: row.phone,
        email: row.email,
        referral_source: ReferralSource::from_str(&row.referral_source)?,
        registered_at,
    })
}

// ═══════════════════════════════════════════
// Appointment Repository
// ═══════════════════════════════════════════

const APPOINTMENT_COLUMNS: &str = "id, patient_id, date, time, payment_amount, attended,
     is_first_appointment, coverage_type, canceled";

/// Insert a new appointment. Fails with `ConstraintViolation` on a duplicate id.
pub fn insert_appointment(
    conn: &Connection,
    record: &AppointmentRecord,
) -> Result<(), DatabaseError> {
    let result = conn.execute(
        "INSERT INTO appointments (id, patient_id, date, time, payment_amount, attended,
         is_first_appointment, coverage_type, canceled, seq)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM appointments))",
        params_from_iter(appointment_params(record)),
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(DatabaseError::ConstraintViolation(format!(
                "appointment {} already exists",
                record.appointment_id
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Insert or replace an appointment by id, keeping its original position in
/// the ledger when it already exists.
pub fn upsert_appointment(
    conn: &Connection,
    record: &AppointmentRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, date, time, payment_amount, attended,
         is_first_appointment, coverage_type, canceled, seq)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM appointments))
         ON CONFLICT(id) DO UPDATE SET
             patient_id = excluded.patient_id,
             date = excluded.date,
             time = excluded.time,
             payment_amount = excluded.payment_amount,
             attended = excluded.attended,
             is_first_appointment = excluded.is_first_appointment,
             coverage_type = excluded.coverage_type,
             canceled = excluded.canceled",
        params_from_iter(appointment_params(record)),
    )?;
    Ok(())
}

fn appointment_params(record: &AppointmentRecord) -> [Value; 9] {
    [
        Value::Text(record.appointment_id.as_str().to_string()),
        Value::Text(record.patient_id.as_str().to_string()),
        Value::Text(record.date.clone()),
        record
            .time
            .map(|t| Value::Text(t.format("%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        Value::Real(record.payment_amount),
        Value::Integer(record.attended as i64),
        Value::Integer(record.is_first_appointment as i64),
        record
            .coverage_type
            .label()
            .map(|l| Value::Text(l.to_string()))
            .unwrap_or(Value::Null),
        Value::Integer(record.canceled as i64),
    ]
}

pub fn get_appointment(
    conn: &Connection,
    id: &AppointmentId,
) -> Result<Option<AppointmentRecord>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.as_str()],
            raw_appointment_row,
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(Some(ingest::normalize(&raw)?)),
        None => Ok(None),
    }
}

/// Materialize the whole ledger as an owned snapshot, in insertion order.
///
/// Every row goes through the ingestion normalization; rows that cannot be
/// normalized are logged and left out.
pub fn load_snapshot(conn: &Connection) -> Result<Vec<AppointmentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY seq ASC"
    ))?;
    let rows = stmt
        .query_map([], raw_appointment_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let batch = ingest::normalize_batch(rows);
    if !batch.rejected.is_empty() {
        tracing::warn!(
            rejected = batch.rejected.len(),
            "Ledger rows dropped from snapshot"
        );
    }
    Ok(batch.records)
}

/// Appointments whose date falls on `date`, in ledger order.
pub fn list_appointments_on(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<AppointmentRecord>, DatabaseError> {
    Ok(load_snapshot(conn)?
        .into_iter()
        .filter(|r| parse_record_date(&r.date) == Some(date))
        .collect())
}

/// Set either flag on an existing appointment. `None` leaves a flag as is.
pub fn update_appointment_flags(
    conn: &Connection,
    id: &AppointmentId,
    attended: Option<bool>,
    canceled: Option<bool>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET
             attended = COALESCE(?2, attended),
             canceled = COALESCE(?3, canceled)
         WHERE id = ?1",
        params![id.as_str(), attended, canceled],
    )?;
    ensure_found(changed, id)
}

pub fn update_payment(
    conn: &Connection,
    id: &AppointmentId,
    amount: f64,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET payment_amount = ?2 WHERE id = ?1",
        params![id.as_str(), amount],
    )?;
    ensure_found(changed, id)
}

fn ensure_found(changed: usize, id: &AppointmentId) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn raw_appointment_row(row: &Row<'_>) -> rusqlite::Result<RawAppointment> {
    let cell = |i: usize| -> rusqlite::Result<RawValue> { Ok(row.get::<_, Value>(i)?.into()) };
    Ok(RawAppointment {
        appointment_id: cell(0)?,
        patient_id: cell(1)?,
        date: cell(2)?,
        time: cell(3)?,
        payment_amount: cell(4)?,
        attended: cell(5)?,
        is_first_appointment: cell(6)?,
        coverage_type: cell(7)?,
        canceled: cell(8)?,
    })
}
