//! Patient and appointment registration.
//!
//! New appointments start unpaid, unattended and not canceled. Whether one is
//! the patient's first is decided here, once, from the current ledger
//! snapshot through `analytics::PatientVisits`, the same query the retention
//! KPI uses.

use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::PatientVisits;
use crate::db::{self, DatabaseError};
use crate::models::*;

/// Coverage choices offered when scheduling.
pub const COVERAGE_OPTIONS: &[&str] = &["Unimed", "Bradesco Saúde", "Amil", "Private", "Other"];

/// Input for registering a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub referral_source: ReferralSource,
}

/// Input for scheduling an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub patient_id: String,
    pub date: String,         // YYYY-MM-DD
    pub time: Option<String>, // HH:MM
    pub coverage: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Registers a patient. Returns the stored patient with its generated id.
pub fn register_patient(
    conn: &rusqlite::Connection,
    input: NewPatient,
) -> Result<Patient, DatabaseError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "patient name must not be empty".into(),
        ));
    }

    let now = Local::now().naive_local();
    let patient = Patient {
        id: PatientId(Uuid::new_v4().to_string()),
        name,
        phone: non_blank(input.phone),
        email: non_blank(input.email),
        referral_source: input.referral_source,
        registered_at: now.with_nanosecond(0).unwrap_or(now),
    };
    db::insert_patient(conn, &patient)?;

    tracing::info!(patient_id = %patient.id, "Registered patient");
    Ok(patient)
}

/// Schedules an appointment for a registered patient.
pub fn schedule_appointment(
    conn: &rusqlite::Connection,
    request: &AppointmentRequest,
) -> Result<AppointmentRecord, DatabaseError> {
    let patient_id = PatientId(request.patient_id.trim().to_string());
    if db::get_patient(conn, &patient_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: patient_id.to_string(),
        });
    }

    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d").map_err(|_| {
        DatabaseError::ConstraintViolation(format!(
            "appointment date '{}' is not YYYY-MM-DD",
            request.date
        ))
    })?;

    let time = match request.time.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
            DatabaseError::ConstraintViolation(format!("appointment time '{raw}' is not HH:MM"))
        })?),
    };

    let snapshot = db::load_snapshot(conn)?;
    let is_first_appointment = PatientVisits::from_snapshot(&snapshot).is_first_appointment(&patient_id);

    let record = AppointmentRecord {
        appointment_id: AppointmentId(Uuid::new_v4().to_string()),
        patient_id,
        date: date.format("%Y-%m-%d").to_string(),
        time,
        payment_amount: 0.0,
        attended: false,
        is_first_appointment,
        coverage_type: CoverageType::from_label(&request.coverage),
        canceled: false,
    };
    db::insert_appointment(conn, &record)?;

    tracing::info!(
        appointment_id = %record.appointment_id,
        first = record.is_first_appointment,
        "Scheduled appointment"
    );
    Ok(record)
}
