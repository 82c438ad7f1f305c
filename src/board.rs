//! Same-day appointment board: the front desk's view of one day and the
//! three actions taken from it: mark attended, cancel, record payment.
//!
//! Marking an appointment attended also clears its canceled flag. Canceling
//! leaves `attended` alone, so a record can still end up with both flags set
//! (attended first, canceled later); nothing here reconciles that.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, DatabaseError};
use crate::models::*;

/// Shown when an appointment's patient does not resolve.
pub const UNKNOWN_PATIENT: &str = "Unknown";

/// One row on the day board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEntry {
    pub appointment_id: String,
    pub patient_name: String,
    pub time: Option<NaiveTime>,
    pub coverage: String,
    pub payment_amount: f64,
    pub attended: bool,
    pub canceled: bool,
}

/// Timed appointments first, by time; untimed ones after, in ledger order.
fn by_time(a: &Option<NaiveTime>, b: &Option<NaiveTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Appointments scheduled on `date`, sorted by time of day.
pub fn todays_board(conn: &Connection, date: NaiveDate) -> Result<Vec<BoardEntry>, DatabaseError> {
    let mut todays = db::list_appointments_on(conn, date)?;
    todays.sort_by(|a, b| by_time(&a.time, &b.time));

    todays
        .into_iter()
        .map(|record| {
            let patient_name = db::get_patient(conn, &record.patient_id)?
                .map(|p| p.name)
                .unwrap_or_else(|| UNKNOWN_PATIENT.to_string());
            Ok(BoardEntry {
                appointment_id: record.appointment_id.0,
                patient_name,
                time: record.time,
                coverage: record.coverage_type.label().unwrap_or("-").to_string(),
                payment_amount: record.payment_amount,
                attended: record.attended,
                canceled: record.canceled,
            })
        })
        .collect()
}

/// Marks an appointment attended and clears any cancellation.
pub fn mark_attended(conn: &Connection, id: &AppointmentId) -> Result<(), DatabaseError> {
    db::update_appointment_flags(conn, id, Some(true), Some(false))?;
    tracing::info!(appointment_id = %id, "Appointment marked attended");
    Ok(())
}

/// Cancels an appointment. The attended flag is left untouched.
pub fn cancel_appointment(conn: &Connection, id: &AppointmentId) -> Result<(), DatabaseError> {
    db::update_appointment_flags(conn, id, None, Some(true))?;
    tracing::info!(appointment_id = %id, "Appointment canceled");
    Ok(())
}

/// Records the amount collected for an appointment.
pub fn record_payment(conn: &Connection, id: &AppointmentId, amount: f64) -> Result<(), DatabaseError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "payment amount must be a non-negative number, got {amount}"
        )));
    }
    db::update_payment(conn, id, amount)?;
    tracing::info!(appointment_id = %id, amount, "Payment recorded");
    Ok(())
}
