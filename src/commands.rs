//! Command handlers behind the `clinic-ops` binary.
//!
//! Each handler opens nothing itself: it takes a connection (or a settings
//! path), calls into the core modules and flattens errors to `String` for
//! display.

use std::path::Path;

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::board::{self, BoardEntry};
use crate::config::{self, ClinicSettings, SettingsUpdate};
use crate::dashboard::{self, DashboardView};
use crate::db;
use crate::ingest::{self, RejectedRow};
use crate::models::{AppointmentId, AppointmentRecord, Patient, Period};
use crate::registration::{self, AppointmentRequest, NewPatient};

/// Outcome of an `import` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: Vec<RejectedRow>,
}

// ═══════════════════════════════════════════
// Dashboard + import
// ═══════════════════════════════════════════

/// Builds the KPI dashboard for the stored ledger.
pub fn kpis(conn: &Connection, period: Period) -> Result<DashboardView, String> {
    let snapshot = db::load_snapshot(conn).map_err(|e| e.to_string())?;
    Ok(dashboard::build_dashboard(&snapshot, period))
}

/// Normalizes a JSON export of appointment rows and stores it in one
/// transaction. Rows with an id already in the ledger replace the stored row.
pub fn import(conn: &Connection, path: &Path) -> Result<ImportSummary, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    let batch = ingest::normalize_json(&value);

    let tx = conn.unchecked_transaction().map_err(|e| e.to_string())?;
    for record in &batch.records {
        db::upsert_appointment(&tx, record).map_err(|e| e.to_string())?;
    }
    tx.commit().map_err(|e| e.to_string())?;

    tracing::info!(
        imported = batch.records.len(),
        rejected = batch.rejected.len(),
        path = %path.display(),
        "Import finished"
    );
    Ok(ImportSummary {
        imported: batch.records.len(),
        rejected: batch.rejected,
    })
}

// ═══════════════════════════════════════════
// Front desk
// ═══════════════════════════════════════════

/// The day board for `date`, or today when absent.
pub fn board(conn: &Connection, date: Option<NaiveDate>) -> Result<Vec<BoardEntry>, String> {
    let day = date.unwrap_or_else(|| Local::now().date_naive());
    board::todays_board(conn, day).map_err(|e| e.to_string())
}

pub fn register_patient(conn: &Connection, input: NewPatient) -> Result<Patient, String> {
    registration::register_patient(conn, input).map_err(|e| e.to_string())
}

pub fn schedule(conn: &Connection, request: &AppointmentRequest) -> Result<AppointmentRecord, String> {
    registration::schedule_appointment(conn, request).map_err(|e| e.to_string())
}

/// Marks an appointment attended and returns it as stored.
pub fn attend(conn: &Connection, id: &AppointmentId) -> Result<AppointmentRecord, String> {
    board::mark_attended(conn, id).map_err(|e| e.to_string())?;
    stored_appointment(conn, id)
}

/// Cancels an appointment and returns it as stored.
pub fn cancel(conn: &Connection, id: &AppointmentId) -> Result<AppointmentRecord, String> {
    board::cancel_appointment(conn, id).map_err(|e| e.to_string())?;
    stored_appointment(conn, id)
}

/// Records a payment and returns the appointment as stored.
pub fn pay(conn: &Connection, id: &AppointmentId, amount: f64) -> Result<AppointmentRecord, String> {
    board::record_payment(conn, id, amount).map_err(|e| e.to_string())?;
    stored_appointment(conn, id)
}

fn stored_appointment(conn: &Connection, id: &AppointmentId) -> Result<AppointmentRecord, String> {
    db::get_appointment(conn, id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("appointment {id} not found"))
}

// ═══════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════

pub fn show_settings(path: &Path) -> Result<ClinicSettings, String> {
    config::load_settings(path).map_err(|e| e.to_string())
}

pub fn update_settings(path: &Path, update: SettingsUpdate) -> Result<ClinicSettings, String> {
    config::update_settings(path, update).map_err(|e| e.to_string())
}
