//! Command-line surface of `clinic-ops`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::analytics;
use crate::commands;
use crate::config::{self, SettingsUpdate};
use crate::db;
use crate::models::{AppointmentId, Period, ReferralSource, Theme};
use crate::registration::{AppointmentRequest, NewPatient};

/// Clinic operations ledger
#[derive(Parser, Debug)]
#[command(name = "clinic-ops", version, about = "Clinic ledger, day board and KPI dashboard")]
pub struct Cli {
    /// Ledger database path (default: ~/ClinicOps/ledger.db)
    #[arg(long, env = "CLINIC_OPS_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Settings file path (default: ~/ClinicOps/settings.json)
    #[arg(long, env = "CLINIC_OPS_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the KPI dashboard as JSON
    Kpis {
        /// annual or monthly (case-insensitive)
        #[arg(value_parser = analytics::parse_period)]
        period: Period,
    },

    /// Import a JSON array of appointment rows
    Import { path: PathBuf },

    /// Print the appointment board for a day
    Board {
        /// YYYY-MM-DD (default: today)
        date: Option<NaiveDate>,
    },

    /// Register a new patient
    RegisterPatient {
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// social_media, website, google, referral or other
        #[arg(long, default_value = "other")]
        referral: ReferralSource,
    },

    /// Schedule an appointment for a registered patient
    Schedule {
        patient_id: String,
        /// YYYY-MM-DD
        date: String,
        /// HH:MM
        #[arg(long)]
        time: Option<String>,
        /// Unimed, Bradesco Saúde, Amil, Private or Other
        #[arg(long, default_value = "Private")]
        coverage: String,
    },

    /// Mark an appointment attended
    Attend { appointment_id: String },

    /// Cancel an appointment
    Cancel { appointment_id: String },

    /// Record the amount paid for an appointment
    Pay { appointment_id: String, amount: f64 },

    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        username: Option<String>,
        /// light or dark
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        notifications: Option<bool>,
        /// Dashboard refresh interval, 1 to 60 seconds
        #[arg(long)]
        refresh_rate: Option<u32>,
    },
}

impl Cli {
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger.clone().unwrap_or_else(config::ledger_db_path)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(config::settings_path)
    }
}

fn open_ledger(path: &Path) -> Result<Connection, String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    db::open_database(path).map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

/// Runs a parsed command and returns its JSON output. The ledger is only
/// opened by commands that need it.
pub fn execute(cli: Cli) -> Result<String, String> {
    let settings_path = cli.settings_path();
    let ledger_path = cli.ledger_path();

    match cli.command {
        Command::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => to_json(&commands::show_settings(&settings_path)?),
            SettingsAction::Set {
                username,
                theme,
                notifications,
                refresh_rate,
            } => to_json(&commands::update_settings(
                &settings_path,
                SettingsUpdate {
                    username,
                    theme,
                    notifications,
                    refresh_rate_secs: refresh_rate,
                },
            )?),
        },
        command => {
            let conn = open_ledger(&ledger_path)?;
            execute_on_ledger(&conn, command)
        }
    }
}

fn execute_on_ledger(conn: &Connection, command: Command) -> Result<String, String> {
    match command {
        Command::Kpis { period } => to_json(&commands::kpis(conn, period)?),
        Command::Import { path } => to_json(&commands::import(conn, &path)?),
        Command::Board { date } => to_json(&commands::board(conn, date)?),
        Command::RegisterPatient {
            name,
            phone,
            email,
            referral,
        } => to_json(&commands::register_patient(
            conn,
            NewPatient {
                name,
                phone,
                email,
                referral_source: referral,
            },
        )?),
        Command::Schedule {
            patient_id,
            date,
            time,
            coverage,
        } => to_json(&commands::schedule(
            conn,
            &AppointmentRequest {
                patient_id,
                date,
                time,
                coverage,
            },
        )?),
        Command::Attend { appointment_id } => {
            to_json(&commands::attend(conn, &AppointmentId(appointment_id))?)
        }
        Command::Cancel { appointment_id } => {
            to_json(&commands::cancel(conn, &AppointmentId(appointment_id))?)
        }
        Command::Pay {
            appointment_id,
            amount,
        } => to_json(&commands::pay(conn, &AppointmentId(appointment_id), amount)?),
        Command::Settings { .. } => Err("settings do not live in the ledger".into()),
    }
}
