use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Opaque appointment identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(pub String);

/// Opaque patient identifier. Not required to resolve to a registered patient.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl AppointmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PatientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Labels treated as the self-pay sentinel, compared case-insensitively.
pub const PRIVATE_COVERAGE_LABELS: &[&str] = &["private", "particular", "self-pay", "self_pay"];

/// Payer category for an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "plan", rename_all = "snake_case")]
pub enum CoverageType {
    /// Self-pay.
    Private,
    /// A named insurance plan.
    Plan(String),
    /// Source row carried no coverage at all.
    Unspecified,
}

impl CoverageType {
    /// Maps a free-text coverage label onto the payer category.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Self::Unspecified;
        }
        if PRIVATE_COVERAGE_LABELS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(trimmed))
        {
            Self::Private
        } else {
            Self::Plan(trimmed.to_string())
        }
    }

    /// Label written back to the store. `None` for `Unspecified`.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Private => Some("Private"),
            Self::Plan(name) => Some(name),
            Self::Unspecified => None,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}

/// One row of the appointment ledger, as seen by the analytics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub appointment_id: AppointmentId,
    pub patient_id: PatientId,
    /// Calendar date as captured upstream; parsed by the engine.
    pub date: String,
    pub time: Option<NaiveTime>,
    pub payment_amount: f64,
    pub attended: bool,
    pub is_first_appointment: bool,
    pub coverage_type: CoverageType,
    pub canceled: bool,
}
