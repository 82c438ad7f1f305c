use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::appointment::PatientId;
use super::enums::ReferralSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub referral_source: ReferralSource,
    pub registered_at: NaiveDateTime,
}
