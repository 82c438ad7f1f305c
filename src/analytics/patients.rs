//! Patient-level queries over a snapshot.
//!
//! "How many appointments does this patient have" is answered here and only
//! here: registration asks it to flag a first appointment, the retention KPI
//! asks it to count returning patients.

use std::collections::BTreeMap;

use crate::models::{AppointmentRecord, PatientId};

/// A snapshot's records grouped by patient, in snapshot order.
#[derive(Debug, Default)]
pub struct PatientVisits<'a> {
    visits: BTreeMap<&'a PatientId, Vec<&'a AppointmentRecord>>,
}

impl<'a> PatientVisits<'a> {
    pub fn from_snapshot(records: &'a [AppointmentRecord]) -> Self {
        let mut visits: BTreeMap<&PatientId, Vec<&AppointmentRecord>> = BTreeMap::new();
        for record in records {
            visits.entry(&record.patient_id).or_default().push(record);
        }
        Self { visits }
    }

    /// Number of distinct patients.
    pub fn patient_count(&self) -> usize {
        self.visits.len()
    }

    /// Appointments recorded for `patient`; 0 when unknown.
    pub fn visit_count(&self, patient: &PatientId) -> usize {
        self.visits.get(patient).map_or(0, Vec::len)
    }

    /// Patients with more than one appointment.
    pub fn returning_count(&self) -> usize {
        self.visits.values().filter(|v| v.len() > 1).count()
    }

    /// Whether a new appointment for `patient` would be their first.
    pub fn is_first_appointment(&self, patient: &PatientId) -> bool {
        self.visit_count(patient) == 0
    }

    /// Summed payments per patient.
    pub fn totals(&self) -> impl Iterator<Item = (&'a PatientId, f64)> + '_ {
        self.visits
            .iter()
            .map(|(patient, list)| (*patient, list.iter().map(|r| r.payment_amount).sum::<f64>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentId, CoverageType};

    fn record(id: &str, patient: &str, amount: f64) -> AppointmentRecord {
        AppointmentRecord {
            appointment_id: AppointmentId(id.into()),
            patient_id: PatientId(patient.into()),
            date: "2024-01-01".into(),
            time: None,
            payment_amount: amount,
            attended: true,
            is_first_appointment: false,
            coverage_type: CoverageType::Private,
            canceled: false,
        }
    }

    #[test]
    fn groups_by_patient() {
        let snapshot = vec![record("1", "a", 10.0), record("2", "b", 5.0), record("3", "a", 20.0)];
        let visits = PatientVisits::from_snapshot(&snapshot);
        assert_eq!(visits.patient_count(), 2);
        assert_eq!(visits.visit_count(&PatientId("a".into())), 2);
        assert_eq!(visits.visit_count(&PatientId("z".into())), 0);
        assert_eq!(visits.returning_count(), 1);
    }

    #[test]
    fn first_appointment_only_for_unseen_patients() {
        let snapshot = vec![record("1", "a", 0.0)];
        let visits = PatientVisits::from_snapshot(&snapshot);
        assert!(!visits.is_first_appointment(&PatientId("a".into())));
        assert!(visits.is_first_appointment(&PatientId("b".into())));
        assert!(PatientVisits::from_snapshot(&[]).is_first_appointment(&PatientId("a".into())));
    }

    #[test]
    fn totals_sum_per_patient() {
        let snapshot = vec![record("1", "a", 100.0), record("2", "a", 50.0), record("3", "b", 0.0)];
        let visits = PatientVisits::from_snapshot(&snapshot);
        let totals: Vec<(String, f64)> = visits
            .totals()
            .map(|(p, t)| (p.as_str().to_string(), t))
            .collect();
        assert_eq!(totals, vec![("a".into(), 150.0), ("b".into(), 0.0)]);
    }
}
