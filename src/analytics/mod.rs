//! Clinic analytics engine: per-period performance metrics over a snapshot
//! of the appointment ledger.
//!
//! Every function here is pure: it takes `&[AppointmentRecord]`, borrows what
//! it needs into working structures (buckets, patient groups) and returns
//! owned results. Nothing is cached between calls, so concurrent callers only
//! need their own snapshot.
//!
//! Series metrics (average ticket, conversion, coverage mix, no-show) are
//! bucketed by year or by (year, month) and exclude records whose date does
//! not parse; those are reported in `KpiReport::skipped_records`. Patient
//! metrics (lifetime value, retention) cover the whole snapshot.

mod buckets;
mod kpis;
pub mod patients;
mod types;

pub use buckets::{bucket_key, parse_record_date};
pub use kpis::*;
pub use patients::PatientVisits;
pub use types::*;

use thiserror::Error;

use crate::models::{AppointmentRecord, Period};

#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid period '{value}': expected 'annual' or 'monthly'")]
    InvalidPeriod { value: String },
}

/// Parse a caller-supplied period label, case-insensitively.
pub fn parse_period(label: &str) -> Result<Period, AnalyticsError> {
    label
        .trim()
        .to_ascii_lowercase()
        .parse::<Period>()
        .map_err(|_| AnalyticsError::InvalidPeriod {
            value: label.to_string(),
        })
}

/// [`compute_kpis`] for a period given as text. A malformed label is the one
/// input the engine refuses.
pub fn compute_kpis_for_label(
    records: &[AppointmentRecord],
    period: &str,
) -> Result<KpiReport, AnalyticsError> {
    let period = parse_period(period)?;
    Ok(compute_kpis(records, period))
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentId, CoverageType, PatientId};

    const EPSILON: f64 = 0.01;

    fn appt(
        id: &str,
        patient: &str,
        date: &str,
        attended: bool,
        coverage: &str,
        payment: f64,
    ) -> AppointmentRecord {
        AppointmentRecord {
            appointment_id: AppointmentId(id.into()),
            patient_id: PatientId(patient.into()),
            date: date.into(),
            time: None,
            payment_amount: payment,
            attended,
            is_first_appointment: false,
            coverage_type: CoverageType::from_label(coverage),
            canceled: false,
        }
    }

    /// Two patients, three appointments across January and February 2024.
    fn scenario() -> Vec<AppointmentRecord> {
        vec![
            appt("1", "A", "2024-01-05", true, "Private", 200.0),
            appt("2", "A", "2024-02-10", true, "Unimed", 150.0),
            appt("3", "B", "2024-01-20", false, "Private", 0.0),
        ]
    }

    fn year(y: i32) -> BucketKey {
        BucketKey::Year(y)
    }

    fn month(y: i32, m: u32) -> BucketKey {
        BucketKey::Month { year: y, month: m }
    }

    #[test]
    fn scenario_annual_kpis() {
        let report = compute_kpis(&scenario(), Period::Annual);

        assert_eq!(report.period, Period::Annual);
        assert_eq!(report.conversion_rate.get(&year(2024)), Some(66.67));
        assert_eq!(report.coverage_mix.get(&year(2024)), Some(33.33));
        assert_eq!(report.no_show_rate.get(&year(2024)), Some(33.33));
        assert_eq!(report.average_ticket.get(&year(2024)), Some(116.67));
        assert_eq!(report.lifetime_value, MetricScalar::Defined(175.0));
        assert_eq!(report.retention_rate, MetricScalar::Defined(50.0));
        assert_eq!(report.skipped_records, 0);
    }

    #[test]
    fn scenario_monthly_buckets() {
        let report = compute_kpis(&scenario(), Period::Monthly);

        let keys: Vec<BucketKey> = report.conversion_rate.keys().copied().collect();
        assert_eq!(keys, vec![month(2024, 1), month(2024, 2)]);
        assert_eq!(report.conversion_rate.get(&month(2024, 1)), Some(50.0));
        assert_eq!(report.conversion_rate.get(&month(2024, 2)), Some(100.0));
        assert_eq!(report.no_show_rate.get(&month(2024, 1)), Some(50.0));
        assert_eq!(report.no_show_rate.get(&month(2024, 2)), Some(0.0));
        assert_eq!(report.average_ticket.get(&month(2024, 1)), Some(100.0));
        assert_eq!(report.coverage_mix.get(&month(2024, 2)), Some(100.0));
        // Patient metrics ignore the period.
        assert_eq!(report.lifetime_value, MetricScalar::Defined(175.0));
        assert_eq!(report.retention_rate, MetricScalar::Defined(50.0));
    }

    #[test]
    fn empty_snapshot_yields_empty_series_and_undefined_scalars() {
        let report = compute_kpis(&[], Period::Monthly);
        assert!(report.average_ticket.is_empty());
        assert!(report.conversion_rate.is_empty());
        assert!(report.coverage_mix.is_empty());
        assert!(report.no_show_rate.is_empty());
        assert_eq!(report.lifetime_value, MetricScalar::Undefined);
        assert_eq!(report.retention_rate, MetricScalar::Undefined);
        assert_eq!(report.lifetime_value.display(), "N/A");
        assert_eq!(report.skipped_records, 0);
    }

    #[test]
    fn lifetime_value_sums_per_patient() {
        let snapshot = vec![
            appt("1", "A", "2024-01-05", true, "Private", 100.0),
            appt("2", "A", "2024-03-05", true, "Private", 50.0),
        ];
        assert_eq!(lifetime_value(&snapshot), MetricScalar::Defined(150.0));
        assert_eq!(lifetime_value(&[]), MetricScalar::Undefined);
    }

    #[test]
    fn conversion_and_no_show_always_sum_to_one_hundred() {
        let mut snapshot = Vec::new();
        for i in 0..37 {
            let date = format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1);
            snapshot.push(appt(&i.to_string(), "P", &date, i % 3 == 0, "Private", 10.0));
        }
        for period in [Period::Annual, Period::Monthly] {
            let report = compute_kpis(&snapshot, period);
            assert!(!report.conversion_rate.is_empty());
            for (key, conversion) in report.conversion_rate.iter() {
                let no_show = report.no_show_rate.get(key).unwrap();
                assert!(
                    (conversion + no_show - 100.0).abs() < EPSILON,
                    "{key}: {conversion} + {no_show}"
                );
            }
        }
    }

    #[test]
    fn standalone_series_match_the_combined_report() {
        let snapshot = scenario();
        let report = compute_kpis(&snapshot, Period::Monthly);
        assert_eq!(average_ticket(&snapshot, Period::Monthly), report.average_ticket);
        assert_eq!(conversion_rate(&snapshot, Period::Monthly), report.conversion_rate);
        assert_eq!(coverage_mix(&snapshot, Period::Monthly), report.coverage_mix);
        assert_eq!(no_show_rate(&snapshot, Period::Monthly), report.no_show_rate);
    }

    #[test]
    fn buckets_partition_every_dated_record() {
        let snapshot = vec![
            appt("1", "A", "2023-12-31", true, "Private", 10.0),
            appt("2", "B", "2024-01-01", false, "Amil", 20.0),
            appt("3", "C", "2024-01-15", true, "Private", 30.0),
            appt("4", "D", "garbage", true, "Private", 40.0),
            appt("5", "E", "2024-06-30 10:00:00", true, "Private", 50.0),
        ];
        for period in [Period::Annual, Period::Monthly] {
            let partition = buckets::partition(&snapshot, period);
            let counted: usize = partition.buckets.values().map(Vec::len).sum();
            assert_eq!(counted + partition.skipped, snapshot.len());
            assert_eq!(partition.skipped, 1);
            assert_eq!(counted, 4);
        }
    }

    #[test]
    fn unparseable_date_is_skipped_from_series_but_counted_for_patients() {
        let mut snapshot = scenario();
        snapshot.push(appt("4", "C", "31/02/2024", true, "Private", 90.0));

        let report = compute_kpis(&snapshot, Period::Annual);

        assert_eq!(report.skipped_records, 1);
        // Series are unchanged by the bad record.
        assert_eq!(report.conversion_rate.get(&year(2024)), Some(66.67));
        assert_eq!(report.average_ticket.get(&year(2024)), Some(116.67));
        assert_eq!(report.average_ticket.len(), 1);
        // Patient C still counts: (350 + 0 + 90) / 3 and 1 of 3 returning.
        assert_eq!(report.lifetime_value, MetricScalar::Defined(146.67));
        assert_eq!(report.retention_rate, MetricScalar::Defined(33.33));
    }

    #[test]
    fn retention_never_drops_when_existing_patients_return() {
        let mut snapshot = vec![
            appt("1", "A", "2024-01-01", true, "Private", 0.0),
            appt("2", "B", "2024-01-02", true, "Private", 0.0),
            appt("3", "C", "2024-01-03", true, "Private", 0.0),
        ];
        let mut previous = retention_rate(&snapshot).value().unwrap();
        assert_eq!(previous, 0.0);

        for (i, patient) in ["A", "A", "B", "C", "B"].iter().enumerate() {
            snapshot.push(appt(&format!("x{i}"), patient, "2024-02-01", false, "Private", 0.0));
            let current = retention_rate(&snapshot).value().unwrap();
            assert!(current >= previous, "{current} < {previous}");
            previous = current;
        }
        assert_eq!(previous, 100.0);
    }

    #[test]
    fn canceled_flag_does_not_affect_conversion() {
        let mut both = appt("1", "A", "2024-01-01", true, "Private", 0.0);
        both.canceled = true;
        let mut canceled_only = appt("2", "B", "2024-01-01", false, "Private", 0.0);
        canceled_only.canceled = true;

        let series = conversion_rate(&[both, canceled_only], Period::Annual);
        assert_eq!(series.get(&year(2024)), Some(50.0));
    }

    #[test]
    fn unspecified_coverage_counts_as_insured() {
        let snapshot = vec![
            appt("1", "A", "2024-01-01", true, "", 0.0),
            appt("2", "B", "2024-01-01", true, "Private", 0.0),
        ];
        assert_eq!(coverage_mix(&snapshot, Period::Annual).get(&year(2024)), Some(50.0));
    }

    #[test]
    fn snapshot_is_not_mutated() {
        let snapshot = scenario();
        let before = snapshot.clone();
        let _ = compute_kpis(&snapshot, Period::Monthly);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn concurrent_callers_get_identical_reports() {
        let snapshot = scenario();
        let expected = compute_kpis(&snapshot, Period::Monthly);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let own = snapshot.clone();
                    s.spawn(move || compute_kpis(&own, Period::Monthly))
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn period_labels_parse_case_insensitively() {
        assert_eq!(parse_period("Annual").unwrap(), Period::Annual);
        assert_eq!(parse_period(" MONTHLY ").unwrap(), Period::Monthly);
    }

    #[test]
    fn malformed_period_is_rejected_loudly() {
        let err = compute_kpis_for_label(&scenario(), "weekly").unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::InvalidPeriod {
                value: "weekly".into()
            }
        );
        assert!(err.to_string().contains("weekly"));
    }

    #[test]
    fn named_metrics_cover_all_six_kpis() {
        let report = compute_kpis(&scenario(), Period::Annual);
        let named = report.named_metrics();
        assert_eq!(named.len(), 6);
        assert!(matches!(named[&MetricName::AverageTicket], Metric::Series(_)));
        assert_eq!(
            named[&MetricName::RetentionRate],
            Metric::Scalar(MetricScalar::Defined(50.0))
        );
    }

    #[test]
    fn report_serializes_series_as_points() {
        let report = compute_kpis(&scenario(), Period::Monthly);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["period"], "monthly");
        assert_eq!(json["conversion_rate"][0]["bucket"], "2024-01");
        assert_eq!(json["conversion_rate"][0]["value"], 50.0);
        assert_eq!(json["lifetime_value"]["defined"], 175.0);
        assert_eq!(json["skipped_records"], 0);
    }
}
