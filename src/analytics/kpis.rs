use crate::models::{AppointmentRecord, Period};

use super::buckets::{partition, Partition};
use super::patients::PatientVisits;
use super::types::*;

/// Round half-to-even at 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Share of `part` in `total` as a percentage, unrounded.
fn percentage(part: usize, total: usize) -> f64 {
    part as f64 / total as f64 * 100.0
}

/// Applies `f` to every non-empty bucket of a partition.
fn series_of<F>(partition: &Partition<'_>, f: F) -> MetricSeries
where
    F: Fn(&[&AppointmentRecord]) -> f64,
{
    partition
        .buckets
        .iter()
        .filter(|(_, records)| !records.is_empty())
        .map(|(key, records)| (*key, f(records.as_slice())))
        .collect()
}

fn average_ticket_of(partition: &Partition<'_>) -> MetricSeries {
    series_of(partition, |records| {
        let total: f64 = records.iter().map(|r| r.payment_amount).sum();
        round2(total / records.len() as f64)
    })
}

fn conversion_rate_of(partition: &Partition<'_>) -> MetricSeries {
    series_of(partition, |records| {
        let attended = records.iter().filter(|r| r.attended).count();
        round2(percentage(attended, records.len()))
    })
}

fn coverage_mix_of(partition: &Partition<'_>) -> MetricSeries {
    series_of(partition, |records| {
        let covered = records.iter().filter(|r| !r.coverage_type.is_private()).count();
        round2(percentage(covered, records.len()))
    })
}

/// Complement of an already-rounded conversion series, bucket for bucket.
fn no_show_from(conversion: &MetricSeries) -> MetricSeries {
    conversion
        .iter()
        .map(|(key, rate)| (*key, round2(100.0 - rate)))
        .collect()
}

/// Mean payment per appointment, per bucket.
pub fn average_ticket(records: &[AppointmentRecord], period: Period) -> MetricSeries {
    average_ticket_of(&partition(records, period))
}

/// Attended appointments as a percentage of all appointments, per bucket.
/// Canceled appointments still count toward the total.
pub fn conversion_rate(records: &[AppointmentRecord], period: Period) -> MetricSeries {
    conversion_rate_of(&partition(records, period))
}

/// Percentage of appointments not paid privately, per bucket.
pub fn coverage_mix(records: &[AppointmentRecord], period: Period) -> MetricSeries {
    coverage_mix_of(&partition(records, period))
}

/// Percentage of appointments not attended, per bucket. Always the exact
/// complement of [`conversion_rate`] for the same bucket.
pub fn no_show_rate(records: &[AppointmentRecord], period: Period) -> MetricSeries {
    no_show_from(&conversion_rate(records, period))
}

/// Mean over patients of each patient's total payments. Whole snapshot,
/// including records whose date does not parse.
pub fn lifetime_value(records: &[AppointmentRecord]) -> MetricScalar {
    let visits = PatientVisits::from_snapshot(records);
    let patients = visits.patient_count();
    if patients == 0 {
        return MetricScalar::Undefined;
    }
    let total: f64 = visits.totals().map(|(_, t)| t).sum();
    MetricScalar::Defined(round2(total / patients as f64))
}

/// Percentage of distinct patients with more than one appointment. Whole
/// snapshot, including records whose date does not parse.
pub fn retention_rate(records: &[AppointmentRecord]) -> MetricScalar {
    let visits = PatientVisits::from_snapshot(records);
    let patients = visits.patient_count();
    if patients == 0 {
        return MetricScalar::Undefined;
    }
    MetricScalar::Defined(round2(percentage(visits.returning_count(), patients)))
}

/// Computes every KPI for one snapshot in a single pass over the buckets.
pub fn compute_kpis(records: &[AppointmentRecord], period: Period) -> KpiReport {
    let partition = partition(records, period);
    let conversion = conversion_rate_of(&partition);

    let report = KpiReport {
        period,
        average_ticket: average_ticket_of(&partition),
        no_show_rate: no_show_from(&conversion),
        conversion_rate: conversion,
        coverage_mix: coverage_mix_of(&partition),
        lifetime_value: lifetime_value(records),
        retention_rate: retention_rate(records),
        skipped_records: partition.skipped,
    };

    tracing::debug!(
        period = %period,
        records = records.len(),
        buckets = report.average_ticket.len(),
        skipped = report.skipped_records,
        "Computed clinic KPIs"
    );

    report
}
