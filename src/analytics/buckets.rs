use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::models::{AppointmentRecord, Period};

use super::types::BucketKey;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a record's captured date. Time-of-day, when present, is dropped.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

pub fn bucket_key(date: NaiveDate, period: Period) -> BucketKey {
    match period {
        Period::Annual => BucketKey::Year(date.year()),
        Period::Monthly => BucketKey::Month {
            year: date.year(),
            month: date.month(),
        },
    }
}

/// Records grouped by bucket, plus the ones whose date did not parse.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub buckets: BTreeMap<BucketKey, Vec<&'a AppointmentRecord>>,
    pub skipped: usize,
}

/// Split a snapshot into period buckets. Works on borrowed records; the
/// caller's snapshot is never touched.
pub fn partition(records: &[AppointmentRecord], period: Period) -> Partition<'_> {
    let mut partition = Partition::default();
    for record in records {
        match parse_record_date(&record.date) {
            Some(date) => partition
                .buckets
                .entry(bucket_key(date, period))
                .or_default()
                .push(record),
            None => {
                tracing::warn!(
                    appointment_id = %record.appointment_id,
                    date = %record.date,
                    "Skipping record with unparseable date"
                );
                partition.skipped += 1;
            }
        }
    }
    partition
}
