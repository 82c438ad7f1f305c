use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::models::Period;

/// Time bucket a record falls into for a series metric.
///
/// A series only ever holds keys of one shape, so ordering across the two
/// variants never matters; within a variant it is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Year(i32),
    Month { year: i32, month: u32 },
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered mapping from bucket to value, ascending by bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeries(BTreeMap<BucketKey, f64>);

impl MetricSeries {
    pub fn get(&self, key: &BucketKey) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &BucketKey> {
        self.0.keys()
    }

    /// Points in ascending bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(BucketKey, f64)> for MetricSeries {
    fn from_iter<I: IntoIterator<Item = (BucketKey, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Serialized as `[{ "bucket": "2024-01", "value": 50.0 }, ...]`, since JSON
/// object keys cannot carry the structured bucket.
impl Serialize for MetricSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Point<'a> {
            bucket: &'a BucketKey,
            value: f64,
        }

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (bucket, value) in &self.0 {
            seq.serialize_element(&Point {
                bucket,
                value: *value,
            })?;
        }
        seq.end()
    }
}

/// A whole-snapshot value, or an explicit marker for "no data".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricScalar {
    Defined(f64),
    Undefined,
}

impl MetricScalar {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    /// Display form: the value with 2 decimals, or `N/A`.
    pub fn display(&self) -> String {
        match self {
            Self::Defined(v) => format!("{v:.2}"),
            Self::Undefined => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    AverageTicket,
    LifetimeValue,
    ConversionRate,
    CoverageMix,
    NoShowRate,
    RetentionRate,
}

impl MetricName {
    pub const ALL: [MetricName; 6] = [
        Self::AverageTicket,
        Self::ConversionRate,
        Self::CoverageMix,
        Self::NoShowRate,
        Self::LifetimeValue,
        Self::RetentionRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AverageTicket => "average_ticket",
            Self::LifetimeValue => "lifetime_value",
            Self::ConversionRate => "conversion_rate",
            Self::CoverageMix => "coverage_mix",
            Self::NoShowRate => "no_show_rate",
            Self::RetentionRate => "retention_rate",
        }
    }
}

/// A borrowed view of one metric in a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric<'a> {
    Series(&'a MetricSeries),
    Scalar(MetricScalar),
}

/// Everything the engine produces for one snapshot and period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub period: Period,
    pub average_ticket: MetricSeries,
    pub conversion_rate: MetricSeries,
    pub coverage_mix: MetricSeries,
    pub no_show_rate: MetricSeries,
    pub lifetime_value: MetricScalar,
    pub retention_rate: MetricScalar,
    /// Records excluded from bucketed metrics because their date did not parse.
    pub skipped_records: usize,
}

impl KpiReport {
    pub fn metric(&self, name: MetricName) -> Metric<'_> {
        match name {
            MetricName::AverageTicket => Metric::Series(&self.average_ticket),
            MetricName::ConversionRate => Metric::Series(&self.conversion_rate),
            MetricName::CoverageMix => Metric::Series(&self.coverage_mix),
            MetricName::NoShowRate => Metric::Series(&self.no_show_rate),
            MetricName::LifetimeValue => Metric::Scalar(self.lifetime_value),
            MetricName::RetentionRate => Metric::Scalar(self.retention_rate),
        }
    }

    /// Every metric keyed by name.
    pub fn named_metrics(&self) -> BTreeMap<MetricName, Metric<'_>> {
        MetricName::ALL
            .iter()
            .map(|name| (*name, self.metric(*name)))
            .collect()
    }
}
