//! KPI dashboard: the presentation payload for the analytics report.

use serde::{Deserialize, Serialize};

use crate::analytics::{compute_kpis, KpiReport, MetricScalar, MetricSeries};
use crate::models::{AppointmentRecord, Period};

pub const CURRENCY_LABEL: &str = "R$";
pub const NO_DATA_WARNING: &str = "No appointment data available to calculate KPIs.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionBody {
    Table { column: String, rows: Vec<SeriesRow> },
    Value { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub bucket: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSection {
    pub title: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub period: Period,
    pub warning: Option<String>,
    pub sections: Vec<DashboardSection>,
    pub skipped_records: usize,
}

fn table(title: String, column: &str, series: &MetricSeries) -> DashboardSection {
    DashboardSection {
        title,
        body: SectionBody::Table {
            column: column.to_string(),
            rows: series
                .iter()
                .map(|(bucket, value)| SeriesRow {
                    bucket: bucket.to_string(),
                    value,
                })
                .collect(),
        },
    }
}

fn scalar(title: &str, value: MetricScalar) -> DashboardSection {
    DashboardSection {
        title: title.to_string(),
        body: SectionBody::Value {
            text: value.display(),
        },
    }
}

/// Lays a computed report out as dashboard sections, in display order.
pub fn render_report(report: &KpiReport) -> Vec<DashboardSection> {
    let label = report.period.label();
    vec![
        table(
            format!("{label} Average Ticket ({CURRENCY_LABEL})"),
            "Average Ticket",
            &report.average_ticket,
        ),
        table(
            format!("{label} Conversion Rate (%)"),
            "Conversion Rate",
            &report.conversion_rate,
        ),
        table(
            format!("{label} Insurance Percentage (%)"),
            "Insurance Percentage",
            &report.coverage_mix,
        ),
        table(
            format!("{label} No-show Rate (%)"),
            "No-show Rate",
            &report.no_show_rate,
        ),
        scalar(&format!("Average LTV ({CURRENCY_LABEL})"), report.lifetime_value),
        scalar("Retention Rate (%)", report.retention_rate),
    ]
}

/// Builds the dashboard for a snapshot. An empty snapshot produces only the
/// no-data warning.
pub fn build_dashboard(records: &[AppointmentRecord], period: Period) -> DashboardView {
    if records.is_empty() {
        return DashboardView {
            period,
            warning: Some(NO_DATA_WARNING.to_string()),
            sections: Vec::new(),
            skipped_records: 0,
        };
    }

    let report = compute_kpis(records, period);
    DashboardView {
        period,
        warning: None,
        sections: render_report(&report),
        skipped_records: report.skipped_records,
    }
}
