//! Metrics for the report pipeline.
//!
//! Recording functions are grouped by phase. Without an installed recorder
//! they are no-ops, so library callers and tests pay nothing.

use std::fmt;
use std::net::SocketAddr;

use ::metrics::Unit;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Every metric name used by the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader
    LoaderRowsLoaded,

    // Cleaning
    CleaningRowsIn,
    CleaningRowsOut,
    CleaningRowsDropped,
    CleaningAgesFilled,
    CleaningAgesClamped,

    // Insights
    InsightsEmitted,
    InsightsOmitted,

    // Rendering
    RenderChartsWritten,

    // Report runs
    ReportRunsSuccess,
    ReportRunsError,
    ReportDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LoaderRowsLoaded => "event_insights_loader_rows_loaded_total",

            MetricName::CleaningRowsIn => "event_insights_cleaning_rows_in_total",
            MetricName::CleaningRowsOut => "event_insights_cleaning_rows_out_total",
            MetricName::CleaningRowsDropped => "event_insights_cleaning_rows_dropped_total",
            MetricName::CleaningAgesFilled => "event_insights_cleaning_ages_filled_total",
            MetricName::CleaningAgesClamped => "event_insights_cleaning_ages_clamped_total",

            MetricName::InsightsEmitted => "event_insights_insights_emitted_total",
            MetricName::InsightsOmitted => "event_insights_insights_omitted_total",

            MetricName::RenderChartsWritten => "event_insights_render_charts_written_total",

            MetricName::ReportRunsSuccess => "event_insights_report_runs_success_total",
            MetricName::ReportRunsError => "event_insights_report_runs_error_total",
            MetricName::ReportDuration => "event_insights_report_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            LoaderRowsLoaded,
            CleaningRowsIn,
            CleaningRowsOut,
            CleaningRowsDropped,
            CleaningAgesFilled,
            CleaningAgesClamped,
            InsightsEmitted,
            InsightsOmitted,
            RenderChartsWritten,
            ReportRunsSuccess,
            ReportRunsError,
            ReportDuration,
        ]
        .into_iter()
    }

    /// (phase, description, unit). Only histograms carry a unit.
    pub fn metadata(&self) -> (&'static str, &'static str, Option<Unit>) {
        match self {
            MetricName::LoaderRowsLoaded => ("loader", "Rows read from the input table", None),

            MetricName::CleaningRowsIn => ("cleaning", "Rows entering the cleaning stage", None),
            MetricName::CleaningRowsOut => ("cleaning", "Rows surviving the cleaning stage", None),
            MetricName::CleaningRowsDropped => ("cleaning", "Rows dropped, by reason", None),
            MetricName::CleaningAgesFilled => ("cleaning", "Missing ages filled with the mean", None),
            MetricName::CleaningAgesClamped => ("cleaning", "Ages clamped into range", None),

            MetricName::InsightsEmitted => ("insights", "Insight facts emitted", None),
            MetricName::InsightsOmitted => ("insights", "Insights omitted for lack of data", None),

            MetricName::RenderChartsWritten => ("render", "Chart images written", None),

            MetricName::ReportRunsSuccess => ("report", "Successful report runs", None),
            MetricName::ReportRunsError => ("report", "Failed report runs", None),
            MetricName::ReportDuration => ("report", "Report run duration", Some(Unit::Seconds)),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder with a scrape endpoint on `addr`.
///
/// Must be called from inside a tokio runtime.
pub fn init(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;
    for metric in MetricName::all_metrics() {
        let (_, description, unit) = metric.metadata();
        let name = metric.as_str();
        match unit {
            Some(unit) => ::metrics::describe_histogram!(name, unit, description),
            None => ::metrics::describe_counter!(name, description),
        }
    }
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

// ============================================================================
// Loader Metrics
// ============================================================================

pub mod loader {
    use super::MetricName;

    pub fn rows_loaded(count: usize) {
        ::metrics::counter!(MetricName::LoaderRowsLoaded.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Cleaning Metrics
// ============================================================================

pub mod cleaning {
    use super::MetricName;
    use crate::pipeline::processing::clean::CleaningSummary;

    fn dropped(reason: &'static str, count: usize) {
        if count > 0 {
            ::metrics::counter!(MetricName::CleaningRowsDropped.as_str(), "reason" => reason)
                .increment(count as u64);
        }
    }

    /// Record the counters of one cleaning run.
    pub fn summary_recorded(summary: &CleaningSummary) {
        ::metrics::counter!(MetricName::CleaningRowsIn.as_str()).increment(summary.rows_in as u64);
        ::metrics::counter!(MetricName::CleaningRowsOut.as_str()).increment(summary.rows_out as u64);
        ::metrics::counter!(MetricName::CleaningAgesFilled.as_str())
            .increment(summary.ages_filled as u64);
        ::metrics::counter!(MetricName::CleaningAgesClamped.as_str())
            .increment(summary.ages_clamped as u64);

        dropped("invalid_date", summary.invalid_dates);
        dropped("invalid_number", summary.invalid_numbers);
        dropped("duplicate", summary.duplicates);
        dropped("price_outlier", summary.price_outliers);
    }
}

// ============================================================================
// Insight Metrics
// ============================================================================

pub mod insights {
    use super::MetricName;

    pub fn emitted(count: usize) {
        ::metrics::counter!(MetricName::InsightsEmitted.as_str()).increment(count as u64);
    }

    pub fn omitted(insight: &str) {
        ::metrics::counter!(MetricName::InsightsOmitted.as_str(), "insight" => insight.to_string())
            .increment(1);
    }
}

// ============================================================================
// Render Metrics
// ============================================================================

pub mod render {
    use super::MetricName;

    pub fn chart_written(chart: &str) {
        ::metrics::counter!(MetricName::RenderChartsWritten.as_str(), "chart" => chart.to_string())
            .increment(1);
    }
}

// ============================================================================
// Report Metrics
// ============================================================================

pub mod report {
    use super::MetricName;

    pub fn run_succeeded(duration_secs: f64) {
        ::metrics::counter!(MetricName::ReportRunsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::ReportDuration.as_str()).record(duration_secs);
    }

    pub fn run_failed(error_kind: &'static str) {
        ::metrics::counter!(MetricName::ReportRunsError.as_str(), "error" => error_kind).increment(1);
    }
}
