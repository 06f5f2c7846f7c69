//! Report assembly and persistence.
//!
//! A [`DashboardReport`] bundles the computed dashboard with the chart
//! options the front end feeds to ECharts. Reports are written as JSON,
//! optionally gzip-compressed; their summaries can also be appended to a
//! history CSV.

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::{Value, json};
use snafu::ResultExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::aggregate::Aggregation;
use crate::analyzers::analyzer::Dashboard;
use crate::analyzers::types::Status;
use crate::auth::AuthenticatedUser;
use crate::error::{Result, SerializeReportSnafu, WriteCsvSnafu, WriteOutputSnafu};
use crate::stats::{SummaryRecord, SummaryStats};
use crate::table::Tracking;

/// ECharts options for the three summary charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charts {
    pub assignment: Value,
    pub status: Value,
    pub progress: Value,
}

impl Charts {
    pub fn build(summary: &SummaryStats, aggregation: &Aggregation, title: &str) -> Self {
        Charts {
            assignment: assignment_pie(summary),
            status: status_bar(summary),
            progress: progress_bar(aggregation, title),
        }
    }
}

/// Assigned vs. remaining boards, titled with the overall completion.
pub fn assignment_pie(summary: &SummaryStats) -> Value {
    json!({
        "title": { "text": format!("{:.2}%", summary.completion_pct), "left": "center" },
        "tooltip": { "trigger": "item" },
        "legend": { "top": "5%", "left": "center" },
        "series": [{
            "name": "Delegados",
            "type": "pie",
            "radius": ["40%", "70%"],
            "data": [
                { "value": summary.assigned_count, "name": "Asignados" },
                { "value": summary.remaining, "name": "Faltantes" },
            ],
        }],
    })
}

/// Locations per status, in green/yellow/red order.
pub fn status_bar(summary: &SummaryStats) -> Value {
    let data: Vec<Value> = Status::ALL
        .iter()
        .map(|s| {
            json!({
                "value": summary.status_counts.get(*s),
                "itemStyle": { "color": s.color() },
            })
        })
        .collect();

    json!({
        "xAxis": {
            "type": "category",
            "data": Status::ALL.iter().map(|s| s.label()).collect::<Vec<_>>(),
        },
        "yAxis": { "type": "value" },
        "series": [{ "type": "bar", "data": data }],
    })
}

/// Completion percentage per group, highest first.
pub fn progress_bar(aggregation: &Aggregation, title: &str) -> Value {
    let labels: Vec<&str> = aggregation.series.iter().map(|p| p.label.as_str()).collect();
    let values: Vec<f64> = aggregation.series.iter().map(|p| p.ratio).collect();

    json!({
        "title": { "text": title },
        "tooltip": { "trigger": "axis", "formatter": "{b}: {c}%" },
        "xAxis": { "type": "value", "max": 100 },
        "yAxis": { "type": "category", "data": labels, "inverse": true },
        "series": [{
            "name": "Porcentaje de avance",
            "type": "bar",
            "data": values,
            "label": { "show": true, "position": "right", "formatter": "{c}%" },
        }],
    })
}

/// One serialized dashboard, as written to disk or S3.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub user: AuthenticatedUser,
    pub tracking: Tracking,
    pub title: &'static str,
    #[serde(flatten)]
    pub dashboard: Dashboard,
    pub charts: Option<Charts>,
}

impl DashboardReport {
    pub fn new(user: AuthenticatedUser, tracking: Tracking, dashboard: Dashboard) -> Self {
        let charts = match (&dashboard.summary, &dashboard.aggregation) {
            (Some(summary), Some(aggregation)) => Some(Charts::build(
                summary,
                aggregation,
                "Porcentaje de avance",
            )),
            _ => None,
        };

        DashboardReport {
            generated_at: Utc::now(),
            user,
            tracking,
            title: tracking.title(),
            dashboard,
            charts,
        }
    }

    /// Flat history row, `None` for an empty dashboard.
    pub fn summary_record(&self) -> Option<SummaryRecord> {
        let summary = self.dashboard.summary.as_ref()?;
        let selection = &self.dashboard.selection;
        let owned = |v: Option<&str>| v.map(str::to_string);

        Some(SummaryRecord {
            timestamp: self.generated_at,
            username: self.user.username.clone(),
            tracking: self.tracking.to_string(),
            province: owned(selection.province.value()),
            sub_division: owned(selection.sub_division.value()),
            canton: owned(selection.canton.value()),
            parish: owned(selection.parish.value()),
            locations: summary.locations,
            total_units: summary.total_units,
            assigned_count: summary.assigned_count,
            remaining: summary.remaining,
            completion_pct: summary.completion_pct,
            green: summary.status_counts.green,
            yellow: summary.status_counts.yellow,
            red: summary.status_counts.red,
        })
    }

    /// JSON bytes, gzip-compressed when asked.
    pub fn encode(&self, gzip: bool) -> Result<Vec<u8>> {
        let json = serde_json::to_vec_pretty(self).context(SerializeReportSnafu)?;
        if !gzip {
            return Ok(json);
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .context(WriteOutputSnafu { path: "<gzip>" })?;
        encoder.finish().context(WriteOutputSnafu { path: "<gzip>" })
    }
}

/// Writes `bytes` to `path`, or to stdout when `path` is `-`.
pub fn write_report(path: &str, bytes: &[u8]) -> Result<()> {
    if path == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(bytes)
            .and_then(|_| stdout.write_all(b"\n"))
            .context(WriteOutputSnafu { path })?;
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context(WriteOutputSnafu { path })?;
    }
    std::fs::write(path, bytes).context(WriteOutputSnafu { path })?;
    info!(path, bytes = bytes.len(), "Report written");
    Ok(())
}

/// Appends a [`SummaryRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &SummaryRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .context(WriteOutputSnafu { path })?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record).context(WriteCsvSnafu { path })?;
    writer.flush().context(WriteOutputSnafu { path })?;

    Ok(())
}
