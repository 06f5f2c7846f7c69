//! Error taxonomy for the dashboard library.
//!
//! Only failures that stop a computation live here. Recoverable conditions
//! (live source down, empty working set, zero capacity) are reported as
//! [`crate::analyzers::types::Notice`] values instead.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DashboardError {
    #[snafu(display("Failed to open location table {path}: {source}"))]
    OpenTable {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read CSV {path}: {source}"))]
    ReadCsv { path: String, source: csv::Error },

    #[snafu(display("Failed to open workbook {path}: {source}"))]
    OpenWorkbook {
        path: String,
        source: calamine::XlsxError,
    },

    #[snafu(display("Workbook {path} has no sheet or no header row"))]
    EmptyWorkbook { path: String },

    #[snafu(display("Unsupported table format for {path} (expected .csv or .xlsx)"))]
    UnsupportedFormat { path: String },

    #[snafu(display("Location table is missing required column '{column}'"))]
    MissingColumn { column: String },

    #[snafu(display("Row {row}: column '{column}' has invalid value '{value}'"))]
    InvalidCell {
        row: usize,
        column: String,
        value: String,
    },

    #[snafu(display("Failed to load query {path}: {source}"))]
    LoadQuery {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Query {path} is empty"))]
    EmptyQuery { path: String },

    #[snafu(display("Count gateway request failed: {source}"))]
    Gateway { source: reqwest::Error },

    #[snafu(display("Count gateway returned status {status}: {body}"))]
    GatewayStatus { status: u16, body: String },

    #[snafu(display("Failed to encode count query '{query}': {source}"))]
    EncodeQuery {
        query: String,
        source: serde_json::Error,
    },

    #[snafu(display("Invalid count gateway URL '{url}'"))]
    GatewayUrl { url: String },

    #[snafu(display("Failed to read count export {path}: {source}"))]
    ReadExport { path: String, source: csv::Error },

    #[snafu(display("Count export {path} is missing column '{column}'"))]
    ExportColumn { path: String, column: String },

    #[snafu(display("Live count query '{query}' timed out after {seconds}s"))]
    QueryTimeout { query: String, seconds: u64 },

    #[snafu(display("No live count source is configured"))]
    NoCountSource,

    #[snafu(display("Access denied for '{identity}': {reason}"))]
    AccessDenied { identity: String, reason: String },

    #[snafu(display("Failed to read users file {path}: {source}"))]
    ReadUsers {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse users file {path}: {source}"))]
    ParseUsers {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("'{value}' is not an available {level} for this user"))]
    InvalidSelection { level: String, value: String },

    #[snafu(display("Invalid value '{value}' for {key}"))]
    InvalidSetting { key: String, value: String },

    #[snafu(display("Failed to write {path}: {source}"))]
    WriteOutput {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to append CSV row to {path}: {source}"))]
    WriteCsv { path: String, source: csv::Error },

    #[snafu(display("Failed to serialize report: {source}"))]
    SerializeReport { source: serde_json::Error },

    #[snafu(display("Failed to publish s3://{bucket}/{key}: {message}"))]
    Publish {
        bucket: String,
        key: String,
        message: String,
    },
}

impl DashboardError {
    /// True for failures of the live count provider, which callers degrade to
    /// a notice instead of aborting.
    pub fn is_live_source_failure(&self) -> bool {
        matches!(
            self,
            DashboardError::Gateway { .. }
                | DashboardError::GatewayStatus { .. }
                | DashboardError::GatewayUrl { .. }
                | DashboardError::EncodeQuery { .. }
                | DashboardError::ReadExport { .. }
                | DashboardError::ExportColumn { .. }
                | DashboardError::QueryTimeout { .. }
                | DashboardError::NoCountSource
                | DashboardError::LoadQuery { .. }
                | DashboardError::EmptyQuery { .. }
        )
    }
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
