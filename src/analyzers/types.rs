//! Data types used by the classification and aggregation pipeline.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Completion percentage of assigned delegates over electoral boards.
///
/// `Undefined` stands for a zero denominator; it is never encoded as NaN so
/// every consumer has to decide what an undefined ratio means for it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Ratio {
    Defined(f64),
    #[default]
    Undefined,
}

impl Ratio {
    /// `part / whole * 100`, or `Undefined` when `whole` is zero.
    pub fn percent(part: u64, whole: u64) -> Self {
        if whole == 0 {
            Ratio::Undefined
        } else {
            Ratio::Defined(part as f64 / whole as f64 * 100.0)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Ratio::Defined(_))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{:.2}%", v),
            Ratio::Undefined => write!(f, "N/A"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Defined(v) => serializer.serialize_some(v),
            Ratio::Undefined => serializer.serialize_none(),
        }
    }
}

/// Semaphore category of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    #[default]
    Red,
}

impl Status {
    /// Display order used by every status series.
    pub const ALL: [Status; 3] = [Status::Green, Status::Yellow, Status::Red];

    /// Color name understood by the map and chart sinks.
    pub fn color(&self) -> &'static str {
        match self {
            Status::Green => "green",
            Status::Yellow => "yellow",
            Status::Red => "red",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Green => "Verde",
            Status::Yellow => "Amarillo",
            Status::Red => "Rojo",
        }
    }
}

/// One polling location after the static table and the live counts are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationRecord {
    pub location_code: String,
    pub province: String,
    pub canton: String,
    pub parish: String,
    pub sub_division: Option<String>,
    pub zone: Option<String>,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_units: u64,
    pub assigned_count: u64,

    // filled in by the classifier
    pub completion_ratio: Ratio,
    pub status: Status,
}

impl LocationRecord {
    /// Coordinates, when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// One row of the live delegate-count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCount {
    pub location_code: String,
    pub assigned_count: u64,
    pub total_units: u64,
}

/// Wire shape of a live count row, as returned by the gateway or an export.
///
/// Counts arrive as floats from some drivers and as blanks for NULLs.
#[derive(Debug, Deserialize)]
pub struct LiveCountRow {
    #[serde(alias = "location_code", alias = "COD_RECINTO")]
    pub cod_recinto: CodeValue,
    #[serde(default, alias = "assigned_count")]
    pub delegados_asignados: Option<f64>,
    #[serde(default, alias = "total_units")]
    pub delegados_asignar: Option<f64>,
}

impl From<LiveCountRow> for LiveCount {
    fn from(row: LiveCountRow) -> Self {
        LiveCount {
            location_code: row.cod_recinto.to_string(),
            assigned_count: count_from_float(row.delegados_asignados),
            total_units: count_from_float(row.delegados_asignar),
        }
    }
}

fn count_from_float(v: Option<f64>) -> u64 {
    match v {
        Some(x) if x.is_finite() && x > 0.0 => x.round() as u64,
        _ => 0,
    }
}

/// A location code that may have been stored as text or as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CodeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeValue::Int(i) => write!(f, "{}", i),
            CodeValue::Float(x) if x.fract() == 0.0 => write!(f, "{}", *x as i64),
            CodeValue::Float(x) => write!(f, "{}", x),
            CodeValue::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

/// Inline message shown to the user next to whatever could still be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The live count provider failed; counts fall back to the static table.
    SourceUnavailable { source: String, message: String },
    /// The filters left no location to show.
    EmptyResultSet,
    /// Locations with zero electoral boards, classified red with no ratio.
    ZeroCapacity { locations: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SourceUnavailable { source, message } => {
                write!(f, "live counts from {} unavailable: {}", source, message)
            }
            Notice::EmptyResultSet => write!(f, "no locations match the selected filters"),
            Notice::ZeroCapacity { locations } => {
                write!(f, "{} location(s) have no electoral boards", locations)
            }
        }
    }
}
