//! Marker payload for the map sink.

use serde::Serialize;

use crate::analyzers::types::LocationRecord;

const MIN_RADIUS: f64 = 2.0;
const RADIUS_SPAN: f64 = 13.0;

/// One circle on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub location_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: &'static str,
    pub radius: f64,
    pub tooltip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: [f64; 2],
    pub north_east: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: [f64; 2],
    pub bounds: Bounds,
    pub markers: Vec<Marker>,
    /// Rows in the working set that had no usable coordinates.
    pub unmapped: usize,
}

impl MapView {
    /// Builds markers for the rows that have coordinates. `None` when no row
    /// can be placed.
    pub fn from_rows(rows: &[&LocationRecord]) -> Option<Self> {
        let placed: Vec<(&LocationRecord, (f64, f64))> = rows
            .iter()
            .filter_map(|r| r.coordinates().map(|c| (*r, c)))
            .collect();
        if placed.is_empty() {
            return None;
        }

        let max_units = placed.iter().map(|(r, _)| r.total_units).max().unwrap_or(0);
        let n = placed.len() as f64;
        let (mut lat_sum, mut lon_sum) = (0.0, 0.0);
        let (mut south, mut west) = (f64::INFINITY, f64::INFINITY);
        let (mut north, mut east) = (f64::NEG_INFINITY, f64::NEG_INFINITY);

        let markers = placed
            .iter()
            .map(|(row, (lat, lon))| {
                lat_sum += lat;
                lon_sum += lon;
                south = south.min(*lat);
                north = north.max(*lat);
                west = west.min(*lon);
                east = east.max(*lon);

                Marker {
                    location_code: row.location_code.clone(),
                    latitude: *lat,
                    longitude: *lon,
                    color: row.status.color(),
                    radius: marker_radius(row.total_units, max_units),
                    tooltip: tooltip(row),
                }
            })
            .collect();

        Some(MapView {
            center: [lat_sum / n, lon_sum / n],
            bounds: Bounds {
                south_west: [south, west],
                north_east: [north, east],
            },
            markers,
            unmapped: rows.len() - placed.len(),
        })
    }
}

/// Scales between 2 and 15 by board count relative to the largest location.
pub fn marker_radius(units: u64, max_units: u64) -> f64 {
    if max_units == 0 {
        MIN_RADIUS
    } else {
        MIN_RADIUS + RADIUS_SPAN * units as f64 / max_units as f64
    }
}

/// HTML tooltip; missing optional fields read "N/A".
pub fn tooltip(row: &LocationRecord) -> String {
    let or_na = |v: Option<&str>| v.filter(|s| !s.is_empty()).unwrap_or("N/A").to_string();
    let lines = [
        ("Provincia", row.province.clone()),
        ("Cantón", row.canton.clone()),
        ("Circunscripción", or_na(row.sub_division.as_deref())),
        ("Parroquia", row.parish.clone()),
        ("Zona", or_na(row.zone.as_deref())),
        ("Recinto", row.location_name.clone()),
        ("Total Juntas", row.total_units.to_string()),
        ("Delegados Asignados", row.assigned_count.to_string()),
        ("Proporción Asignados", row.completion_ratio.to_string()),
    ];

    lines
        .iter()
        .map(|(k, v)| format!("<b>{k}:</b> {v}"))
        .collect::<Vec<_>>()
        .join("<br>")
}
