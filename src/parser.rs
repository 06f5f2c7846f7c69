//! Loader for the static location/capacity table.
//!
//! Accepts the electoral authority's spreadsheet as `.xlsx` (first sheet) or
//! as a `.csv` export. Headers are matched case-insensitively; columns not
//! listed in [`columns`] are ignored.

use calamine::{DataType, Reader, Xlsx, open_workbook};
use snafu::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::analyzers::types::LocationRecord;
use crate::analyzers::utility::label_key;
use crate::error::{
    EmptyWorkbookSnafu, InvalidCellSnafu, MissingColumnSnafu, OpenTableSnafu, OpenWorkbookSnafu,
    ReadCsvSnafu, Result, UnsupportedFormatSnafu,
};

/// Header names of the location table.
pub mod columns {
    pub const CODE: &[&str] = &["CODIGO RECINTO", "COD_RECINTO"];
    pub const PROVINCE: &[&str] = &["NOMBRE PROVINCIA"];
    pub const CANTON: &[&str] = &["NOMBRE CANTON", "NOMBRE CANTÓN"];
    pub const PARISH: &[&str] = &["NOMBRE PARROQUIA"];
    pub const SUB_DIVISION: &[&str] = &["NOMBRE CIRCUNSCRIPCIÓN", "NOMBRE CIRCUNSCRIPCION"];
    pub const ZONE: &[&str] = &["NOMBRE ZONA"];
    pub const NAME: &[&str] = &["NOMBRE RECINTO"];
    pub const LATITUDE: &[&str] = &["lat", "latitud", "latitude"];
    pub const LONGITUDE: &[&str] = &["long", "longitud", "longitude", "lon"];
    pub const TOTAL_UNITS: &[&str] = &["NUM_JUNR"];
    pub const ASSIGNED: &[&str] = &["Delegados_Asignados"];
}

/// Position of each known column in a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    code: usize,
    province: usize,
    canton: usize,
    parish: usize,
    name: usize,
    latitude: usize,
    longitude: usize,
    total_units: usize,
    sub_division: Option<usize>,
    zone: Option<usize>,
    assigned: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let keys: Vec<String> = headers.iter().map(|h| label_key(h)).collect();
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|a| keys.iter().position(|k| *k == label_key(a)))
        };
        let require = |aliases: &[&str]| {
            find(aliases).context(MissingColumnSnafu { column: aliases[0] })
        };

        Ok(ColumnMap {
            code: require(columns::CODE)?,
            province: require(columns::PROVINCE)?,
            canton: require(columns::CANTON)?,
            parish: require(columns::PARISH)?,
            name: require(columns::NAME)?,
            latitude: require(columns::LATITUDE)?,
            longitude: require(columns::LONGITUDE)?,
            total_units: require(columns::TOTAL_UNITS)?,
            sub_division: find(columns::SUB_DIVISION),
            zone: find(columns::ZONE),
            assigned: find(columns::ASSIGNED),
        })
    }
}

/// Reads the location table at `path`, choosing the format by extension.
///
/// # Errors
///
/// Fails if the file cannot be opened, has an unknown extension, lacks a
/// required column, or carries a non-numeric board count.
#[tracing::instrument]
pub fn read_locations(path: &str) -> Result<Vec<LocationRecord>> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let rows = match extension.as_deref() {
        Some("csv") => {
            let file = std::fs::File::open(path).context(OpenTableSnafu { path })?;
            parse_locations_csv(file, path)?
        }
        Some("xlsx") | Some("xlsm") => read_locations_xlsx(path)?,
        _ => return UnsupportedFormatSnafu { path }.fail(),
    };

    info!(path, locations = rows.len(), "Location table loaded");
    Ok(rows)
}

/// Parses a CSV location table from any reader. `origin` is only used in errors.
pub fn parse_locations_csv<R: Read>(reader: R, origin: &str) -> Result<Vec<LocationRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context(ReadCsvSnafu { path: origin })?
        .iter()
        .map(str::to_string)
        .collect();
    let cols = ColumnMap::from_headers(&headers)?;
    debug!(?cols, "Resolved table columns");

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.context(ReadCsvSnafu { path: origin })?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        // header is line 1
        if let Some(location) = record_from_fields(idx + 2, &fields, &cols)? {
            rows.push(location);
        }
    }

    Ok(dedup_codes(rows))
}

fn read_locations_xlsx(path: &str) -> Result<Vec<LocationRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpenWorkbookSnafu { path })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(EmptyWorkbookSnafu { path })?
        .context(OpenWorkbookSnafu { path })?;

    let mut iter = range.rows();
    let header = iter.next().context(EmptyWorkbookSnafu { path })?;
    let headers: Vec<String> = header.iter().map(cell_text).collect();
    let cols = ColumnMap::from_headers(&headers)?;
    debug!(?cols, "Resolved workbook columns");

    let mut rows = Vec::new();
    for (idx, row) in iter.enumerate() {
        let fields: Vec<String> = row.iter().map(cell_text).collect();
        if let Some(location) = record_from_fields(idx + 2, &fields, &cols)? {
            rows.push(location);
        }
    }

    Ok(dedup_codes(rows))
}

/// Text form of a spreadsheet cell. Whole floats lose their `.0` so numeric
/// parish or location codes compare equal to their text spelling.
fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(f) => f.to_string(),
        _ => String::new(),
    }
}

fn record_from_fields(
    row: usize,
    fields: &[String],
    cols: &ColumnMap,
) -> Result<Option<LocationRecord>> {
    let get = |idx: usize| fields.get(idx).map(|s| s.trim()).unwrap_or("");
    let optional = |idx: Option<usize>| {
        idx.map(get)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if fields.iter().all(|f| f.trim().is_empty()) {
        return Ok(None);
    }

    let code = get(cols.code);
    if code.is_empty() {
        warn!(row, "Skipping location without a code");
        return Ok(None);
    }

    Ok(Some(LocationRecord {
        location_code: code.to_string(),
        province: get(cols.province).to_string(),
        canton: get(cols.canton).to_string(),
        parish: get(cols.parish).to_string(),
        sub_division: optional(cols.sub_division),
        zone: optional(cols.zone),
        location_name: get(cols.name).to_string(),
        latitude: parse_coordinate(row, columns::LATITUDE[0], get(cols.latitude)),
        longitude: parse_coordinate(row, columns::LONGITUDE[0], get(cols.longitude)),
        total_units: parse_count(row, columns::TOTAL_UNITS[0], get(cols.total_units))?,
        assigned_count: match cols.assigned {
            Some(idx) => parse_count(row, columns::ASSIGNED[0], get(idx))?,
            None => 0,
        },
        ..Default::default()
    }))
}

/// Parses a non-negative count. Blank cells count as zero.
fn parse_count(row: usize, column: &str, value: &str) -> Result<u64> {
    if value.is_empty() {
        return Ok(0);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v.round() as u64),
        _ => InvalidCellSnafu { row, column, value }.fail(),
    }
}

fn parse_coordinate(row: usize, column: &str, value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    match value.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            warn!(row, column, value, "Unreadable coordinate, location will not be mapped");
            None
        }
    }
}

/// Keeps the first row for each location code.
fn dedup_codes(rows: Vec<LocationRecord>) -> Vec<LocationRecord> {
    let mut seen = HashSet::new();
    let before = rows.len();
    let rows: Vec<LocationRecord> = rows
        .into_iter()
        .filter(|r| seen.insert(r.location_code.clone()))
        .collect();
    if rows.len() < before {
        warn!(dropped = before - rows.len(), "Duplicate location codes, first row kept");
    }
    rows
}
