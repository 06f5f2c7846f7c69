use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use std::path::PathBuf;

use super::{CountSource, LiveQuery};
use crate::analyzers::types::LiveCount;
use crate::analyzers::utility::label_key;
use crate::error::{ExportColumnSnafu, ReadExportSnafu, Result};

/// Reads query results that were exported to `<dir>/<query name>.csv`.
///
/// Used when the database is only reachable through scheduled exports.
/// Codes are kept as text so leading zeros survive.
pub struct ExportCountSource {
    dir: PathBuf,
}

impl ExportCountSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, query: &LiveQuery) -> PathBuf {
        self.dir.join(format!("{}.csv", query.name))
    }
}

#[async_trait]
impl CountSource for ExportCountSource {
    fn describe(&self) -> String {
        format!("export {}", self.dir.display())
    }

    fn requires_sql(&self) -> bool {
        false
    }

    async fn run(&self, query: &LiveQuery) -> Result<Vec<LiveCount>> {
        let path = self.path_for(query);
        let shown = path.display().to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(csv::Error::from)
            .context(ReadExportSnafu { path: &shown })?;
        parse_export(&bytes, &shown)
    }
}

fn parse_export(bytes: &[u8], path: &str) -> Result<Vec<LiveCount>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers: Vec<String> = rdr
        .headers()
        .context(ReadExportSnafu { path })?
        .iter()
        .map(label_key)
        .collect();

    let position = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| headers.iter().position(|h| *h == label_key(n)))
    };
    let code_idx = position(&["cod_recinto", "location_code"])
        .context(ExportColumnSnafu {
            path,
            column: "cod_recinto",
        })?;
    let assigned_idx = position(&["delegados_asignados", "assigned_count"]);
    let total_idx = position(&["delegados_asignar", "total_units"]);

    let mut counts = Vec::new();
    for result in rdr.records() {
        let record = result.context(ReadExportSnafu { path })?;
        let code = record.get(code_idx).unwrap_or("");
        if code.is_empty() {
            continue;
        }
        let count_at = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| v.round() as u64)
                .unwrap_or(0)
        };
        counts.push(LiveCount {
            location_code: code.to_string(),
            assigned_count: count_at(assigned_idx),
            total_units: count_at(total_idx),
        });
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use std::env;
    use std::fs;

    #[test]
    fn test_parse_export_keeps_leading_zeros_and_blanks_as_zero() {
        let csv = "cod_recinto,delegados_asignados,delegados_asignar\n0101,3,4\n0102,,5\n";
        let rows = parse_export(csv.as_bytes(), "inline").unwrap();

        assert_eq!(
            rows,
            vec![
                LiveCount {
                    location_code: "0101".into(),
                    assigned_count: 3,
                    total_units: 4
                },
                LiveCount {
                    location_code: "0102".into(),
                    assigned_count: 0,
                    total_units: 5
                },
            ]
        );
    }

    #[test]
    fn test_parse_export_without_code_column() {
        let err = parse_export(b"codigo,asignados\n1,2\n", "inline").unwrap_err();
        assert!(matches!(err, DashboardError::ExportColumn { .. }));
        assert!(err.is_live_source_failure());
    }

    #[tokio::test]
    async fn test_run_reads_file_named_after_query() {
        let dir = env::temp_dir().join("delegate_semaphore_export_test");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("conteo_rapido.csv"),
            "COD_RECINTO,DELEGADOS_ASIGNADOS,DELEGADOS_ASIGNAR\n7,1.0,2.0\n",
        )
        .unwrap();

        let source = ExportCountSource::new(&dir);
        let rows = source.run(&LiveQuery::named("conteo_rapido")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].assigned_count, 1);
        assert_eq!(rows[0].total_units, 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_export_is_a_live_source_failure() {
        let source = ExportCountSource::new("/definitely/not/here");
        let err = source
            .run(&LiveQuery::named("control_electoral"))
            .await
            .unwrap_err();
        assert!(err.is_live_source_failure());
    }
}
