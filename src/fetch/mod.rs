//! Live delegate counts.
//!
//! A [`CountSource`] answers a named query with one [`LiveCount`] per
//! location. Queries are plain `.sql` files kept next to the binary so they
//! can be edited without a rebuild.

mod client;
mod export;
mod gateway;
pub mod auth;

pub use client::{BasicClient, HttpClient};
pub use export::ExportCountSource;
pub use gateway::GatewayCountSource;

use async_trait::async_trait;
use snafu::{ResultExt, ensure};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::analyzers::types::LiveCount;
use crate::error::{EmptyQuerySnafu, LoadQuerySnafu, QueryTimeoutSnafu, Result};

/// A named live query and its SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveQuery {
    pub name: String,
    pub sql: String,
}

impl LiveQuery {
    /// A query identified by name only, for sources that never look at SQL.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: String::new(),
        }
    }
}

#[async_trait]
pub trait CountSource: Send + Sync {
    /// Short human-readable origin, used in logs and notices.
    fn describe(&self) -> String;

    /// Whether [`run`](Self::run) needs the SQL text or only the query name.
    fn requires_sql(&self) -> bool {
        true
    }

    async fn run(&self, query: &LiveQuery) -> Result<Vec<LiveCount>>;
}

/// Reads `<dir>/<name>.sql`.
pub fn load_query(dir: impl AsRef<Path>, name: &str) -> Result<LiveQuery> {
    let path = dir.as_ref().join(format!("{name}.sql"));
    let shown = path.display().to_string();
    let sql = std::fs::read_to_string(&path).context(LoadQuerySnafu { path: &shown })?;
    let sql = sql.trim().to_string();
    ensure!(!sql.is_empty(), EmptyQuerySnafu { path: shown });

    Ok(LiveQuery {
        name: name.to_string(),
        sql,
    })
}

/// Runs `query` against `source`, giving up after `timeout`.
#[tracing::instrument(skip(source, query), fields(source = %source.describe(), query = %query.name))]
pub async fn fetch_counts(
    source: &dyn CountSource,
    query: &LiveQuery,
    timeout: Duration,
) -> Result<Vec<LiveCount>> {
    let start = std::time::Instant::now();
    let counts = tokio::time::timeout(timeout, source.run(query))
        .await
        .map_err(|_| {
            QueryTimeoutSnafu {
                query: &query.name,
                seconds: timeout.as_secs(),
            }
            .build()
        })??;

    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Live query finished");
    info!(rows = counts.len(), "Live counts fetched");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use std::env;
    use std::fs;

    struct Slow;

    #[async_trait]
    impl CountSource for Slow {
        fn describe(&self) -> String {
            "slow".into()
        }

        async fn run(&self, _query: &LiveQuery) -> Result<Vec<LiveCount>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    struct Fixed(Vec<LiveCount>);

    #[async_trait]
    impl CountSource for Fixed {
        fn describe(&self) -> String {
            "fixed".into()
        }

        async fn run(&self, _query: &LiveQuery) -> Result<Vec<LiveCount>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_fetch_counts_times_out() {
        let err = fetch_counts(&Slow, &LiveQuery::named("q"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::QueryTimeout { .. }));
        assert!(err.is_live_source_failure());
    }

    #[tokio::test]
    async fn test_fetch_counts_passes_rows_through() {
        let rows = vec![LiveCount {
            location_code: "1".into(),
            assigned_count: 2,
            total_units: 3,
        }];
        let got = fetch_counts(
            &Fixed(rows.clone()),
            &LiveQuery::named("q"),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(got, rows);
    }

    #[test]
    fn test_load_query_trims_and_rejects_empty() {
        let dir = env::temp_dir().join("delegate_semaphore_query_test");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("control_electoral.sql"), "\n  SELECT 1;  \n").unwrap();
        fs::write(dir.join("blank.sql"), "   \n").unwrap();

        let q = load_query(&dir, "control_electoral").unwrap();
        assert_eq!(q.sql, "SELECT 1;");
        assert_eq!(q.name, "control_electoral");

        assert!(matches!(
            load_query(&dir, "blank"),
            Err(DashboardError::EmptyQuery { .. })
        ));
        assert!(matches!(
            load_query(&dir, "missing"),
            Err(DashboardError::LoadQuery { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
