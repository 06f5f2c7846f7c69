//! The merged location table: static geography plus live delegate counts.
//!
//! Built once per session, classified, then shared read-only through
//! [`TableCache`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::analyzers::grade::classify_all;
use crate::analyzers::types::{LiveCount, LocationRecord, Notice};
use crate::error::{DashboardError, InvalidSettingSnafu, Result};
use crate::fetch::{CountSource, LiveQuery, fetch_counts, load_query};
use crate::parser::read_locations;

/// Which delegate roster is being tracked. Each one has its own query and
/// its own merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Tracking {
    /// Every location in the geography, with live counts where present.
    #[default]
    #[serde(rename = "control_electoral")]
    ElectoralControl,
    /// Only locations the live query returns.
    #[serde(rename = "conteo_rapido")]
    QuickCount,
}

impl Tracking {
    pub fn query_name(&self) -> &'static str {
        match self {
            Tracking::ElectoralControl => "control_electoral",
            Tracking::QuickCount => "conteo_rapido",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tracking::ElectoralControl => "Control Electoral",
            Tracking::QuickCount => "Conteo Rápido",
        }
    }

    fn keeps_unmatched(&self) -> bool {
        matches!(self, Tracking::ElectoralControl)
    }
}

impl fmt::Display for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_name())
    }
}

impl FromStr for Tracking {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "control_electoral" | "electoral_control" | "control" => {
                Ok(Tracking::ElectoralControl)
            }
            "conteo_rapido" | "quick_count" | "conteo" => Ok(Tracking::QuickCount),
            _ => InvalidSettingSnafu {
                key: "tracking",
                value: s,
            }
            .fail(),
        }
    }
}

/// Joins live counts onto the static rows by location code.
///
/// With no live result the static values stand. With one, matched rows take
/// the live counts; unmatched rows get zero for both under
/// [`Tracking::ElectoralControl`] and are dropped under
/// [`Tracking::QuickCount`]. Repeated live codes keep their first row.
pub fn merge_counts(
    static_rows: Vec<LocationRecord>,
    live: Option<&[LiveCount]>,
    tracking: Tracking,
) -> Vec<LocationRecord> {
    let Some(live) = live else {
        return static_rows;
    };

    let mut by_code: HashMap<&str, &LiveCount> = HashMap::with_capacity(live.len());
    let mut duplicates = 0usize;
    for count in live {
        let code = count.location_code.trim();
        if by_code.contains_key(code) {
            duplicates += 1;
        } else {
            by_code.insert(code, count);
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "Live result repeats location codes, keeping first");
    }

    let mut unmatched = 0usize;
    let merged: Vec<LocationRecord> = static_rows
        .into_iter()
        .filter_map(|mut row| match by_code.get(row.location_code.trim()) {
            Some(count) => {
                row.assigned_count = count.assigned_count;
                row.total_units = count.total_units;
                Some(row)
            }
            None => {
                unmatched += 1;
                tracking.keeps_unmatched().then(|| {
                    row.assigned_count = 0;
                    row.total_units = 0;
                    row
                })
            }
        })
        .collect();

    info!(
        %tracking,
        live = by_code.len(),
        unmatched,
        merged = merged.len(),
        "Live counts merged"
    );
    merged
}

/// Classified, merged rows for one geography file and tracking mode.
#[derive(Debug, Clone)]
pub struct LocationTable {
    pub tracking: Tracking,
    pub rows: Vec<LocationRecord>,
    pub loaded_at: DateTime<Utc>,
    /// Live rows received, `None` when the live source failed.
    pub live_rows: Option<usize>,
    /// Problems met while loading that did not stop it.
    pub notices: Vec<Notice>,
}

impl LocationTable {
    /// Builds a table from already-loaded parts.
    pub fn from_parts(
        static_rows: Vec<LocationRecord>,
        live: Option<&[LiveCount]>,
        tracking: Tracking,
    ) -> Self {
        let rows = classify_all(merge_counts(static_rows, live, tracking));
        LocationTable {
            tracking,
            rows,
            loaded_at: Utc::now(),
            live_rows: live.map(<[LiveCount]>::len),
            notices: Vec::new(),
        }
    }
}

/// Everything needed to (re)build a [`LocationTable`].
pub struct TableLoader {
    pub geography_path: String,
    pub queries_dir: String,
    pub timeout: Duration,
    pub source: Option<Box<dyn CountSource>>,
}

impl TableLoader {
    /// Reads the geography, runs the live query and merges.
    ///
    /// # Errors
    ///
    /// Only geography failures are returned; live source failures become a
    /// [`Notice::SourceUnavailable`] on the table.
    #[tracing::instrument(skip(self), fields(geography = %self.geography_path))]
    pub async fn load(&self, tracking: Tracking) -> Result<LocationTable> {
        let static_rows = read_locations(&self.geography_path)?;

        match self.live_counts(tracking).await {
            Ok(live) => Ok(LocationTable::from_parts(static_rows, Some(&live), tracking)),
            Err(e) if e.is_live_source_failure() => {
                let source = self
                    .source
                    .as_ref()
                    .map(|s| s.describe())
                    .unwrap_or_else(|| "none".to_string());
                warn!(%source, error = %e, "Live counts unavailable, using static values");

                let mut table = LocationTable::from_parts(static_rows, None, tracking);
                table.notices.push(Notice::SourceUnavailable {
                    source,
                    message: e.to_string(),
                });
                Ok(table)
            }
            Err(e) => Err(e),
        }
    }

    async fn live_counts(&self, tracking: Tracking) -> Result<Vec<LiveCount>> {
        let source = self
            .source
            .as_deref()
            .ok_or(DashboardError::NoCountSource)?;
        let query = if source.requires_sql() {
            load_query(&self.queries_dir, tracking.query_name())?
        } else {
            LiveQuery::named(tracking.query_name())
        };
        fetch_counts(source, &query, self.timeout).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    geography_path: String,
    query: &'static str,
    tracking: Tracking,
}

/// Session memo of loaded tables.
///
/// Loads are serialized so two requests for the same key never hit the live
/// source twice.
pub struct TableCache {
    loader: TableLoader,
    tables: Mutex<HashMap<TableKey, Arc<LocationTable>>>,
}

impl TableCache {
    pub fn new(loader: TableLoader) -> Self {
        Self {
            loader,
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn key(&self, tracking: Tracking) -> TableKey {
        TableKey {
            geography_path: self.loader.geography_path.clone(),
            query: tracking.query_name(),
            tracking,
        }
    }

    /// Returns the cached table for `tracking`, loading it on first use.
    pub async fn get(&self, tracking: Tracking) -> Result<Arc<LocationTable>> {
        let key = self.key(tracking);
        let mut tables = self.tables.lock().await;
        if let Some(table) = tables.get(&key) {
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(self.loader.load(tracking).await?);
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Drops the cached table so the next [`get`](Self::get) reloads it.
    pub async fn invalidate(&self, tracking: Tracking) -> bool {
        let key = self.key(tracking);
        self.tables.lock().await.remove(&key).is_some()
    }
}
