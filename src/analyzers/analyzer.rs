use serde::Serialize;
use tracing::{info, instrument};

use crate::analyzers::aggregate::{Aggregation, aggregate_groups};
use crate::analyzers::map::MapView;
use crate::analyzers::scope::{LevelOptions, ScopeSelection, Specificity, apply_filters};
use crate::analyzers::types::Notice;
use crate::auth::UserScope;
use crate::error::Result;
use crate::stats::SummaryStats;
use crate::table::LocationTable;

/// Everything the sinks need for one interaction.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Filters as applied, after clamping to the user's scope.
    pub selection: ScopeSelection,
    pub options: Vec<LevelOptions>,
    pub specificity: Specificity,
    pub notices: Vec<Notice>,
    /// `None` when the working set is empty.
    pub summary: Option<SummaryStats>,
    pub aggregation: Option<Aggregation>,
    pub map: Option<MapView>,
}

impl Dashboard {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
    }
}

/// Runs the filter chain, aggregator and summary over a loaded table.
///
/// Pure: the table is not modified and the same inputs give the same
/// dashboard, apart from the summary timestamp.
///
/// # Errors
///
/// Fails only when `requested` names a value the user may not select.
#[instrument(skip(table, requested), fields(tracking = %table.tracking, rows = table.rows.len()))]
pub fn analyze(
    table: &LocationTable,
    user: &UserScope,
    requested: &ScopeSelection,
) -> Result<Dashboard> {
    let view = apply_filters(&table.rows, user, requested)?;
    let mut notices = table.notices.clone();

    if view.is_empty() {
        info!(selection = ?view.selection, "No locations in scope");
        notices.push(Notice::EmptyResultSet);
        return Ok(Dashboard {
            selection: view.selection,
            options: view.options,
            specificity: view.specificity,
            notices,
            summary: None,
            aggregation: None,
            map: None,
        });
    }

    let summary = SummaryStats::from_locations(&view.rows);
    if summary.zero_capacity > 0 {
        notices.push(Notice::ZeroCapacity {
            locations: summary.zero_capacity,
        });
    }

    let aggregation = aggregate_groups(&view.rows, view.specificity.group_level());
    let map = MapView::from_rows(&view.rows);

    info!(
        locations = summary.locations,
        groups = aggregation.groups.len(),
        specificity = ?view.specificity,
        "Dashboard computed"
    );

    Ok(Dashboard {
        selection: view.selection,
        options: view.options,
        specificity: view.specificity,
        notices,
        summary: Some(summary),
        aggregation: Some(aggregation),
        map,
    })
}
