use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::analyzers::scope::GroupLevel;
use crate::analyzers::types::{LocationRecord, Ratio};
use crate::analyzers::utility::{label_key, round2};

/// Totals for one group of locations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    pub label: String,
    pub locations: usize,
    pub total_units: u64,
    pub assigned_count: u64,
    /// Rounded to two decimals; undefined when the group has no boards.
    pub ratio: Ratio,
}

/// One bar of the progress chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPoint {
    pub label: String,
    pub ratio: f64,
}

/// Groups at one level plus the progress series derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub level: GroupLevel,
    /// Every group, in ascending label order.
    pub groups: Vec<GroupAggregate>,
    /// Groups with a defined ratio, highest ratio first.
    pub series: Vec<ProgressPoint>,
}

impl Aggregation {
    pub fn total_units(&self) -> u64 {
        self.groups.iter().map(|g| g.total_units).sum()
    }

    pub fn assigned_count(&self) -> u64 {
        self.groups.iter().map(|g| g.assigned_count).sum()
    }
}

/// Aggregates `rows` by the label `level` selects.
///
/// Groups are formed in ascending label order and the series is then sorted by
/// ratio with a stable sort, so equal ratios keep label order. Groups with no
/// boards stay in `groups` (their counts still add up) but are left out of
/// `series`.
pub fn aggregate_groups(rows: &[&LocationRecord], level: GroupLevel) -> Aggregation {
    let mut by_label: BTreeMap<String, GroupAggregate> = BTreeMap::new();

    for row in rows {
        let label = level.label_of(row);
        let group = by_label
            .entry(label_key(label))
            .or_insert_with(|| GroupAggregate {
                label: label.trim().to_string(),
                locations: 0,
                total_units: 0,
                assigned_count: 0,
                ratio: Ratio::Undefined,
            });
        group.locations += 1;
        group.total_units += row.total_units;
        group.assigned_count += row.assigned_count;
    }

    let groups: Vec<GroupAggregate> = by_label
        .into_values()
        .map(|mut g| {
            g.ratio = match Ratio::percent(g.assigned_count, g.total_units) {
                Ratio::Defined(p) => Ratio::Defined(round2(p)),
                Ratio::Undefined => Ratio::Undefined,
            };
            g
        })
        .collect();

    let mut series: Vec<ProgressPoint> = groups
        .iter()
        .filter_map(|g| {
            g.ratio.value().map(|ratio| ProgressPoint {
                label: g.label.clone(),
                ratio,
            })
        })
        .collect();
    series.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

    let undefined = groups.len() - series.len();
    if undefined > 0 {
        debug!(?level, undefined, "Groups without boards left out of the series");
    }

    Aggregation {
        level,
        groups,
        series,
    }
}
