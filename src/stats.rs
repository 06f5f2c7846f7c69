use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::types::{LocationRecord, Ratio, Status};
use crate::analyzers::utility::round2;

/// Locations per semaphore status, zero-filled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}

impl StatusCounts {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Green => self.green,
            Status::Yellow => self.yellow,
            Status::Red => self.red,
        }
    }

    fn bump(&mut self, status: Status) {
        match status {
            Status::Green => self.green += 1,
            Status::Yellow => self.yellow += 1,
            Status::Red => self.red += 1,
        }
    }
}

/// Scalar outputs shown next to the map and fed to the charts.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub timestamp: DateTime<Utc>,
    pub locations: usize,
    pub total_units: u64,
    pub assigned_count: u64,
    /// Boards still without a delegate; never negative.
    pub remaining: u64,
    pub status_counts: StatusCounts,
    /// Locations with zero boards (undefined ratio, counted as red).
    pub zero_capacity: usize,
    /// Assigned over total boards, two decimals; 0 when there are no boards.
    pub completion_pct: f64,
}

impl SummaryStats {
    pub fn from_locations(rows: &[&LocationRecord]) -> Self {
        let mut s = SummaryStats {
            timestamp: Utc::now(),
            ..Default::default()
        };

        for row in rows {
            s.locations += 1;
            s.total_units += row.total_units;
            s.assigned_count += row.assigned_count;
            s.status_counts.bump(row.status);

            if !row.completion_ratio.is_defined() {
                s.zero_capacity += 1;
            }
        }

        s.remaining = s.total_units.saturating_sub(s.assigned_count);
        s.completion_pct = Ratio::percent(s.assigned_count, s.total_units)
            .value()
            .map(round2)
            .unwrap_or(0.0);
        s
    }
}

/// Flat row appended to the report history CSV.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub tracking: String,
    pub province: Option<String>,
    pub sub_division: Option<String>,
    pub canton: Option<String>,
    pub parish: Option<String>,
    pub locations: usize,
    pub total_units: u64,
    pub assigned_count: u64,
    pub remaining: u64,
    pub completion_pct: f64,
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}
