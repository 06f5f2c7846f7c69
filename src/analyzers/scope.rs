//! Cascading geographic filters bounded by the user's scope.
//!
//! Levels are applied in order: province, sub-division (designated provinces
//! only), canton, parish. A level is only offered once the levels above it are
//! narrowed, and every applied level only removes rows.

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::analyzers::types::LocationRecord;
use crate::analyzers::utility::{distinct_labels, same_label};
use crate::auth::{UserScope, is_designated_province};
use crate::error::{InvalidSelectionSnafu, Result};

/// Value picked at one filter level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Choice {
    #[default]
    All,
    Only(String),
}

impl Choice {
    /// Reads a user-supplied value. Missing values and the usual spellings of
    /// "all" (`all`, `todas`, `todos`, `*`) mean [`Choice::All`].
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("*") => Choice::All,
            Some(v)
                if ["all", "todas", "todos"]
                    .iter()
                    .any(|a| v.eq_ignore_ascii_case(a)) =>
            {
                Choice::All
            }
            Some(v) => Choice::Only(v.to_string()),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Choice::All => None,
            Choice::Only(v) => Some(v),
        }
    }

    pub fn is_narrowed(&self) -> bool {
        matches!(self, Choice::Only(_))
    }
}

impl Serialize for Choice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Choice::All => serializer.serialize_none(),
            Choice::Only(v) => serializer.serialize_some(v),
        }
    }
}

/// Active filter state, one [`Choice`] per level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ScopeSelection {
    pub province: Choice,
    pub sub_division: Choice,
    pub canton: Choice,
    pub parish: Choice,
}

impl ScopeSelection {
    /// Nothing narrowed.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_province(mut self, value: &str) -> Self {
        self.province = Choice::Only(value.to_string());
        self
    }

    pub fn with_sub_division(mut self, value: &str) -> Self {
        self.sub_division = Choice::Only(value.to_string());
        self
    }

    pub fn with_canton(mut self, value: &str) -> Self {
        self.canton = Choice::Only(value.to_string());
        self
    }

    pub fn with_parish(mut self, value: &str) -> Self {
        self.parish = Choice::Only(value.to_string());
        self
    }
}

/// A filter level, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Province,
    SubDivision,
    Canton,
    Parish,
}

impl Level {
    fn label_of(self, row: &LocationRecord) -> Option<&str> {
        match self {
            Level::Province => Some(&row.province),
            Level::SubDivision => row.sub_division.as_deref(),
            Level::Canton => Some(&row.canton),
            Level::Parish => Some(&row.parish),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Province => "province",
            Level::SubDivision => "sub-division",
            Level::Canton => "canton",
            Level::Parish => "parish",
        };
        write!(f, "{}", name)
    }
}

/// Choices offered to the user at one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelOptions {
    pub level: Level,
    pub allow_all: bool,
    pub values: Vec<String>,
}

impl LevelOptions {
    fn from_rows(level: Level, rows: &[&LocationRecord], ceiling: Option<&str>) -> Self {
        let present = distinct_labels(rows.iter().filter_map(|r| level.label_of(r)));
        match ceiling {
            None => LevelOptions {
                level,
                allow_all: true,
                values: present,
            },
            Some(limit) => LevelOptions {
                level,
                allow_all: false,
                values: present
                    .into_iter()
                    .filter(|v| same_label(v, limit))
                    .collect(),
            },
        }
    }

    /// Maps a requested choice onto what is offered.
    ///
    /// A specific value must be offered (or be the ceiling itself, which may
    /// be absent from the data). An "all" request that is not offered falls
    /// back to the first offered value, or to the ceiling.
    fn resolve(&self, requested: &Choice, ceiling: Option<&str>) -> Result<Choice> {
        match requested {
            Choice::Only(v) => {
                if let Some(offered) = self.values.iter().find(|o| same_label(o, v)) {
                    Ok(Choice::Only(offered.clone()))
                } else if let Some(limit) = ceiling.filter(|c| same_label(c, v)) {
                    Ok(Choice::Only(limit.to_string()))
                } else {
                    InvalidSelectionSnafu {
                        level: self.level.to_string(),
                        value: v.as_str(),
                    }
                    .fail()
                }
            }
            Choice::All if self.allow_all => Ok(Choice::All),
            Choice::All => Ok(self
                .values
                .first()
                .map(String::as_str)
                .or(ceiling)
                .map(|v| Choice::Only(v.to_string()))
                .unwrap_or(Choice::All)),
        }
    }
}

/// Deepest level that is narrowed to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    AllProvinces,
    Province,
    SubDivision,
    Canton,
    Parish,
}

/// Label the aggregator groups rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLevel {
    Province,
    Canton,
    Parish,
    Location,
}

impl GroupLevel {
    pub fn label_of<'a>(&self, row: &'a LocationRecord) -> &'a str {
        match self {
            GroupLevel::Province => &row.province,
            GroupLevel::Canton => &row.canton,
            GroupLevel::Parish => &row.parish,
            GroupLevel::Location => &row.location_name,
        }
    }
}

impl Specificity {
    /// One level below the narrowest filter; sub-divisions never group on
    /// their own, they break down by canton like a province does.
    pub fn group_level(&self) -> GroupLevel {
        match self {
            Specificity::AllProvinces => GroupLevel::Province,
            Specificity::Province | Specificity::SubDivision => GroupLevel::Canton,
            Specificity::Canton => GroupLevel::Parish,
            Specificity::Parish => GroupLevel::Location,
        }
    }
}

/// Result of running the filter chain.
#[derive(Debug, Clone)]
pub struct ScopedView<'a> {
    pub rows: Vec<&'a LocationRecord>,
    /// What was actually applied, after clamping to the user's scope.
    pub selection: ScopeSelection,
    /// Levels offered, in order.
    pub options: Vec<LevelOptions>,
    pub specificity: Specificity,
}

impl ScopedView<'_> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn narrow(rows: &mut Vec<&LocationRecord>, level: Level, value: &str) {
    let before = rows.len();
    rows.retain(|r| level.label_of(r).is_some_and(|l| same_label(l, value)));
    debug!(%level, value, before, after = rows.len(), "Applied filter");
}

/// Applies `requested` to `rows` within the limits of `user`.
///
/// # Errors
///
/// Returns [`crate::error::DashboardError::InvalidSelection`] if a specific
/// value is requested that the user may not select.
pub fn apply_filters<'a>(
    rows: &'a [LocationRecord],
    user: &UserScope,
    requested: &ScopeSelection,
) -> Result<ScopedView<'a>> {
    let mut working: Vec<&LocationRecord> = rows.iter().collect();
    let mut options = Vec::new();
    let mut selection = ScopeSelection::all();
    let mut specificity = Specificity::AllProvinces;

    let province_options = LevelOptions::from_rows(Level::Province, &working, user.province());
    selection.province = province_options.resolve(&requested.province, user.province())?;
    options.push(province_options);

    let Choice::Only(province) = selection.province.clone() else {
        ignore_below(Level::Province, requested);
        return Ok(ScopedView {
            rows: working,
            selection,
            options,
            specificity,
        });
    };
    narrow(&mut working, Level::Province, &province);
    specificity = Specificity::Province;

    let canton_offered = if is_designated_province(&province) {
        let sub_options =
            LevelOptions::from_rows(Level::SubDivision, &working, user.sub_division());
        selection.sub_division =
            sub_options.resolve(&requested.sub_division, user.sub_division())?;
        options.push(sub_options);

        if let Choice::Only(sub) = &selection.sub_division {
            narrow(&mut working, Level::SubDivision, sub);
            specificity = Specificity::SubDivision;
            true
        } else {
            false
        }
    } else {
        if requested.sub_division.is_narrowed() {
            debug!(%province, "Sub-division ignored for a province without sub-divisions");
        }
        true
    };

    if !canton_offered {
        ignore_below(Level::SubDivision, requested);
        return Ok(ScopedView {
            rows: working,
            selection,
            options,
            specificity,
        });
    }

    let canton_options = LevelOptions::from_rows(Level::Canton, &working, None);
    selection.canton = canton_options.resolve(&requested.canton, None)?;
    options.push(canton_options);

    if let Choice::Only(canton) = selection.canton.clone() {
        narrow(&mut working, Level::Canton, &canton);
        specificity = Specificity::Canton;

        let parish_options = LevelOptions::from_rows(Level::Parish, &working, None);
        selection.parish = parish_options.resolve(&requested.parish, None)?;
        options.push(parish_options);

        if let Choice::Only(parish) = &selection.parish {
            narrow(&mut working, Level::Parish, parish);
            specificity = Specificity::Parish;
        }
    } else {
        ignore_below(Level::Canton, requested);
    }

    Ok(ScopedView {
        rows: working,
        selection,
        options,
        specificity,
    })
}

fn ignore_below(level: Level, requested: &ScopeSelection) {
    let below = [
        (Level::SubDivision, &requested.sub_division),
        (Level::Canton, &requested.canton),
        (Level::Parish, &requested.parish),
    ];
    for (lower, choice) in below {
        if lower > level && choice.is_narrowed() {
            debug!(level = %lower, value = ?choice.value(), "Filter not offered yet, ignored");
        }
    }
}
