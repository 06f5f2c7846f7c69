//! Classification, filtering and aggregation of delegate assignment data.
//!
//! Rows come in already merged (see [`crate::table`]); this module grades
//! each location, narrows the set to the user's filters, and computes the
//! group series, summary and map payload shown on the dashboard.

pub mod aggregate;
pub mod analyzer;
pub mod grade;
pub mod map;
pub mod scope;
pub mod types;
pub mod utility;
pub mod writetos3;
