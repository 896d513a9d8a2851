//! Read-side aggregation over stored samples.
//!
//! Queries run in memory over a [`SeriesAggregator`] built from the store, so
//! every result is a pure function of the samples and the query parameters.

mod availability;
mod bucket;
mod latest;
mod overview;
mod series;
mod transitions;
mod trend;

pub use availability::*;
pub use bucket::*;
pub use latest::*;
pub use overview::*;
pub use series::SeriesAggregator;
pub use transitions::*;
pub use trend::*;

use std::cmp::Ordering;

/// Sort direction for ranked queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` sorts descending.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    /// Orient an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of UP samples as a percentage with two decimals; `None` for no samples.
pub(crate) fn uptime_percent(up: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(round2(100.0 * up as f64 / total as f64))
    }
}
