//! In-memory series store shared between the data handler and the renderer.
//!
//! Layout mirrors the chart model: axis name → ordered points, where each
//! point is one observation of one column at one index position. An axis
//! holds a single column by default, or several when the all-in-one-axis
//! grouping is configured. The handler is the only writer; the renderer only
//! ever sees `SeriesSnapshot` copies, so it cannot observe a half-appended
//! axis.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// X position of a point: a timestamp for delta-log sources, a category
/// label for snapshot sources.
///
/// Derived ordering sorts all timestamps before all labels; within a variant
/// it is chronological / lexicographic, which is what axis recency ranking
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointIndex {
    Time(NaiveDateTime),
    Label(String),
}

/// One observation of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub index: PointIndex,
    pub column: String,
    pub value: f64,
}

/// Axis name → ordered points. Writable side of the store.
#[derive(Debug, Default)]
pub struct SeriesStore {
    axes: BTreeMap<String, Vec<SeriesPoint>>,
}

/// Handle shared between the engine and its handler. The lock is uncontended
/// by construction (a single worker thread both writes and snapshots), it
/// exists to satisfy aliasing across the thread boundary.
pub type SharedStore = Arc<Mutex<SeriesStore>>;

/// Builds a fresh shared store.
pub fn shared_store() -> SharedStore {
    Arc::new(Mutex::new(SeriesStore::default()))
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point to the named axis, creating the axis lazily.
    pub fn append(&mut self, axis: &str, point: SeriesPoint) {
        self.axes.entry(axis.to_string()).or_default().push(point);
    }

    /// Drops every axis. Used on explicit refresh and container rollover.
    pub fn reset(&mut self) {
        self.axes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn axis_len(&self, axis: &str) -> usize {
        self.axes.get(axis).map_or(0, Vec::len)
    }

    pub fn axis(&self, axis: &str) -> Option<&[SeriesPoint]> {
        self.axes.get(axis).map(Vec::as_slice)
    }

    /// Deep copy for the renderer. Axis order is deterministic (sorted by
    /// name) so repeated renders of unchanged data are stable.
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            axes: self.axes.clone(),
        }
    }
}

/// Read-only copy handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    axes: BTreeMap<String, Vec<SeriesPoint>>,
}

impl SeriesSnapshot {
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn axis(&self, axis: &str) -> Option<&[SeriesPoint]> {
        self.axes.get(axis).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SeriesPoint])> {
        self.axes.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Picks the axes worth displaying on a bounded surface.
    ///
    /// Ranks axes by their most recent point index descending (freshest
    /// signals first), truncates to `limit`, then orders the survivors
    /// case-insensitively by name for a stable layout. If `sort_first`
    /// names a column, axes containing that column jump to the front.
    pub fn top_axes(&self, limit: usize, sort_first: Option<&str>) -> Vec<&str> {
        let mut ranked: Vec<(&str, Option<&PointIndex>)> = self
            .axes
            .iter()
            .map(|(name, pts)| (name.as_str(), pts.iter().map(|p| &p.index).max()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);

        let mut names: Vec<&str> = ranked.into_iter().map(|(n, _)| n).collect();
        names.sort_by_key(|n| n.to_lowercase());
        if let Some(col) = sort_first {
            names.sort_by_key(|n| {
                let has_col = self.axes[*n].iter().any(|p| p.column == col);
                !has_col
            });
        }
        names
    }
}
