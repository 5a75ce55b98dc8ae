//! Incremental data handlers — the seam between on-disk signal files and the
//! series store.
//!
//! Two source layouts share one contract:
//! - [`TimeSeriesHandler`]: date-partitioned delta files, consumed
//!   incrementally behind a cursor with changed-only retention.
//! - [`SnapshotHandler`]: a single continuously rewritten file, fully
//!   re-read on every poll.
//!
//! Variants are selected at construction time; the engine only sees
//! `Box<dyn DataHandler>`.

mod snapshot;
mod time_series;

pub use snapshot::{FieldOrder, SnapshotHandler};
pub use time_series::TimeSeriesHandler;

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced from one `handle()` call. None of these are fatal to the
/// monitor: the worker loop logs them and treats the tick as "no change".
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("data root '{0}' is missing or unreadable")]
    RootNotFound(PathBuf),

    #[error("no date containers under '{0}'")]
    NoContainers(PathBuf),

    #[error("source file '{0}' does not exist")]
    SourceNotFound(PathBuf),

    #[error("io error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error at '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Contract consumed by the monitor engine.
///
/// `handle()` reads whatever is new since the last call, mutates the shared
/// series store, and reports whether anything changed. `refresh_data()`
/// drops all accumulated state for a full resync on the next call.
pub trait DataHandler: Send {
    fn handle(&mut self) -> Result<bool, HandlerError>;
    fn refresh_data(&mut self);
}

/// How columns map onto axes: one axis per column, or everything grouped
/// under a single named axis.
#[derive(Debug, Clone)]
pub enum AxisGrouping {
    PerColumn,
    Single(String),
}

impl AxisGrouping {
    /// Builds from the `all_in_one_axis` config option (empty/absent means
    /// one axis per column).
    pub fn from_option(all_in_one_axis: Option<&str>) -> Self {
        match all_in_one_axis {
            Some(name) if !name.is_empty() => Self::Single(name.to_string()),
            _ => Self::PerColumn,
        }
    }

    pub fn axis_for<'a>(&'a self, column: &'a str) -> &'a str {
        match self {
            Self::PerColumn => column,
            Self::Single(name) => name,
        }
    }
}
