//! Single-file snapshot source: full resync on every poll.
//!
//! The upstream process rewrites one file in place (e.g. a per-trader
//! position dump), so there is no delta log to cursor over. Each poll parses
//! the whole file into a fresh store image and always reports "changed" —
//! the renderer is expected to be idempotent under redundant redraws.
//!
//! Position dumps historically use `column,index,value` field order
//! (trader, ticker, volume) while the generic layout is
//! `index,column,value`; [`FieldOrder`] selects between them. Index labels
//! whose values are zero in every row can optionally be dropped, matching
//! how flat books are elided from position charts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AxisGrouping, DataHandler, HandlerError};
use crate::store::{PointIndex, SeriesPoint, SharedStore};

/// On-disk field order of the three CSV fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOrder {
    /// `indexLabel,column,value`
    #[default]
    IndexColumnValue,
    /// `column,indexLabel,value` (position dumps: trader,ticker,volume)
    ColumnIndexValue,
}

impl FieldOrder {
    fn split<'a>(&self, record: &'a csv::StringRecord) -> (&'a str, &'a str, &'a str) {
        match self {
            Self::IndexColumnValue => (record[0].trim(), record[1].trim(), record[2].trim()),
            Self::ColumnIndexValue => (record[1].trim(), record[0].trim(), record[2].trim()),
        }
    }
}

pub struct SnapshotHandler {
    file: PathBuf,
    store: SharedStore,
    grouping: AxisGrouping,
    field_order: FieldOrder,
    drop_zero_indexes: bool,
}

impl SnapshotHandler {
    pub fn new(
        file: impl Into<PathBuf>,
        store: SharedStore,
        grouping: AxisGrouping,
        field_order: FieldOrder,
        drop_zero_indexes: bool,
    ) -> Self {
        Self {
            file: file.into(),
            store,
            grouping,
            field_order,
            drop_zero_indexes,
        }
    }

    /// Parses every line into `(index, column, value)` rows, skipping
    /// malformed ones.
    fn parse_rows(&self, path: &Path) -> Result<Vec<(String, String, f64)>, HandlerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| HandlerError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(HandlerError::Csv {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed record");
                    continue;
                }
            };
            if record.len() != 3 {
                warn!(
                    path = %path.display(),
                    fields = record.len(),
                    "skipping record with bad field count"
                );
                continue;
            }

            let (index, column, raw_value) = self.field_order.split(&record);
            let value: f64 = match raw_value.parse() {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %path.display(), column, raw = raw_value, error = %e, "skipping record with non-numeric value");
                    continue;
                }
            };
            rows.push((index.to_string(), column.to_string(), value));
        }
        Ok(rows)
    }
}

impl DataHandler for SnapshotHandler {
    fn handle(&mut self) -> Result<bool, HandlerError> {
        if !self.file.is_file() {
            return Err(HandlerError::SourceNotFound(self.file.clone()));
        }

        // Parse fully before touching the store so a failed read leaves the
        // previous image intact.
        let path = self.file.clone();
        let mut rows = self.parse_rows(&path)?;

        if self.drop_zero_indexes {
            let live: HashSet<String> = rows
                .iter()
                .filter(|(_, _, value)| *value != 0.0)
                .map(|(index, _, _)| index.clone())
                .collect();
            rows.retain(|(index, _, _)| live.contains(index));
        }

        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.reset();
        for (index, column, value) in rows {
            let axis = self.grouping.axis_for(&column).to_string();
            store.append(
                &axis,
                SeriesPoint {
                    index: PointIndex::Label(index),
                    column,
                    value,
                },
            );
        }
        debug!(axes = store.axis_count(), "snapshot resynced");
        Ok(true)
    }

    fn refresh_data(&mut self) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.reset();
    }
}
