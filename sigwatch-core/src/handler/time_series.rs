//! Dated-folder delta source: incremental, cursor-based ingestion.
//!
//! Source layout (written by the upstream signal emitter):
//!
//! ```text
//! {root}/
//!     20240101/
//!         090000.csv      # one delta file every few seconds
//!         090005.csv
//!     20240102/
//! ```
//!
//! Each line is `timestamp,column,value` with the timestamp in the
//! configured format (default `%Y%m%d %H%M%S`). Folder and file names are
//! zero-padded so lexicographic order is chronological order — the cursor
//! relies on that.
//!
//! Per poll: pick the lexicographically newest folder (detecting rollover),
//! read every file whose name sorts after the cursor in ascending order, and
//! append only points whose value differs from the last value seen for that
//! column (changed-only retention). A slowly-changing signal polled every
//! few seconds would otherwise flood the store with duplicates.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::{AxisGrouping, DataHandler, HandlerError};
use crate::store::{PointIndex, SeriesPoint, SharedStore};

/// Per-source bookkeeping. Both names only ever move forward in
/// lexicographic order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Cursor {
    container: String,
    file: String,
}

#[derive(Debug, Clone, Copy)]
struct LastValue {
    index: NaiveDateTime,
    value: f64,
}

pub struct TimeSeriesHandler {
    root: PathBuf,
    store: SharedStore,
    grouping: AxisGrouping,
    timestamp_format: String,
    refresh_on_rollover: bool,
    cursor: Cursor,
    last_values: HashMap<String, LastValue>,
}

impl TimeSeriesHandler {
    pub fn new(
        root: impl Into<PathBuf>,
        store: SharedStore,
        grouping: AxisGrouping,
        timestamp_format: impl Into<String>,
        refresh_on_rollover: bool,
    ) -> Self {
        Self {
            root: root.into(),
            store,
            grouping,
            timestamp_format: timestamp_format.into(),
            refresh_on_rollover,
            cursor: Cursor::default(),
            last_values: HashMap::new(),
        }
    }

    /// Name of the last fully consumed file (empty before the first poll).
    /// Exposed for cursor-monotonicity checks.
    pub fn cursor_file(&self) -> &str {
        &self.cursor.file
    }

    /// Name of the container currently being consumed.
    pub fn cursor_container(&self) -> &str {
        &self.cursor.container
    }

    /// Lexicographically newest immediate subdirectory of the root.
    fn newest_container(&self) -> Result<String, HandlerError> {
        let entries = fs::read_dir(&self.root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => HandlerError::RootNotFound(self.root.clone()),
            _ => HandlerError::Io {
                path: self.root.clone(),
                source: e,
            },
        })?;

        let mut newest: Option<String> = None;
        for entry in entries {
            let entry = entry.map_err(|e| HandlerError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if newest.as_deref() < Some(name) {
                    newest = Some(name.to_string());
                }
            }
        }
        newest.ok_or_else(|| HandlerError::NoContainers(self.root.clone()))
    }

    /// Files in `dir` whose names sort strictly after the cursor, ascending.
    fn new_files(&self, dir: &Path) -> Result<Vec<String>, HandlerError> {
        let entries = fs::read_dir(dir).map_err(|e| HandlerError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HandlerError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name > self.cursor.file.as_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads one delta file, appending changed points. A malformed line is
    /// skipped; an underlying I/O failure aborts the file so the caller can
    /// retry it next tick.
    fn read_file(&mut self, path: &Path) -> Result<bool, HandlerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| HandlerError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut changed = false;
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

            let ts = match NaiveDateTime::parse_from_str(
                record[0].trim(),
                &self.timestamp_format,
            ) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(path = %path.display(), raw = &record[0], error = %e, "skipping record with bad timestamp");
                    continue;
                }
            };
            let column = record[1].trim();
            let value: f64 = match record[2].trim().parse() {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %path.display(), column, raw = &record[2], error = %e, "skipping record with non-numeric value");
                    continue;
                }
            };

            // Changed-only retention: discard the line unless the value
            // differs from the last one recorded for this column.
            if let Some(last) = self.last_values.get(column) {
                if last.value == value {
                    continue;
                }
            }
            self.last_values
                .insert(column.to_string(), LastValue { index: ts, value });

            let axis = self.grouping.axis_for(column).to_string();
            let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.append(
                &axis,
                SeriesPoint {
                    index: PointIndex::Time(ts),
                    column: column.to_string(),
                    value,
                },
            );
            changed = true;
            debug!(column, value, "signal changed");
        }
        Ok(changed)
    }
}

impl DataHandler for TimeSeriesHandler {
    fn handle(&mut self) -> Result<bool, HandlerError> {
        let newest = self.newest_container()?;

        if newest != self.cursor.container {
            info!(container = %newest, "container rollover, resetting cursor");
            if self.refresh_on_rollover && !self.cursor.container.is_empty() {
                let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
                store.reset();
                self.last_values.clear();
            }
            self.cursor.file.clear();
            self.cursor.container = newest;
        }

        let dir = self.root.join(&self.cursor.container);
        let files = self.new_files(&dir)?;
        if files.is_empty() {
            debug!("no new data file");
            return Ok(false);
        }
        info!(count = files.len(), newest = %files[files.len() - 1], "reading new data files");

        let mut changed = false;
        for name in files {
            let path = dir.join(&name);
            match self.read_file(&path) {
                Ok(any) => {
                    changed |= any;
                    // Advance even when the file produced zero changed
                    // points: each file is consumed exactly once.
                    self.cursor.file = name;
                }
                Err(e) => {
                    // Stop here so this file (and everything after it) is
                    // retried in order next tick.
                    warn!(path = %path.display(), error = %e, "file read failed, retrying next tick");
                    break;
                }
            }
        }
        Ok(changed)
    }

    fn refresh_data(&mut self) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.reset();
        self.last_values.clear();
        self.cursor.file.clear();
    }
}
