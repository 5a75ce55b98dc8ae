//! Serializable monitor configuration.
//!
//! Loaded from TOML by the CLI. Everything the monitor recognizes lives
//! here: trading windows, both poll intervals, refresh flags, axis grouping,
//! display hints, and the tagged data source. Validation failures are the
//! only fatal errors in the system — bad files at runtime are logged and
//! retried, a bad config aborts startup.
//!
//! ```toml
//! windows = ["09:30-11:30", "13:00-15:00"]
//! task_interval_secs = 10
//!
//! [source]
//! type = "TIME_SERIES"
//! root = "/srv/signals/targets"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::{AxisGrouping, FieldOrder};
use crate::window::TimeWindow;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("schedule has no trading windows")]
    NoWindows,

    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("source path '{0}' does not exist")]
    SourceMissing(PathBuf),
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Daily trading windows, e.g. `"09:30-11:30"`. Inclusive both ends.
    pub windows: Vec<TimeWindow>,

    /// Guard-loop poll interval in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Worker-loop poll interval in seconds.
    #[serde(default = "default_task_interval")]
    pub task_interval_secs: u64,

    /// Full data resync when a window opens.
    #[serde(default = "default_true")]
    pub refresh_on_start: bool,

    /// Full data resync when the newest date container changes.
    #[serde(default = "default_true")]
    pub refresh_on_rollover: bool,

    /// Group every column under this single axis name. Empty or absent
    /// means one axis per column.
    #[serde(default)]
    pub all_in_one_axis: Option<String>,

    /// Column whose axes are listed first by the renderer.
    #[serde(default)]
    pub sort_by: Option<String>,

    /// Upper bound on displayed axes.
    #[serde(default)]
    pub max_axes: Option<usize>,

    /// chrono format of record timestamps in time-series sources.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Where the signal data lives.
    pub source: SourceConfig,
}

/// Data source selection (serializable tagged enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceConfig {
    /// Date-partitioned delta files: `{root}/{YYYYMMDD}/{HHMMSS}.csv`.
    TimeSeries { root: PathBuf },

    /// One continuously rewritten file.
    Snapshot {
        file: PathBuf,
        #[serde(default)]
        field_order: FieldOrder,
        #[serde(default)]
        drop_zero_indexes: bool,
    },
}

fn default_check_interval() -> u64 {
    60
}

fn default_task_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_timestamp_format() -> String {
    "%Y%m%d %H%M%S".to_string()
}

impl MonitorConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup-time validation. Window shape (end before start) is already
    /// rejected during deserialization by [`TimeWindow`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.windows.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "check_interval_secs",
            });
        }
        if self.task_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "task_interval_secs",
            });
        }
        match &self.source {
            SourceConfig::TimeSeries { root } if !root.is_dir() => {
                Err(ConfigError::SourceMissing(root.clone()))
            }
            SourceConfig::Snapshot { file, .. } if !file.is_file() => {
                Err(ConfigError::SourceMissing(file.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }

    pub fn task_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.task_interval_secs)
    }

    pub fn grouping(&self) -> AxisGrouping {
        AxisGrouping::from_option(self.all_in_one_axis.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_toml(source: &str) -> String {
        format!("windows = [\"09:00-11:30\", \"13:00-15:00\"]\n\n{source}")
    }

    #[test]
    fn parse_time_series_source_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let toml = base_toml(&format!(
            "[source]\ntype = \"TIME_SERIES\"\nroot = \"{}\"\n",
            tmp.path().display()
        ));
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.windows.len(), 2);
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.task_interval_secs, 10);
        assert!(config.refresh_on_start);
        assert!(config.refresh_on_rollover);
        assert_eq!(config.timestamp_format, "%Y%m%d %H%M%S");
        assert!(matches!(config.source, SourceConfig::TimeSeries { .. }));
        assert!(matches!(config.grouping(), AxisGrouping::PerColumn));
    }

    #[test]
    fn parse_snapshot_source() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("positions.csv");
        fs::write(&file, "deskA,AAPL,100\n").unwrap();
        let toml = base_toml(&format!(
            "all_in_one_axis = \"book\"\nmax_axes = 6\n\n[source]\ntype = \"SNAPSHOT\"\nfile = \"{}\"\nfield_order = \"COLUMN_INDEX_VALUE\"\ndrop_zero_indexes = true\n",
            file.display()
        ));
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        config.validate().unwrap();

        assert!(matches!(config.grouping(), AxisGrouping::Single(_)));
        assert_eq!(config.max_axes, Some(6));
        match config.source {
            SourceConfig::Snapshot {
                field_order,
                drop_zero_indexes,
                ..
            } => {
                assert_eq!(field_order, FieldOrder::ColumnIndexValue);
                assert!(drop_zero_indexes);
            }
            _ => panic!("expected snapshot source"),
        }
    }

    #[test]
    fn inverted_window_fails_at_parse() {
        let toml = "windows = [\"15:00-09:00\"]\n\n[source]\ntype = \"TIME_SERIES\"\nroot = \"/tmp\"\n";
        assert!(toml::from_str::<MonitorConfig>(toml).is_err());
    }

    #[test]
    fn empty_windows_rejected() {
        let tmp = TempDir::new().unwrap();
        let toml = format!(
            "windows = []\n\n[source]\ntype = \"TIME_SERIES\"\nroot = \"{}\"\n",
            tmp.path().display()
        );
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoWindows)));
    }

    #[test]
    fn zero_interval_rejected() {
        let tmp = TempDir::new().unwrap();
        let toml = base_toml(&format!(
            "task_interval_secs = 0\n\n[source]\ntype = \"TIME_SERIES\"\nroot = \"{}\"\n",
            tmp.path().display()
        ));
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval { .. })
        ));
    }

    #[test]
    fn missing_source_path_is_fatal() {
        let toml = base_toml("[source]\ntype = \"TIME_SERIES\"\nroot = \"/definitely/not/here\"\n");
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SourceMissing(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MonitorConfig::load(Path::new("/no/such/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn config_serialization_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let toml = base_toml(&format!(
            "[source]\ntype = \"TIME_SERIES\"\nroot = \"{}\"\n",
            tmp.path().display()
        ));
        let config: MonitorConfig = toml::from_str(&toml).unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
