//! SigWatch Core — scheduled monitoring of append-only trading signal files.
//!
//! This crate contains the heart of the monitor:
//! - Daily trading-window evaluation (pure membership test)
//! - Schedule runner: guard loop driving start/stop of a background task
//! - Monitor engine: single-flight worker loop (ingest → render → sleep)
//! - Incremental data handlers (dated-folder deltas, single-file snapshots)
//! - In-memory series store with snapshot isolation for the renderer
//! - TOML configuration surface

pub mod config;
pub mod engine;
pub mod handler;
pub mod render;
pub mod schedule;
pub mod store;
pub mod window;

pub use config::{ConfigError, MonitorConfig, SourceConfig};
pub use engine::MonitorEngine;
pub use handler::{
    AxisGrouping, DataHandler, FieldOrder, HandlerError, SnapshotHandler, TimeSeriesHandler,
};
pub use render::{JsonRenderer, LogRenderer, NullRenderer, Renderer};
pub use schedule::{Clock, ScheduleHandle, ScheduleRunner, ScheduleState, ScheduledTask, SystemClock};
pub use store::{shared_store, PointIndex, SeriesPoint, SeriesSnapshot, SeriesStore, SharedStore};
pub use window::{is_active, TimeWindow, WindowError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses the worker thread boundary
    /// is Send (and the shared pieces Sync).
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<store::SeriesPoint>();
        require_sync::<store::SeriesPoint>();
        require_send::<store::SeriesStore>();
        require_sync::<store::SeriesStore>();
        require_send::<store::SeriesSnapshot>();
        require_sync::<store::SeriesSnapshot>();

        require_send::<window::TimeWindow>();
        require_sync::<window::TimeWindow>();

        require_send::<config::MonitorConfig>();
        require_sync::<config::MonitorConfig>();

        require_send::<handler::TimeSeriesHandler>();
        require_send::<handler::SnapshotHandler>();
        require_send::<engine::MonitorEngine>();

        require_send::<schedule::SystemClock>();
        require_sync::<schedule::SystemClock>();
    }
}
