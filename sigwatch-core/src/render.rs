//! Renderer boundary.
//!
//! The real plotting surface is an external collaborator; the engine only
//! needs `plot()` (one-time display setup) and `update()` (redraw from a
//! store snapshot). Built-ins cover headless operation: [`LogRenderer`]
//! writes a per-axis summary to the log, [`JsonRenderer`] dumps the
//! snapshot to stdout for piping, [`NullRenderer`] is for tests.

use tracing::{error, info};

use crate::store::{PointIndex, SeriesSnapshot};

/// Consumed by the monitor engine, always from the worker thread — renders
/// never interleave because the worker is single-flight.
pub trait Renderer: Send {
    /// Initial display setup, called once at engine start.
    fn plot(&mut self);

    /// Redraw from a consistent snapshot of the series store.
    fn update(&mut self, snapshot: &SeriesSnapshot);
}

/// Logs a one-line summary per displayed axis.
pub struct LogRenderer {
    max_axes: Option<usize>,
    sort_first: Option<String>,
}

impl LogRenderer {
    pub fn new(max_axes: Option<usize>, sort_first: Option<String>) -> Self {
        Self {
            max_axes,
            sort_first,
        }
    }
}

impl Renderer for LogRenderer {
    fn plot(&mut self) {
        info!("display ready");
    }

    fn update(&mut self, snapshot: &SeriesSnapshot) {
        let limit = self.max_axes.unwrap_or(usize::MAX);
        for name in snapshot.top_axes(limit, self.sort_first.as_deref()) {
            let points = snapshot.axis(name).unwrap_or(&[]);
            match points.last() {
                Some(last) => info!(
                    axis = name,
                    points = points.len(),
                    last_index = %format_index(&last.index),
                    last_value = last.value,
                    "axis"
                ),
                None => info!(axis = name, points = 0usize, "axis"),
            }
        }
    }
}

fn format_index(index: &PointIndex) -> String {
    match index {
        PointIndex::Time(ts) => ts.format("%H:%M:%S").to_string(),
        PointIndex::Label(label) => label.clone(),
    }
}

/// Prints the whole snapshot as JSON, one document per update.
#[derive(Debug, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl Renderer for JsonRenderer {
    fn plot(&mut self) {}

    fn update(&mut self, snapshot: &SeriesSnapshot) {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(snapshot)
        } else {
            serde_json::to_string(snapshot)
        };
        match rendered {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "snapshot serialization failed"),
        }
    }
}

/// Discards everything.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn plot(&mut self) {}
    fn update(&mut self, _snapshot: &SeriesSnapshot) {}
}
