//! Monitor engine — the concrete task driven by the schedule runner.
//!
//! `on_start` spawns exactly one worker thread running the ingest/render
//! loop; `on_stop` clears the running flag and joins it before returning.
//! That blocking join is the single-flight guarantee: the guard loop cannot
//! re-enter `on_start` while a previous worker is still draining, so only
//! one thread ever mutates the series store.
//!
//! Handler errors are caught per iteration and logged — a single bad file
//! must not kill the monitor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::handler::DataHandler;
use crate::render::Renderer;
use crate::schedule::ScheduledTask;
use crate::store::SharedStore;

/// Handler and renderer live together behind one lock so the worker thread
/// can borrow them between starts. Uncontended: only the worker (or, between
/// workers, `on_start`) ever takes it.
struct EngineInner {
    handler: Box<dyn DataHandler>,
    renderer: Box<dyn Renderer>,
}

pub struct MonitorEngine {
    inner: Arc<Mutex<EngineInner>>,
    store: SharedStore,
    task_interval: Duration,
    refresh_on_start: bool,
    running: Arc<AtomicBool>,
    live_workers: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl MonitorEngine {
    pub fn new(
        handler: Box<dyn DataHandler>,
        renderer: Box<dyn Renderer>,
        store: SharedStore,
        task_interval: Duration,
        refresh_on_start: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner { handler, renderer })),
            store,
            task_interval,
            refresh_on_start,
            running: Arc::new(AtomicBool::new(false)),
            live_workers: Arc::new(AtomicUsize::new(0)),
            worker: None,
        }
    }

    /// One-time display setup, called once before the schedule runner takes
    /// over the engine.
    pub fn plot(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.renderer.plot();
    }

    /// Gauge of currently alive worker threads. By construction this never
    /// exceeds one; exposed so tests can observe the single-flight
    /// invariant.
    pub fn worker_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live_workers)
    }
}

impl ScheduledTask for MonitorEngine {
    fn on_start(&mut self) {
        if self.worker.is_some() {
            // Structurally unreachable: the guard loop only starts from Idle.
            warn!("on_start with a live worker, ignoring");
            return;
        }
        if self.refresh_on_start {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.handler.refresh_data();
            info!("data refreshed for task start");
        }

        self.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let store = self.store.clone();
        let running = Arc::clone(&self.running);
        let gauge = Arc::clone(&self.live_workers);
        let interval = self.task_interval;

        let handle = thread::Builder::new()
            .name("sigwatch-worker".into())
            .spawn(move || {
                gauge.fetch_add(1, Ordering::SeqCst);
                worker_loop(inner, store, running, interval);
                gauge.fetch_sub(1, Ordering::SeqCst);
            })
            .expect("failed to spawn worker thread");
        self.worker = Some(handle);
    }

    fn on_stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            info!("waiting for worker to drain");
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
            info!("worker stopped");
        }
    }
}

fn worker_loop(
    inner: Arc<Mutex<EngineInner>>,
    store: SharedStore,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    info!("worker loop started");
    while running.load(Ordering::SeqCst) {
        {
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.handler.handle() {
                Ok(true) => {
                    let snapshot = store
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .snapshot();
                    inner.renderer.update(&snapshot);
                }
                Ok(false) => debug!("no data changed"),
                Err(e) => warn!(error = %e, "ingestion tick failed"),
            }
        }
        sleep_while_running(&running, interval);
    }
    info!("worker loop exited");
}

/// Sleeps the task interval in short slices so `on_stop` does not block for
/// a full interval waiting on the join.
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    const SLICE: Duration = Duration::from_millis(20);
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let nap = remaining.min(SLICE);
        thread::sleep(nap);
        remaining -= nap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;
    use crate::render::NullRenderer;
    use crate::store::{shared_store, SeriesSnapshot};

    /// Handler scripted with a fixed sequence of results; records refreshes
    /// and concurrent entrancy.
    struct ScriptedHandler {
        script: Vec<Result<bool, ()>>,
        calls: Arc<AtomicUsize>,
        refreshes: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        overlap_seen: Arc<AtomicBool>,
    }

    impl DataHandler for ScriptedHandler {
        fn handle(&mut self) -> Result<bool, HandlerError> {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlap_seen.store(true, Ordering::SeqCst);
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let out = match self.script.get(call % self.script.len()) {
                Some(Ok(changed)) => Ok(*changed),
                _ => Err(HandlerError::NoContainers("scripted".into())),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            out
        }

        fn refresh_data(&mut self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Probes {
        calls: Arc<AtomicUsize>,
        refreshes: Arc<AtomicUsize>,
        overlap_seen: Arc<AtomicBool>,
    }

    fn engine_with(script: Vec<Result<bool, ()>>, refresh_on_start: bool) -> (MonitorEngine, Probes) {
        let calls = Arc::new(AtomicUsize::new(0));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let overlap_seen = Arc::new(AtomicBool::new(false));
        let handler = ScriptedHandler {
            script,
            calls: Arc::clone(&calls),
            refreshes: Arc::clone(&refreshes),
            in_flight: Arc::new(AtomicUsize::new(0)),
            overlap_seen: Arc::clone(&overlap_seen),
        };
        let engine = MonitorEngine::new(
            Box::new(handler),
            Box::new(NullRenderer),
            shared_store(),
            Duration::from_millis(5),
            refresh_on_start,
        );
        (
            engine,
            Probes {
                calls,
                refreshes,
                overlap_seen,
            },
        )
    }

    #[test]
    fn start_runs_worker_and_stop_joins_it() {
        let (mut engine, probes) = engine_with(vec![Ok(false)], false);
        let gauge = engine.worker_gauge();

        engine.on_start();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(gauge.load(Ordering::SeqCst), 1);
        assert!(probes.calls.load(Ordering::SeqCst) >= 1);

        engine.on_stop();
        assert_eq!(gauge.load(Ordering::SeqCst), 0, "join drained the worker");
    }

    #[test]
    fn refresh_on_start_calls_handler_refresh() {
        let (mut engine, probes) = engine_with(vec![Ok(false)], true);
        engine.on_start();
        engine.on_stop();
        assert_eq!(probes.refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_errors_do_not_kill_the_loop() {
        let (mut engine, probes) = engine_with(vec![Err(()), Ok(false)], false);
        engine.on_start();
        thread::sleep(Duration::from_millis(50));
        engine.on_stop();
        assert!(
            probes.calls.load(Ordering::SeqCst) >= 2,
            "loop kept ticking after the error"
        );
    }

    #[test]
    fn restart_cycles_never_overlap_workers() {
        let (mut engine, probes) = engine_with(vec![Ok(true)], false);
        let gauge = engine.worker_gauge();

        for _ in 0..4 {
            engine.on_start();
            thread::sleep(Duration::from_millis(15));
            engine.on_stop();
            assert_eq!(gauge.load(Ordering::SeqCst), 0);
        }
        assert!(!probes.overlap_seen.load(Ordering::SeqCst));
    }

    #[test]
    fn renderer_sees_snapshot_after_change() {
        struct CountingRenderer {
            updates: Arc<AtomicUsize>,
        }
        impl Renderer for CountingRenderer {
            fn plot(&mut self) {}
            fn update(&mut self, _snapshot: &SeriesSnapshot) {
                self.updates.fetch_add(1, Ordering::SeqCst);
            }
        }

        let updates = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = ScriptedHandler {
            script: vec![Ok(true)],
            calls: Arc::clone(&calls),
            refreshes: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            overlap_seen: Arc::new(AtomicBool::new(false)),
        };
        let mut engine = MonitorEngine::new(
            Box::new(handler),
            Box::new(CountingRenderer {
                updates: Arc::clone(&updates),
            }),
            shared_store(),
            Duration::from_millis(5),
            false,
        );

        engine.on_start();
        thread::sleep(Duration::from_millis(30));
        engine.on_stop();

        let u = updates.load(Ordering::SeqCst);
        assert!(u >= 1, "changed ticks trigger renders");
        assert_eq!(u, calls.load(Ordering::SeqCst), "one render per changed tick");
    }
}
