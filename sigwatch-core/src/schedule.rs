//! Schedule runner — the guard loop that starts and stops the monitor task
//! at trading-window boundaries.
//!
//! One dedicated thread polls the window membership test every check
//! interval and drives the `Idle ⇄ Running` state machine. Each transition
//! fires exactly one `on_start` / `on_stop` call; `on_stop` is expected to
//! block until the task has fully wound down, which is what makes re-entry
//! into `on_start` race-free.
//!
//! Unlike the upstream emitter this is modeled after, the guard loop has an
//! explicit shutdown path: `ScheduleHandle::shutdown()` stops the loop,
//! joins the thread, and performs a final `on_stop` if a window was active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveTime};
use tracing::{error, info};

use crate::window::{is_active, TimeWindow};

/// Guard-loop state. Transitions happen only on guard ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Running,
}

/// The task driven by the runner. `on_stop` must block until the task is
/// fully stopped (single-flight discipline). Neither callback may panic;
/// task-internal failures are the task's own log-and-continue concern.
pub trait ScheduledTask: Send {
    fn on_start(&mut self);
    fn on_stop(&mut self);
}

/// Source of "what time of day is it". Injected so window transitions are
/// testable without waiting for wall-clock boundaries.
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

/// Wall-clock time in the local timezone (trading windows are local).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Spawns and owns the guard-loop thread.
pub struct ScheduleRunner;

impl ScheduleRunner {
    /// Starts the guard loop against the local wall clock.
    pub fn spawn(
        windows: Vec<TimeWindow>,
        check_interval: Duration,
        task: Box<dyn ScheduledTask>,
    ) -> ScheduleHandle {
        Self::spawn_with_clock(windows, check_interval, task, Arc::new(SystemClock))
    }

    /// Starts the guard loop with an injected clock.
    pub fn spawn_with_clock(
        windows: Vec<TimeWindow>,
        check_interval: Duration,
        task: Box<dyn ScheduledTask>,
        clock: Arc<dyn Clock>,
    ) -> ScheduleHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("sigwatch-guard".into())
            .spawn(move || {
                guard_loop(windows, check_interval, task, clock, stop_flag);
            })
            .expect("failed to spawn guard thread");

        ScheduleHandle {
            stop,
            thread: Some(thread),
        }
    }
}

fn guard_loop(
    windows: Vec<TimeWindow>,
    check_interval: Duration,
    mut task: Box<dyn ScheduledTask>,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
) {
    info!("guard loop started, waiting for a trading window");
    let mut state = ScheduleState::Idle;

    while !stop.load(Ordering::Relaxed) {
        let active = is_active(clock.time_of_day(), &windows);
        match (state, active) {
            (ScheduleState::Idle, true) => {
                state = ScheduleState::Running;
                info!("entering trading window, starting task");
                task.on_start();
            }
            (ScheduleState::Running, false) => {
                state = ScheduleState::Idle;
                info!("leaving trading window, stopping task");
                task.on_stop();
            }
            _ => {}
        }
        sleep_unless_stopped(&stop, check_interval);
    }

    // Final stop so a shutdown mid-window still drains the worker.
    if state == ScheduleState::Running {
        info!("shutdown during active window, stopping task");
        task.on_stop();
    }
    info!("guard loop exited");
}

/// Sleeps `total` in short slices so a shutdown request does not have to
/// wait out a full check interval. Transition cadence is unaffected: window
/// state is still only evaluated once per interval.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    const SLICE: Duration = Duration::from_millis(20);
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let nap = remaining.min(SLICE);
        thread::sleep(nap);
        remaining -= nap;
    }
}

/// Handle to a running guard loop.
pub struct ScheduleHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Requests shutdown and blocks until the guard thread (and, through its
    /// final `on_stop`, any active worker) has exited.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("guard thread panicked");
            }
        }
    }

    /// Blocks until the guard loop exits. Without a prior `shutdown` request
    /// from another handle holder this is effectively "run forever".
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("guard thread panicked");
            }
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Clock whose reported time is set by the test.
    pub struct FakeClock {
        now: Mutex<NaiveTime>,
    }

    impl FakeClock {
        pub fn at(h: u32, m: u32) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            })
        }

        pub fn set(&self, h: u32, m: u32) {
            *self.now.lock().unwrap() = NaiveTime::from_hms_opt(h, m, 0).unwrap();
        }
    }

    impl Clock for FakeClock {
        fn time_of_day(&self) -> NaiveTime {
            *self.now.lock().unwrap()
        }
    }

    struct CountingTask {
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl ScheduledTask for CountingTask {
        fn on_start(&mut self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settle() {
        thread::sleep(Duration::from_millis(60));
    }

    #[test]
    fn window_transition_fires_start_and_stop_exactly_once() {
        let clock = FakeClock::at(8, 59);
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let task = CountingTask {
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };

        let handle = ScheduleRunner::spawn_with_clock(
            vec![TimeWindow::parse("09:00-09:05").unwrap()],
            Duration::from_millis(10),
            Box::new(task),
            clock.clone(),
        );

        settle();
        assert_eq!(starts.load(Ordering::SeqCst), 0, "idle before the window");

        clock.set(9, 0);
        settle();
        assert_eq!(starts.load(Ordering::SeqCst), 1, "single start at 09:00");
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        clock.set(9, 3);
        settle();
        assert_eq!(starts.load(Ordering::SeqCst), 1, "no restart inside window");

        clock.set(9, 6);
        settle();
        assert_eq!(stops.load(Ordering::SeqCst), 1, "single stop at 09:06");

        handle.shutdown();
        // Already idle at shutdown: no extra stop.
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_during_window_performs_final_stop() {
        let clock = FakeClock::at(10, 0);
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let task = CountingTask {
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };

        let handle = ScheduleRunner::spawn_with_clock(
            vec![TimeWindow::parse("09:00-16:00").unwrap()],
            Duration::from_millis(10),
            Box::new(task),
            clock,
        );

        settle();
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        handle.shutdown();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rapid_flapping_keeps_start_stop_paired() {
        let clock = FakeClock::at(8, 0);
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let task = CountingTask {
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };

        let handle = ScheduleRunner::spawn_with_clock(
            vec![TimeWindow::parse("09:00-09:05").unwrap()],
            Duration::from_millis(10),
            Box::new(task),
            clock.clone(),
        );

        for _ in 0..3 {
            clock.set(9, 0);
            settle();
            clock.set(9, 30);
            settle();
        }
        handle.shutdown();

        let s = starts.load(Ordering::SeqCst);
        let p = stops.load(Ordering::SeqCst);
        assert_eq!(s, 3);
        assert_eq!(p, 3, "every start has a matching stop");
    }
}
