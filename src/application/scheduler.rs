// Poll scheduler - cycle cadence, pause/resume and debounced reconfiguration
use super::debounce::Debouncer;
use super::lock;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const MIN_INTERVAL_SECS: u64 = 1;

/// Delay used to coalesce device-list and address edits.
pub const RECONFIGURE_DEBOUNCE: Duration = Duration::from_millis(500);

/// The work the scheduler drives.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    /// Whether a cycle is still outstanding.
    fn is_busy(&self) -> bool;

    async fn run_cycle(&self);

    fn cancel_in_flight(&self);

    /// Re-read the device list after configuration edits.
    async fn reconfigure(&self);

    /// Release long-lived resources on teardown.
    fn shutdown(&self) {}
}

struct SchedulerState {
    interval: Duration,
    paused: bool,
    torn_down: bool,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct PollScheduler {
    runner: Arc<dyn CycleRunner>,
    state: Arc<Mutex<SchedulerState>>,
    debounce: Debouncer,
}

impl PollScheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, paused: bool) -> Self {
        Self {
            runner,
            state: Arc::new(Mutex::new(SchedulerState {
                interval: Duration::from_secs(MIN_INTERVAL_SECS),
                paused,
                torn_down: false,
                timer: None,
            })),
            debounce: Debouncer::new(),
        }
    }

    /// Run one cycle now, then one every `interval_secs` until stopped.
    /// A paused scheduler only records the interval.
    pub fn start(&self, interval_secs: u64) {
        let mut state = lock(&self.state);
        state.interval = Duration::from_secs(interval_secs.max(MIN_INTERVAL_SECS));
        if state.torn_down {
            return;
        }
        if state.paused {
            tracing::info!(interval_secs, "Polling paused, not starting timer");
            return;
        }
        self.install_timer(&mut state);
    }

    /// Replace the timer when the interval actually changed.
    pub fn set_interval(&self, interval_secs: u64) {
        let interval = Duration::from_secs(interval_secs.max(MIN_INTERVAL_SECS));
        if lock(&self.state).interval == interval {
            return;
        }
        tracing::info!(interval_secs, "Poll interval changed");
        self.start(interval_secs);
    }

    pub fn pause(&self) {
        let mut state = lock(&self.state);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if !state.paused {
            tracing::info!("Polling paused");
        }
        state.paused = true;
        drop(state);
        self.runner.cancel_in_flight();
    }

    pub fn resume(&self) {
        let mut state = lock(&self.state);
        if state.torn_down || !state.paused {
            return;
        }
        state.paused = false;
        tracing::info!("Polling resumed");
        self.install_timer(&mut state);
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    /// Manual refresh outside the cadence. Skipped while a cycle is outstanding.
    pub fn refresh_now(&self) {
        if lock(&self.state).torn_down {
            return;
        }
        trigger_cycle(&self.runner);
    }

    /// Coalesce configuration edits into one reconfigure-and-restart fired
    /// after `delay` without further edits.
    pub fn debounce_reconfigure(&self, delay: Duration) {
        if lock(&self.state).torn_down {
            return;
        }
        let scheduler = self.clone();
        self.debounce.arm(delay, move || async move {
            scheduler.runner.cancel_in_flight();
            scheduler.runner.reconfigure().await;
            let mut state = lock(&scheduler.state);
            if !state.paused && !state.torn_down {
                scheduler.install_timer(&mut state);
            }
        });
    }

    /// Cancel the timer, any pending reconfigure and in-flight work. Safe to
    /// call more than once.
    pub fn teardown(&self) {
        let mut state = lock(&self.state);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let first = !state.torn_down;
        state.torn_down = true;
        drop(state);

        self.debounce.cancel();
        self.runner.cancel_in_flight();
        if first {
            self.runner.shutdown();
            tracing::info!("Poll scheduler torn down");
        }
    }

    fn install_timer(&self, state: &mut SchedulerState) {
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }
        let runner = self.runner.clone();
        let period = state.interval;
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately.
                ticker.tick().await;
                trigger_cycle(&runner);
            }
        }));
    }
}

fn trigger_cycle(runner: &Arc<dyn CycleRunner>) {
    if runner.is_busy() {
        tracing::debug!("Previous cycle still in flight, skipping tick");
        return;
    }
    let runner = runner.clone();
    tokio::spawn(async move {
        runner.run_cycle().await;
    });
}
