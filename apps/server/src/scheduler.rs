//! Periodic analysis trigger.

use crate::state::SharedState;
use std::time::Duration;
use stockwatch_engine::{Analyzer, CycleReport};
use tokio::time::Instant;
use tracing::{debug, info};

/// Fixed-interval schedule. The first firing is one interval after start.
#[derive(Debug, Clone)]
pub struct AnalysisSchedule {
    interval: Duration,
    next_run: Instant,
}

impl AnalysisSchedule {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now() + interval)
    }

    pub fn starting_at(interval: Duration, next_run: Instant) -> Self {
        Self { interval, next_run }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_run
    }

    /// Next firing is measured from when this one was handled.
    pub fn mark_ran(&mut self, now: Instant) {
        self.next_run = now + self.interval;
    }

    pub fn next_run(&self) -> Instant {
        self.next_run
    }
}

/// Run a cycle if the schedule is due and nothing else is running.
///
/// A firing that finds a cycle in flight is dropped, not queued.
pub async fn run_pending(
    analyzer: &Analyzer,
    schedule: &mut AnalysisSchedule,
    now: Instant,
) -> Option<CycleReport> {
    if !schedule.is_due(now) {
        return None;
    }
    schedule.mark_ran(now);

    match analyzer.try_begin() {
        Ok(guard) => {
            info!("Scheduled analysis starting");
            Some(analyzer.run_cycle(guard).await)
        }
        Err(e) => {
            debug!("Skipping scheduled analysis: {}", e);
            None
        }
    }
}

/// Poll for due work every tick until the application stops.
///
/// `stop()` interrupts the tick sleep. A cycle already in flight runs to
/// completion before the loop returns.
pub async fn run_scheduler(state: SharedState) {
    let interval = state.config.analysis.interval();
    let tick = state.config.analysis.tick();
    let mut schedule = AnalysisSchedule::new(interval);
    let mut shutdown = state.shutdown_signal();

    info!(
        interval_secs = interval.as_secs(),
        tick_secs = tick.as_secs(),
        "Starting scheduler"
    );

    while state.is_running() {
        run_pending(&state.analyzer, &mut schedule, Instant::now()).await;

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = shutdown.changed() => {}
        }
    }

    info!("Scheduler stopped");
}
