//! Idle and settle waits between pipeline steps
//!
//! Delays are drawn uniformly in whole minutes from a configured range. The
//! wait itself runs on `tokio::time`, checks the shutdown flag every second
//! and reports progress every poll interval. Tests drive it with paused time.

use chrono::Local;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::{Config, DelayRange};

/// How often the shutdown flag is checked while waiting
const SHUTDOWN_CHECK: Duration = Duration::from_secs(1);

/// Which configured range a wait draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayClass {
    /// Between cycles
    Long,
    /// After a reels container is created, while the remote side processes it
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Uniformly random whole-minute delay within `range` (both ends inclusive)
pub fn random_delay(range: DelayRange) -> Duration {
    let minutes = if range.min_minutes >= range.max_minutes {
        range.min_minutes
    } else {
        rand::thread_rng().gen_range(range.min_minutes..=range.max_minutes)
    };
    Duration::from_secs(minutes * 60)
}

#[derive(Debug, Clone)]
pub struct Schedule {
    cycle: DelayRange,
    settle: DelayRange,
    poll: Duration,
}

impl Schedule {
    pub fn new(cycle: DelayRange, settle: DelayRange, poll: Duration) -> Self {
        Self {
            cycle,
            settle,
            poll,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.schedule.cycle_delay,
            config.schedule.settle_delay,
            Duration::from_secs(config.schedule.poll_interval_secs),
        )
    }

    pub fn range(&self, class: DelayClass) -> DelayRange {
        match class {
            DelayClass::Long => self.cycle,
            DelayClass::Short => self.settle,
        }
    }

    /// Draw a delay for `class` and wait it out
    pub async fn wait(&self, class: DelayClass, shutdown: &AtomicBool) -> WaitOutcome {
        let delay = random_delay(self.range(class));
        let next = Local::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        match class {
            DelayClass::Long => info!(
                next_execution = %next.format("%Y-%m-%d %H:%M:%S"),
                "Next cycle in {}",
                humantime::format_duration(delay)
            ),
            DelayClass::Short => info!(
                "Waiting {} for remote processing",
                humantime::format_duration(delay)
            ),
        }

        wait_until(Instant::now() + delay, self.poll, shutdown).await
    }
}

/// Block until `deadline` or until `shutdown` is set
pub async fn wait_until(deadline: Instant, poll: Duration, shutdown: &AtomicBool) -> WaitOutcome {
    let mut last_report = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Wait cancelled by shutdown");
            return WaitOutcome::Cancelled;
        }

        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::Elapsed;
        }

        if now.duration_since(last_report) >= poll {
            debug!(
                "Still waiting, {} remaining",
                humantime::format_duration(Duration::from_secs((deadline - now).as_secs()))
            );
            last_report = now;
        }

        sleep(SHUTDOWN_CHECK.min(deadline - now)).await;
    }
}
