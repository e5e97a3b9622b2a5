//! Periodic reminder task.
//!
//! Runs [`ReminderScheduler::try_run_sweep`] on a fixed interval until
//! stopped. The first sweep happens one interval after start. Ticks that
//! fire while a sweep is still running are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{AlertError, Result};
use crate::reminders::ReminderScheduler;

/// Handle for controlling the reminder task.
#[derive(Debug)]
pub struct ReminderHandle {
    running: Arc<AtomicBool>,
    sweeps: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderHandle {
    /// Check if the reminder task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of sweeps completed so far.
    #[must_use]
    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Stop the reminder task. A sweep in progress runs to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // receiver gone means the task already exited
        let _ = self.shutdown.send(true);
    }

    /// Stop the task and wait for it to exit.
    pub async fn join(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!(error = %e, "reminder task ended abnormally");
        }
    }
}

/// Start the periodic reminder task.
///
/// Must be called from within a tokio runtime. Returns a handle to control
/// the task and monitor its state; dropping the handle also stops the task.
///
/// # Errors
///
/// Returns `AlertError::InvalidConfig` if `interval` is zero.
pub fn start_reminder_task(
    scheduler: ReminderScheduler,
    interval: Duration,
) -> Result<ReminderHandle> {
    if interval.is_zero() {
        return Err(AlertError::InvalidConfig {
            reason: "reminder interval must be greater than 0".to_string(),
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    let sweeps = Arc::new(AtomicU64::new(0));
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task_running = Arc::clone(&running);
    let task_sweeps = Arc::clone(&sweeps);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "reminder task started");

        while task_running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => break,
            }

            if !task_running.load(Ordering::SeqCst) {
                break;
            }

            let scheduler = scheduler.clone();
            match tokio::task::spawn_blocking(move || scheduler.try_run_sweep()).await {
                Ok(Some(report)) => {
                    task_sweeps.fetch_add(1, Ordering::SeqCst);
                    debug!(sent = report.reminders_sent, "tick sweep finished");
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "reminder sweep panicked"),
            }
        }

        task_running.store(false, Ordering::SeqCst);
        info!("reminder task stopped");
    });

    Ok(ReminderHandle {
        running,
        sweeps,
        shutdown,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelRegistry;
    use crate::clock::{Clock, ManualClock};
    use crate::delivery::DeliveryEngine;
    use crate::preferences::PreferenceTracker;
    use crate::repositories::{
        AlertRepository, DeliveryRepository, PreferenceRepository, UserRepository,
    };

    fn scheduler() -> ReminderScheduler {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let tracker = Arc::new(PreferenceTracker::new(
            Arc::new(PreferenceRepository::new()),
            Arc::clone(&clock),
        ));
        let engine = Arc::new(DeliveryEngine::new(
            Arc::new(ChannelRegistry::with_defaults()),
            Arc::new(DeliveryRepository::new()),
            Arc::clone(&tracker),
            Arc::clone(&clock),
        ));
        ReminderScheduler::new(
            Arc::new(AlertRepository::new()),
            Arc::new(UserRepository::new()),
            tracker,
            engine,
            clock,
        )
    }

    #[tokio::test]
    async fn task_runs_sweeps_periodically() {
        let handle = start_reminder_task(scheduler(), Duration::from_millis(10)).unwrap();
        assert!(handle.is_running());

        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.sweeps_completed() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timeout waiting for sweeps");

        handle.join().await;
    }

    #[tokio::test]
    async fn first_sweep_waits_one_interval() {
        let handle = start_reminder_task(scheduler(), Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.sweeps_completed(), 0);
        handle.join().await;
    }

    #[tokio::test]
    async fn stop_ends_the_task() {
        let handle = start_reminder_task(scheduler(), Duration::from_secs(60)).unwrap();
        handle.stop();
        assert!(!handle.is_running());

        let running = Arc::clone(&handle.running);
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("task did not stop");
        assert!(!running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn skipped_tick_is_not_counted() {
        let scheduler = scheduler();
        let lock = Arc::clone(&scheduler.sweep_lock);
        let guard = lock.lock();

        let handle = start_reminder_task(scheduler, Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(handle.sweeps_completed(), 0);

        drop(guard);
        handle.join().await;
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let err = start_reminder_task(scheduler(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, AlertError::InvalidConfig { .. }));
    }
}
