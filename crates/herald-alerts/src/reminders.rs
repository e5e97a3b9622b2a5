//! The reminder sweep.
//!
//! A sweep walks every effectively-active alert with reminders enabled and
//! re-delivers it to each recipient whose preference is due: not read, not
//! snoozed, and last reminded at least one reminder frequency ago (or
//! never). Sweeps never create preference rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::Notification;
use crate::clock::Clock;
use crate::delivery::DeliveryEngine;
use crate::preferences::PreferenceTracker;
use crate::repositories::{AlertRepository, UserRepository};
use crate::store::Repository;
use crate::types::Alert;

/// Outcome of one reminder sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// The instant every comparison in the sweep used.
    pub now: Option<DateTime<Utc>>,
    /// Active alerts with reminders enabled that were examined.
    pub alerts_evaluated: usize,
    /// Preference rows examined.
    pub preferences_evaluated: usize,
    /// Reminders accepted by a channel.
    pub reminders_sent: usize,
    /// Reminders that could not be sent (channel missing or rejected).
    pub failures: usize,
    /// Due preferences skipped because the user no longer exists.
    pub skipped: usize,
}

/// Runs reminder sweeps over the stored alerts and preferences.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    alerts: Arc<AlertRepository>,
    users: Arc<UserRepository>,
    tracker: Arc<PreferenceTracker>,
    engine: Arc<DeliveryEngine>,
    clock: Arc<dyn Clock>,
    pub(crate) sweep_lock: Arc<Mutex<()>>,
    budget: Duration,
}

impl ReminderScheduler {
    /// Default time a sweep may take before it is reported as slow.
    pub const DEFAULT_BUDGET: Duration = Duration::from_secs(30);

    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        alerts: Arc<AlertRepository>,
        users: Arc<UserRepository>,
        tracker: Arc<PreferenceTracker>,
        engine: Arc<DeliveryEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            alerts,
            users,
            tracker,
            engine,
            clock,
            sweep_lock: Arc::new(Mutex::new(())),
            budget: Self::DEFAULT_BUDGET,
        }
    }

    /// Sets the duration above which a sweep is logged as slow.
    #[must_use]
    pub const fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Returns the sweep budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Runs one sweep, waiting for any sweep already in progress to finish.
    pub fn run_sweep(&self) -> SweepReport {
        let _guard = self.sweep_lock.lock();
        self.sweep_timed()
    }

    /// Runs one sweep unless another one is in progress.
    ///
    /// Returns `None` if the sweep was skipped.
    pub fn try_run_sweep(&self) -> Option<SweepReport> {
        let Some(_guard) = self.sweep_lock.try_lock() else {
            warn!("previous reminder sweep still running, skipping this tick");
            return None;
        };
        Some(self.sweep_timed())
    }

    fn sweep_timed(&self) -> SweepReport {
        let started = Instant::now();
        let report = self.sweep_at(self.clock.now());
        let elapsed = started.elapsed();

        if elapsed > self.budget {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "reminder sweep exceeded its budget"
            );
        }
        report
    }

    /// Runs one sweep using `now` for every comparison.
    fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport {
            now: Some(now),
            ..SweepReport::default()
        };

        let alerts = self
            .alerts
            .find_active(now)
            .into_iter()
            .filter(|a| a.reminder_enabled);

        for alert in alerts {
            report.alerts_evaluated += 1;
            self.sweep_alert(&alert, now, &mut report);
        }

        if report.reminders_sent > 0 || report.failures > 0 {
            info!(
                alerts = report.alerts_evaluated,
                preferences = report.preferences_evaluated,
                sent = report.reminders_sent,
                failures = report.failures,
                skipped = report.skipped,
                "reminder sweep complete"
            );
        } else {
            debug!(
                alerts = report.alerts_evaluated,
                preferences = report.preferences_evaluated,
                "reminder sweep complete, nothing due"
            );
        }
        report
    }

    fn sweep_alert(&self, alert: &Alert, now: DateTime<Utc>, report: &mut SweepReport) {
        let preferences = self.tracker.for_alert(&alert.id);
        report.preferences_evaluated += preferences.len();

        let frequency = alert.reminder_frequency();
        let due: Vec<_> = preferences
            .into_iter()
            .filter(|p| p.is_due(now, frequency))
            .collect();
        if due.is_empty() {
            return;
        }

        let channel = match self.engine.channels().get(alert.delivery_type) {
            Ok(channel) => channel,
            Err(e) => {
                report.failures += due.len();
                warn!(alert_id = %alert.id, error = %e, "cannot send reminders");
                return;
            }
        };

        for preference in due {
            // read or snoozed since the snapshot was taken
            if !self.tracker.is_due(&preference.id, now, frequency) {
                debug!(
                    alert_id = %alert.id,
                    user_id = %preference.user_id,
                    "preference no longer due"
                );
                continue;
            }

            let Some(user) = self.users.find_by_id(&preference.user_id) else {
                report.skipped += 1;
                warn!(
                    alert_id = %alert.id,
                    user_id = %preference.user_id,
                    "reminder recipient no longer exists"
                );
                continue;
            };

            match self
                .engine
                .send(channel.as_ref(), &Notification::reminder(alert, &user), now)
            {
                Ok(_) => {
                    self.tracker.record_reminder(&preference.id, now);
                    report.reminders_sent += 1;
                    debug!(alert_id = %alert.id, user_id = %user.id, "reminder sent");
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(
                        alert_id = %alert.id,
                        user_id = %user.id,
                        channel = %channel.name(),
                        error = %e,
                        "reminder delivery failed"
                    );
                }
            }
        }
    }
}
