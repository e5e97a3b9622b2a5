//! Per-recipient acknowledgment tracking.
//!
//! [`PreferenceTracker`] owns the unread → read / snoozed state of each
//! (alert, user) pair and the reminder timestamp the scheduler relies on.
//!
//! Every mutation runs as a closure under the repository's write lock and
//! touches only its own fields: read/snooze write `is_read`/`snoozed_until`,
//! reminders write `last_reminded_at`. Both bump `updated_at`.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, info};

use crate::clock::{Clock, end_of_day_in, end_of_local_day};
use crate::repositories::PreferenceRepository;
use crate::store::Repository;
use crate::types::Preference;

/// Tracks read/snooze/reminder state per (alert, user).
#[derive(Debug, Clone)]
pub struct PreferenceTracker {
    preferences: Arc<PreferenceRepository>,
    clock: Arc<dyn Clock>,
}

impl PreferenceTracker {
    /// Creates a tracker over the preference repository.
    #[must_use]
    pub fn new(preferences: Arc<PreferenceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { preferences, clock }
    }

    /// Returns the preference row for (user, alert), creating an unread one
    /// if the alert was never delivered to the user.
    ///
    /// The flag is `true` if the row was created by this call.
    pub(crate) fn ensure(
        &self,
        user_id: &str,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> (Preference, bool) {
        let (preference, created) = self.preferences.find_or_create(user_id, alert_id, now);
        if created {
            debug!(%user_id, %alert_id, preference_id = %preference.id, "created preference");
        }
        (preference, created)
    }

    /// Marks the alert as read for the user.
    ///
    /// Returns the updated row, or `None` (and does nothing) if the alert
    /// was never delivered to the user.
    pub fn mark_read(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        let now = self.clock.now();
        let updated = self
            .preferences
            .update_by_user_and_alert(user_id, alert_id, |p| {
                p.is_read = true;
                p.updated_at = now;
            });

        match &updated {
            Some(_) => info!(%user_id, %alert_id, "alert marked read"),
            None => debug!(%user_id, %alert_id, "mark read ignored, alert never delivered"),
        }
        updated
    }

    /// Snoozes reminders until the end of the current local day.
    ///
    /// Re-snoozing replaces the previous deadline. Returns `None` (and does
    /// nothing) if the alert was never delivered to the user.
    pub fn snooze(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        let now = self.clock.now();
        self.snooze_until(user_id, alert_id, end_of_local_day(now))
    }

    /// Snoozes reminders until the end of the current day in `tz`.
    pub fn snooze_in<Tz: TimeZone>(
        &self,
        user_id: &str,
        alert_id: &str,
        tz: &Tz,
    ) -> Option<Preference> {
        let now = self.clock.now();
        self.snooze_until(user_id, alert_id, end_of_day_in(now, tz))
    }

    fn snooze_until(
        &self,
        user_id: &str,
        alert_id: &str,
        until: DateTime<Utc>,
    ) -> Option<Preference> {
        let now = self.clock.now();
        let updated = self
            .preferences
            .update_by_user_and_alert(user_id, alert_id, |p| {
                p.snoozed_until = Some(until);
                p.updated_at = now;
            });

        match &updated {
            Some(_) => info!(%user_id, %alert_id, %until, "alert snoozed"),
            None => debug!(%user_id, %alert_id, "snooze ignored, alert never delivered"),
        }
        updated
    }

    /// Re-reads a preference row and checks it is still due at `now`.
    pub(crate) fn is_due(
        &self,
        preference_id: &str,
        now: DateTime<Utc>,
        frequency: Duration,
    ) -> bool {
        self.preferences
            .find_by_id(preference_id)
            .is_some_and(|p| p.is_due(now, frequency))
    }

    /// Records that a reminder was accepted by a channel at `at`.
    pub(crate) fn record_reminder(
        &self,
        preference_id: &str,
        at: DateTime<Utc>,
    ) -> Option<Preference> {
        self.preferences.update(preference_id, |p| {
            p.last_reminded_at = Some(at);
            p.updated_at = at;
        })
    }

    /// Returns the preference row for (user, alert).
    #[must_use]
    pub fn get(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        self.preferences.find_by_user_and_alert(user_id, alert_id)
    }

    /// Returns a user's preference rows.
    #[must_use]
    pub fn for_user(&self, user_id: &str) -> Vec<Preference> {
        self.preferences.find_by_user(user_id)
    }

    /// Returns all preference rows of an alert.
    #[must_use]
    pub fn for_alert(&self, alert_id: &str) -> Vec<Preference> {
        self.preferences.find_by_alert(alert_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::PreferenceState;
    use chrono::{Duration, FixedOffset};
    use proptest::prelude::*;

    fn tracker() -> (PreferenceTracker, Arc<PreferenceRepository>, Arc<ManualClock>) {
        let repo = Arc::new(PreferenceRepository::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap(),
        ));
        let tracker = PreferenceTracker::new(Arc::clone(&repo), clock.clone());
        (tracker, repo, clock)
    }

    #[test]
    fn ensure_creates_once() {
        let (tracker, repo, clock) = tracker();
        let (first, created) = tracker.ensure("u1", "a1", clock.now());
        assert!(created);
        let (second, created) = tracker.ensure("u1", "a1", clock.now());
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn mark_read_without_row_is_noop() {
        let (tracker, repo, _) = tracker();
        assert!(tracker.mark_read("u1", "a1").is_none());
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn snooze_without_row_is_noop() {
        let (tracker, repo, _) = tracker();
        assert!(tracker.snooze("u1", "a1").is_none());
        assert_eq!(repo.count(), 0);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());

        clock.advance(Duration::minutes(1));
        let first = tracker.mark_read("u1", "a1").unwrap();
        let second = tracker.mark_read("u1", "a1").unwrap();

        assert!(first.is_read && second.is_read);
        assert_eq!(second.updated_at, clock.now());
        assert_eq!(second.state(clock.now()), PreferenceState::Read);
    }

    #[test]
    fn snooze_until_end_of_day_in_zone() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());

        let pref = tracker.snooze_in("u1", "a1", &Utc).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 59).unwrap() + Duration::milliseconds(999);
        assert_eq!(pref.snoozed_until, Some(expected));
        assert_eq!(pref.state(clock.now()), PreferenceState::Snoozed { until: expected });
    }

    #[test]
    fn resnooze_replaces_deadline() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());

        let first = tracker.snooze_in("u1", "a1", &Utc).unwrap();
        clock.advance(Duration::days(1));
        let second = tracker.snooze_in("u1", "a1", &Utc).unwrap();

        assert!(second.snoozed_until > first.snoozed_until);
    }

    #[test]
    fn snooze_uses_zone_calendar_day() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());
        // 10:00 UTC is already 01:00 of the next day at UTC+15.
        let tz = FixedOffset::east_opt(15 * 3600).unwrap();
        let pref = tracker.snooze_in("u1", "a1", &tz).unwrap();
        let local = pref.snoozed_until.unwrap().with_timezone(&tz);
        assert_eq!(local.date_naive().to_string(), "2026-05-05");
    }

    #[test]
    fn read_after_snooze_stays_read() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());
        tracker.snooze("u1", "a1").unwrap();
        let pref = tracker.mark_read("u1", "a1").unwrap();

        assert!(pref.is_read);
        assert!(pref.snoozed_until.is_some());
        assert_eq!(pref.state(clock.now()), PreferenceState::Read);
    }

    #[test]
    fn reminder_update_keeps_read_flag() {
        let (tracker, _, clock) = tracker();
        let (pref, _) = tracker.ensure("u1", "a1", clock.now());
        tracker.mark_read("u1", "a1");

        let at = clock.now() + Duration::minutes(3);
        let updated = tracker.record_reminder(&pref.id, at).unwrap();

        assert!(updated.is_read);
        assert_eq!(updated.last_reminded_at, Some(at));
    }

    #[test]
    fn concurrent_read_and_reminder_do_not_clobber() {
        let (tracker, _, clock) = tracker();
        let (pref, _) = tracker.ensure("u1", "a1", clock.now());
        let at = clock.now();

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..100 {
                    tracker.record_reminder(&pref.id, at);
                }
            });
            s.spawn(|| {
                for _ in 0..100 {
                    tracker.mark_read("u1", "a1");
                }
            });
        });

        let pref = tracker.get("u1", "a1").unwrap();
        assert!(pref.is_read);
        assert_eq!(pref.last_reminded_at, Some(at));
    }

    proptest! {
        #[test]
        fn ensure_keeps_one_row_per_pair(pairs in prop::collection::vec((0u8..4, 0u8..4), 0..40)) {
            let (tracker, repo, clock) = tracker();
            let mut distinct = std::collections::HashSet::new();
            for (user, alert) in &pairs {
                let (pref, created) = tracker.ensure(&format!("u{user}"), &format!("a{alert}"), clock.now());
                prop_assert_eq!(created, distinct.insert((*user, *alert)));
                prop_assert!(!pref.is_read);
            }
            prop_assert_eq!(repo.count(), distinct.len());
        }
    }

    #[test]
    fn queries_by_user_and_alert() {
        let (tracker, _, clock) = tracker();
        tracker.ensure("u1", "a1", clock.now());
        tracker.ensure("u1", "a2", clock.now());
        tracker.ensure("u2", "a1", clock.now());

        assert_eq!(tracker.for_user("u1").len(), 2);
        assert_eq!(tracker.for_alert("a1").len(), 2);
        assert!(tracker.get("u2", "a2").is_none());
    }
}
