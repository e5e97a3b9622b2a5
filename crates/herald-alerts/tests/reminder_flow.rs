//! Integration tests for delivery, acknowledgment and reminder sweeps.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use herald_alerts::{
    Alert, AlertError, Clock, AlertStatus, AlertUpdate, ChannelRegistry, DeliveryType, Herald,
    InAppChannel, ManualClock, NewAlert, Notification, NotificationChannel, Result, Team, User,
    VisibilityKind,
};
use parking_lot::Mutex;

fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap(),
    ))
}

fn test_herald(clock: &Arc<ManualClock>, channels: ChannelRegistry) -> Herald {
    Herald::builder()
        .clock(clock.clone())
        .channels(channels)
        .build()
}

fn team_alert(frequency: u32) -> NewAlert {
    Alert::builder("Security training", "Complete the course by Friday", "admin")
        .visibility(VisibilityKind::Team)
        .remind_every(frequency)
        .build()
        .unwrap()
}

fn reminder_count(herald: &Herald, user: &User) -> usize {
    herald
        .deliveries_for_user(&user.id)
        .iter()
        .filter(|d| d.is_reminder)
        .count()
}

/// Channel that rejects deliveries to chosen users.
#[derive(Debug, Default)]
struct RejectingChannel {
    rejected: Mutex<HashSet<String>>,
}

impl NotificationChannel for RejectingChannel {
    fn delivery_type(&self) -> DeliveryType {
        DeliveryType::Email
    }

    fn deliver(&self, notification: &Notification<'_>) -> Result<()> {
        if self.rejected.lock().contains(&notification.recipient.id) {
            return Err(AlertError::DeliveryFailed {
                channel: "email".to_string(),
                reason: "mailbox unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[test]
fn test_team_alert_reminds_only_unread_recipient() {
    let clock = test_clock();
    let inbox = InAppChannel::new();
    let mut channels = ChannelRegistry::new();
    channels.register(inbox.clone());
    let herald = test_herald(&clock, channels);

    let team = herald.add_team(Team::new("Support", "Customer support"));
    let ada = herald.add_user(User::member("ada@example.com", "Ada").with_team(&team.id));
    let bob = herald.add_user(User::member("bob@example.com", "Bob").with_team(&team.id));
    herald.add_user(User::member("eve@example.com", "Eve"));

    let published = herald
        .publish(team_alert(120), &[team.id.clone()], &[])
        .expect("publish should succeed");
    let alert_id = published.alert.alert.id.clone();

    assert_eq!(published.report.delivered, 2);
    assert_eq!(herald.deliveries_for_alert(&alert_id).len(), 2);
    assert_eq!(inbox.notifications().len(), 2);

    herald.mark_read(&ada.id, &alert_id).expect("ada has a preference");

    let report = herald.run_reminder_sweep();
    assert_eq!(report.reminders_sent, 1);
    assert_eq!(reminder_count(&herald, &ada), 0);
    assert_eq!(reminder_count(&herald, &bob), 1);

    let bob_pref = herald.tracker().get(&bob.id, &alert_id).unwrap();
    assert_eq!(bob_pref.last_reminded_at, Some(clock.now()));
    assert_eq!(inbox.inbox_for(&bob.id).len(), 2);
    assert!(inbox.inbox_for(&bob.id)[1].is_reminder);
}

#[test]
fn test_snooze_holds_reminders_until_next_day() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    let ada = herald.add_user(User::member("ada@example.com", "Ada"));

    let alert = Alert::builder("Benefits enrollment", "Closes soon", "admin")
        .remind_every(60)
        .build()
        .unwrap();
    let published = herald.publish(alert, &[], &[]).unwrap();
    let alert_id = published.alert.alert.id;

    let pref = herald.snooze_in(&ada.id, &alert_id, &Utc).unwrap();
    let deadline = pref.snoozed_until.unwrap();
    assert_eq!(deadline, Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 59).unwrap() + Duration::milliseconds(999));

    clock.advance(Duration::hours(5));
    assert_eq!(herald.run_reminder_sweep().reminders_sent, 0);

    clock.set(Utc.with_ymd_and_hms(2026, 5, 5, 9, 0, 0).unwrap());
    assert_eq!(herald.run_reminder_sweep().reminders_sent, 1);
    assert_eq!(reminder_count(&herald, &ada), 1);
}

#[test]
fn test_reminder_cadence_follows_alert_frequency() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    let team = herald.add_team(Team::new("Ops", ""));
    let ada = herald.add_user(User::member("ada@example.com", "Ada").with_team(&team.id));
    herald
        .publish(team_alert(120), &[team.id.clone()], &[])
        .unwrap();

    // First sweep reminds immediately: no reminder was ever sent.
    assert_eq!(herald.run_reminder_sweep().reminders_sent, 1);

    clock.advance(Duration::minutes(119));
    assert_eq!(herald.run_reminder_sweep().reminders_sent, 0);

    clock.advance(Duration::minutes(2));
    let report = herald.run_reminder_sweep();
    assert_eq!(report.reminders_sent, 1);
    assert_eq!(reminder_count(&herald, &ada), 2);

    let pref = &herald.user_preferences(&ada.id)[0];
    assert_eq!(pref.last_reminded_at, Some(clock.now()));
}

#[test]
fn test_double_delivery_keeps_single_preference() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    let ada = herald.add_user(User::member("ada@example.com", "Ada"));

    let alert = Alert::builder("Reminder", "Submit timesheets", "admin")
        .visibility(VisibilityKind::User)
        .build()
        .unwrap();
    let published = herald.publish(alert, &[], &[ada.id.clone()]).unwrap();
    let report = herald.deliver_alert(&published.alert.alert.id).unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(report.preferences_created, 0);
    assert_eq!(herald.deliveries_for_user(&ada.id).len(), 2);
    assert_eq!(herald.user_preferences(&ada.id).len(), 1);
}

#[test]
fn test_inactive_alerts_get_no_reminders() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    herald.add_user(User::member("ada@example.com", "Ada"));

    let archived = herald
        .publish(Alert::builder("A", "archived", "admin").build().unwrap(), &[], &[])
        .unwrap();
    herald.alerts().archive_alert(&archived.alert.alert.id);

    let expiring = Alert::builder("B", "expires", "admin")
        .expires_at(clock.now() + Duration::minutes(30))
        .build()
        .unwrap();
    herald.publish(expiring, &[], &[]).unwrap();

    let future = Alert::builder("C", "future", "admin")
        .starts_at(clock.now() + Duration::days(1))
        .build()
        .unwrap();
    let future = herald.publish(future, &[], &[]).unwrap();
    assert_eq!(future.report.attempted(), 0);

    clock.advance(Duration::hours(1));
    let report = herald.run_reminder_sweep();
    assert_eq!(report.alerts_evaluated, 0);
    assert_eq!(report.reminders_sent, 0);
}

#[test]
fn test_disabling_reminders_stops_sweeps() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    herald.add_user(User::member("ada@example.com", "Ada"));
    let published = herald
        .publish(Alert::builder("A", "B", "admin").build().unwrap(), &[], &[])
        .unwrap();

    let update = AlertUpdate {
        reminder_enabled: Some(false),
        ..AlertUpdate::default()
    };
    herald
        .alerts()
        .update_alert(&published.alert.alert.id, update)
        .unwrap();

    assert_eq!(herald.run_reminder_sweep().reminders_sent, 0);
    assert_eq!(
        herald.alerts().get_alert(&published.alert.alert.id).unwrap().alert.status,
        AlertStatus::Active
    );
}

#[test]
fn test_unknown_channel_rejects_publish() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::new());
    herald.add_user(User::member("ada@example.com", "Ada"));

    let alert = Alert::builder("A", "B", "admin")
        .delivery_type(DeliveryType::Sms)
        .build()
        .unwrap();
    let err = herald.publish(alert, &[], &[]).unwrap_err();

    assert!(err.is_configuration());
    assert!(herald.alerts().list_alerts().is_empty());
    assert_eq!(herald.analytics().deliveries_count(), 0);
}

#[test]
fn test_failing_recipient_is_isolated_and_retried() {
    let clock = test_clock();
    let channel = Arc::new(RejectingChannel::default());
    let mut channels = ChannelRegistry::new();
    channels.register_arc(channel.clone());
    let herald = test_herald(&clock, channels);

    let ada = herald.add_user(User::member("ada@example.com", "Ada"));
    let bob = herald.add_user(User::member("bob@example.com", "Bob"));
    channel.rejected.lock().insert(bob.id.clone());

    let alert = Alert::builder("A", "B", "admin")
        .delivery_type(DeliveryType::Email)
        .build()
        .unwrap();
    let published = herald.publish(alert, &[], &[]).unwrap();

    assert_eq!(published.report.delivered, 1);
    assert_eq!(published.report.failed, 1);
    assert!(herald.deliveries_for_user(&bob.id).is_empty());
    assert_eq!(herald.deliveries_for_user(&ada.id).len(), 1);

    // Bob's reminder fails too and his timestamp stays unset.
    let report = herald.run_reminder_sweep();
    assert_eq!(report.reminders_sent, 1);
    assert_eq!(report.failures, 1);
    let bob_pref = herald.tracker().get(&bob.id, &published.alert.alert.id).unwrap();
    assert!(bob_pref.last_reminded_at.is_none());

    // Once the mailbox recovers the next sweep reaches him.
    channel.rejected.lock().clear();
    assert_eq!(herald.run_reminder_sweep().reminders_sent, 1);
    assert_eq!(reminder_count(&herald, &bob), 1);
}

#[test]
fn test_analytics_after_activity() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    let ada = herald.add_user(User::member("ada@example.com", "Ada"));
    let bob = herald.add_user(User::member("bob@example.com", "Bob"));

    let published = herald
        .publish(Alert::builder("A", "B", "admin").build().unwrap(), &[], &[])
        .unwrap();
    let alert_id = published.alert.alert.id;
    herald.mark_read(&ada.id, &alert_id);
    herald.snooze_in(&bob.id, &alert_id, &Utc);

    let summary = herald.analytics().summary();
    assert_eq!(summary.total_alerts, 1);
    assert_eq!(summary.deliveries, 2);
    assert_eq!(summary.read, 1);
    assert_eq!(summary.snoozed.get(&alert_id), Some(&1));
}

#[tokio::test]
async fn test_periodic_task_sends_reminders() {
    let clock = test_clock();
    let herald = test_herald(&clock, ChannelRegistry::with_defaults());
    let ada = herald.add_user(User::member("ada@example.com", "Ada"));
    herald
        .publish(Alert::builder("A", "B", "admin").build().unwrap(), &[], &[])
        .unwrap();

    let handle = herald_alerts::start_reminder_task(
        herald.scheduler().clone(),
        std::time::Duration::from_millis(10),
    )
    .expect("non-zero interval");
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while reminder_count(&herald, &ada) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("reminder should be sent by the periodic task");
    handle.join().await;

    // Frozen clock: later ticks find nothing due.
    assert_eq!(reminder_count(&herald, &ada), 1);
}
