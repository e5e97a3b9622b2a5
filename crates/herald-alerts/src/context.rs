//! Wiring of repositories, channels and services.
//!
//! [`Herald`] is built once at startup and passed around by clone; every
//! part is shared behind an `Arc`.

use std::sync::Arc;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::Analytics;
use crate::channels::ChannelRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::HeraldConfig;
use crate::delivery::{DeliveryEngine, DeliveryReport};
use crate::error::{AlertError, Result};
use crate::preferences::PreferenceTracker;
use crate::reminders::{ReminderScheduler, SweepReport};
use crate::repositories::{
    AlertRepository, DeliveryRepository, PreferenceRepository, TeamRepository, UserRepository,
    VisibilityRepository,
};
use crate::service::AlertService;
use crate::store::Repository;
use crate::task::{ReminderHandle, start_reminder_task};
use crate::types::{Alert, AlertWithTargets, DeliveryRecord, NewAlert, Preference, Team, User};
use crate::visibility::VisibilityResolver;

/// An alert that was stored and delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Published {
    /// The stored alert and its targets.
    pub alert: AlertWithTargets,
    /// The outcome of the initial delivery.
    pub report: DeliveryReport,
}

/// The assembled notification engine.
#[derive(Debug, Clone)]
pub struct Herald {
    config: HeraldConfig,
    clock: Arc<dyn Clock>,
    users: Arc<UserRepository>,
    teams: Arc<TeamRepository>,
    alerts: Arc<AlertRepository>,
    deliveries: Arc<DeliveryRepository>,
    resolver: Arc<VisibilityResolver>,
    tracker: Arc<PreferenceTracker>,
    engine: Arc<DeliveryEngine>,
    scheduler: ReminderScheduler,
    service: Arc<AlertService>,
    analytics: Arc<Analytics>,
}

impl Herald {
    /// Creates an engine using wall-clock time and the channels enabled in
    /// the configuration.
    #[must_use]
    pub fn new(config: HeraldConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> HeraldBuilder {
        HeraldBuilder::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the user repository.
    #[must_use]
    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Returns the team repository.
    #[must_use]
    pub fn teams(&self) -> &TeamRepository {
        &self.teams
    }

    /// Returns the alert service.
    #[must_use]
    pub fn alerts(&self) -> &AlertService {
        &self.service
    }

    /// Returns the visibility resolver.
    #[must_use]
    pub fn resolver(&self) -> &VisibilityResolver {
        &self.resolver
    }

    /// Returns the preference tracker.
    #[must_use]
    pub fn tracker(&self) -> &PreferenceTracker {
        &self.tracker
    }

    /// Returns the delivery engine.
    #[must_use]
    pub fn engine(&self) -> &DeliveryEngine {
        &self.engine
    }

    /// Returns the reminder scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Returns the analytics view.
    #[must_use]
    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Returns the channel registry.
    #[must_use]
    pub fn channels(&self) -> &ChannelRegistry {
        self.engine.channels()
    }

    /// Stores a team.
    pub fn add_team(&self, team: Team) -> Team {
        self.teams.create(team)
    }

    /// Stores a user.
    pub fn add_user(&self, user: User) -> User {
        self.users.create(user)
    }

    /// Creates an alert and delivers it to its recipients.
    ///
    /// If the alert starts in the future (or is created archived) it is
    /// stored but not delivered; see [`Herald::deliver_alert`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownChannel` before storing anything if the
    /// alert's channel is not registered, or the validation errors of
    /// [`AlertService::create_alert`].
    pub fn publish(
        &self,
        new_alert: NewAlert,
        team_ids: &[String],
        user_ids: &[String],
    ) -> Result<Published> {
        if !self.channels().is_registered(new_alert.delivery_type) {
            return Err(AlertError::UnknownChannel {
                delivery_type: new_alert.delivery_type,
            });
        }

        let alert = self.service.create_alert(new_alert, team_ids, user_ids)?;
        let recipients = self.resolver.resolve_recipients(
            &alert.alert,
            &alert.target_team_ids,
            &alert.target_user_ids,
        );
        let report = self.engine.deliver(&alert.alert, &recipients)?;

        info!(
            alert_id = %alert.alert.id,
            recipients = recipients.len(),
            delivered = report.delivered,
            "published alert"
        );
        Ok(Published { alert, report })
    }

    /// Delivers a stored alert to its current recipients.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::AlertNotFound` if there is no such alert, or
    /// `AlertError::UnknownChannel` if its channel is not registered.
    pub fn deliver_alert(&self, alert_id: &str) -> Result<DeliveryReport> {
        let alert = self
            .alerts
            .find_by_id(alert_id)
            .ok_or_else(|| AlertError::AlertNotFound {
                id: alert_id.to_string(),
            })?;
        let recipients = self.resolver.recipients_for(&alert);
        self.engine.deliver(&alert, &recipients)
    }

    /// Returns the effectively-active alerts visible to a user, newest
    /// first. Unknown users see nothing.
    #[must_use]
    pub fn user_alerts(&self, user_id: &str) -> Vec<Alert> {
        let Some(user) = self.users.find_by_id(user_id) else {
            return Vec::new();
        };

        let mut visible: Vec<Alert> = self
            .alerts
            .find_active(self.clock.now())
            .into_iter()
            .filter(|alert| self.resolver.is_visible_to(alert, &user))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        visible
    }

    /// Returns a user's preference rows.
    #[must_use]
    pub fn user_preferences(&self, user_id: &str) -> Vec<Preference> {
        self.tracker.for_user(user_id)
    }

    /// Marks an alert read for a user. No-op if it was never delivered.
    pub fn mark_read(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        self.tracker.mark_read(user_id, alert_id)
    }

    /// Snoozes an alert until the end of the local day. No-op if it was
    /// never delivered.
    pub fn snooze(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        self.tracker.snooze(user_id, alert_id)
    }

    /// Snoozes an alert until the end of the day in `tz`.
    pub fn snooze_in<Tz: TimeZone>(
        &self,
        user_id: &str,
        alert_id: &str,
        tz: &Tz,
    ) -> Option<Preference> {
        self.tracker.snooze_in(user_id, alert_id, tz)
    }

    /// Returns the deliveries made to a user, oldest first.
    #[must_use]
    pub fn deliveries_for_user(&self, user_id: &str) -> Vec<DeliveryRecord> {
        sorted(self.deliveries.find_by_user(user_id))
    }

    /// Returns the deliveries of an alert, oldest first.
    #[must_use]
    pub fn deliveries_for_alert(&self, alert_id: &str) -> Vec<DeliveryRecord> {
        sorted(self.deliveries.find_by_alert(alert_id))
    }

    /// Runs one reminder sweep now.
    pub fn run_reminder_sweep(&self) -> SweepReport {
        self.scheduler.run_sweep()
    }

    /// Starts the periodic reminder task at the configured interval.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if the configuration fails
    /// [`HeraldConfig::validate`].
    pub fn start_reminders(&self) -> Result<ReminderHandle> {
        self.config.validate()?;
        start_reminder_task(self.scheduler.clone(), self.config.reminder_interval())
    }
}

fn sorted(mut records: Vec<DeliveryRecord>) -> Vec<DeliveryRecord> {
    records.sort_by(|a, b| a.delivered_at.cmp(&b.delivered_at).then_with(|| a.id.cmp(&b.id)));
    records
}

/// Builder for [`Herald`].
#[derive(Debug, Default)]
pub struct HeraldBuilder {
    config: Option<HeraldConfig>,
    clock: Option<Arc<dyn Clock>>,
    channels: Option<ChannelRegistry>,
}

impl HeraldBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the channel registry, overriding the configured channels.
    #[must_use]
    pub fn channels(mut self, channels: ChannelRegistry) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Wires everything together.
    #[must_use]
    pub fn build(self) -> Herald {
        let config = self.config.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let registry = self
            .channels
            .unwrap_or_else(|| config.channels.build_registry());

        let users = Arc::new(UserRepository::new());
        let teams = Arc::new(TeamRepository::new());
        let alerts = Arc::new(AlertRepository::new());
        let targets = Arc::new(VisibilityRepository::new());
        let deliveries = Arc::new(DeliveryRepository::new());
        let preferences = Arc::new(PreferenceRepository::new());

        let resolver = Arc::new(VisibilityResolver::new(
            Arc::clone(&users),
            Arc::clone(&targets),
            Arc::clone(&clock),
        ));
        let tracker = Arc::new(PreferenceTracker::new(
            Arc::clone(&preferences),
            Arc::clone(&clock),
        ));
        let engine = Arc::new(DeliveryEngine::new(
            Arc::new(registry),
            Arc::clone(&deliveries),
            Arc::clone(&tracker),
            Arc::clone(&clock),
        ));
        let scheduler = ReminderScheduler::new(
            Arc::clone(&alerts),
            Arc::clone(&users),
            Arc::clone(&tracker),
            Arc::clone(&engine),
            Arc::clone(&clock),
        )
        .with_budget(config.sweep_budget());
        let service = Arc::new(AlertService::new(
            Arc::clone(&alerts),
            Arc::clone(&targets),
            Arc::clone(&preferences),
            Arc::clone(&clock),
        ));
        let analytics = Arc::new(Analytics::new(
            Arc::clone(&alerts),
            Arc::clone(&deliveries),
            preferences,
            Arc::clone(&clock),
        ));

        info!(
            channels = engine.channels().len(),
            reminder_interval_minutes = config.reminder_interval_minutes,
            "herald engine ready"
        );

        Herald {
            config,
            clock,
            users,
            teams,
            alerts,
            deliveries,
            resolver,
            tracker,
            engine,
            scheduler,
            service,
            analytics,
        }
    }
}
