//! Alert dispatch to resolved recipients.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::{ChannelRegistry, Notification, NotificationChannel};
use crate::clock::Clock;
use crate::error::Result;
use crate::preferences::PreferenceTracker;
use crate::repositories::DeliveryRepository;
use crate::store::Repository;
use crate::types::{Alert, DeliveryRecord, User};

/// Outcome of delivering one alert to a recipient set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Recipients whose channel accepted the alert.
    pub delivered: usize,
    /// Recipients whose channel rejected the alert.
    pub failed: usize,
    /// Preference rows created by this delivery.
    pub preferences_created: usize,
}

impl DeliveryReport {
    /// Total recipients attempted.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Dispatches alerts through the channel registry and records the result.
#[derive(Debug, Clone)]
pub struct DeliveryEngine {
    channels: Arc<ChannelRegistry>,
    deliveries: Arc<DeliveryRepository>,
    tracker: Arc<PreferenceTracker>,
    clock: Arc<dyn Clock>,
}

impl DeliveryEngine {
    /// Creates a delivery engine.
    #[must_use]
    pub fn new(
        channels: Arc<ChannelRegistry>,
        deliveries: Arc<DeliveryRepository>,
        tracker: Arc<PreferenceTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channels,
            deliveries,
            tracker,
            clock,
        }
    }

    /// Returns the channel registry.
    #[must_use]
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Delivers an alert to every recipient.
    ///
    /// The channel is resolved once up front. Each recipient is then
    /// attempted independently: an accepted delivery appends a
    /// [`DeliveryRecord`], a rejected one is logged and counted. Either way
    /// the recipient's preference row is ensured, so a failed recipient is
    /// picked up by the next reminder sweep.
    ///
    /// Alerts that are not effectively active are not delivered.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownChannel` if no channel is registered for
    /// the alert's delivery type. Nothing is delivered in that case.
    pub fn deliver(&self, alert: &Alert, recipients: &[User]) -> Result<DeliveryReport> {
        let channel = self.channels.get(alert.delivery_type)?;
        let now = self.clock.now();
        let mut report = DeliveryReport::default();

        if !alert.is_effectively_active(now) {
            debug!(alert_id = %alert.id, "alert not effectively active, skipping delivery");
            return Ok(report);
        }

        for recipient in recipients {
            match self.send(channel.as_ref(), &Notification::new(alert, recipient), now) {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        alert_id = %alert.id,
                        user_id = %recipient.id,
                        channel = %channel.name(),
                        error = %e,
                        "delivery failed, leaving for reminder sweep"
                    );
                }
            }

            let (_, created) = self.tracker.ensure(&recipient.id, &alert.id, now);
            if created {
                report.preferences_created += 1;
            }
        }

        info!(
            alert_id = %alert.id,
            channel = %channel.name(),
            delivered = report.delivered,
            failed = report.failed,
            "alert delivered"
        );
        Ok(report)
    }

    /// Hands one notification to `channel` and, if accepted, appends the
    /// delivery record stamped with `at`.
    pub(crate) fn send(
        &self,
        channel: &dyn NotificationChannel,
        notification: &Notification<'_>,
        at: DateTime<Utc>,
    ) -> Result<DeliveryRecord> {
        channel.deliver(notification)?;
        let record = self.deliveries.create(DeliveryRecord::new(
            notification.alert,
            notification.recipient.id.clone(),
            notification.is_reminder,
            at,
        ));
        debug!(
            alert_id = %record.alert_id,
            user_id = %record.user_id,
            reminder = record.is_reminder,
            "recorded delivery"
        );
        Ok(record)
    }
}
