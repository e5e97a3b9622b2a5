//! Notification channels for alert delivery.
//!
//! This module provides the [`NotificationChannel`] trait, the three
//! built-in channels ([`InAppChannel`], [`EmailChannel`], [`SmsChannel`]) and
//! the [`ChannelRegistry`] that maps a [`DeliveryType`] to its channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::types::{Alert, DeliveryType, User};

/// One alert addressed to one recipient.
#[derive(Debug, Clone, Copy)]
pub struct Notification<'a> {
    /// The alert being delivered.
    pub alert: &'a Alert,
    /// The recipient.
    pub recipient: &'a User,
    /// Whether this is a reminder.
    pub is_reminder: bool,
}

impl<'a> Notification<'a> {
    /// Creates an initial (non-reminder) notification.
    #[must_use]
    pub const fn new(alert: &'a Alert, recipient: &'a User) -> Self {
        Self {
            alert,
            recipient,
            is_reminder: false,
        }
    }

    /// Creates a reminder notification.
    #[must_use]
    pub const fn reminder(alert: &'a Alert, recipient: &'a User) -> Self {
        Self {
            alert,
            recipient,
            is_reminder: true,
        }
    }

    /// Formats the notification as a plain-text message body.
    #[must_use]
    pub fn format_message(&self) -> String {
        let prefix = if self.is_reminder { "Reminder: " } else { "" };
        format!(
            "[{}] {prefix}{}\n\n{}\n\nTo: {} ({})",
            self.alert.severity.as_str().to_uppercase(),
            self.alert.title,
            self.alert.message,
            self.recipient.full_name,
            self.recipient.email,
        )
    }
}

/// Trait for notification channels.
///
/// A channel hands one alert to one recipient over its transport. It does
/// not record anything; the delivery engine writes delivery records only
/// after `deliver` returns `Ok`.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the delivery type this channel serves.
    fn delivery_type(&self) -> DeliveryType;

    /// Returns the name of this channel, used in logs and errors.
    fn name(&self) -> &str {
        self.delivery_type().as_str()
    }

    /// Hands the notification off to the transport.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::DeliveryFailed` if the transport rejects it.
    fn deliver(&self, notification: &Notification<'_>) -> Result<()>;
}

/// A notification kept in an in-app inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    /// The delivered alert.
    pub alert_id: String,
    /// The recipient.
    pub user_id: String,
    /// Alert title at delivery time.
    pub title: String,
    /// Whether this was a reminder.
    pub is_reminder: bool,
    /// When the entry was added.
    pub received_at: DateTime<Utc>,
}

/// In-app channel that keeps delivered notifications in a shared inbox.
///
/// Cloning the channel shares the inbox.
#[derive(Debug, Clone, Default)]
pub struct InAppChannel {
    inbox: Arc<RwLock<Vec<InboxEntry>>>,
}

impl InAppChannel {
    /// Creates a channel with an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification delivered so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<InboxEntry> {
        self.inbox.read().clone()
    }

    /// Returns the notifications delivered to one user.
    #[must_use]
    pub fn inbox_for(&self, user_id: &str) -> Vec<InboxEntry> {
        self.inbox
            .read()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl NotificationChannel for InAppChannel {
    fn delivery_type(&self) -> DeliveryType {
        DeliveryType::InApp
    }

    fn deliver(&self, notification: &Notification<'_>) -> Result<()> {
        self.inbox.write().push(InboxEntry {
            alert_id: notification.alert.id.clone(),
            user_id: notification.recipient.id.clone(),
            title: notification.alert.title.clone(),
            is_reminder: notification.is_reminder,
            received_at: Utc::now(),
        });

        debug!(
            channel = %self.name(),
            alert_id = %notification.alert.id,
            to = %notification.recipient.email,
            reminder = notification.is_reminder,
            "delivered in-app notification"
        );
        Ok(())
    }
}

/// Placeholder email channel.
///
/// Formats the message and logs it instead of talking to an SMTP server.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    from: String,
}

impl EmailChannel {
    /// Creates an email channel sending from `from`.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }
}

impl Default for EmailChannel {
    fn default() -> Self {
        Self::new("alerts@localhost")
    }
}

impl NotificationChannel for EmailChannel {
    fn delivery_type(&self) -> DeliveryType {
        DeliveryType::Email
    }

    fn deliver(&self, notification: &Notification<'_>) -> Result<()> {
        if notification.recipient.email.is_empty() {
            return Err(AlertError::DeliveryFailed {
                channel: self.name().to_string(),
                reason: format!("user {} has no email address", notification.recipient.id),
            });
        }

        info!(
            channel = %self.name(),
            from = %self.from,
            to = %notification.recipient.email,
            alert_id = %notification.alert.id,
            reminder = notification.is_reminder,
            "would send email notification"
        );
        debug!(body = %notification.format_message(), "email body");
        Ok(())
    }
}

/// Placeholder SMS channel.
///
/// Logs the alert title instead of talking to an SMS gateway.
#[derive(Debug, Clone)]
pub struct SmsChannel {
    sender_id: String,
}

impl SmsChannel {
    /// Maximum characters of the title included in a text message.
    pub const MAX_TEXT_LENGTH: usize = 160;

    /// Creates an SMS channel with the given sender ID.
    #[must_use]
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
        }
    }

    /// Builds the text sent for a notification.
    #[must_use]
    pub fn text(notification: &Notification<'_>) -> String {
        let prefix = if notification.is_reminder { "Reminder: " } else { "" };
        let text = format!("{prefix}{}", notification.alert.title);
        text.chars().take(Self::MAX_TEXT_LENGTH).collect()
    }
}

impl Default for SmsChannel {
    fn default() -> Self {
        Self::new("HERALD")
    }
}

impl NotificationChannel for SmsChannel {
    fn delivery_type(&self) -> DeliveryType {
        DeliveryType::Sms
    }

    fn deliver(&self, notification: &Notification<'_>) -> Result<()> {
        info!(
            channel = %self.name(),
            sender = %self.sender_id,
            to = %notification.recipient.email,
            alert_id = %notification.alert.id,
            text = %Self::text(notification),
            "would send sms notification"
        );
        Ok(())
    }
}

/// Lookup table from delivery type to channel.
///
/// Built once at startup; adding a channel is registering it here.
#[derive(Debug, Default, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<DeliveryType, Arc<dyn NotificationChannel>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the in-app, email and SMS channels.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(InAppChannel::new());
        registry.register(EmailChannel::default());
        registry.register(SmsChannel::default());
        registry
    }

    /// Registers a channel under its delivery type, replacing any previous one.
    pub fn register(&mut self, channel: impl NotificationChannel + 'static) {
        self.register_arc(Arc::new(channel));
    }

    /// Registers a shared channel under its delivery type.
    pub fn register_arc(&mut self, channel: Arc<dyn NotificationChannel>) {
        let delivery_type = channel.delivery_type();
        info!(channel = %channel.name(), %delivery_type, "registered notification channel");
        self.channels.insert(delivery_type, channel);
    }

    /// Looks up the channel for a delivery type.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownChannel` if nothing is registered for it.
    pub fn get(&self, delivery_type: DeliveryType) -> Result<Arc<dyn NotificationChannel>> {
        self.channels
            .get(&delivery_type)
            .cloned()
            .ok_or(AlertError::UnknownChannel { delivery_type })
    }

    /// Returns true if a channel is registered for the delivery type.
    #[must_use]
    pub fn is_registered(&self, delivery_type: DeliveryType) -> bool {
        self.channels.contains_key(&delivery_type)
    }

    /// Returns the registered delivery types, sorted.
    #[must_use]
    pub fn delivery_types(&self) -> Vec<DeliveryType> {
        let mut types: Vec<_> = self.channels.keys().copied().collect();
        types.sort();
        types
    }

    /// Returns the number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channel is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertSeverity;

    fn alert() -> Alert {
        Alert::builder("Disk full", "Volume /data is at 95%", "admin")
            .severity(AlertSeverity::Critical)
            .build()
            .unwrap()
            .into_alert(Utc::now())
            .unwrap()
    }

    fn user() -> User {
        User::member("ada@example.com", "Ada Lovelace")
    }

    mod notification_tests {
        use super::*;

        #[test]
        fn format_message() {
            let alert = alert();
            let user = user();
            let message = Notification::new(&alert, &user).format_message();
            assert_eq!(
                message,
                "[CRITICAL] Disk full\n\nVolume /data is at 95%\n\nTo: Ada Lovelace (ada@example.com)"
            );
        }

        #[test]
        fn format_reminder() {
            let alert = alert();
            let user = user();
            let message = Notification::reminder(&alert, &user).format_message();
            assert!(message.starts_with("[CRITICAL] Reminder: Disk full"));
        }

        #[test]
        fn sms_text_is_truncated() {
            let mut alert = alert();
            alert.title = "x".repeat(400);
            let user = user();
            let text = SmsChannel::text(&Notification::new(&alert, &user));
            assert_eq!(text.chars().count(), SmsChannel::MAX_TEXT_LENGTH);
        }
    }

    mod channel_tests {
        use super::*;

        #[test]
        fn in_app_keeps_inbox() {
            let channel = InAppChannel::new();
            let shared = channel.clone();
            let alert = alert();
            let user = user();

            channel.deliver(&Notification::new(&alert, &user)).unwrap();
            channel.deliver(&Notification::reminder(&alert, &user)).unwrap();

            let inbox = shared.inbox_for(&user.id);
            assert_eq!(inbox.len(), 2);
            assert!(!inbox[0].is_reminder);
            assert!(inbox[1].is_reminder);
            assert!(shared.inbox_for("someone-else").is_empty());
        }

        #[test]
        fn email_requires_address() {
            let channel = EmailChannel::new("alerts@example.com");
            let alert = alert();
            let mut user = user();
            assert!(channel.deliver(&Notification::new(&alert, &user)).is_ok());

            user.email.clear();
            let result = channel.deliver(&Notification::new(&alert, &user));
            assert!(matches!(result, Err(AlertError::DeliveryFailed { .. })));
        }

        #[test]
        fn channel_names_follow_delivery_type() {
            assert_eq!(InAppChannel::new().name(), "in_app");
            assert_eq!(EmailChannel::default().name(), "email");
            assert_eq!(SmsChannel::default().name(), "sms");
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn defaults_cover_all_types() {
            let registry = ChannelRegistry::with_defaults();
            assert_eq!(registry.len(), 3);
            assert_eq!(registry.delivery_types(), DeliveryType::ALL.to_vec());
            for delivery_type in DeliveryType::ALL {
                assert_eq!(registry.get(delivery_type).unwrap().delivery_type(), delivery_type);
            }
        }

        #[test]
        fn missing_channel_is_unknown() {
            let mut registry = ChannelRegistry::new();
            registry.register(InAppChannel::new());

            assert!(registry.is_registered(DeliveryType::InApp));
            match registry.get(DeliveryType::Sms) {
                Err(AlertError::UnknownChannel { delivery_type }) => {
                    assert_eq!(delivery_type, DeliveryType::Sms);
                }
                other => panic!("expected UnknownChannel, got {other:?}"),
            }
        }

        #[test]
        fn register_replaces_previous() {
            let mut registry = ChannelRegistry::new();
            registry.register(EmailChannel::new("a@example.com"));
            registry.register(EmailChannel::new("b@example.com"));
            assert_eq!(registry.len(), 1);
        }
    }
}
