//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channels::{ChannelRegistry, EmailChannel, InAppChannel, SmsChannel};
use crate::error::{AlertError, Result};

/// Configuration for a [`Herald`](crate::Herald) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// Minutes between reminder sweeps.
    pub reminder_interval_minutes: u64,
    /// Seconds a sweep may take before it is logged as slow.
    pub sweep_budget_secs: u64,
    /// Which channels to register.
    pub channels: ChannelSettings,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            reminder_interval_minutes: 2,
            sweep_budget_secs: 30,
            channels: ChannelSettings::default(),
        }
    }
}

impl HeraldConfig {
    /// Interval between reminder sweeps.
    #[must_use]
    pub const fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_minutes * 60)
    }

    /// Duration above which a sweep is logged as slow.
    #[must_use]
    pub const fn sweep_budget(&self) -> Duration {
        Duration::from_secs(self.sweep_budget_secs)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.reminder_interval_minutes == 0 {
            return Err(invalid("reminder_interval_minutes must be greater than 0"));
        }

        if self.sweep_budget_secs == 0 {
            return Err(invalid("sweep_budget_secs must be greater than 0"));
        }

        let channels = &self.channels;
        if !channels.in_app && !channels.email.enabled && !channels.sms.enabled {
            return Err(invalid("at least one notification channel must be enabled"));
        }

        if channels.email.enabled && !channels.email.from.contains('@') {
            return Err(invalid("channels.email.from must be an email address"));
        }

        if channels.sms.enabled && channels.sms.sender_id.trim().is_empty() {
            return Err(invalid("channels.sms.sender_id cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> AlertError {
    AlertError::InvalidConfig {
        reason: reason.to_string(),
    }
}

/// Per-channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Register the in-app channel.
    pub in_app: bool,
    /// Email channel settings.
    pub email: EmailSettings,
    /// SMS channel settings.
    pub sms: SmsSettings,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            in_app: true,
            email: EmailSettings::default(),
            sms: SmsSettings::default(),
        }
    }
}

/// Email channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Register the email channel.
    pub enabled: bool,
    /// Sender address.
    pub from: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            from: "alerts@localhost".to_string(),
        }
    }
}

/// SMS channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsSettings {
    /// Register the SMS channel.
    pub enabled: bool,
    /// Sender ID shown to recipients.
    pub sender_id: String,
}

impl Default for SmsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sender_id: "HERALD".to_string(),
        }
    }
}

impl ChannelSettings {
    /// Builds a registry holding the enabled channels.
    #[must_use]
    pub fn build_registry(&self) -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        if self.in_app {
            registry.register(InAppChannel::new());
        }
        if self.email.enabled {
            registry.register(EmailChannel::new(self.email.from.clone()));
        }
        if self.sms.enabled {
            registry.register(SmsChannel::new(self.sms.sender_id.clone()));
        }
        registry
    }
}
