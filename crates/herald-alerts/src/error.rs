//! Error types for the herald-alerts crate.

use thiserror::Error;

use crate::types::DeliveryType;

/// Errors that can occur in the notification engine.
#[derive(Debug, Error)]
pub enum AlertError {
    /// No channel is registered for the alert's delivery type.
    #[error("no notification channel registered for delivery type: {delivery_type}")]
    UnknownChannel {
        /// The delivery type that has no registered channel.
        delivery_type: DeliveryType,
    },

    /// A channel could not hand the alert off to its transport.
    #[error("delivery through {channel} failed: {reason}")]
    DeliveryFailed {
        /// The channel that failed.
        channel: String,
        /// The reason the delivery failed.
        reason: String,
    },

    /// Alert with the given ID was not found.
    #[error("alert not found: {id}")]
    AlertNotFound {
        /// The alert ID that was not found.
        id: String,
    },

    /// Alert definition is invalid.
    #[error("invalid alert: {reason}")]
    InvalidAlert {
        /// The reason the alert is invalid.
        reason: String,
    },

    /// Engine configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Visibility targets do not match the alert's visibility kind.
    #[error("invalid visibility target: {reason}")]
    InvalidTarget {
        /// The reason the targets are invalid.
        reason: String,
    },
}

impl AlertError {
    /// Returns true if this error is a configuration problem rather than a
    /// per-recipient failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownChannel { .. } | Self::InvalidConfig { .. })
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
