//! Core types for the notification engine.
//!
//! This module provides the records the engine reads and writes:
//! - [`Alert`] and its builder [`AlertBuilder`] producing a [`NewAlert`]
//! - [`VisibilityTarget`]: one team or user an alert is scoped to
//! - [`DeliveryRecord`]: an append-only log entry per delivery attempt
//! - [`Preference`]: the per-(alert, user) acknowledgment state
//! - [`Team`] and [`User`]: reference entities

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlertError, Result};

/// Generates a new record identifier.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// The severity level of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational announcement.
    #[default]
    Info,
    /// Something recipients should look at.
    Warning,
    /// Requires immediate attention.
    Critical,
}

impl AlertSeverity {
    /// All severities, lowest first.
    pub const ALL: [Self; 3] = [Self::Info, Self::Warning, Self::Critical];

    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The channel kind an alert is delivered through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Shown inside the application.
    #[default]
    InApp,
    /// Sent by email.
    Email,
    /// Sent by text message.
    Sms,
}

impl DeliveryType {
    /// All delivery types.
    pub const ALL: [Self; 3] = [Self::InApp, Self::Email, Self::Sms];

    /// Returns the registry key for this delivery type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeliveryType {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AlertError::InvalidAlert {
                reason: format!("unknown delivery type '{s}'"),
            })
    }
}

/// Who an alert is addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityKind {
    /// Every member of the organization.
    #[default]
    Organization,
    /// Users belonging to the targeted teams.
    Team,
    /// Explicitly listed users.
    User,
}

impl VisibilityKind {
    /// Returns the visibility kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Team => "team",
            Self::User => "user",
        }
    }
}

impl fmt::Display for VisibilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The alert may be delivered while inside its time window.
    #[default]
    Active,
    /// The alert is retired and never delivered again.
    Archived,
}

impl AlertStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a user within the organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Creates and manages alerts.
    Admin,
    /// Receives alerts.
    #[default]
    Member,
}

/// A team users can belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// When the team was created.
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Creates a new team with a generated ID.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// A member of the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role within the organization.
    pub role: UserRole,
    /// The team this user belongs to, if any.
    pub team_id: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a generated ID and no team.
    #[must_use]
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: new_id(),
            email: email.into(),
            full_name: full_name.into(),
            role,
            team_id: None,
            created_at: Utc::now(),
        }
    }

    /// Convenience constructor for a member-role user.
    #[must_use]
    pub fn member(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self::new(email, full_name, UserRole::Member)
    }

    /// Assigns the user to a team.
    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Returns true if this user receives alerts.
    #[must_use]
    pub fn is_member(&self) -> bool {
        self.role == UserRole::Member
    }
}

/// A stored alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier.
    pub id: String,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity level.
    pub severity: AlertSeverity,
    /// Channel used to deliver the alert and its reminders.
    pub delivery_type: DeliveryType,
    /// Who the alert is addressed to.
    pub visibility: VisibilityKind,
    /// Whether unread recipients get reminders.
    pub reminder_enabled: bool,
    /// Minimum minutes between two reminders to the same recipient.
    pub reminder_frequency_minutes: u32,
    /// The alert is not delivered before this instant.
    pub start_time: DateTime<Utc>,
    /// The alert is not delivered at or after this instant.
    pub expiry_time: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: AlertStatus,
    /// ID of the user who created the alert.
    pub created_by: String,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
    /// When the alert was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Default number of minutes between reminders.
    pub const DEFAULT_REMINDER_FREQUENCY_MINUTES: u32 = 120;

    /// Maximum allowed length for titles.
    pub const MAX_TITLE_LENGTH: usize = 256;

    /// Creates a new alert builder.
    pub fn builder(
        title: impl Into<String>,
        message: impl Into<String>,
        created_by: impl Into<String>,
    ) -> AlertBuilder {
        AlertBuilder::new(title, message, created_by)
    }

    /// Returns true if the alert may be delivered or reminded at `now`.
    ///
    /// That is: status is active, the start time has been reached and the
    /// expiry time (if any) is still in the future.
    #[must_use]
    pub fn is_effectively_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AlertStatus::Active
            && self.start_time <= now
            && self.expiry_time.is_none_or(|expiry| expiry > now)
    }

    /// Returns the reminder frequency as a duration.
    #[must_use]
    pub fn reminder_frequency(&self) -> Duration {
        Duration::minutes(i64::from(self.reminder_frequency_minutes))
    }
}

/// An alert definition before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlert {
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity level.
    pub severity: AlertSeverity,
    /// Delivery channel.
    pub delivery_type: DeliveryType,
    /// Who the alert is addressed to.
    pub visibility: VisibilityKind,
    /// Whether reminders are sent.
    pub reminder_enabled: bool,
    /// Minutes between reminders.
    pub reminder_frequency_minutes: u32,
    /// Start of the delivery window; `None` means "when created".
    pub start_time: Option<DateTime<Utc>>,
    /// End of the delivery window.
    pub expiry_time: Option<DateTime<Utc>>,
    /// Initial lifecycle status.
    pub status: AlertStatus,
    /// ID of the creating user.
    pub created_by: String,
}

impl NewAlert {
    /// Checks the definition against the alert invariants.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if:
    /// - The title is empty or exceeds the maximum length
    /// - The reminder frequency is zero
    /// - Both start and expiry are set and the expiry is not after the start
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AlertError::InvalidAlert {
                reason: "title cannot be empty".to_string(),
            });
        }

        if self.title.len() > Alert::MAX_TITLE_LENGTH {
            return Err(AlertError::InvalidAlert {
                reason: format!(
                    "title exceeds maximum length of {} characters",
                    Alert::MAX_TITLE_LENGTH
                ),
            });
        }

        if self.reminder_frequency_minutes == 0 {
            return Err(AlertError::InvalidAlert {
                reason: "reminder frequency must be greater than zero".to_string(),
            });
        }

        if let (Some(start), Some(expiry)) = (self.start_time, self.expiry_time) {
            if expiry <= start {
                return Err(AlertError::InvalidAlert {
                    reason: "expiry time must be after start time".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Turns the definition into a stored alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if [`NewAlert::validate`] fails or
    /// the expiry time is not after the resolved start time.
    pub fn into_alert(self, now: DateTime<Utc>) -> Result<Alert> {
        self.validate()?;
        let start_time = self.start_time.unwrap_or(now);
        if self.expiry_time.is_some_and(|expiry| expiry <= start_time) {
            return Err(AlertError::InvalidAlert {
                reason: "expiry time must be after start time".to_string(),
            });
        }

        Ok(Alert {
            id: new_id(),
            title: self.title,
            message: self.message,
            severity: self.severity,
            delivery_type: self.delivery_type,
            visibility: self.visibility,
            reminder_enabled: self.reminder_enabled,
            reminder_frequency_minutes: self.reminder_frequency_minutes,
            start_time,
            expiry_time: self.expiry_time,
            status: self.status,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Builder for [`NewAlert`] definitions.
#[derive(Debug)]
pub struct AlertBuilder {
    inner: NewAlert,
}

impl AlertBuilder {
    fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            inner: NewAlert {
                title: title.into(),
                message: message.into(),
                severity: AlertSeverity::Info,
                delivery_type: DeliveryType::InApp,
                visibility: VisibilityKind::Organization,
                reminder_enabled: true,
                reminder_frequency_minutes: Alert::DEFAULT_REMINDER_FREQUENCY_MINUTES,
                start_time: None,
                expiry_time: None,
                status: AlertStatus::Active,
                created_by: created_by.into(),
            },
        }
    }

    /// Sets the severity level.
    #[must_use]
    pub const fn severity(mut self, severity: AlertSeverity) -> Self {
        self.inner.severity = severity;
        self
    }

    /// Sets the delivery channel.
    #[must_use]
    pub const fn delivery_type(mut self, delivery_type: DeliveryType) -> Self {
        self.inner.delivery_type = delivery_type;
        self
    }

    /// Sets the visibility kind.
    #[must_use]
    pub const fn visibility(mut self, visibility: VisibilityKind) -> Self {
        self.inner.visibility = visibility;
        self
    }

    /// Enables reminders every `minutes` minutes.
    #[must_use]
    pub const fn remind_every(mut self, minutes: u32) -> Self {
        self.inner.reminder_enabled = true;
        self.inner.reminder_frequency_minutes = minutes;
        self
    }

    /// Turns reminders on or off.
    #[must_use]
    pub const fn reminders(mut self, enabled: bool) -> Self {
        self.inner.reminder_enabled = enabled;
        self
    }

    /// Sets the start of the delivery window.
    #[must_use]
    pub const fn starts_at(mut self, start: DateTime<Utc>) -> Self {
        self.inner.start_time = Some(start);
        self
    }

    /// Sets the end of the delivery window.
    #[must_use]
    pub const fn expires_at(mut self, expiry: DateTime<Utc>) -> Self {
        self.inner.expiry_time = Some(expiry);
        self
    }

    /// Sets the initial lifecycle status.
    #[must_use]
    pub const fn status(mut self, status: AlertStatus) -> Self {
        self.inner.status = status;
        self
    }

    /// Builds the [`NewAlert`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if:
    /// - The title is empty or exceeds the maximum length
    /// - The reminder frequency is zero
    /// - Both start and expiry are set and the expiry is not after the start
    pub fn build(self) -> Result<NewAlert> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

/// Partial update of an alert's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertUpdate {
    /// New title.
    pub title: Option<String>,
    /// New body text.
    pub message: Option<String>,
    /// New severity.
    pub severity: Option<AlertSeverity>,
    /// New delivery channel.
    pub delivery_type: Option<DeliveryType>,
    /// Turn reminders on or off.
    pub reminder_enabled: Option<bool>,
    /// New reminder frequency.
    pub reminder_frequency_minutes: Option<u32>,
    /// New start time.
    pub start_time: Option<DateTime<Utc>>,
    /// New expiry; `Some(None)` clears it.
    pub expiry_time: Option<Option<DateTime<Utc>>>,
    /// New status.
    pub status: Option<AlertStatus>,
}

impl AlertUpdate {
    /// An update that only archives the alert.
    #[must_use]
    pub fn archive() -> Self {
        Self {
            status: Some(AlertStatus::Archived),
            ..Self::default()
        }
    }

    /// Checks the update does not put the alert in an invalid state.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` for an empty title or a zero
    /// reminder frequency.
    pub fn validate(&self) -> Result<()> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AlertError::InvalidAlert {
                reason: "title cannot be empty".to_string(),
            });
        }
        if self.reminder_frequency_minutes == Some(0) {
            return Err(AlertError::InvalidAlert {
                reason: "reminder frequency must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Applies the update in place and bumps `updated_at`.
    pub fn apply(self, alert: &mut Alert, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            alert.title = title;
        }
        if let Some(message) = self.message {
            alert.message = message;
        }
        if let Some(severity) = self.severity {
            alert.severity = severity;
        }
        if let Some(delivery_type) = self.delivery_type {
            alert.delivery_type = delivery_type;
        }
        if let Some(enabled) = self.reminder_enabled {
            alert.reminder_enabled = enabled;
        }
        if let Some(minutes) = self.reminder_frequency_minutes {
            alert.reminder_frequency_minutes = minutes;
        }
        if let Some(start) = self.start_time {
            alert.start_time = start;
        }
        if let Some(expiry) = self.expiry_time {
            alert.expiry_time = expiry;
        }
        if let Some(status) = self.status {
            alert.status = status;
        }
        alert.updated_at = now;
    }
}

/// The team or user a visibility target points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    /// All users of a team.
    Team(String),
    /// A single user.
    User(String),
}

/// Scopes a team- or user-visibility alert to one team or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityTarget {
    /// Unique identifier.
    pub id: String,
    /// The owning alert.
    pub alert_id: String,
    /// The targeted team or user.
    pub target: TargetRef,
    /// When the target was created.
    pub created_at: DateTime<Utc>,
}

impl VisibilityTarget {
    /// Creates a new target row for an alert.
    #[must_use]
    pub fn new(alert_id: impl Into<String>, target: TargetRef, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            alert_id: alert_id.into(),
            target,
            created_at,
        }
    }

    /// Returns the targeted team ID, if this is a team target.
    #[must_use]
    pub fn team_id(&self) -> Option<&str> {
        match &self.target {
            TargetRef::Team(id) => Some(id),
            TargetRef::User(_) => None,
        }
    }

    /// Returns the targeted user ID, if this is a user target.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match &self.target {
            TargetRef::User(id) => Some(id),
            TargetRef::Team(_) => None,
        }
    }
}

/// An alert together with the IDs it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertWithTargets {
    /// The alert.
    #[serde(flatten)]
    pub alert: Alert,
    /// Targeted team IDs (team visibility only).
    pub target_team_ids: Vec<String>,
    /// Targeted user IDs (user visibility only).
    pub target_user_ids: Vec<String>,
}

impl AlertWithTargets {
    /// Groups visibility rows into team and user ID lists.
    #[must_use]
    pub fn from_targets(alert: Alert, targets: &[VisibilityTarget]) -> Self {
        Self {
            alert,
            target_team_ids: targets
                .iter()
                .filter_map(VisibilityTarget::team_id)
                .map(str::to_string)
                .collect(),
            target_user_ids: targets
                .iter()
                .filter_map(VisibilityTarget::user_id)
                .map(str::to_string)
                .collect(),
        }
    }
}

/// One delivery attempt that reached a channel. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Unique identifier.
    pub id: String,
    /// The delivered alert.
    pub alert_id: String,
    /// The recipient.
    pub user_id: String,
    /// Channel used.
    pub delivery_type: DeliveryType,
    /// When the channel accepted the alert.
    pub delivered_at: DateTime<Utc>,
    /// Whether this was a reminder rather than the initial delivery.
    pub is_reminder: bool,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Creates a record for a delivery accepted at `at`.
    #[must_use]
    pub fn new(
        alert: &Alert,
        user_id: impl Into<String>,
        is_reminder: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            alert_id: alert.id.clone(),
            user_id: user_id.into(),
            delivery_type: alert.delivery_type,
            delivered_at: at,
            is_reminder,
            created_at: at,
        }
    }
}

/// Acknowledgment state of one recipient for one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceState {
    /// Delivered, not yet acknowledged.
    Unread,
    /// Acknowledged. Terminal.
    Read,
    /// Unread, reminders paused until the deadline.
    Snoozed {
        /// When reminders resume.
        until: DateTime<Utc>,
    },
}

/// Per-(alert, user) read/snooze/reminder bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Unique identifier.
    pub id: String,
    /// The alert.
    pub alert_id: String,
    /// The recipient.
    pub user_id: String,
    /// Whether the recipient acknowledged the alert.
    pub is_read: bool,
    /// Reminders are suppressed until this instant.
    pub snoozed_until: Option<DateTime<Utc>>,
    /// When the last reminder was accepted by a channel.
    pub last_reminded_at: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Preference {
    /// Creates an unread preference with no snooze and no reminder history.
    #[must_use]
    pub fn unread(
        alert_id: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            alert_id: alert_id.into(),
            user_id: user_id.into(),
            is_read: false,
            snoozed_until: None,
            last_reminded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if a snooze deadline lies strictly after `now`.
    #[must_use]
    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    /// Returns the acknowledgment state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> PreferenceState {
        if self.is_read {
            return PreferenceState::Read;
        }
        match self.snoozed_until {
            Some(until) if until > now => PreferenceState::Snoozed { until },
            _ => PreferenceState::Unread,
        }
    }

    /// Returns true if the recipient should be reminded at `now` given the
    /// alert's reminder frequency.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>, frequency: Duration) -> bool {
        if self.state(now) != PreferenceState::Unread {
            return false;
        }
        self.last_reminded_at
            .is_none_or(|last| now.signed_duration_since(last) >= frequency)
    }
}
