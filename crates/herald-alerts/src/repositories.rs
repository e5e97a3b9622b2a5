//! Typed repositories for each record kind.
//!
//! Each repository wraps a [`MemoryStore`] and adds the indexed queries the
//! engine needs on top of the [`Repository`] CRUD contract.

use chrono::{DateTime, Utc};

use crate::store::{MemoryStore, Repository};
use crate::types::{
    Alert, AlertStatus, DeliveryRecord, Preference, Team, User, UserRole, VisibilityTarget,
};

/// Stored alerts.
#[derive(Debug, Default)]
pub struct AlertRepository {
    store: MemoryStore<Alert>,
}

impl Repository<Alert> for AlertRepository {
    fn store(&self) -> &MemoryStore<Alert> {
        &self.store
    }
}

/// Organization users.
#[derive(Debug, Default)]
pub struct UserRepository {
    store: MemoryStore<User>,
}

impl Repository<User> for UserRepository {
    fn store(&self) -> &MemoryStore<User> {
        &self.store
    }
}

/// Organization teams.
#[derive(Debug, Default)]
pub struct TeamRepository {
    store: MemoryStore<Team>,
}

impl Repository<Team> for TeamRepository {
    fn store(&self) -> &MemoryStore<Team> {
        &self.store
    }
}

/// Team/user targets of scoped alerts.
#[derive(Debug, Default)]
pub struct VisibilityRepository {
    store: MemoryStore<VisibilityTarget>,
}

impl Repository<VisibilityTarget> for VisibilityRepository {
    fn store(&self) -> &MemoryStore<VisibilityTarget> {
        &self.store
    }
}

/// Append-only log of delivery attempts.
#[derive(Debug, Default)]
pub struct DeliveryRepository {
    store: MemoryStore<DeliveryRecord>,
}

impl Repository<DeliveryRecord> for DeliveryRepository {
    fn store(&self) -> &MemoryStore<DeliveryRecord> {
        &self.store
    }
}

/// Per-(alert, user) acknowledgment rows.
#[derive(Debug, Default)]
pub struct PreferenceRepository {
    store: MemoryStore<Preference>,
}

impl Repository<Preference> for PreferenceRepository {
    fn store(&self) -> &MemoryStore<Preference> {
        &self.store
    }
}

impl AlertRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns alerts with the given lifecycle status.
    #[must_use]
    pub fn find_by_status(&self, status: AlertStatus) -> Vec<Alert> {
        self.store.filter(|a| a.status == status)
    }

    /// Returns alerts created by a user.
    #[must_use]
    pub fn find_by_creator(&self, user_id: &str) -> Vec<Alert> {
        self.store.filter(|a| a.created_by == user_id)
    }

    /// Returns alerts that are effectively active at `now`.
    #[must_use]
    pub fn find_active(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.store.filter(|a| a.is_effectively_active(now))
    }
}

impl UserRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns users with the given role.
    #[must_use]
    pub fn find_by_role(&self, role: UserRole) -> Vec<User> {
        self.store.filter(|u| u.role == role)
    }

    /// Returns users belonging to a team.
    #[must_use]
    pub fn find_by_team(&self, team_id: &str) -> Vec<User> {
        self.store.filter(|u| u.team_id.as_deref() == Some(team_id))
    }
}

impl TeamRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisibilityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the targets of an alert.
    #[must_use]
    pub fn find_by_alert(&self, alert_id: &str) -> Vec<VisibilityTarget> {
        self.store.filter(|v| v.alert_id == alert_id)
    }

    /// Removes all targets of an alert.
    pub fn delete_by_alert(&self, alert_id: &str) -> usize {
        self.store.delete_where(|v| v.alert_id == alert_id)
    }
}

impl DeliveryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns deliveries made to a user.
    #[must_use]
    pub fn find_by_user(&self, user_id: &str) -> Vec<DeliveryRecord> {
        self.store.filter(|d| d.user_id == user_id)
    }

    /// Returns deliveries of an alert.
    #[must_use]
    pub fn find_by_alert(&self, alert_id: &str) -> Vec<DeliveryRecord> {
        self.store.filter(|d| d.alert_id == alert_id)
    }
}

impl PreferenceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a user's preferences across alerts.
    #[must_use]
    pub fn find_by_user(&self, user_id: &str) -> Vec<Preference> {
        self.store.filter(|p| p.user_id == user_id)
    }

    /// Returns all recipients' preferences for an alert.
    #[must_use]
    pub fn find_by_alert(&self, alert_id: &str) -> Vec<Preference> {
        self.store.filter(|p| p.alert_id == alert_id)
    }

    /// Returns the preference for one (user, alert) pair.
    #[must_use]
    pub fn find_by_user_and_alert(&self, user_id: &str, alert_id: &str) -> Option<Preference> {
        self.store
            .find_first(|p| p.user_id == user_id && p.alert_id == alert_id)
    }

    /// Applies `apply` to the preference for one (user, alert) pair.
    pub fn update_by_user_and_alert(
        &self,
        user_id: &str,
        alert_id: &str,
        apply: impl FnOnce(&mut Preference),
    ) -> Option<Preference> {
        self.store
            .update_first(|p| p.user_id == user_id && p.alert_id == alert_id, apply)
    }

    /// Returns the preference for (user, alert), creating an unread one if
    /// none exists. The flag is `true` if a row was created.
    pub fn find_or_create(
        &self,
        user_id: &str,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> (Preference, bool) {
        self.store.find_or_create(
            |p| p.user_id == user_id && p.alert_id == alert_id,
            || Preference::unread(alert_id, user_id, now),
        )
    }

    /// Removes all preferences of an alert.
    pub fn delete_by_alert(&self, alert_id: &str) -> usize {
        self.store.delete_where(|p| p.alert_id == alert_id)
    }
}
