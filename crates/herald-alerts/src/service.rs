//! Alert lifecycle: create, update, archive, query, delete.

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::error::{AlertError, Result};
use crate::repositories::{AlertRepository, PreferenceRepository, VisibilityRepository};
use crate::store::Repository;
use crate::types::{
    Alert, AlertStatus, AlertUpdate, AlertWithTargets, NewAlert, TargetRef, VisibilityKind,
    VisibilityTarget,
};

/// Stores alerts together with their visibility targets.
#[derive(Debug, Clone)]
pub struct AlertService {
    alerts: Arc<AlertRepository>,
    targets: Arc<VisibilityRepository>,
    preferences: Arc<PreferenceRepository>,
    clock: Arc<dyn Clock>,
}

impl AlertService {
    /// Creates an alert service.
    #[must_use]
    pub fn new(
        alerts: Arc<AlertRepository>,
        targets: Arc<VisibilityRepository>,
        preferences: Arc<PreferenceRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            alerts,
            targets,
            preferences,
            clock,
        }
    }

    /// Stores a new alert and one visibility target per listed team or user.
    ///
    /// Duplicate target IDs are stored once.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if the definition is invalid, or
    /// `AlertError::InvalidTarget` if the target lists do not match the
    /// visibility kind.
    pub fn create_alert(
        &self,
        new_alert: NewAlert,
        team_ids: &[String],
        user_ids: &[String],
    ) -> Result<AlertWithTargets> {
        let targets = targets_for(new_alert.visibility, team_ids, user_ids)?;
        let now = self.clock.now();
        let alert = self.alerts.create(new_alert.into_alert(now)?);

        let rows: Vec<VisibilityTarget> = targets
            .into_iter()
            .map(|target| self.targets.create(VisibilityTarget::new(&alert.id, target, now)))
            .collect();

        info!(
            alert_id = %alert.id,
            severity = %alert.severity,
            visibility = %alert.visibility,
            targets = rows.len(),
            "created alert"
        );
        Ok(AlertWithTargets::from_targets(alert, &rows))
    }

    /// Applies a partial update to an alert.
    ///
    /// Returns `Ok(None)` if the alert does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if the update is invalid or would
    /// leave the expiry at or before the start.
    pub fn update_alert(&self, id: &str, update: AlertUpdate) -> Result<Option<Alert>> {
        update.validate()?;
        let now = self.clock.now();
        let mut rejected = None;
        let updated = self.alerts.update(id, |alert| {
            let mut candidate = alert.clone();
            update.apply(&mut candidate, now);
            if candidate.expiry_time.is_some_and(|expiry| expiry <= candidate.start_time) {
                rejected = Some(AlertError::InvalidAlert {
                    reason: "expiry time must be after start time".to_string(),
                });
            } else {
                *alert = candidate;
            }
        });

        if let Some(err) = rejected {
            return Err(err);
        }
        if updated.is_some() {
            info!(alert_id = %id, "updated alert");
        }
        Ok(updated)
    }

    /// Archives an alert. Archived alerts are no longer delivered or reminded.
    pub fn archive_alert(&self, id: &str) -> Option<Alert> {
        let now = self.clock.now();
        let archived = self
            .alerts
            .update(id, |alert| AlertUpdate::archive().apply(alert, now));
        if archived.is_some() {
            info!(alert_id = %id, "archived alert");
        }
        archived
    }

    /// Gets an alert with its targets.
    #[must_use]
    pub fn get_alert(&self, id: &str) -> Option<AlertWithTargets> {
        self.alerts.find_by_id(id).map(|a| self.with_targets(a))
    }

    /// Lists all alerts, newest first.
    #[must_use]
    pub fn list_alerts(&self) -> Vec<AlertWithTargets> {
        self.collect(self.alerts.find_all())
    }

    /// Lists the alerts that are effectively active now, newest first.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<AlertWithTargets> {
        self.collect(self.alerts.find_active(self.clock.now()))
    }

    /// Lists alerts created by a user, newest first.
    #[must_use]
    pub fn alerts_by_creator(&self, user_id: &str) -> Vec<AlertWithTargets> {
        self.collect(self.alerts.find_by_creator(user_id))
    }

    /// Lists alerts with a lifecycle status, newest first.
    #[must_use]
    pub fn alerts_by_status(&self, status: AlertStatus) -> Vec<AlertWithTargets> {
        self.collect(self.alerts.find_by_status(status))
    }

    /// Deletes an alert with its visibility targets and preferences.
    ///
    /// Delivery records are kept. Returns `true` if the alert existed.
    pub fn delete_alert(&self, id: &str) -> bool {
        if !self.alerts.delete(id) {
            return false;
        }
        let targets = self.targets.delete_by_alert(id);
        let preferences = self.preferences.delete_by_alert(id);
        info!(alert_id = %id, targets, preferences, "deleted alert");
        true
    }

    fn with_targets(&self, alert: Alert) -> AlertWithTargets {
        let targets = self.targets.find_by_alert(&alert.id);
        AlertWithTargets::from_targets(alert, &targets)
    }

    fn collect(&self, mut alerts: Vec<Alert>) -> Vec<AlertWithTargets> {
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        alerts.into_iter().map(|a| self.with_targets(a)).collect()
    }
}

/// Checks the target lists against the visibility kind and turns them into
/// deduplicated target refs.
fn targets_for(
    kind: VisibilityKind,
    team_ids: &[String],
    user_ids: &[String],
) -> Result<Vec<TargetRef>> {
    let (wanted, other, make): (&[String], &[String], fn(String) -> TargetRef) = match kind {
        VisibilityKind::Organization => {
            if !team_ids.is_empty() || !user_ids.is_empty() {
                return Err(AlertError::InvalidTarget {
                    reason: "organization alerts take no team or user targets".to_string(),
                });
            }
            return Ok(Vec::new());
        }
        VisibilityKind::Team => (team_ids, user_ids, TargetRef::Team),
        VisibilityKind::User => (user_ids, team_ids, TargetRef::User),
    };

    if !other.is_empty() {
        return Err(AlertError::InvalidTarget {
            reason: format!("{kind} alerts only take {kind} targets"),
        });
    }
    if wanted.is_empty() {
        return Err(AlertError::InvalidTarget {
            reason: format!("{kind} alerts need at least one {kind} target"),
        });
    }
    if wanted.iter().any(|id| id.trim().is_empty()) {
        return Err(AlertError::InvalidTarget {
            reason: "target IDs cannot be empty".to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    Ok(wanted
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .map(|id| make(id.clone()))
        .collect())
}
