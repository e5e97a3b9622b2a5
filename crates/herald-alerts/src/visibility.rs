//! Recipient resolution.
//!
//! [`VisibilityResolver`] turns an alert's targeting (organization, teams or
//! users) into concrete recipients, and answers the converse question of
//! whether a given user can see a given alert.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::repositories::{UserRepository, VisibilityRepository};
use crate::store::Repository;
use crate::types::{Alert, User, UserRole, VisibilityKind};

/// Resolves who an alert is addressed to.
#[derive(Debug, Clone)]
pub struct VisibilityResolver {
    users: Arc<UserRepository>,
    targets: Arc<VisibilityRepository>,
    clock: Arc<dyn Clock>,
}

impl VisibilityResolver {
    /// Creates a resolver over the given repositories.
    #[must_use]
    pub fn new(
        users: Arc<UserRepository>,
        targets: Arc<VisibilityRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            targets,
            clock,
        }
    }

    /// Computes the recipients of an alert from explicit target lists.
    ///
    /// - organization: every member-role user (target lists are ignored)
    /// - team: users of the listed teams, deduplicated
    /// - user: the listed users that exist
    ///
    /// Unknown IDs are skipped. Alerts that are not effectively active
    /// resolve to nobody. The result is ordered by user ID.
    #[must_use]
    pub fn resolve_recipients(
        &self,
        alert: &Alert,
        team_ids: &[String],
        user_ids: &[String],
    ) -> Vec<User> {
        if !alert.is_effectively_active(self.clock.now()) {
            debug!(alert_id = %alert.id, "alert not effectively active, no recipients");
            return Vec::new();
        }

        let mut recipients = BTreeMap::new();
        match alert.visibility {
            VisibilityKind::Organization => {
                for user in self.users.find_by_role(UserRole::Member) {
                    recipients.insert(user.id.clone(), user);
                }
            }
            VisibilityKind::Team => {
                for team_id in team_ids {
                    for user in self.users.find_by_team(team_id) {
                        recipients.entry(user.id.clone()).or_insert(user);
                    }
                }
            }
            VisibilityKind::User => {
                for user in user_ids.iter().filter_map(|id| self.users.find_by_id(id)) {
                    recipients.entry(user.id.clone()).or_insert(user);
                }
            }
        }

        debug!(
            alert_id = %alert.id,
            visibility = %alert.visibility,
            recipients = recipients.len(),
            "resolved recipients"
        );
        recipients.into_values().collect()
    }

    /// Computes the recipients of a stored alert from its visibility targets.
    #[must_use]
    pub fn recipients_for(&self, alert: &Alert) -> Vec<User> {
        let targets = self.targets.find_by_alert(&alert.id);
        let team_ids: Vec<String> = targets
            .iter()
            .filter_map(|t| t.team_id())
            .map(str::to_string)
            .collect();
        let user_ids: Vec<String> = targets
            .iter()
            .filter_map(|t| t.user_id())
            .map(str::to_string)
            .collect();
        self.resolve_recipients(alert, &team_ids, &user_ids)
    }

    /// Returns true if `user` can see `alert` right now.
    #[must_use]
    pub fn is_visible_to(&self, alert: &Alert, user: &User) -> bool {
        if !alert.is_effectively_active(self.clock.now()) {
            return false;
        }

        match alert.visibility {
            VisibilityKind::Organization => user.is_member(),
            VisibilityKind::Team => user.team_id.as_deref().is_some_and(|team_id| {
                self.targets
                    .find_by_alert(&alert.id)
                    .iter()
                    .any(|t| t.team_id() == Some(team_id))
            }),
            VisibilityKind::User => self
                .targets
                .find_by_alert(&alert.id)
                .iter()
                .any(|t| t.user_id() == Some(user.id.as_str())),
        }
    }
}
