//! Read-only counts over alerts, deliveries and preferences.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::repositories::{AlertRepository, DeliveryRepository, PreferenceRepository};
use crate::store::Repository;
use crate::types::AlertSeverity;

/// Snapshot of all counts at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Number of stored alerts.
    pub total_alerts: usize,
    /// Number of delivery records, initial and reminder.
    pub deliveries: usize,
    /// Number of preferences marked read.
    pub read: usize,
    /// Currently snoozed preferences per alert ID.
    pub snoozed: HashMap<String, usize>,
    /// Alerts per severity, including zero counts.
    pub severity_breakdown: HashMap<AlertSeverity, usize>,
}

/// Computes counts over the stored records.
#[derive(Debug, Clone)]
pub struct Analytics {
    alerts: Arc<AlertRepository>,
    deliveries: Arc<DeliveryRepository>,
    preferences: Arc<PreferenceRepository>,
    clock: Arc<dyn Clock>,
}

impl Analytics {
    /// Creates an analytics view over the repositories.
    #[must_use]
    pub fn new(
        alerts: Arc<AlertRepository>,
        deliveries: Arc<DeliveryRepository>,
        preferences: Arc<PreferenceRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            alerts,
            deliveries,
            preferences,
            clock,
        }
    }

    /// Number of stored alerts.
    #[must_use]
    pub fn total_alerts(&self) -> usize {
        self.alerts.count()
    }

    /// Number of delivery records.
    #[must_use]
    pub fn deliveries_count(&self) -> usize {
        self.deliveries.count()
    }

    /// Number of preferences marked read.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.preferences.store().filter(|p| p.is_read).len()
    }

    /// Number of currently snoozed preferences, per alert ID.
    #[must_use]
    pub fn snoozed_counts(&self) -> HashMap<String, usize> {
        let now = self.clock.now();
        let mut counts = HashMap::new();
        for pref in self.preferences.store().filter(|p| p.is_snoozed(now)) {
            *counts.entry(pref.alert_id).or_insert(0) += 1;
        }
        counts
    }

    /// Number of alerts per severity.
    #[must_use]
    pub fn severity_breakdown(&self) -> HashMap<AlertSeverity, usize> {
        let mut breakdown: HashMap<_, _> = AlertSeverity::ALL.iter().map(|s| (*s, 0)).collect();
        for alert in self.alerts.find_all() {
            *breakdown.entry(alert.severity).or_insert(0) += 1;
        }
        breakdown
    }

    /// All counts at once.
    #[must_use]
    pub fn summary(&self) -> AnalyticsSummary {
        AnalyticsSummary {
            total_alerts: self.total_alerts(),
            deliveries: self.deliveries_count(),
            read: self.read_count(),
            snoozed: self.snoozed_counts(),
            severity_breakdown: self.severity_breakdown(),
        }
    }
}
