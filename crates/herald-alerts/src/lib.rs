//! Alert notification delivery and reminder engine for Herald.
//!
//! `herald-alerts` tells the members of an organization about alerts
//! (announcements, incidents, required actions), tracks per recipient
//! whether the alert was delivered, read or snoozed, and keeps reminding
//! unread recipients on a cadence until they acknowledge it.
//!
//! # Features
//!
//! - **Targeting**: Organization-wide, team-scoped or user-scoped alerts
//! - **Channels**: In-app, email and SMS channels behind one trait
//! - **Acknowledgment**: Per-recipient read and snooze-until-end-of-day state
//! - **Reminders**: A periodic sweep re-delivering unread alerts per alert frequency
//! - **Audit Trail**: Append-only delivery records for every accepted delivery
//!
//! # Example
//!
//! ```rust
//! use herald_alerts::{Alert, Herald, HeraldConfig, Team, User, VisibilityKind};
//!
//! let herald = Herald::new(HeraldConfig::default());
//!
//! let team = herald.add_team(Team::new("Platform", "Infrastructure team"));
//! let ada = herald.add_user(User::member("ada@example.com", "Ada").with_team(&team.id));
//!
//! // Deliver a team alert, reminding every 30 minutes until read
//! let alert = Alert::builder("Deploy freeze", "No deploys until Monday", "admin")
//!     .visibility(VisibilityKind::Team)
//!     .remind_every(30)
//!     .build()
//!     .unwrap();
//! let published = herald.publish(alert, &[team.id.clone()], &[]).unwrap();
//! assert_eq!(published.report.delivered, 1);
//!
//! // Ada has not read it yet, so the next sweep reminds her
//! let report = herald.run_reminder_sweep();
//! assert_eq!(report.reminders_sent, 1);
//!
//! // Once read, no more reminders
//! herald.mark_read(&ada.id, &published.alert.alert.id);
//! assert!(herald.user_preferences(&ada.id)[0].is_read);
//! ```
//!
//! # Periodic Reminders
//!
//! Inside a tokio runtime the sweep runs on the configured interval:
//!
//! ```rust,ignore
//! let handle = herald.start_reminders()?;
//! // ...
//! handle.join().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod analytics;
pub mod channels;
pub mod clock;
pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod preferences;
pub mod reminders;
pub mod repositories;
pub mod service;
pub mod store;
pub mod task;
pub mod types;
pub mod visibility;

// Re-export main types at crate root
pub use analytics::{Analytics, AnalyticsSummary};
pub use channels::{
    ChannelRegistry, EmailChannel, InAppChannel, InboxEntry, Notification, NotificationChannel,
    SmsChannel,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChannelSettings, EmailSettings, HeraldConfig, SmsSettings};
pub use context::{Herald, HeraldBuilder, Published};
pub use delivery::{DeliveryEngine, DeliveryReport};
pub use error::{AlertError, Result};
pub use preferences::PreferenceTracker;
pub use reminders::{ReminderScheduler, SweepReport};
pub use service::AlertService;
pub use store::{MemoryStore, Repository};
pub use task::{ReminderHandle, start_reminder_task};
pub use types::{
    Alert, AlertBuilder, AlertSeverity, AlertStatus, AlertUpdate, AlertWithTargets,
    DeliveryRecord, DeliveryType, NewAlert, Preference, PreferenceState, TargetRef, Team, User,
    UserRole, VisibilityKind, VisibilityTarget,
};
pub use visibility::VisibilityResolver;
