//! Herald notification daemon.
//!
//! Loads a [`ServerConfig`], wires a [`Herald`] engine from it and runs the
//! periodic reminder sweep until shutdown.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

use std::future::Future;

use herald_alerts::{AnalyticsSummary, Herald, Result};
use tracing::info;

pub use config::{ConfigError, LogConfig, LogFormat, ServerConfig};

/// Builds the engine described by `config`.
#[must_use]
pub fn build_herald(config: &ServerConfig) -> Herald {
    Herald::new(config.engine.clone())
}

/// Runs the reminder task until `shutdown` resolves, then stops it and
/// returns the final counts.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the engine configuration cannot start the reminder
/// task.
pub async fn run_until<F>(herald: &Herald, shutdown: F) -> Result<AnalyticsSummary>
where
    F: Future<Output = ()>,
{
    let handle = herald.start_reminders()?;
    info!(
        interval_minutes = herald.config().reminder_interval_minutes,
        channels = ?herald.channels().delivery_types(),
        "reminder sweeps scheduled"
    );

    shutdown.await;
    info!("shutdown requested, stopping reminder task");

    let sweeps = handle.sweeps_completed();
    handle.join().await;

    let summary = herald.analytics().summary();
    info!(
        sweeps,
        alerts = summary.total_alerts,
        deliveries = summary.deliveries,
        read = summary.read,
        "herald stopped"
    );
    Ok(summary)
}
