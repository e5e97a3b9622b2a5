//! Integration tests for wiring the daemon from configuration.

use std::time::Duration;

use herald_alerts::{Alert, DeliveryType, User};
use herald_server::{ServerConfig, build_herald, run_until};

fn test_config(json: &str) -> ServerConfig {
    ServerConfig::from_json(json).expect("valid test config")
}

#[test]
fn test_engine_registers_enabled_channels_only() {
    let config = test_config(r#"{"engine": {"channels": {"sms": {"enabled": false}}}}"#);
    let herald = build_herald(&config);

    assert_eq!(
        herald.channels().delivery_types(),
        vec![DeliveryType::InApp, DeliveryType::Email]
    );
    assert!(herald.publish(
        Alert::builder("A", "B", "admin")
            .delivery_type(DeliveryType::Sms)
            .build()
            .unwrap(),
        &[],
        &[],
    )
    .is_err());
}

#[test]
fn test_engine_uses_configured_budget() {
    let config = test_config(r#"{"engine": {"sweep_budget_secs": 3}}"#);
    let herald = build_herald(&config);
    assert_eq!(herald.scheduler().budget(), Duration::from_secs(3));
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let config = test_config("{}");
    let herald = build_herald(&config);
    herald.add_user(User::member("ada@example.com", "Ada"));
    herald
        .publish(Alert::builder("A", "B", "admin").build().unwrap(), &[], &[])
        .unwrap();

    let summary = tokio::time::timeout(
        Duration::from_secs(2),
        run_until(&herald, tokio::time::sleep(Duration::from_millis(20))),
    )
    .await
    .expect("run_until should return after shutdown")
    .expect("reminder task should start");

    assert_eq!(summary.total_alerts, 1);
    assert_eq!(summary.deliveries, 1);
}

#[tokio::test]
async fn test_run_until_rejects_zero_interval() {
    let mut config = ServerConfig::default();
    config.engine.reminder_interval_minutes = 0;
    let herald = build_herald(&config);

    let result = run_until(&herald, std::future::pending()).await;

    assert!(result.is_err_and(|e| e.is_configuration()));
}
