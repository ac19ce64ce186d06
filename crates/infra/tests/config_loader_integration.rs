//! Loading options from files and handing them to a live queue

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::collections::HashMap;
use std::time::Duration;

use spillway_core::errors::QueueError;
use spillway_domain::DomainError;
use spillway_infra::config::{load_from_file, load_from_lookup};
use support::Harness;
use tempfile::TempDir;

/// Validates a TOML file end to end.
///
/// Assertions:
/// - Every field in the file reaches the validated settings.
/// - A queue connects with them and honours the buffer size.
#[tokio::test]
async fn test_toml_options_drive_a_queue() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("spillway.toml");
    std::fs::write(
        &path,
        r#"
name = "reports"
namespace = "nightly"
buffer_size = 6
overflow_threshold_bytes = 2048
visibility_timeout_secs = 120
idle_poll_interval_ms = 20
collector_interval_ms = 10

[retry]
send_attempts = 2
base_delay_ms = 1
max_delay_ms = 2
"#,
    )?;

    let options = load_from_file(Some(path))?;
    let settings = options.validate()?;
    assert_eq!(settings.name, "queue-nightly-reports");
    assert_eq!(settings.buffer_size, 6);
    assert_eq!(settings.overflow_threshold_bytes, 2048);
    assert_eq!(settings.visibility_timeout_secs, Some(120));
    assert_eq!(settings.retry.send_attempts, 2);
    assert_eq!(settings.idle_poll_interval, Duration::from_millis(20));

    let h = Harness::connect(options).await;
    assert_eq!(h.remote().visibility_timeout(), Duration::from_secs(120));
    for i in 0..6u8 {
        h.queue.push(vec![i]).await?;
    }
    assert_eq!(h.remote().visible_count(), 6);
    h.queue.destroy().await?;
    Ok(())
}

#[tokio::test]
async fn test_json_file_with_invalid_values_is_rejected_at_validation() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "buffer_size": 2, "name": "tiny" }"#)?;

    let options = load_from_file(Some(path))?;
    let err = options.validate().unwrap_err();
    assert!(matches!(err, DomainError::Config { field: "buffer_size", .. }));

    let queue_err = QueueError::from(err);
    assert!(matches!(queue_err, QueueError::InvalidConfiguration(_)));
    Ok(())
}

#[test]
fn test_env_lookup_and_file_agree() {
    let env: HashMap<&str, &str> = [
        ("SPILLWAY_BUFFER_SIZE", "9"),
        ("SPILLWAY_QUEUE_NAME", "sync"),
        ("SPILLWAY_MAX_RETRY_ATTEMPTS", "4"),
    ]
    .into_iter()
    .collect();
    let from_env = load_from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spillway.json");
    std::fs::write(
        &path,
        r#"{ "buffer_size": 9, "name": "sync", "retry": {
            "send_attempts": 4, "receive_attempts": 4, "delete_attempts": 4,
            "overflow_attempts": 4, "create_attempts": 4 } }"#,
    )
    .unwrap();
    let from_file = load_from_file(Some(path)).unwrap();

    assert_eq!(from_env, from_file);
}
