//! Queue options and their validated form
//!
//! [`QueueOptions`] is the serde-friendly surface read from files or the
//! environment; [`QueueOptions::validate`] turns it into [`QueueSettings`]
//! with durations, a resolved queue name and every bound checked. Nothing
//! talks to the remote service before validation succeeds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::*;
use crate::errors::{DomainError, Result};

/// User-facing queue options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Base queue name; a random `temp-name-*` is used when absent
    pub name: Option<String>,
    pub namespace: Option<String>,
    /// Required. Ingress capacity and egress target.
    pub buffer_size: Option<usize>,
    pub overflow_threshold_bytes: usize,
    pub visibility_timeout_secs: Option<u32>,
    pub replace_existing_queue: bool,
    pub retry: RetryOptions,
    pub idle_poll_interval_ms: u64,
    pub collector_interval_ms: u64,
    pub collector_join_timeout_ms: u64,
    pub empty_receive_limit: u32,
    pub recreate_delay_ms: u64,
}

/// Attempt budgets per remote call class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub send_attempts: u32,
    pub receive_attempts: u32,
    pub delete_attempts: u32,
    pub overflow_attempts: u32,
    pub create_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            send_attempts: DEFAULT_RETRY_ATTEMPTS,
            receive_attempts: DEFAULT_RETRY_ATTEMPTS,
            delete_attempts: DEFAULT_RETRY_ATTEMPTS,
            overflow_attempts: DEFAULT_RETRY_ATTEMPTS,
            create_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetryOptions {
    /// Same attempt budget for every call class
    pub fn uniform(attempts: u32) -> Self {
        Self {
            send_attempts: attempts,
            receive_attempts: attempts,
            delete_attempts: attempts,
            overflow_attempts: attempts,
            create_attempts: attempts,
            ..Self::default()
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            name: None,
            namespace: None,
            buffer_size: None,
            overflow_threshold_bytes: DEFAULT_OVERFLOW_THRESHOLD_BYTES,
            visibility_timeout_secs: None,
            replace_existing_queue: false,
            retry: RetryOptions::default(),
            idle_poll_interval_ms: DEFAULT_IDLE_POLL_INTERVAL_MS,
            collector_interval_ms: DEFAULT_COLLECTOR_INTERVAL_MS,
            collector_join_timeout_ms: DEFAULT_COLLECTOR_JOIN_TIMEOUT_MS,
            empty_receive_limit: DEFAULT_EMPTY_RECEIVE_LIMIT,
            recreate_delay_ms: DEFAULT_RECREATE_DELAY_MS,
        }
    }
}

impl QueueOptions {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size: Some(buffer_size), ..Self::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_overflow_threshold(mut self, bytes: usize) -> Self {
        self.overflow_threshold_bytes = bytes;
        self
    }

    pub fn with_visibility_timeout(mut self, secs: u32) -> Self {
        self.visibility_timeout_secs = Some(secs);
        self
    }

    pub fn with_replace_existing_queue(mut self, replace: bool) -> Self {
        self.replace_existing_queue = replace;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry = RetryOptions {
            base_delay_ms: self.retry.base_delay_ms,
            max_delay_ms: self.retry.max_delay_ms,
            ..RetryOptions::uniform(attempts)
        };
        self
    }

    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_collector_interval(mut self, interval: Duration) -> Self {
        self.collector_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_recreate_delay(mut self, delay: Duration) -> Self {
        self.recreate_delay_ms = duration_ms(delay);
        self
    }

    /// Check every bound and resolve the queue name.
    pub fn validate(&self) -> Result<QueueSettings> {
        let buffer_size = self
            .buffer_size
            .ok_or_else(|| DomainError::config("buffer_size", "buffer_size is required"))?;
        if buffer_size < MIN_BUFFER_SIZE {
            return Err(DomainError::config(
                "buffer_size",
                format!("minimum buffer_size is {MIN_BUFFER_SIZE}, got {buffer_size}"),
            ));
        }

        if self.overflow_threshold_bytes == 0 {
            return Err(DomainError::config(
                "overflow_threshold_bytes",
                "overflow threshold must be greater than 0",
            ));
        }

        if let Some(secs) = self.visibility_timeout_secs {
            if secs > MAX_VISIBILITY_TIMEOUT_SECS {
                return Err(DomainError::config(
                    "visibility_timeout_secs",
                    format!("visibility timeout must be at most {MAX_VISIBILITY_TIMEOUT_SECS} seconds"),
                ));
            }
        }

        let retry = self.retry.validate()?;

        for (field, value) in [
            ("idle_poll_interval_ms", self.idle_poll_interval_ms),
            ("collector_interval_ms", self.collector_interval_ms),
            ("collector_join_timeout_ms", self.collector_join_timeout_ms),
        ] {
            if value == 0 {
                return Err(DomainError::config(field, "interval must be greater than 0"));
            }
        }

        if self.empty_receive_limit == 0 {
            return Err(DomainError::config(
                "empty_receive_limit",
                "empty receive limit must be at least 1",
            ));
        }

        let name = resolve_queue_name(self.name.as_deref(), self.namespace.as_deref())?;

        Ok(QueueSettings {
            name,
            buffer_size,
            overflow_threshold_bytes: self.overflow_threshold_bytes,
            visibility_timeout_secs: self.visibility_timeout_secs,
            replace_existing_queue: self.replace_existing_queue,
            retry,
            idle_poll_interval: Duration::from_millis(self.idle_poll_interval_ms),
            collector_interval: Duration::from_millis(self.collector_interval_ms),
            collector_join_timeout: Duration::from_millis(self.collector_join_timeout_ms),
            empty_receive_limit: self.empty_receive_limit,
            recreate_delay: Duration::from_millis(self.recreate_delay_ms),
        })
    }
}

impl RetryOptions {
    fn validate(&self) -> Result<RetryBudget> {
        for (field, attempts) in [
            ("retry.send_attempts", self.send_attempts),
            ("retry.receive_attempts", self.receive_attempts),
            ("retry.delete_attempts", self.delete_attempts),
            ("retry.overflow_attempts", self.overflow_attempts),
            ("retry.create_attempts", self.create_attempts),
        ] {
            if attempts == 0 || attempts > MAX_RETRY_ATTEMPTS {
                return Err(DomainError::config(
                    field,
                    format!("attempts must be within 1..={MAX_RETRY_ATTEMPTS}, got {attempts}"),
                ));
            }
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(DomainError::config(
                "retry.base_delay_ms",
                "base delay cannot exceed max delay",
            ));
        }

        Ok(RetryBudget {
            send_attempts: self.send_attempts,
            receive_attempts: self.receive_attempts,
            delete_attempts: self.delete_attempts,
            overflow_attempts: self.overflow_attempts,
            create_attempts: self.create_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        })
    }
}

/// Validated options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub name: String,
    pub buffer_size: usize,
    pub overflow_threshold_bytes: usize,
    pub visibility_timeout_secs: Option<u32>,
    pub replace_existing_queue: bool,
    pub retry: RetryBudget,
    pub idle_poll_interval: Duration,
    pub collector_interval: Duration,
    pub collector_join_timeout: Duration,
    pub empty_receive_limit: u32,
    pub recreate_delay: Duration,
}

/// Validated retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    pub send_attempts: u32,
    pub receive_attempts: u32,
    pub delete_attempts: u32,
    pub overflow_attempts: u32,
    pub create_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// Builds `queue-<namespace>-<name>` (or `queue-<name>`), generating a
/// `temp-name-*` base when no name is given.
pub fn resolve_queue_name(name: Option<&str>, namespace: Option<&str>) -> Result<String> {
    let base = match name {
        Some(name) if name.is_empty() => {
            return Err(DomainError::config("name", "queue name cannot be empty"));
        }
        Some(name) => name.to_string(),
        None => format!("{TEMP_NAME_PREFIX}-{}", Uuid::new_v4().simple()),
    };

    let resolved = match namespace {
        Some("") => return Err(DomainError::config("namespace", "namespace cannot be empty")),
        Some(ns) => format!("{QUEUE_NAME_PREFIX}-{ns}-{base}"),
        None => format!("{QUEUE_NAME_PREFIX}-{base}"),
    };

    validate_queue_name(&resolved)?;
    Ok(resolved)
}

fn validate_queue_name(name: &str) -> Result<()> {
    if name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(DomainError::config(
            "name",
            format!("queue name '{name}' exceeds {MAX_QUEUE_NAME_LENGTH} characters"),
        ));
    }
    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(DomainError::config(
            "name",
            format!("queue name '{name}' contains invalid character '{bad}'"),
        ));
    }
    Ok(())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_is_required() {
        let err = QueueOptions::default().validate().unwrap_err();
        assert!(matches!(err, DomainError::Config { field: "buffer_size", .. }));
    }

    /// Validates the minimum buffer size bound.
    ///
    /// Assertions:
    /// - 4 is rejected.
    /// - 5 is accepted and carried through unchanged.
    #[test]
    fn test_buffer_size_minimum() {
        assert!(QueueOptions::new(4).validate().is_err());
        let settings = QueueOptions::new(5).validate().unwrap();
        assert_eq!(settings.buffer_size, 5);
        assert_eq!(settings.overflow_threshold_bytes, DEFAULT_OVERFLOW_THRESHOLD_BYTES);
    }

    #[test]
    fn test_visibility_timeout_bound() {
        assert!(QueueOptions::new(10).with_visibility_timeout(43_200).validate().is_ok());
        assert!(QueueOptions::new(10).with_visibility_timeout(43_201).validate().is_err());
    }

    #[test]
    fn test_retry_attempt_bounds() {
        assert!(QueueOptions::new(10).with_max_retry_attempts(0).validate().is_err());
        assert!(QueueOptions::new(10).with_max_retry_attempts(101).validate().is_err());
        let settings = QueueOptions::new(10).with_max_retry_attempts(3).validate().unwrap();
        assert_eq!(settings.retry.send_attempts, 3);
        assert_eq!(settings.retry.create_attempts, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS));
    }

    /// Validates queue name resolution.
    ///
    /// Assertions:
    /// - Namespace and name are joined under the `queue-` prefix.
    /// - A missing name produces a `temp-name-` base.
    /// - Invalid characters and over-long names are rejected.
    #[test]
    fn test_queue_name_resolution() {
        assert_eq!(resolve_queue_name(Some("jobs"), Some("prod")).unwrap(), "queue-prod-jobs");
        assert_eq!(resolve_queue_name(Some("jobs"), None).unwrap(), "queue-jobs");

        let generated = resolve_queue_name(None, None).unwrap();
        assert!(generated.starts_with("queue-temp-name-"));
        assert!(generated.len() <= MAX_QUEUE_NAME_LENGTH);

        assert!(resolve_queue_name(Some("bad name"), None).is_err());
        assert!(resolve_queue_name(Some(""), None).is_err());
        assert!(resolve_queue_name(Some(&"x".repeat(80)), None).is_err());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: QueueOptions =
            serde_json::from_str(r#"{"buffer_size": 20, "retry": {"send_attempts": 2}}"#).unwrap();
        assert_eq!(options.buffer_size, Some(20));
        assert_eq!(options.retry.send_attempts, 2);
        assert_eq!(options.retry.delete_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(options.recreate_delay_ms, DEFAULT_RECREATE_DELAY_MS);
    }
}
