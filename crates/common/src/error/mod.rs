//! Unified error handling shared by every Spillway crate.
//!
//! Module-specific error enums embed [`CommonError`] through a transparent
//! `Common` variant and use the macros below to get conversions and
//! [`ErrorClassification`] without repeating the boilerplate:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum StoreError {
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//!
//!     #[error("Blob not found: {0}")]
//!     Missing(String),
//! }
//!
//! impl_error_conversion!(StoreError, Common);
//! impl_error_classification!(StoreError, Common,
//!     Self::Missing(_) => {
//!         retryable: false,
//!         severity: ErrorSeverity::Info,
//!         critical: false,
//!     }
//! );
//! ```
//!
//! Classification drives the retry executor in
//! [`crate::resilience`]: only errors reporting `is_retryable() == true` are
//! attempted again.

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error variants that appear across multiple modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Timeout errors
    Timeout { operation: String, duration: Duration },

    /// Network or backend connectivity errors
    Backend { service: String, message: String, is_retryable: bool },

    /// Resource not found errors
    NotFound { resource_type: String, identifier: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },

    /// Task cancellation (async)
    TaskCancelled { task_id: String, reason: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => match field {
                Some(field) => write!(f, "Configuration error in field '{field}': {message}"),
                None => write!(f, "Configuration error: {message}"),
            },
            Self::Serialization { message, format } => match format {
                Some(format) => write!(f, "Serialization error ({format}): {message}"),
                None => write!(f, "Serialization error: {message}"),
            },
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{operation}' timed out after {duration:?}")
            }
            Self::Backend { service, message, .. } => {
                write!(f, "Backend error from '{service}': {message}")
            }
            Self::NotFound { resource_type, identifier } => match identifier {
                Some(id) => write!(f, "{resource_type} not found: '{id}'"),
                None => write!(f, "{resource_type} not found"),
            },
            Self::Internal { message, context } => match context {
                Some(ctx) => write!(f, "Internal error in '{ctx}': {message}"),
                None => write!(f, "Internal error: {message}"),
            },
            Self::TaskCancelled { task_id, reason } => match reason {
                Some(reason) => write!(f, "Task '{task_id}' cancelled: {reason}"),
                None => write!(f, "Task '{task_id}' cancelled"),
            },
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::Serialization { .. } | Self::Backend { .. } => {
                ErrorSeverity::Error
            }
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::NotFound { .. } | Self::TaskCancelled { .. } => ErrorSeverity::Info,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error tied to a specific field
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into(), format: None }
    }

    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a backend error; `is_retryable` decides whether the retry
    /// executor will attempt the call again.
    pub fn backend<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    pub fn not_found<T: Into<String>>(resource_type: T) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: None }
    }

    pub fn not_found_with_id<T: Into<String>, I: Into<String>>(
        resource_type: T,
        identifier: I,
    ) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: Some(identifier.into()) }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    pub fn task_cancelled<S: Into<String>>(task_id: S) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: None }
    }

    pub fn task_cancelled_with_reason<S: Into<String>, R: Into<String>>(
        task_id: S,
        reason: R,
    ) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: Some(reason.into()) }
    }

    /// Key/value pairs suitable for structured log fields
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("error.kind", self.kind().to_string()),
            ("error.severity", self.severity().to_string()),
            ("error.retryable", self.is_retryable().to_string()),
        ];
        match self {
            Self::Config { field: Some(field), .. } => fields.push(("error.field", field.clone())),
            Self::Timeout { operation, .. } => fields.push(("error.operation", operation.clone())),
            Self::Backend { service, .. } => fields.push(("error.service", service.clone())),
            _ => {}
        }
        fields
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Timeout { .. } => "timeout",
            Self::Backend { .. } => "backend",
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
            Self::TaskCancelled { .. } => "task_cancelled",
        }
    }
}

/// Classification shared by every error type in the workspace
pub trait ErrorClassification {
    /// Whether the failure is transient and worth attempting again
    fn is_retryable(&self) -> bool;

    /// Severity used for logging and alerting decisions
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error signals a broken invariant
    fn is_critical(&self) -> bool;

    /// Suggested delay before the next attempt, if the source provided one
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal { message: err.to_string(), context: Some("io".to_string()) }
    }
}

/// Generates `From<serde_json::Error>` and `From<std::io::Error>` for a
/// module error that embeds [`CommonError`] in `$variant`.
///
/// `From<CommonError>` itself is expected to come from `#[from]` on the
/// variant; pass `with_common` when it does not.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };

    ($error_type:ty, $variant:ident, with_common) => {
        impl From<$crate::error::CommonError> for $error_type {
            fn from(err: $crate::error::CommonError) -> Self {
                Self::$variant(err)
            }
        }

        $crate::impl_error_conversion!($error_type, $variant);
    };
}

/// Implements [`ErrorClassification`] for a module error, delegating the
/// embedded `CommonError` variant and classifying the rest inline.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_retryable(e),
                    $(
                        #[allow(unused_variables)]
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::severity(e),
                    $(
                        #[allow(unused_variables)]
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_critical(e),
                    $(
                        #[allow(unused_variables)]
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::retry_after(e),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
