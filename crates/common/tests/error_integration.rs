//! Integration tests for `spillway_common::error`.
//!
//! These suites validate classification and module error delegation through
//! the exported macros so downstream crates receive consistent failure
//! semantics.

use std::time::Duration;

use spillway_common::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
use spillway_common::{impl_error_classification, impl_error_conversion};
use thiserror::Error;

#[derive(Debug, Error)]
enum StoreError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Blob missing: {0}")]
    Missing(String),

    #[error("Store throttled")]
    Throttled { retry_after: Duration },
}

impl_error_conversion!(StoreError, Common);
impl_error_classification!(StoreError, Common,
    Self::Missing(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::Throttled { retry_after } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: Some(*retry_after),
    }
);

/// Validates the classification matrix for every `CommonError` variant.
///
/// Assertions:
/// - Confirms `is_retryable()` matches the expected flag.
/// - Confirms `severity()` matches the expected level.
/// - Confirms `is_critical()` matches the expected flag.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing queue name"), false, ErrorSeverity::Error, false),
        (CommonError::serialization("invalid JSON"), false, ErrorSeverity::Error, false),
        (
            CommonError::timeout("receive", Duration::from_secs(3)),
            true,
            ErrorSeverity::Warning,
            false,
        ),
        (CommonError::backend("queue", "connection reset", true), true, ErrorSeverity::Error, false),
        (CommonError::backend("queue", "access denied", false), false, ErrorSeverity::Error, false),
        (CommonError::not_found("queue"), false, ErrorSeverity::Info, false),
        (CommonError::internal("invariant broken"), false, ErrorSeverity::Critical, true),
        (CommonError::task_cancelled("collector"), false, ErrorSeverity::Info, false),
    ];

    for (err, retryable, severity, critical) in cases {
        assert_eq!(err.is_retryable(), retryable, "retryable mismatch for {err}");
        assert_eq!(err.severity(), severity, "severity mismatch for {err}");
        assert_eq!(err.is_critical(), critical, "critical mismatch for {err}");
    }
}

/// Validates that a module error delegates its `Common` variant and uses
/// the inline classification for the rest.
///
/// Assertions:
/// - Retryable backend errors stay retryable after wrapping.
/// - `Missing` is informational and not retryable.
/// - `Throttled` surfaces its `retry_after` hint.
#[test]
fn module_error_delegates_classification() {
    let wrapped: StoreError = CommonError::backend("blob", "503", true).into();
    assert!(wrapped.is_retryable());
    assert_eq!(wrapped.retry_after(), None);

    let missing = StoreError::Missing("abc".into());
    assert!(!missing.is_retryable());
    assert_eq!(missing.severity(), ErrorSeverity::Info);
    assert_eq!(missing.retry_after(), None);

    let throttled = StoreError::Throttled { retry_after: Duration::from_millis(250) };
    assert!(throttled.is_retryable());
    assert_eq!(throttled.retry_after(), Some(Duration::from_millis(250)));
}

#[test]
fn conversion_macro_wraps_io_and_json_errors() {
    let io: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert!(matches!(io, StoreError::Common(CommonError::Internal { .. })));

    let json_err = serde_json::from_str::<u32>("{").unwrap_err();
    let json: StoreError = json_err.into();
    assert!(matches!(json, StoreError::Common(CommonError::Serialization { .. })));
}

#[test]
fn common_result_propagates_with_question_mark() {
    fn parse(raw: &str) -> CommonResult<u32> {
        let value: u32 = serde_json::from_str(raw)?;
        Ok(value)
    }

    assert_eq!(parse("7").unwrap(), 7);
    assert!(parse("seven").is_err());
}
