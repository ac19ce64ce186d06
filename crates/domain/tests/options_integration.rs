//! Integration tests for queue options and the wire codec
//!
//! Covers the paths a consumer of the domain crate walks: deserializing
//! options, validating them, and encoding payloads for the remote queue.

use std::time::Duration;

use spillway_domain::constants::MIN_BUFFER_SIZE;
use spillway_domain::{
    decode_body, DomainError, Envelope, MessageContent, OverflowPointer, QueueOptions,
    ReceiptHandle, WireMessage,
};

/// Validates a JSON options document end to end.
///
/// Assertions:
/// - Name and namespace resolve to `queue-<ns>-<name>`.
/// - Millisecond fields become durations.
/// - Unspecified fields keep their defaults.
#[test]
fn options_document_validates_into_settings() {
    let options: QueueOptions = serde_json::from_str(
        r#"{
            "name": "orders",
            "namespace": "staging",
            "buffer_size": 25,
            "visibility_timeout_secs": 60,
            "collector_interval_ms": 50
        }"#,
    )
    .expect("options parse");

    let settings = options.validate().expect("options validate");
    assert_eq!(settings.name, "queue-staging-orders");
    assert_eq!(settings.buffer_size, 25);
    assert_eq!(settings.visibility_timeout_secs, Some(60));
    assert_eq!(settings.collector_interval, Duration::from_millis(50));
    assert!(!settings.replace_existing_queue);
}

#[test]
fn invalid_options_name_the_offending_field() {
    let err = QueueOptions::new(MIN_BUFFER_SIZE - 1).validate().unwrap_err();
    assert!(matches!(err, DomainError::Config { field: "buffer_size", .. }));

    let err = QueueOptions::new(10).with_overflow_threshold(0).validate().unwrap_err();
    assert!(matches!(err, DomainError::Config { field: "overflow_threshold_bytes", .. }));

    let err = QueueOptions::new(10).with_name("has/slash").validate().unwrap_err();
    assert!(matches!(err, DomainError::Config { field: "name", .. }));
}

/// Validates that a payload routed through the overflow store comes back as
/// a pointer whose key matches a fresh hash of the same bytes.
#[test]
fn overflow_body_resolves_to_payload_key() {
    let payload = vec![b'x'; 70_000];
    let pointer = OverflowPointer::for_payload(&payload);
    let body = WireMessage::overflow(&pointer).to_body().unwrap();

    match decode_body(&body).unwrap() {
        MessageContent::Pointer(decoded) => {
            assert_eq!(decoded.key(), OverflowPointer::for_payload(&payload).key());
        }
        other => panic!("expected pointer, got {other:?}"),
    }

    let envelope =
        Envelope::remote(payload, ReceiptHandle::new("rh"), Some(pointer.into_key()));
    let (_, ack) = envelope.into_parts();
    assert!(ack.and_then(|a| a.overflow_key).is_some());
}

