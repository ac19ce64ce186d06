use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle the remote service issues per delivery; required to delete
/// the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A delivery as returned by the remote queue, body still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub receipt: ReceiptHandle,
    pub body: String,
}

/// What must be deleted once a message has been consumed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken {
    pub receipt: ReceiptHandle,
    /// Blob key when the payload was stored in the overflow store
    pub overflow_key: Option<String>,
}

/// A payload waiting in the egress buffer.
///
/// Envelopes received from the remote queue carry their receipt (and the
/// overflow key when the payload came from the blob store). Envelopes
/// promoted straight from local ingress carry neither: nothing exists
/// remotely that would need deleting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub receipt: Option<ReceiptHandle>,
    pub overflow_key: Option<String>,
}

impl Envelope {
    pub fn remote(payload: Vec<u8>, receipt: ReceiptHandle, overflow_key: Option<String>) -> Self {
        Self { payload, receipt: Some(receipt), overflow_key }
    }

    pub fn local(payload: Vec<u8>) -> Self {
        Self { payload, receipt: None, overflow_key: None }
    }

    pub fn is_local(&self) -> bool {
        self.receipt.is_none()
    }

    /// Split into the payload and the acknowledgment it owes, if any
    pub fn into_parts(self) -> (Vec<u8>, Option<AckToken>) {
        let ack = self
            .receipt
            .map(|receipt| AckToken { receipt, overflow_key: self.overflow_key });
        (self.payload, ack)
    }
}
