//! Message body codec
//!
//! Every remote body is a JSON object tagged by `kind`:
//!
//! ```json
//! {"kind":"raw","data":"aGVsbG8"}
//! {"kind":"overflow","content_hash":"2cf24dba5fb0a30e..."}
//! ```
//!
//! `raw` carries the payload as unpadded base64url. `overflow` points at a
//! blob keyed by the lower-case hex SHA-256 of the payload.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{DomainError, Result};

const CONTENT_HASH_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    Raw { data: String },
    Overflow { content_hash: String },
}

/// Decoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Payload(Vec<u8>),
    Pointer(OverflowPointer),
}

/// Content-addressed reference to a payload held in the overflow store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverflowPointer {
    content_hash: String,
}

impl OverflowPointer {
    pub fn for_payload(payload: &[u8]) -> Self {
        Self { content_hash: hex::encode(Sha256::digest(payload)) }
    }

    pub fn from_hash(content_hash: impl Into<String>) -> Result<Self> {
        let content_hash = content_hash.into();
        let well_formed = content_hash.len() == CONTENT_HASH_LEN
            && content_hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(DomainError::Codec(format!("malformed content hash '{content_hash}'")));
        }
        Ok(Self { content_hash })
    }

    /// Blob key in the overflow store
    pub fn key(&self) -> &str {
        &self.content_hash
    }

    pub fn into_key(self) -> String {
        self.content_hash
    }
}

impl WireMessage {
    pub fn raw(payload: &[u8]) -> Self {
        Self::Raw { data: URL_SAFE_NO_PAD.encode(payload) }
    }

    pub fn overflow(pointer: &OverflowPointer) -> Self {
        Self::Overflow { content_hash: pointer.key().to_string() }
    }

    pub fn to_body(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DomainError::Codec(e.to_string()))
    }

    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| DomainError::Codec(e.to_string()))
    }

    pub fn into_content(self) -> Result<MessageContent> {
        match self {
            Self::Raw { data } => URL_SAFE_NO_PAD
                .decode(data.as_bytes())
                .map(MessageContent::Payload)
                .map_err(|e| DomainError::Codec(format!("invalid base64 payload: {e}"))),
            Self::Overflow { content_hash } => {
                OverflowPointer::from_hash(content_hash).map(MessageContent::Pointer)
            }
        }
    }
}

/// Decode a remote body straight into its content
pub fn decode_body(body: &str) -> Result<MessageContent> {
    WireMessage::from_body(body)?.into_content()
}
