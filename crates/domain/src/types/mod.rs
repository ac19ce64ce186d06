//! Domain types: messages, acknowledgments, queue status and wire format

pub mod message;
pub mod status;
pub mod wire;

pub use message::{AckToken, Envelope, ReceiptHandle, ReceivedMessage};
pub use status::QueueStatus;
pub use wire::{decode_body, MessageContent, OverflowPointer, WireMessage};
