use std::collections::VecDeque;
use std::mem;

use spillway_domain::{AckToken, Envelope};

use crate::remote::ReceivedBatch;

/// Local buffers owned by one queue, only touched under the sync core lock.
///
/// `ingress` collects pushed payloads until a flush ships them. `egress`
/// holds envelopes ready for `pop`. `ack_pending` records what consumed
/// messages still owe the remote queue; the deletion collector empties it.
#[derive(Debug)]
pub struct LocalQueueState {
    buffer_size: usize,
    ingress: VecDeque<Vec<u8>>,
    egress: VecDeque<Envelope>,
    ack_pending: Vec<AckToken>,
}

impl LocalQueueState {
    /// Empty buffers sized for `buffer_size` payloads each
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ingress: VecDeque::with_capacity(buffer_size),
            egress: VecDeque::with_capacity(buffer_size),
            ack_pending: Vec::new(),
        }
    }

    /// Capacity of ingress and egress
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Append to ingress; true once ingress is at capacity and must flush
    pub fn enqueue(&mut self, payload: Vec<u8>) -> bool {
        self.ingress.push_back(payload);
        self.ingress.len() >= self.buffer_size
    }

    /// Ingress for flushing in place; sent payloads are drained by the flush
    pub fn ingress_mut(&mut self) -> &mut VecDeque<Vec<u8>> {
        &mut self.ingress
    }

    /// Pop the egress head, recording its acknowledgment before handing the
    /// payload out.
    pub fn take_next(&mut self) -> Option<Vec<u8>> {
        let envelope = self.egress.pop_front()?;
        let (payload, ack) = envelope.into_parts();
        if let Some(ack) = ack {
            self.ack_pending.push(ack);
        }
        Some(payload)
    }

    /// How many envelopes egress can take before reaching `buffer_size`
    pub fn shortfall(&self) -> usize {
        self.buffer_size.saturating_sub(self.egress.len())
    }

    /// Queue received envelopes for `pop` and tombstones for deletion
    pub fn absorb(&mut self, batch: ReceivedBatch) {
        self.egress.extend(batch.envelopes);
        self.ack_pending.extend(batch.tombstones);
    }

    /// Move unflushed payloads straight into egress. Used when the remote
    /// queue had nothing to offer.
    pub fn promote_ingress(&mut self) -> usize {
        let mut moved = 0;
        while self.egress.len() < self.buffer_size {
            match self.ingress.pop_front() {
                Some(payload) => {
                    self.egress.push_back(Envelope::local(payload));
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    /// Hand every recorded acknowledgment to the deletion collector
    pub fn take_acks(&mut self) -> Vec<AckToken> {
        mem::take(&mut self.ack_pending)
    }

    /// Acknowledgments waiting for the collector
    pub fn pending_acks(&self) -> usize {
        self.ack_pending.len()
    }

    /// Payloads pushed but not yet flushed
    pub fn ingress_len(&self) -> usize {
        self.ingress.len()
    }

    /// Envelopes ready for `pop`
    pub fn egress_len(&self) -> usize {
        self.egress.len()
    }

    /// Everything held locally, ingress plus egress
    pub fn local_len(&self) -> usize {
        self.ingress.len() + self.egress.len()
    }

    /// Payloads that exist nowhere but here: ingress plus envelopes that were
    /// promoted locally. Remote envelopes are left in egress; the remote
    /// queue redelivers them after the visibility timeout.
    pub fn take_unsent(&mut self) -> VecDeque<Vec<u8>> {
        let mut unsent = VecDeque::with_capacity(self.local_len());
        let (local, remote): (VecDeque<_>, VecDeque<_>) =
            mem::take(&mut self.egress).into_iter().partition(Envelope::is_local);
        self.egress = remote;
        unsent.extend(local.into_iter().map(|envelope| envelope.payload));
        unsent.extend(self.ingress.drain(..));
        unsent
    }
}
