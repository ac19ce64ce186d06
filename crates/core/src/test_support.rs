//! Minimal collaborator doubles for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use spillway_domain::{ReceiptHandle, ReceivedMessage};

use crate::remote::ports::{
    BatchFailure, BlobService, OverflowStore, QueueAttributes, QueueService, RemoteError,
    RemoteQueue, RemoteResult,
};

#[derive(Default)]
struct FakeQueueState {
    visible: VecDeque<(String, String)>,
    in_flight: HashMap<String, String>,
    next_id: u64,
    send_sizes: Vec<usize>,
    sent: Vec<String>,
    failing_calls: u32,
    refuse_entries: usize,
    failing_queue_deletes: u32,
    receives_started: usize,
    deleted: bool,
}

/// Queue without visibility timeouts: received messages stay in flight
/// until deleted.
#[derive(Default)]
pub struct FakeQueue {
    state: Mutex<FakeQueueState>,
    receive_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeQueue {
    pub fn fail_next_calls(&self, calls: u32) {
        self.state.lock().failing_calls = calls;
    }

    pub fn fail_next_queue_deletes(&self, calls: u32) {
        self.state.lock().failing_queue_deletes = calls;
    }

    /// Hold every receive until the returned semaphore gets a permit
    pub fn gate_receives(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.receive_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn receives_started(&self) -> usize {
        self.state.lock().receives_started
    }

    pub fn refuse_next_send_entries(&self, entries: usize) {
        self.state.lock().refuse_entries = entries;
    }

    pub fn inject_body(&self, body: String) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("m-{}", state.next_id);
        state.visible.push_back((id, body));
    }

    pub fn send_sizes(&self) -> Vec<usize> {
        self.state.lock().send_sizes.clone()
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub fn visible(&self) -> usize {
        self.state.lock().visible.len()
    }

    pub fn total(&self) -> usize {
        let state = self.state.lock();
        state.visible.len() + state.in_flight.len()
    }

    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    fn fault(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        if state.failing_calls > 0 {
            state.failing_calls -= 1;
            return Err(RemoteError::Unavailable("injected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteQueue for FakeQueue {
    async fn url(&self) -> RemoteResult<String> {
        Ok("fake://queue".to_string())
    }

    async fn send_batch(&self, bodies: &[String]) -> RemoteResult<Vec<BatchFailure>> {
        self.fault()?;
        let mut state = self.state.lock();
        state.send_sizes.push(bodies.len());
        let refuse = std::mem::take(&mut state.refuse_entries).min(bodies.len());
        let accepted = bodies.len() - refuse;
        let mut failures = Vec::new();
        for (index, body) in bodies.iter().enumerate() {
            if index >= accepted {
                failures.push(BatchFailure { index, message: "refused".into() });
                continue;
            }
            state.next_id += 1;
            let id = format!("m-{}", state.next_id);
            state.sent.push(body.clone());
            state.visible.push_back((id, body.clone()));
        }
        Ok(failures)
    }

    async fn receive_batch(&self, max: usize) -> RemoteResult<Vec<ReceivedMessage>> {
        self.state.lock().receives_started += 1;
        let gate = self.receive_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.fault()?;
        let mut state = self.state.lock();
        let mut out = Vec::new();
        while out.len() < max.min(10) {
            let Some((id, body)) = state.visible.pop_front() else { break };
            state.in_flight.insert(id.clone(), body.clone());
            out.push(ReceivedMessage { receipt: ReceiptHandle::new(id), body });
        }
        Ok(out)
    }

    async fn delete_batch(&self, receipts: &[ReceiptHandle]) -> RemoteResult<Vec<BatchFailure>> {
        self.fault()?;
        let mut state = self.state.lock();
        for receipt in receipts {
            state.in_flight.remove(receipt.as_str());
        }
        Ok(Vec::new())
    }

    async fn approximate_count(&self) -> RemoteResult<u64> {
        self.fault()?;
        Ok(self.state.lock().visible.len() as u64)
    }

    async fn delete_queue(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        if state.failing_queue_deletes > 0 {
            state.failing_queue_deletes -= 1;
            return Err(RemoteError::Unavailable("injected".into()));
        }
        state.visible.clear();
        state.in_flight.clear();
        state.deleted = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<usize>,
}

impl FakeStore {
    pub fn puts(&self) -> usize {
        *self.puts.lock()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }
}

#[async_trait]
impl OverflowStore for FakeStore {
    async fn exists(&self, key: &str) -> RemoteResult<bool> {
        Ok(self.blobs.lock().contains_key(key))
    }

    async fn put(&self, key: &str, payload: &[u8]) -> RemoteResult<()> {
        *self.puts.lock() += 1;
        self.blobs.lock().insert(key.to_string(), payload.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        self.blobs.lock().remove(key);
        Ok(())
    }

    async fn delete_container(&self) -> RemoteResult<()> {
        self.blobs.lock().clear();
        Ok(())
    }
}

/// Hands out one shared fake queue and store regardless of name
#[derive(Default)]
pub struct FakeServices {
    pub queue: Arc<FakeQueue>,
    pub store: Arc<FakeStore>,
    pub existing: Mutex<bool>,
}

#[async_trait]
impl QueueService for FakeServices {
    async fn find_queue(&self, _name: &str) -> RemoteResult<Option<Arc<dyn RemoteQueue>>> {
        if *self.existing.lock() {
            Ok(Some(Arc::clone(&self.queue) as Arc<dyn RemoteQueue>))
        } else {
            Ok(None)
        }
    }

    async fn create_queue(
        &self,
        _name: &str,
        _attributes: &QueueAttributes,
    ) -> RemoteResult<Arc<dyn RemoteQueue>> {
        *self.existing.lock() = true;
        Ok(Arc::clone(&self.queue) as Arc<dyn RemoteQueue>)
    }
}

#[async_trait]
impl BlobService for FakeServices {
    async fn open_container(&self, _name: &str) -> RemoteResult<Arc<dyn OverflowStore>> {
        Ok(Arc::clone(&self.store) as Arc<dyn OverflowStore>)
    }
}
