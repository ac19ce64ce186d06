//! In-process queue service with visibility timeouts.
//!
//! Behaves like a hosted at-least-once queue closely enough to exercise the
//! buffered queue end to end: received messages become invisible until
//! deleted or until their visibility timeout lapses, batch calls are capped
//! at ten entries, oversize bodies are refused per entry, and recently
//! deleted names can be held back from re-creation. Faults can be injected
//! per operation.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use spillway_core::remote::{
    BatchFailure, QueueAttributes, QueueService, RemoteError, RemoteQueue, RemoteResult,
};
use spillway_domain::constants::BATCH_LIMIT;
use spillway_domain::{ReceiptHandle, ReceivedMessage};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Largest body the service accepts, in bytes
pub const MAX_BODY_BYTES: usize = 262_144;
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote calls that can be counted or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueOperation {
    Send,
    Receive,
    Delete,
    Count,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    body: String,
}

#[derive(Default)]
struct QueueState {
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<String, (StoredMessage, Instant)>,
    next_id: u64,
    deleted_at: Option<Instant>,
    faults: HashMap<QueueOperation, VecDeque<RemoteError>>,
    sent_bodies: Vec<String>,
}

impl QueueState {
    /// Return messages whose visibility timeout lapsed to the front
    fn expire(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        let mut returned: Vec<StoredMessage> = expired
            .into_iter()
            .filter_map(|receipt| self.in_flight.remove(&receipt).map(|(message, _)| message))
            .collect();
        returned.sort_by_key(|message| message.id);
        for message in returned.into_iter().rev() {
            self.visible.push_front(message);
        }
    }
}

pub struct InMemoryQueue {
    name: String,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    calls: Mutex<HashMap<QueueOperation, u64>>,
}

impl InMemoryQueue {
    fn new(name: &str, visibility_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Fail the next `count` calls of `operation` with a retryable error
    pub fn fail_next(&self, operation: QueueOperation, count: usize) {
        self.inject(operation, RemoteError::Unavailable("injected fault".into()), count);
    }

    /// Fail the next `count` calls of `operation` with `error`
    pub fn inject(&self, operation: QueueOperation, error: RemoteError, count: usize) {
        let mut state = self.state.lock();
        let faults = state.faults.entry(operation).or_default();
        faults.extend(std::iter::repeat(error).take(count));
    }

    pub fn calls(&self, operation: QueueOperation) -> u64 {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Bodies accepted by `send_batch`, in order
    pub fn sent_bodies(&self) -> Vec<String> {
        self.state.lock().sent_bodies.clone()
    }

    /// Place a raw body on the queue, bypassing `send_batch`
    pub fn enqueue_raw(&self, body: impl Into<String>) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.visible.push_back(StoredMessage { id, body: body.into() });
    }

    pub fn visible_count(&self) -> usize {
        self.state.lock().visible.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    fn deleted_at(&self) -> Option<Instant> {
        self.state.lock().deleted_at
    }

    fn begin(&self, operation: QueueOperation) -> RemoteResult<()> {
        *self.calls.lock().entry(operation).or_default() += 1;

        let mut state = self.state.lock();
        if state.deleted_at.is_some() {
            return Err(RemoteError::NotFound(format!("queue {} does not exist", self.name)));
        }
        if let Some(error) = state.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            debug!(queue = %self.name, ?operation, %error, "Injected fault");
            return Err(error);
        }
        Ok(())
    }

    fn mark_deleted(&self) {
        let mut state = self.state.lock();
        state.deleted_at.get_or_insert_with(Instant::now);
        state.visible.clear();
        state.in_flight.clear();
    }
}

fn check_batch_len(len: usize) -> RemoteResult<()> {
    if len > BATCH_LIMIT {
        return Err(RemoteError::Rejected(format!(
            "batch of {len} entries exceeds the limit of {BATCH_LIMIT}"
        )));
    }
    Ok(())
}

#[async_trait]
impl RemoteQueue for InMemoryQueue {
    async fn url(&self) -> RemoteResult<String> {
        Ok(format!("memory://queues/{}", self.name))
    }

    async fn send_batch(&self, bodies: &[String]) -> RemoteResult<Vec<BatchFailure>> {
        self.begin(QueueOperation::Send)?;
        check_batch_len(bodies.len())?;

        let mut state = self.state.lock();
        let mut failures = Vec::new();
        for (index, body) in bodies.iter().enumerate() {
            if body.len() > MAX_BODY_BYTES {
                failures.push(BatchFailure {
                    index,
                    message: format!("body of {} bytes exceeds {MAX_BODY_BYTES}", body.len()),
                });
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.sent_bodies.push(body.clone());
            state.visible.push_back(StoredMessage { id, body: body.clone() });
        }
        Ok(failures)
    }

    async fn receive_batch(&self, max: usize) -> RemoteResult<Vec<ReceivedMessage>> {
        self.begin(QueueOperation::Receive)?;
        check_batch_len(max)?;

        let now = Instant::now();
        let mut state = self.state.lock();
        state.expire(now);

        let mut received = Vec::new();
        while received.len() < max {
            let Some(message) = state.visible.pop_front() else { break };
            let receipt = format!("{}-{}", message.id, Uuid::new_v4().simple());
            received.push(ReceivedMessage {
                receipt: ReceiptHandle::new(receipt.clone()),
                body: message.body.clone(),
            });
            state.in_flight.insert(receipt, (message, now + self.visibility_timeout));
        }
        Ok(received)
    }

    async fn delete_batch(&self, receipts: &[ReceiptHandle]) -> RemoteResult<Vec<BatchFailure>> {
        self.begin(QueueOperation::Delete)?;
        check_batch_len(receipts.len())?;

        let mut state = self.state.lock();
        for receipt in receipts {
            // Stale receipts are accepted and ignored.
            state.in_flight.remove(receipt.as_str());
        }
        Ok(Vec::new())
    }

    async fn approximate_count(&self) -> RemoteResult<u64> {
        self.begin(QueueOperation::Count)?;
        let mut state = self.state.lock();
        state.expire(Instant::now());
        Ok(state.visible.len() as u64)
    }

    async fn delete_queue(&self) -> RemoteResult<()> {
        self.mark_deleted();
        debug!(queue = %self.name, "Queue deleted");
        Ok(())
    }
}

#[derive(Default)]
struct ServiceState {
    queues: HashMap<String, Arc<InMemoryQueue>>,
    deleted_at: HashMap<String, Instant>,
}

/// Registry of named in-memory queues
#[derive(Default)]
pub struct InMemoryQueueService {
    state: Mutex<ServiceState>,
    recreate_cooldown: Duration,
    requests: AtomicU64,
}

impl InMemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to re-create a name within `cooldown` of deleting it
    pub fn with_recreate_cooldown(mut self, cooldown: Duration) -> Self {
        self.recreate_cooldown = cooldown;
        self
    }

    /// Look a queue up by its resolved name, ignoring deleted ones
    pub fn queue(&self, name: &str) -> Option<Arc<InMemoryQueue>> {
        let mut state = self.state.lock();
        Self::live(&mut state, name)
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut state = self.state.lock();
        let names: Vec<String> = state.queues.keys().cloned().collect();
        names.into_iter().filter(|name| Self::live(&mut state, name).is_some()).collect()
    }

    /// Service-level calls (find and create)
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn live(state: &mut ServiceState, name: &str) -> Option<Arc<InMemoryQueue>> {
        let queue = state.queues.get(name).cloned()?;
        if let Some(deleted_at) = queue.deleted_at() {
            state.queues.remove(name);
            state.deleted_at.insert(name.to_string(), deleted_at);
            return None;
        }
        Some(queue)
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn find_queue(&self, name: &str) -> RemoteResult<Option<Arc<dyn RemoteQueue>>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        Ok(Self::live(&mut state, name).map(|queue| queue as Arc<dyn RemoteQueue>))
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
    ) -> RemoteResult<Arc<dyn RemoteQueue>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if let Some(existing) = Self::live(&mut state, name) {
            return Ok(existing as Arc<dyn RemoteQueue>);
        }
        if let Some(deleted_at) = state.deleted_at.get(name) {
            if deleted_at.elapsed() < self.recreate_cooldown {
                return Err(RemoteError::Rejected(format!(
                    "queue {name} was deleted recently; wait before re-creating it"
                )));
            }
        }

        let visibility_timeout = attributes
            .visibility_timeout_secs
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT);
        let queue = Arc::new(InMemoryQueue::new(name, visibility_timeout));
        state.queues.insert(name.to_string(), Arc::clone(&queue));
        debug!(queue = %name, ?visibility_timeout, "Queue created");
        Ok(queue)
    }
}
