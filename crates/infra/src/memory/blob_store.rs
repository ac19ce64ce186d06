//! In-process overflow store, one container per queue name

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use spillway_core::remote::{BlobService, OverflowStore, RemoteError, RemoteResult};
use tracing::debug;

#[derive(Default)]
pub struct InMemoryBlobStore {
    name: String,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing_puts: Mutex<Vec<RemoteError>>,
    puts: AtomicU64,
    deleted: AtomicBool,
}

impl InMemoryBlobStore {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Successful `put` calls so far
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    /// Drop a blob behind the queue's back
    pub fn remove(&self, key: &str) -> bool {
        self.blobs.lock().remove(key).is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Fail the next `count` puts with a retryable error
    pub fn fail_next_puts(&self, count: usize) {
        let mut failing = self.failing_puts.lock();
        failing.extend(std::iter::repeat(RemoteError::Unavailable("injected fault".into())).take(count));
    }

    fn ensure_live(&self) -> RemoteResult<()> {
        if self.is_deleted() {
            return Err(RemoteError::NotFound(format!("container {} does not exist", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl OverflowStore for InMemoryBlobStore {
    async fn exists(&self, key: &str) -> RemoteResult<bool> {
        self.ensure_live()?;
        Ok(self.blobs.lock().contains_key(key))
    }

    async fn put(&self, key: &str, payload: &[u8]) -> RemoteResult<()> {
        self.ensure_live()?;
        if let Some(error) = self.failing_puts.lock().pop() {
            return Err(error);
        }
        self.blobs.lock().insert(key.to_string(), payload.to_vec());
        self.puts.fetch_add(1, Ordering::Relaxed);
        debug!(container = %self.name, key, size = payload.len(), "Blob stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.ensure_live()?;
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        self.ensure_live()?;
        self.blobs.lock().remove(key);
        Ok(())
    }

    async fn delete_container(&self) -> RemoteResult<()> {
        self.blobs.lock().clear();
        self.deleted.store(true, Ordering::Release);
        debug!(container = %self.name, "Container deleted");
        Ok(())
    }
}

/// Hands out one container per name, re-creating deleted ones on open
#[derive(Default)]
pub struct InMemoryBlobService {
    containers: Mutex<HashMap<String, Arc<InMemoryBlobStore>>>,
}

impl InMemoryBlobService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self, name: &str) -> Option<Arc<InMemoryBlobStore>> {
        self.containers.lock().get(name).cloned()
    }
}

#[async_trait]
impl BlobService for InMemoryBlobService {
    async fn open_container(&self, name: &str) -> RemoteResult<Arc<dyn OverflowStore>> {
        let mut containers = self.containers.lock();
        let live = containers.get(name).filter(|store| !store.is_deleted()).cloned();
        let store = match live {
            Some(store) => store,
            None => {
                let store = Arc::new(InMemoryBlobStore::new(name));
                containers.insert(name.to_string(), Arc::clone(&store));
                store
            }
        };
        Ok(store as Arc<dyn OverflowStore>)
    }
}
