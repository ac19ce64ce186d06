//! Lock-guarded state with an explicit FIFO wait list
//!
//! [`SyncCore::wait`] gives up the state lock, parks the caller on its own
//! wait slot and re-acquires the lock once woken or once the deadline
//! passes. Callers re-check their condition in a loop after every wait.
//!
//! Each waiter owns a slot holding a [`Notify`]. [`SyncCore::wake_one`]
//! pops the oldest slot, so wake-ups are handed out in arrival order. A
//! waiter whose future is dropped after being picked passes the wake on to
//! the next slot, so a cancelled consumer never swallows a push.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::Instant;

/// Why [`SyncCore::wait`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A wake was delivered to this waiter
    Woken,
    /// The deadline passed first
    TimedOut,
}

#[derive(Debug, Default)]
struct WaitSlot {
    notify: Notify,
    woken: AtomicBool,
}

/// State `S` behind an async mutex, plus the consumers parked on it
#[derive(Debug)]
pub struct SyncCore<S> {
    state: Mutex<S>,
    waiters: parking_lot::Mutex<VecDeque<Arc<WaitSlot>>>,
}

impl<S> SyncCore<S> {
    /// Wrap `state` with an empty wait list
    pub fn new(state: S) -> Self {
        Self { state: Mutex::new(state), waiters: parking_lot::Mutex::new(VecDeque::new()) }
    }

    /// Acquire the state lock
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().await
    }

    /// Run `f` with exclusive access to the state
    pub async fn with_lock<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.state.lock().await;
        f(&mut guard)
    }

    /// Release `guard`, sleep until woken or `deadline`, then re-lock.
    ///
    /// The slot is registered before the lock is released, so a wake issued
    /// by whoever takes the lock next is never missed.
    pub async fn wait<'a>(
        &'a self,
        guard: MutexGuard<'a, S>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, S>, WaitOutcome) {
        let slot = Arc::new(WaitSlot::default());
        self.waiters.lock().push_back(Arc::clone(&slot));
        let mut registration = Registration { core: self, slot: Arc::clone(&slot), settled: false };
        drop(guard);

        match deadline {
            Some(deadline) => {
                let _ = tokio::time::timeout_at(deadline, slot.notify.notified()).await;
            }
            None => slot.notify.notified().await,
        }

        let guard = self.state.lock().await;
        let outcome = if registration.settle() { WaitOutcome::Woken } else { WaitOutcome::TimedOut };
        (guard, outcome)
    }

    /// Resume the longest-waiting caller. Returns false when nobody waits.
    pub fn wake_one(&self) -> bool {
        let slot = self.waiters.lock().pop_front();
        match slot {
            Some(slot) => {
                slot.woken.store(true, Ordering::Release);
                slot.notify.notify_one();
                true
            }
            None => false,
        }
    }

    /// Resume every waiter; returns how many were woken
    pub fn wake_all(&self) -> usize {
        let slots: Vec<_> = self.waiters.lock().drain(..).collect();
        for slot in &slots {
            slot.woken.store(true, Ordering::Release);
            slot.notify.notify_one();
        }
        slots.len()
    }

    /// Callers currently parked in [`SyncCore::wait`]
    pub fn num_waiting(&self) -> usize {
        self.waiters.lock().len()
    }
}

/// Removes a slot whose wait ended early and forwards a wake that was
/// delivered to a waiter that will never act on it.
struct Registration<'a, S> {
    core: &'a SyncCore<S>,
    slot: Arc<WaitSlot>,
    settled: bool,
}

impl<S> Registration<'_, S> {
    fn unlink(&self) {
        let mut waiters = self.core.waiters.lock();
        if let Some(pos) = waiters.iter().position(|s| Arc::ptr_eq(s, &self.slot)) {
            waiters.remove(pos);
        }
    }

    /// Leave the wait list; returns whether a wake was delivered. Once
    /// unlinked no further wake can reach the slot.
    fn settle(&mut self) -> bool {
        self.unlink();
        self.settled = true;
        self.slot.woken.load(Ordering::Acquire)
    }
}

impl<S> Drop for Registration<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.unlink();
        if self.slot.woken.load(Ordering::Acquire) {
            self.core.wake_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Validates that a timed wait gives up at its deadline and leaves no
    /// slot behind.
    #[tokio::test]
    async fn test_wait_times_out() {
        let core = SyncCore::new(0u32);
        let guard = core.lock().await;
        let deadline = Instant::now() + Duration::from_millis(20);
        let (_guard, outcome) = core.wait(guard, Some(deadline)).await;
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(core.num_waiting(), 0);
    }

    #[tokio::test]
    async fn test_wake_one_without_waiters() {
        let core = SyncCore::new(());
        assert!(!core.wake_one());
        assert_eq!(core.wake_all(), 0);
    }

    /// Validates FIFO wake order.
    ///
    /// Assertions:
    /// - Two waiters register in order.
    /// - `wake_one` resumes the first one; the second keeps waiting.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_wake_one_is_fifo() {
        let core = Arc::new(SyncCore::new(Vec::<u32>::new()));

        let mut handles = Vec::new();
        for id in 0..2u32 {
            let waiter = Arc::clone(&core);
            handles.push(tokio::spawn(async move {
                let guard = waiter.lock().await;
                let (mut guard, outcome) = waiter.wait(guard, None).await;
                guard.push(id);
                outcome
            }));
            while core.num_waiting() <= id as usize {
                tokio::task::yield_now().await;
            }
        }

        assert!(core.wake_one());
        let first = handles.remove(0).await.unwrap();
        assert_eq!(first, WaitOutcome::Woken);
        assert_eq!(core.with_lock(|order| order.clone()).await, vec![0]);
        assert_eq!(core.num_waiting(), 1);

        core.wake_all();
        handles.remove(0).await.unwrap();
        assert_eq!(core.with_lock(|order| order.clone()).await, vec![0, 1]);
    }

    /// Validates that a wake delivered to a cancelled waiter moves on to the
    /// next waiter.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_waiter_forwards_wake() {
        let core = Arc::new(SyncCore::new(()));

        let cancelled = {
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                let guard = core.lock().await;
                let _ = core.wait(guard, None).await;
            })
        };
        while core.num_waiting() < 1 {
            tokio::task::yield_now().await;
        }

        let survivor = {
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                let guard = core.lock().await;
                core.wait(guard, Some(Instant::now() + Duration::from_secs(5))).await.1
            })
        };
        while core.num_waiting() < 2 {
            tokio::task::yield_now().await;
        }

        // Hold the lock so the first waiter cannot settle before it is aborted.
        let guard = core.lock().await;
        core.wake_one();
        cancelled.abort();
        let _ = cancelled.await;
        drop(guard);

        assert_eq!(survivor.await.unwrap(), WaitOutcome::Woken);
    }
}
