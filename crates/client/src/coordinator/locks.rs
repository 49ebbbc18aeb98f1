//! Per-URL single-flight registry.
//!
//! Each URL gets a lazily created [`UrlSlot`]. The registry map sits behind
//! one short-held lock used only to find or create a slot; the slot's own lock
//! is held for the whole network round trip. Slots are never removed, so the
//! map grows with the number of distinct URLs seen by the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// Registry of per-URL slots, owned by one coordinator.
#[derive(Debug, Default)]
pub struct UrlLocks {
    slots: Mutex<HashMap<String, Arc<UrlSlot>>>,
}

impl UrlLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the slot for `url`.
    ///
    /// The registry lock is released before returning; callers wait on the
    /// slot, never on the registry.
    pub async fn slot(&self, url: &str) -> Arc<UrlSlot> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(url) {
            return Arc::clone(slot);
        }
        let slot = Arc::new(UrlSlot::default());
        slots.insert(url.to_string(), Arc::clone(&slot));
        slot
    }

    /// Number of URLs that have ever had a slot.
    pub async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[derive(Debug, Default)]
struct FlightState {
    last_failed: bool,
}

/// Mutual exclusion plus the outcome of the most recent flight for one URL.
#[derive(Debug, Default)]
pub struct UrlSlot {
    completed: AtomicU64,
    state: Mutex<FlightState>,
}

/// What a caller gets after waiting on a slot.
#[derive(Debug)]
pub enum Entry<'a> {
    /// Nobody finished a flight while this caller waited: it must do the work
    /// and report back through the guard.
    Lead(FlightGuard<'a>),
    /// A flight completed while this caller waited; reuse its outcome instead
    /// of going to the network again.
    Shared { failed: bool },
}

impl UrlSlot {
    /// Wait for exclusive access to this URL.
    pub async fn enter(&self) -> Entry<'_> {
        let observed = self.completed.load(Ordering::Acquire);
        let guard = self.state.lock().await;
        if self.completed.load(Ordering::Acquire) != observed {
            return Entry::Shared { failed: guard.last_failed };
        }
        Entry::Lead(FlightGuard { slot: self, state: guard })
    }

    /// Number of flights that have reported an outcome.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

/// Exclusive hold on a URL for the duration of one flight.
///
/// Dropping the guard without [`FlightGuard::finish`] (e.g. the caller was
/// cancelled) releases the lock without publishing an outcome, so the next
/// waiter leads its own flight.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    slot: &'a UrlSlot,
    state: MutexGuard<'a, FlightState>,
}

impl FlightGuard<'_> {
    /// Publish the outcome to everyone queued behind this flight.
    pub fn finish(mut self, failed: bool) {
        self.state.last_failed = failed;
        self.slot.completed.fetch_add(1, Ordering::AcqRel);
    }
}
