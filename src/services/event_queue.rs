//! In-memory coalescing event queue.
//!
//! FIFO among distinct identity keys, with at most one in-flight entry per
//! key: an event whose key is already `Queued` or `Processing` is dropped on
//! enqueue. Once the in-flight entry is marked `Done`, the key is admitted
//! again. The queue is not durable; pending entries are lost on shutdown.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::domain::models::{EntryState, Event, QueueEntry};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueEntry>,
    /// Lifecycle of every key that is queued or handed to a consumer.
    /// Keys are removed once their entry is done.
    in_flight: HashMap<String, EntryState>,
}

/// Multi-producer, single-consumer event buffer.
#[derive(Default)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Notify,
    admitted: AtomicU64,
    dropped: AtomicU64,
}

impl EventQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event unless its identity key is already in flight.
    ///
    /// Returns true if the event was admitted, false if it was coalesced
    /// into the in-flight entry and dropped.
    pub async fn enqueue(&self, event: Event) -> bool {
        let entry = QueueEntry::new(event);
        {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.in_flight.get(&entry.key) {
                if existing.is_in_flight() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        identity_key = %entry.key,
                        event_type = %entry.event.event_type,
                        existing_state = ?existing,
                        "duplicate event dropped"
                    );
                    return false;
                }
            }
            state.in_flight.insert(entry.key.clone(), EntryState::Queued);
            state.pending.push_back(entry);
        }
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        true
    }

    /// Wait until an entry is available, then remove and return the head.
    ///
    /// Cancel-safe: if the future is dropped, no entry is lost.
    pub async fn dequeue(&self) -> QueueEntry {
        loop {
            if let Some(entry) = self.try_dequeue().await {
                return entry;
            }
            self.available.notified().await;
        }
    }

    /// Remove and return the head entry without waiting.
    pub async fn try_dequeue(&self) -> Option<QueueEntry> {
        self.state.lock().await.pending.pop_front()
    }

    /// Record that the consumer started working on `entry`.
    pub async fn mark_processing(&self, entry: &mut QueueEntry) {
        let mut state = self.state.lock().await;
        state.in_flight.insert(entry.key.clone(), EntryState::Processing);
        entry.state = EntryState::Processing;
    }

    /// Record that `entry` finished; its key may be admitted again.
    pub async fn mark_done(&self, entry: &mut QueueEntry) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&entry.key);
        entry.state = EntryState::Done;
    }

    /// Discard every pending entry. Entries already handed to a consumer are
    /// unaffected. Returns how many were discarded.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let discarded: Vec<QueueEntry> = state.pending.drain(..).collect();
        for entry in &discarded {
            state.in_flight.remove(&entry.key);
        }
        discarded.len()
    }

    /// Number of entries waiting to be dequeued.
    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// True when nothing is waiting to be dequeued.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current lifecycle state for an identity key, if it is in flight.
    pub async fn state_of(&self, key: &str) -> Option<EntryState> {
        self.state.lock().await.in_flight.get(key).copied()
    }

    /// Total events admitted since creation.
    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Total duplicate events dropped since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
