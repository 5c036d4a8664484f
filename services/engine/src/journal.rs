//! Append-only execution journal
//!
//! Single global log of engine events, ordered by the event sequence the
//! journal assigns at append time. A batch is appended atomically, so the
//! events of one submission are contiguous and never interleave with
//! another submission's events. Consumers either page through
//! [`ExecutionJournal::events_from`] after a restart or take a live tail
//! via [`ExecutionJournal::subscribe`].

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::events::EngineEvent;

/// Append-only, sequence-ordered event log
#[derive(Debug)]
pub struct ExecutionJournal {
    inner: Mutex<JournalInner>,
}

#[derive(Debug)]
struct JournalInner {
    events: Vec<EngineEvent>,
    next_seq: u64,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl ExecutionJournal {
    /// Empty journal with room for `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                events: Vec::with_capacity(capacity),
                next_seq: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Append a batch, assigning consecutive event sequences
    ///
    /// Returns the stamped events. Live subscribers observe them in the
    /// same order; a disconnected subscriber is dropped.
    pub fn append_batch(&self, mut batch: Vec<EngineEvent>) -> Vec<EngineEvent> {
        let mut inner = self.inner.lock();
        for event in &mut batch {
            event.set_seq(inner.next_seq);
            inner.next_seq += 1;
        }
        inner
            .subscribers
            .retain(|tx| batch.iter().all(|event| tx.send(event.clone()).is_ok()));
        inner.events.extend(batch.iter().cloned());
        batch
    }

    /// Events at or after `seq`, for restartable consumers
    ///
    /// A consumer that remembers its last-seen sequence resumes with
    /// `events_from(last_seen + 1)`; redelivery is idempotent by sequence.
    #[must_use]
    pub fn events_from(&self, seq: u64) -> Vec<EngineEvent> {
        let inner = self.inner.lock();
        // sequences are dense and 1-based, so the offset is direct
        let start = usize::try_from(seq.saturating_sub(1)).unwrap_or(usize::MAX);
        if start >= inner.events.len() {
            return Vec::new();
        }
        inner.events[start..].to_vec()
    }

    /// Highest sequence assigned so far (0 when empty)
    #[must_use]
    pub fn latest_seq(&self) -> u64 {
        self.inner.lock().next_seq - 1
    }

    /// Number of journaled events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// True when nothing has been journaled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live tail of the journal from this point forward
    ///
    /// The channel is unbounded; a slow consumer never stalls appends.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = channel::unbounded();
        let mut inner = self.inner.lock();
        inner.subscribers.push(tx);
        debug!(subscribers = inner.subscribers.len(), "journal subscriber attached");
        rx
    }
}
