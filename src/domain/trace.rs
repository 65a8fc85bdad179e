//! Ordered marker trace used to observe dispatch behavior.
//!
//! An [`EventTrace`] is an explicit fixture: whoever runs a scenario owns
//! one, hands clones of its `Arc` to the handlers that should write to it,
//! and calls [`EventTrace::reset`] between scenarios.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Numeric identity of an OS thread, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ThreadToken(u64);

impl ThreadToken {
    /// Token for the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self(THREAD_TOKEN.with(|token| *token))
    }

    /// Returns the numeric ident.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One appended marker.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// Marker text.
    pub marker: String,
    /// Thread that appended it.
    pub thread: ThreadToken,
    /// Wall-clock time of the append.
    pub recorded_at: DateTime<Utc>,
}

/// Bounded, thread-safe marker log.
///
/// Once `capacity` entries are held the oldest entry is dropped on append.
#[derive(Debug)]
pub struct EventTrace {
    entries: Mutex<VecDeque<TraceEntry>>,
    capacity: usize,
}

impl EventTrace {
    /// Creates an empty trace holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends `marker`, stamped with the calling thread.
    pub fn append(&self, marker: impl Into<String>) {
        let entry = TraceEntry {
            marker: marker.into(),
            thread: ThreadToken::current(),
            recorded_at: Utc::now(),
        };
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Marker texts in append order.
    #[must_use]
    pub fn markers(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.marker.clone())
            .collect()
    }

    /// Snapshot of all entries in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Thread of the most recent entry with the given marker.
    #[must_use]
    pub fn last_thread_of(&self, marker: &str) -> Option<ThreadToken> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|entry| entry.marker == marker)
            .map(|entry| entry.thread)
    }

    /// Removes every entry.
    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn markers_keep_append_order() {
        let trace = EventTrace::new(16);
        trace.append("a");
        trace.append("b");
        trace.append("c");
        assert_eq!(trace.markers(), vec!["a", "b", "c"]);
    }

    #[test]
    fn capacity_drops_oldest() {
        let trace = EventTrace::new(2);
        trace.append("a");
        trace.append("b");
        trace.append("c");
        assert_eq!(trace.markers(), vec!["b", "c"]);
    }

    #[test]
    fn reset_clears() {
        let trace = EventTrace::new(4);
        trace.append("a");
        trace.reset();
        assert!(trace.is_empty());
        assert_eq!(trace.last_thread_of("a"), None);
    }

    #[test]
    fn tokens_are_stable_per_thread_and_distinct_across_threads() {
        let here = ThreadToken::current();
        assert_eq!(here, ThreadToken::current());
        let Ok(there) = std::thread::spawn(ThreadToken::current).join() else {
            panic!("thread panicked");
        };
        assert_ne!(here, there);
        assert!(here.as_u64() > 0);
    }

    #[test]
    fn records_appending_thread() {
        let trace = std::sync::Arc::new(EventTrace::new(4));
        trace.append("here");
        let remote = std::sync::Arc::clone(&trace);
        let joined = std::thread::spawn(move || remote.append("there")).join();
        assert!(joined.is_ok());

        assert_eq!(trace.last_thread_of("here"), Some(ThreadToken::current()));
        assert_ne!(trace.last_thread_of("there"), Some(ThreadToken::current()));
        assert_eq!(trace.len(), 2);
    }
}
