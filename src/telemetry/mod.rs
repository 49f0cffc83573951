//! Diagnostics collector.
//!
//! Each governor owns one collector. It keeps a bounded history of
//! [`GovernorEvent`]s for snapshot export and fans them out over a broadcast
//! channel for live consumers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub mod events;

pub use events::GovernorEvent;

/// Snapshot of collector state for export.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticsSnapshot {
    pub recent: Vec<GovernorEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct DiagnosticsCollector {
    tx: broadcast::Sender<GovernorEvent>,
    history: Mutex<VecDeque<GovernorEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl DiagnosticsCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: GovernorEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GovernorEvent> {
        self.tx.subscribe()
    }

    /// Live event stream; lagged events are skipped.
    pub fn stream(&self) -> impl Stream<Item = GovernorEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        DiagnosticsSnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for DiagnosticsCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}
