//! One-shot neighbor timers
//!
//! Every entry owns at most one pending timer. Arming replaces the previous
//! one and bumps a per-key generation; a firing that arrives with an old
//! generation (already queued when it was replaced) is discarded.

use crate::types::NeighborKey;
use crate::worker::InterfaceEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;
use tracing::trace;

/// Timer backend used by an interface
pub trait TimerService: Send {
    /// Arm (or re-arm) the timer for `key`, returning its generation
    fn arm(&mut self, key: NeighborKey, after: Duration) -> u64;

    /// Cancel any pending timer for `key`
    fn cancel(&mut self, key: &NeighborKey);

    /// Consume a firing. Returns false for a superseded or cancelled timer.
    fn fired(&mut self, key: &NeighborKey, generation: u64) -> bool;

    /// Number of timers currently pending
    fn pending(&self) -> usize;
}

/// Timers backed by tokio tasks that post into the interface event queue
pub struct TokioTimers {
    queue: WeakSender<InterfaceEvent>,
    pending: HashMap<NeighborKey, (u64, JoinHandle<()>)>,
    next_generation: u64,
}

impl TokioTimers {
    pub fn new(queue: WeakSender<InterfaceEvent>) -> Self {
        Self {
            queue,
            pending: HashMap::new(),
            next_generation: 1,
        }
    }
}

impl TimerService for TokioTimers {
    fn arm(&mut self, key: NeighborKey, after: Duration) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        let queue = self.queue.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // Interface is shutting down when the queue is gone
            if let Some(tx) = queue.upgrade() {
                let _ = tx.send(InterfaceEvent::TimerExpired { key, generation }).await;
            }
        });

        if let Some((_, old)) = self.pending.insert(key, (generation, task)) {
            old.abort();
        }
        trace!(neighbor = %key, generation, after_ms = after.as_millis() as u64, "Armed timer");
        generation
    }

    fn cancel(&mut self, key: &NeighborKey) {
        if let Some((_, task)) = self.pending.remove(key) {
            task.abort();
        }
    }

    fn fired(&mut self, key: &NeighborKey, generation: u64) -> bool {
        match self.pending.get(key) {
            Some((current, _)) if *current == generation => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, (_, task)) in self.pending.drain() {
            task.abort();
        }
    }
}

/// Timers that never fire on their own; tests fire them explicitly.
///
/// Clones share state, so a test can keep one clone while the interface owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimers {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    armed: HashMap<NeighborKey, (u64, Duration)>,
    next_generation: u64,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation and delay currently armed for `key`
    pub fn armed(&self, key: &NeighborKey) -> Option<(u64, Duration)> {
        self.inner.lock().armed.get(key).copied()
    }
}

impl TimerService for ManualTimers {
    fn arm(&mut self, key: NeighborKey, after: Duration) -> u64 {
        let mut state = self.inner.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.armed.insert(key, (generation, after));
        generation
    }

    fn cancel(&mut self, key: &NeighborKey) {
        self.inner.lock().armed.remove(key);
    }

    fn fired(&mut self, key: &NeighborKey, generation: u64) -> bool {
        let mut state = self.inner.lock();
        match state.armed.get(key) {
            Some((current, _)) if *current == generation => {
                state.armed.remove(key);
                true
            }
            _ => false,
        }
    }

    fn pending(&self) -> usize {
        self.inner.lock().armed.len()
    }
}
