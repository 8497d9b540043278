//! One-shot deletion timers.
//!
//! Each scheduled deletion is a spawned tokio task that sleeps for the
//! retention delay and then runs its action. The request that created the
//! artifact never awaits the task; the scheduler keeps the `JoinHandle` so a
//! timer can be cancelled or replaced.
//!
//! Timers are driven by `tokio::time`, so tests can pause the clock and
//! fast-forward with `tokio::time::advance`.
//!
//! Nothing here is persisted. A process restart drops every outstanding timer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::artifact::ArtifactId;

/// An outstanding timer.
struct Timer {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

type TimerMap = HashMap<ArtifactId, Timer>;

/// Registry of pending deletions keyed by artifact id.
///
/// Cloning is cheap and shares the registry.
#[derive(Clone, Default)]
pub struct CleanupScheduler {
    timers: Arc<Mutex<TimerMap>>,
    generation: Arc<AtomicU64>,
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot timer that runs `action` after `delay`.
    ///
    /// At most one timer is live per id: scheduling an id that already has a
    /// timer replaces it. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, id: ArtifactId, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;
        let timers = Arc::clone(&self.timers);

        // Hold the lock across spawn + insert so a zero-delay timer cannot
        // fire before it is registered.
        let mut map = self.lock();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            {
                let mut map = timers.lock().unwrap_or_else(PoisonError::into_inner);
                match map.get(&id) {
                    Some(timer) if timer.generation == generation => {
                        map.remove(&id);
                    }
                    // Replaced or cancelled while we were waking up
                    _ => return,
                }
            }

            debug!(artifact_id = %id, "Deletion timer fired");
            action.await;
        });

        if let Some(previous) = map.insert(
            id,
            Timer {
                generation,
                deadline,
                handle,
            },
        ) {
            warn!(artifact_id = %id, "Replacing an existing deletion timer");
            previous.handle.abort();
        }
    }

    /// Cancel the timer for `id`. Returns `true` if one was pending.
    pub fn cancel(&self, id: &ArtifactId) -> bool {
        match self.lock().remove(id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer, returning how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Timer> = self.lock().drain().map(|(_, timer)| timer).collect();
        for timer in &drained {
            timer.handle.abort();
        }
        drained.len()
    }

    /// Whether a deletion is still pending for `id`.
    pub fn is_scheduled(&self, id: &ArtifactId) -> bool {
        self.lock().contains_key(id)
    }

    /// When the pending deletion for `id` will fire.
    pub fn deadline(&self, id: &ArtifactId) -> Option<Instant> {
        self.lock().get(id).map(|timer| timer.deadline)
    }

    /// Number of pending deletions.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, TimerMap> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
