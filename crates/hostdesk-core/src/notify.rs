//! Notification sink interface and delivery wrappers.
//!
//! The component that turns a confirmed-new batch into operator-visible
//! effects (toasts, sound, badge counts) lives outside this crate. Here we
//! define the seam it implements, the batch payload, a tracing-backed default
//! used by the CLI, a throttling wrapper, and a collecting sink for tests.
//!
//! A detector invokes its sink at most once per cycle, with the whole batch
//! ordered by creation time.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::entity::{EntityKind, Watched};

/// A batch of confirmed-new entities from one detection cycle.
#[derive(Debug, Clone)]
pub struct NewEntityBatch<T> {
    /// Which feed produced the batch.
    pub kind: EntityKind,
    /// The entities, ordered by `created_at` ascending.
    pub entities: Vec<T>,
    /// When the detector confirmed the batch.
    pub detected_at: DateTime<Utc>,
}

impl<T> NewEntityBatch<T> {
    /// Number of entities in the batch. Emitted batches are never empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when the batch carries no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Receives confirmed-new batches.
pub trait NotificationSink<T>: Send + Sync {
    /// Handle one batch. Called at most once per detection cycle.
    fn notify(&self, batch: &NewEntityBatch<T>);
}

/// Default sink: structured log line per batch. Entity identifiers are
/// logged; domain payloads are not.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl<T: Watched> NotificationSink<T> for TracingSink {
    fn notify(&self, batch: &NewEntityBatch<T>) {
        let ids: Vec<&str> = batch.entities.iter().map(Watched::id).collect();
        info!(
            entity_kind = %batch.kind,
            batch_len = batch.len(),
            ids = ?ids,
            "new entities detected"
        );
    }
}

struct ThrottleState {
    last_sent: Option<Instant>,
    suppressed: u64,
}

/// Enforces a minimum interval between deliveries to the wrapped sink.
///
/// Suppressed batches are counted and logged, not re-queued: the entities
/// stay marked seen, and freshness is best-effort. Use this for noisy
/// channels (sound alerts), not for the primary operator feed.
pub struct ThrottledSink<S> {
    inner: S,
    min_interval: Duration,
    state: Mutex<ThrottleState>,
}

impl<S> ThrottledSink<S> {
    /// Wrap a sink with a minimum interval between deliveries.
    #[must_use]
    pub fn new(inner: S, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            state: Mutex::new(ThrottleState {
                last_sent: None,
                suppressed: 0,
            }),
        }
    }

    /// Number of batches suppressed so far.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).suppressed
    }
}

impl<T, S> NotificationSink<T> for ThrottledSink<S>
where
    S: NotificationSink<T>,
{
    fn notify(&self, batch: &NewEntityBatch<T>) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let within_window = state
            .last_sent
            .is_some_and(|last| now.duration_since(last) < self.min_interval);

        if within_window {
            state.suppressed += 1;
            debug!(
                entity_kind = %batch.kind,
                batch_len = batch.len(),
                suppressed_total = state.suppressed,
                "notification batch throttled"
            );
            return;
        }

        state.last_sent = Some(now);
        drop(state);
        self.inner.notify(batch);
    }
}

/// Records every delivered batch. Used by tests and `watch --dry-run`.
pub struct CollectingSink<T> {
    batches: Mutex<Vec<NewEntityBatch<T>>>,
}

impl<T> CollectingSink<T> {
    /// Create an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    /// All batches delivered so far.
    #[must_use]
    pub fn batches(&self) -> Vec<NewEntityBatch<T>>
    where
        T: Clone,
    {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of batches delivered so far.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<T> Default for CollectingSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> NotificationSink<T> for CollectingSink<T> {
    fn notify(&self, batch: &NewEntityBatch<T>) {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(batch.clone());
    }
}
