//! The generic reconciliation state machine.
//!
//! One [`ChangeDetector`] instance watches one entity feed. Each refresh
//! cycle it receives the full snapshot, diffs it against the previous
//! cycle's identifier set (or uses the source's explicit added-list), runs
//! every candidate through the classification pipeline, and hands confirmed
//! new entities to the sink in a single batch.
//!
//! ```text
//! guards → fingerprint short-circuit → baseline (once) → candidates
//!        → classify (exclusion, seen, age, boundary, watermark)
//!        → mark seen → advance watermark → emit batch
//! ```
//!
//! The two live instances (tickets, reservations) share one
//! [`SessionStore`] but touch disjoint per-kind state and never share
//! in-memory state with each other. A cycle is a pure function of the
//! snapshot and the session state: there are no retries and no internal
//! I/O waits.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::entity::{EntityKind, Snapshot, Watched};
use crate::fingerprint::snapshot_fingerprint;
use crate::gate::PermissionGate;
use crate::notify::{NewEntityBatch, NotificationSink};
use crate::session::SessionStore;

/// Why a cycle ran no detection at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No active session (pre-login or post-logout).
    NoSession,
    /// The permission gate denied this feed.
    PermissionDenied,
}

/// What one call to [`ChangeDetector::run_cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A guard clause skipped the cycle; no state changed.
    Skipped(SkipReason),
    /// Identifier set matched the previous cycle; nothing to scan.
    Unchanged,
    /// First valid cycle: everything marked pre-existing, nothing emitted.
    Baseline {
        /// Identifiers marked seen while establishing the baseline.
        seen: usize,
    },
    /// Normal reconciliation cycle.
    Steady {
        /// Candidates that entered the classification pipeline.
        candidates: usize,
        /// Candidates confirmed new and delivered to the sink.
        notified: usize,
    },
}

/// How the classification pipeline disposed of one candidate.
///
/// First matching rule wins; every candidate is marked seen regardless of
/// the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Excluded,
    AlreadySeen,
    UnknownAge,
    PredatesSession,
    BelowWatermark,
    New,
}

enum Phase {
    Uninitialized,
    Steady,
}

/// Reconciliation unit for one entity feed.
pub struct ChangeDetector<T> {
    kind: EntityKind,
    permission: String,
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    exempt: Box<dyn Fn(&T) -> bool + Send + Sync>,
    phase: Phase,
    prev_ids: HashSet<String>,
    prev_fingerprint: Option<String>,
}

impl<T: Watched + Clone> ChangeDetector<T> {
    /// Create a detector for `kind`, gated on `permission`, with the feed's
    /// exclusion predicate.
    pub fn new<F>(
        kind: EntityKind,
        permission: impl Into<String>,
        store: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        exempt: F,
    ) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            kind,
            permission: permission.into(),
            store,
            clock,
            exempt: Box::new(exempt),
            phase: Phase::Uninitialized,
            prev_ids: HashSet::new(),
            prev_fingerprint: None,
        }
    }

    /// The feed this detector watches.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Run one detection cycle over the current snapshot.
    ///
    /// Runs to completion synchronously. The sink is invoked at most once,
    /// and only with a non-empty batch ordered by creation time.
    pub fn run_cycle(
        &mut self,
        snapshot: &Snapshot<T>,
        gate: &dyn PermissionGate,
        sink: &dyn NotificationSink<T>,
    ) -> CycleOutcome {
        if !self.store.is_active() {
            return CycleOutcome::Skipped(SkipReason::NoSession);
        }
        if !gate.has_permission(&self.permission) {
            return CycleOutcome::Skipped(SkipReason::PermissionDenied);
        }

        let fingerprint = snapshot_fingerprint(snapshot.ids());
        if self.prev_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            trace!(entity_kind = %self.kind, "snapshot fingerprint unchanged, skipping scan");
            return CycleOutcome::Unchanged;
        }

        if matches!(self.phase, Phase::Uninitialized) {
            return self.establish_baseline(snapshot, fingerprint);
        }
        self.reconcile(snapshot, fingerprint, sink)
    }

    /// One-time initial classification: everything in the first snapshot is
    /// pre-existing. Emits nothing, even for an empty snapshot.
    fn establish_baseline(&mut self, snapshot: &Snapshot<T>, fingerprint: String) -> CycleOutcome {
        let ids: HashSet<String> = snapshot.ids().map(str::to_string).collect();
        self.store.mark_seen(self.kind, ids.iter().cloned());

        let seen = ids.len();
        self.prev_ids = ids;
        self.prev_fingerprint = Some(fingerprint);
        self.phase = Phase::Steady;

        debug!(entity_kind = %self.kind, seen, "baseline established");
        CycleOutcome::Baseline { seen }
    }

    fn reconcile(
        &mut self,
        snapshot: &Snapshot<T>,
        fingerprint: String,
        sink: &dyn NotificationSink<T>,
    ) -> CycleOutcome {
        let current_ids: HashSet<String> = snapshot.ids().map(str::to_string).collect();

        // Candidate selection: prefer the source's explicit added-list,
        // otherwise diff against the previous cycle's identifier set.
        let raw_candidates: Vec<&T> = match snapshot.added() {
            Some(added) => added.iter().collect(),
            None => snapshot
                .entities()
                .iter()
                .filter(|e| !self.prev_ids.contains(e.id()))
                .collect(),
        };

        let mut in_batch: HashSet<&str> = HashSet::new();
        let candidates: Vec<&T> = raw_candidates
            .into_iter()
            .filter(|e| in_batch.insert(e.id()))
            .collect();

        let started_at = self.store.started_at();
        let watermark = self.store.watermark(self.kind);

        let mut candidate_ids: Vec<String> = Vec::with_capacity(candidates.len());
        let mut survivors: Vec<T> = Vec::new();
        for entity in &candidates {
            let verdict = self.classify(entity, started_at, watermark);
            trace!(
                entity_kind = %self.kind,
                id = entity.id(),
                ?verdict,
                "candidate classified"
            );
            candidate_ids.push(entity.id().to_string());
            if verdict == Verdict::New {
                survivors.push((*entity).clone());
            }
        }

        // Every candidate is marked seen, whatever its verdict: suppression
        // decisions are as final as notifications.
        self.store.mark_seen(self.kind, candidate_ids);

        let notified = survivors.len();
        if !survivors.is_empty() {
            survivors.sort_by_key(Watched::created_at);
            if let Some(max) = survivors.iter().filter_map(Watched::created_at).max() {
                self.store.update_watermark(self.kind, max);
            }
            let batch = NewEntityBatch {
                kind: self.kind,
                entities: survivors,
                detected_at: self.clock.now(),
            };
            sink.notify(&batch);
        }

        debug!(
            entity_kind = %self.kind,
            candidates = candidates.len(),
            notified,
            "detection cycle complete"
        );

        let outcome = CycleOutcome::Steady {
            candidates: candidates.len(),
            notified,
        };
        self.prev_ids = current_ids;
        self.prev_fingerprint = Some(fingerprint);
        outcome
    }

    /// The classification pipeline, first matching rule wins.
    fn classify(
        &self,
        entity: &T,
        started_at: Option<DateTime<Utc>>,
        watermark: Option<DateTime<Utc>>,
    ) -> Verdict {
        if (self.exempt)(entity) {
            return Verdict::Excluded;
        }
        if self.store.has_seen(self.kind, entity.id()) {
            return Verdict::AlreadySeen;
        }
        let Some(created_at) = entity.created_at() else {
            return Verdict::UnknownAge;
        };
        if let Some(boundary) = started_at {
            if created_at < boundary {
                return Verdict::PredatesSession;
            }
        }
        if let Some(mark) = watermark {
            if created_at <= mark {
                return Verdict::BelowWatermark;
            }
        }
        Verdict::New
    }
}
