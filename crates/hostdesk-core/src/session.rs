//! Durable per-session detection state.
//!
//! One [`SessionRecord`] per logical login holds everything the detectors
//! need to survive a restart: the session start boundary, a per-kind set of
//! identifiers already classified, and a per-kind watermark (creation time of
//! the most recently notified entity). The record is persisted as a single
//! JSON document under one well-known path.
//!
//! Persistence is deliberately forgiving: a missing or corrupt document means
//! "no prior session" and a fresh one is created without surfacing an error —
//! notification freshness is best-effort, not safety-critical. Writes are
//! fire-and-forget: a crash between computing new state and persisting it can
//! re-notify on the next start (accepted at-least-once semantics).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::entity::EntityKind;
use crate::error::Result;

/// The persisted session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Start of the "never notify about things older than this" boundary.
    pub started_at: DateTime<Utc>,
    /// Per-kind identifiers already classified (notified or suppressed).
    /// Grows monotonically within a session.
    #[serde(default)]
    pub seen: BTreeMap<String, BTreeSet<String>>,
    /// Per-kind creation time of the most recently notified entity.
    #[serde(default)]
    pub watermark: BTreeMap<String, Option<DateTime<Utc>>>,
}

impl SessionRecord {
    /// A fresh record with empty seen-sets and null watermarks.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            seen: BTreeMap::new(),
            watermark: BTreeMap::new(),
        }
    }
}

/// Where the session document lives.
///
/// The store only calls `load` once, during initialization; every mutation
/// afterwards goes through `store`.
pub trait SessionBackend: Send + Sync {
    /// Load the persisted record, `Ok(None)` when none exists.
    fn load(&self) -> Result<Option<SessionRecord>>;

    /// Persist the record, replacing any previous document.
    fn store(&self, record: &SessionRecord) -> Result<()>;

    /// Delete the persisted document entirely.
    fn clear(&self) -> Result<()>;
}

/// JSON-file backend: one document, temp-file + rename writes, an advisory
/// lock held across the write so concurrent processes cannot interleave.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend storing the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<SessionRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: SessionRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    fn store(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let content = serde_json::to_string_pretty(record)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        // Lock released when lock_file drops.
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        remove_if_present(&self.path)?;
        remove_if_present(&self.lock_path())
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<SessionRecord>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, record: &SessionRecord) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

struct Inner {
    record: Option<SessionRecord>,
    initialized: bool,
}

/// Shared handle over the current session.
///
/// One store serves every detector instance; the per-kind state they touch is
/// disjoint, and each operation is atomic behind the internal mutex. Reads
/// never hit storage after [`SessionStore::initialize`].
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl SessionStore {
    /// Create a store over the given backend. Call
    /// [`initialize`](Self::initialize) before use.
    #[must_use]
    pub fn new(backend: Box<dyn SessionBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            inner: Mutex::new(Inner {
                record: None,
                initialized: false,
            }),
        }
    }

    /// Convenience constructor with an in-memory backend.
    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Box::new(MemoryBackend::new()), clock)
    }

    /// Load the persisted session, creating a fresh one when the document is
    /// missing or corrupt. Never errors to the caller. Idempotent: a second
    /// call does not wipe state.
    pub fn initialize(&self) {
        let mut inner = self.lock();
        if inner.initialized {
            return;
        }

        let record = match self.backend.load() {
            Ok(Some(record)) => {
                debug!(
                    session_started_at = %record.started_at,
                    "restored persisted session"
                );
                record
            }
            Ok(None) => {
                let fresh = SessionRecord::new(self.clock.now());
                self.persist(&fresh);
                fresh
            }
            Err(e) => {
                warn!(error = %e, "session document unreadable, starting fresh");
                let fresh = SessionRecord::new(self.clock.now());
                self.persist(&fresh);
                fresh
            }
        };

        inner.record = Some(record);
        inner.initialized = true;
    }

    /// Explicit reset on login: empty seen-sets, null watermarks,
    /// `started_at = now`.
    pub fn create_new_session(&self) {
        let mut inner = self.lock();
        let fresh = SessionRecord::new(self.clock.now());
        self.persist(&fresh);
        inner.record = Some(fresh);
        inner.initialized = true;
    }

    /// True while a session is active (initialized and not cleared).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().record.is_some()
    }

    /// Start boundary of the active session.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().record.as_ref().map(|r| r.started_at)
    }

    /// Whether `id` was already classified for `kind` this session.
    #[must_use]
    pub fn has_seen(&self, kind: EntityKind, id: &str) -> bool {
        self.lock()
            .record
            .as_ref()
            .and_then(|r| r.seen.get(kind.as_str()))
            .is_some_and(|set| set.contains(id))
    }

    /// Idempotent union into the seen-set; persists only when the set
    /// actually changed.
    pub fn mark_seen<I>(&self, kind: EntityKind, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut inner = self.lock();
        let Some(record) = inner.record.as_mut() else {
            return;
        };

        let set = record.seen.entry(kind.as_str().to_string()).or_default();
        let mut changed = false;
        for id in ids {
            changed |= set.insert(id);
        }

        if changed {
            let snapshot = record.clone();
            self.persist(&snapshot);
        }
    }

    /// Current watermark for `kind`, if any entity was ever notified.
    #[must_use]
    pub fn watermark(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        self.lock()
            .record
            .as_ref()
            .and_then(|r| r.watermark.get(kind.as_str()).copied().flatten())
    }

    /// Advance the watermark for `kind`, clamped to be monotonic: the stored
    /// value is `max(existing, at)`. Returns the effective watermark.
    ///
    /// The source implementation overwrote unconditionally, which lets an
    /// out-of-order batch regress the watermark and re-open already-notified
    /// entities; the clamp closes that hole.
    pub fn update_watermark(&self, kind: EntityKind, at: DateTime<Utc>) -> DateTime<Utc> {
        let mut inner = self.lock();
        let Some(record) = inner.record.as_mut() else {
            return at;
        };

        let entry = record
            .watermark
            .entry(kind.as_str().to_string())
            .or_insert(None);
        let effective = entry.map_or(at, |existing| existing.max(at));
        let changed = *entry != Some(effective);
        *entry = Some(effective);

        if changed {
            let snapshot = record.clone();
            self.persist(&snapshot);
        }
        effective
    }

    /// Delete the persisted session entirely (logout). Afterwards no session
    /// is active until the next login.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if let Err(e) = self.backend.clear() {
            warn!(error = %e, "failed to delete persisted session");
        }
        inner.record = None;
    }

    /// Number of seen identifiers for `kind` (diagnostics).
    #[must_use]
    pub fn seen_count(&self, kind: EntityKind) -> usize {
        self.lock()
            .record
            .as_ref()
            .and_then(|r| r.seen.get(kind.as_str()))
            .map_or(0, BTreeSet::len)
    }

    /// Clone of the active record (diagnostics / `session show`).
    #[must_use]
    pub fn record(&self) -> Option<SessionRecord> {
        self.lock().record.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fire-and-forget persistence: failures are logged, never propagated.
    fn persist(&self, record: &SessionRecord) {
        if let Err(e) = self.backend.store(record) {
            warn!(error = %e, "failed to persist session document");
        }
    }
}
