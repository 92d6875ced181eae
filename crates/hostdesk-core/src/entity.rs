//! Watched-entity model and snapshot boundary.
//!
//! The detector never inspects domain fields beyond two things: a stable
//! opaque identifier and an optional creation instant. The [`Watched`] trait
//! captures exactly that surface, so one detector implementation serves every
//! feed. Records missing an identifier are rejected here at the boundary
//! rather than deep inside the algorithm.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The entity feeds the console watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Support tickets
    Ticket,
    /// Booking reservations
    Reservation,
}

impl EntityKind {
    /// All watched kinds.
    pub const ALL: [Self; 2] = [Self::Ticket, Self::Reservation];

    /// Stable key used in the session document and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Reservation => "reservation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The minimal surface the detector reads from an entity.
///
/// Identifiers are opaque and stable across snapshots; they are unique within
/// one kind but not across kinds. The creation instant may be absent — that
/// is a data-quality defect the classification pipeline handles, not an
/// error.
pub trait Watched {
    /// Stable opaque identifier, unique within the entity's kind.
    fn id(&self) -> &str;

    /// Creation instant, if the upstream record carried one.
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

/// Everything currently known about one feed at refresh time.
///
/// Snapshots may omit previously-seen entities (expiry) or include
/// never-seen ones; no ordering is guaranteed. Sources that can report
/// additions directly attach an explicit `added` sub-list, which the
/// detector prefers over diffing.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    entities: Vec<T>,
    added: Option<Vec<T>>,
    rejected: usize,
}

impl<T: Watched> Snapshot<T> {
    /// Build a snapshot, rejecting entities with an empty identifier.
    #[must_use]
    pub fn new(entities: Vec<T>) -> Self {
        let before = entities.len();
        let entities: Vec<T> = entities.into_iter().filter(|e| !e.id().is_empty()).collect();
        let rejected = before - entities.len();
        Self {
            entities,
            added: None,
            rejected,
        }
    }

    /// Attach an explicit added-since-last-cycle sub-list.
    ///
    /// The same boundary validation applies; rejected entries are counted
    /// together with those from the full list.
    #[must_use]
    pub fn with_added(mut self, added: Vec<T>) -> Self {
        let before = added.len();
        let added: Vec<T> = added.into_iter().filter(|e| !e.id().is_empty()).collect();
        self.rejected += before - added.len();
        self.added = Some(added);
        self
    }

    /// The full entity list.
    #[must_use]
    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    /// The explicit added sub-list, if the source supplied one.
    #[must_use]
    pub fn added(&self) -> Option<&[T]> {
        self.added.as_deref()
    }

    /// Number of entities rejected at the boundary (empty identifier).
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Identifiers of every entity in the full list.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(Watched::id)
    }

    /// Number of entities in the full list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the full list is empty (an empty snapshot is still valid).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
