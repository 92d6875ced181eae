//! Idempotent checkout-ticket automation.
//!
//! A sibling reconciliation loop to the detectors: it consumes the full
//! reservation feed on every refresh and derives exactly one departure
//! ticket per reservation that becomes checkout-eligible. Input delivery is
//! at-least-once (the same full list arrives over and over); the output
//! contract is at-most-one derived ticket per reservation, ever.
//!
//! Two layers enforce the contract:
//! - an in-memory per-run marker set, covering rapid redeliveries within one
//!   process lifetime;
//! - a repository existence check for a persisted departure ticket
//!   referencing the reservation, covering restarts and multiple writers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::{Reservation, Ticket, TicketKind};
use crate::error::Result;

/// Input for creating a ticket through the repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketDraft {
    /// Subject line
    pub subject: String,
    /// Ticket category
    pub kind: TicketKind,
    /// Reservation the ticket references
    pub reservation_id: Option<String>,
    /// True for automation-created tickets
    pub auto_generated: bool,
    /// Creation instant to record
    pub created_at: Option<DateTime<Utc>>,
}

/// Seam to the persistent record store (whose CRUD mechanics live outside
/// this crate).
pub trait TicketRepository: Send + Sync {
    /// Find a persisted departure ticket referencing `reservation_id`.
    fn find_checkout_ticket(&self, reservation_id: &str) -> Result<Option<Ticket>>;

    /// Persist a new ticket and return it with its assigned identifier.
    fn create_ticket(&self, draft: TicketDraft) -> Result<Ticket>;
}

/// In-memory repository used by tests and the CLI's dry runs.
#[derive(Default)]
pub struct MemoryTicketStore {
    inner: Mutex<MemoryTicketStoreInner>,
}

#[derive(Default)]
struct MemoryTicketStoreInner {
    tickets: Vec<Ticket>,
    next_id: u64,
}

impl MemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All tickets created so far.
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tickets
            .clone()
    }
}

impl TicketRepository for MemoryTicketStore {
    fn find_checkout_ticket(&self, reservation_id: &str) -> Result<Option<Ticket>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .tickets
            .iter()
            .find(|t| {
                matches!(t.kind, TicketKind::CheckoutDeparture)
                    && t.reservation_id.as_deref() == Some(reservation_id)
            })
            .cloned())
    }

    fn create_ticket(&self, draft: TicketDraft) -> Result<Ticket> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let ticket = Ticket {
            id: format!("ticket-{}", inner.next_id),
            created_at: draft.created_at,
            subject: draft.subject,
            kind: draft.kind,
            reservation_id: draft.reservation_id,
            auto_generated: draft.auto_generated,
        };
        inner.tickets.push(ticket.clone());
        Ok(ticket)
    }
}

/// What one automation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckoutOutcome {
    /// Reservations that met the eligibility rule this cycle.
    pub eligible: usize,
    /// Derived tickets created this cycle.
    pub created: usize,
    /// Eligible reservations skipped because a ticket already existed.
    pub skipped_existing: usize,
    /// Eligible reservations skipped by the in-memory marker.
    pub skipped_marked: usize,
    /// Repository failures; retried on the next delivery.
    pub failed: usize,
}

/// The checkout-ticket generator.
pub struct CheckoutAutomation {
    repository: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
    processed: HashSet<String>,
}

impl CheckoutAutomation {
    /// Create an automation writing through `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn TicketRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            processed: HashSet::new(),
        }
    }

    /// Whether a reservation is due for a departure ticket: its status has
    /// reached checkout, or its checkout date is today or earlier — and it
    /// is not cancelled.
    #[must_use]
    pub fn is_eligible(&self, reservation: &Reservation) -> bool {
        if reservation.status.is_cancelled() {
            return false;
        }
        if matches!(reservation.status, crate::domain::ReservationStatus::Checkout) {
            return true;
        }
        reservation
            .checkout_date
            .is_some_and(|date| date <= self.clock.today())
    }

    /// Process one full-feed delivery.
    pub fn run_cycle(&mut self, reservations: &[Reservation]) -> CheckoutOutcome {
        let mut outcome = CheckoutOutcome::default();

        for reservation in reservations {
            if !self.is_eligible(reservation) {
                continue;
            }
            outcome.eligible += 1;

            if self.processed.contains(&reservation.id) {
                outcome.skipped_marked += 1;
                continue;
            }

            match self.repository.find_checkout_ticket(&reservation.id) {
                Ok(Some(_)) => {
                    // Persisted ticket from a previous run or another writer.
                    self.processed.insert(reservation.id.clone());
                    outcome.skipped_existing += 1;
                }
                Ok(None) => match self.create_departure_ticket(reservation) {
                    Ok(ticket) => {
                        self.processed.insert(reservation.id.clone());
                        outcome.created += 1;
                        info!(
                            reservation_id = %reservation.id,
                            ticket_id = %ticket.id,
                            "created checkout departure ticket"
                        );
                    }
                    Err(e) => {
                        outcome.failed += 1;
                        warn!(
                            reservation_id = %reservation.id,
                            error = %e,
                            "failed to create checkout ticket"
                        );
                    }
                },
                Err(e) => {
                    outcome.failed += 1;
                    warn!(
                        reservation_id = %reservation.id,
                        error = %e,
                        "failed to look up existing checkout ticket"
                    );
                }
            }
        }

        debug!(
            eligible = outcome.eligible,
            created = outcome.created,
            "checkout automation cycle complete"
        );
        outcome
    }

    fn create_departure_ticket(&self, reservation: &Reservation) -> Result<Ticket> {
        let draft = TicketDraft {
            subject: format!(
                "Checkout: {} ({})",
                reservation.guest_name, reservation.listing_id
            ),
            kind: TicketKind::CheckoutDeparture,
            reservation_id: Some(reservation.id.clone()),
            auto_generated: true,
            created_at: Some(self.clock.now()),
        };
        self.repository.create_ticket(draft)
    }
}
