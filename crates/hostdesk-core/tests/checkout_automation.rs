//! End-to-end checkout automation scenarios through the watcher.
//!
//! The interesting interaction is the feedback loop: the automation writes
//! a ticket, the ticket feed echoes it back on the next refresh, and the
//! exclusion rule must keep that echo from alerting the operator.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use hostdesk_core::checkout::{MemoryTicketStore, TicketRepository};
use hostdesk_core::clock::{Clock, FixedClock};
use hostdesk_core::detector::CycleOutcome;
use hostdesk_core::domain::{Reservation, ReservationStatus, Ticket};
use hostdesk_core::entity::{Snapshot, Watched};
use hostdesk_core::notify::{CollectingSink, NewEntityBatch, NotificationSink};
use hostdesk_core::session::SessionStore;
use hostdesk_core::watcher::{SnapshotProvider, Watcher};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap()
}

fn departing(id: &str) -> Reservation {
    Reservation {
        id: id.to_string(),
        created_at: Some(t0() - Duration::days(3)),
        status: ReservationStatus::Checkout,
        checkout_date: Some(t0().date_naive()),
        guest_name: "Mia".to_string(),
        listing_id: "studio-9".to_string(),
        blocked: false,
    }
}

/// Provider whose snapshot can be swapped between ticks.
struct SharedProvider<T> {
    current: Arc<Mutex<Option<Snapshot<T>>>>,
}

impl<T: Watched + Clone + Send + Sync> SnapshotProvider<T> for SharedProvider<T> {
    fn fetch(&self) -> Option<Snapshot<T>> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

struct SharedSink(Arc<CollectingSink<Ticket>>);

impl NotificationSink<Ticket> for SharedSink {
    fn notify(&self, batch: &NewEntityBatch<Ticket>) {
        self.0.notify(batch);
    }
}

#[test]
fn derived_ticket_echo_does_not_alert_the_operator() {
    let clock = Arc::new(FixedClock::new(t0()));
    let store = Arc::new(SessionStore::in_memory(
        Arc::clone(&clock) as Arc<dyn Clock>
    ));
    store.create_new_session();

    let repo = Arc::new(MemoryTicketStore::new());
    let ticket_sink = Arc::new(CollectingSink::new());

    let tickets = Arc::new(Mutex::new(Some(Snapshot::new(Vec::<Ticket>::new()))));
    let reservations = Arc::new(Mutex::new(Some(Snapshot::new(vec![departing("r-77")]))));

    let mut watcher = Watcher::builder(Arc::clone(&store))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .ticket_provider(Box::new(SharedProvider {
            current: Arc::clone(&tickets),
        }))
        .reservation_provider(Box::new(SharedProvider {
            current: Arc::clone(&reservations),
        }))
        .ticket_sink(Box::new(SharedSink(Arc::clone(&ticket_sink))))
        .repository(Arc::clone(&repo) as Arc<dyn TicketRepository>)
        .build();

    // Tick 1: baselines plus one derived departure ticket.
    let first = watcher.tick();
    assert_eq!(first.checkout.unwrap().created, 1);
    let derived = repo.tickets();
    assert_eq!(derived.len(), 1);

    // The source's next refresh includes the ticket the automation wrote.
    clock.advance(Duration::minutes(1));
    *tickets.lock().unwrap() = Some(Snapshot::new(derived.clone()));

    let second = watcher.tick();
    // The echo enters the pipeline but is excluded from notification.
    assert_eq!(
        second.tickets,
        Some(CycleOutcome::Steady {
            candidates: 1,
            notified: 0
        })
    );
    assert_eq!(ticket_sink.batch_count(), 0);
    // And the automation does not double-create.
    assert_eq!(second.checkout.unwrap().created, 0);
    assert_eq!(repo.tickets().len(), 1);
}

#[test]
fn one_ticket_per_departure_across_many_ticks() {
    let clock = Arc::new(FixedClock::new(t0()));
    let store = Arc::new(SessionStore::in_memory(
        Arc::clone(&clock) as Arc<dyn Clock>
    ));
    store.create_new_session();

    let repo = Arc::new(MemoryTicketStore::new());
    let reservations = Arc::new(Mutex::new(Some(Snapshot::new(vec![
        departing("r-1"),
        departing("r-2"),
    ]))));

    let mut watcher = Watcher::builder(Arc::clone(&store))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .reservation_provider(Box::new(SharedProvider {
            current: Arc::clone(&reservations),
        }))
        .repository(Arc::clone(&repo) as Arc<dyn TicketRepository>)
        .build();

    for _ in 0..5 {
        watcher.tick();
        clock.advance(Duration::minutes(5));
    }

    let tickets = repo.tickets();
    assert_eq!(tickets.len(), 2);
    let mut refs: Vec<_> = tickets
        .iter()
        .filter_map(|t| t.reservation_id.clone())
        .collect();
    refs.sort();
    assert_eq!(refs, ["r-1", "r-2"]);
}

#[test]
fn cancelled_departure_gets_no_ticket() {
    let clock = Arc::new(FixedClock::new(t0()));
    let store = Arc::new(SessionStore::in_memory(
        Arc::clone(&clock) as Arc<dyn Clock>
    ));
    store.create_new_session();

    let repo = Arc::new(MemoryTicketStore::new());
    let mut cancelled = departing("r-cxl");
    cancelled.status = ReservationStatus::Cancelled;
    let reservations = Arc::new(Mutex::new(Some(Snapshot::new(vec![cancelled]))));

    let mut watcher = Watcher::builder(Arc::clone(&store))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .reservation_provider(Box::new(SharedProvider {
            current: Arc::clone(&reservations),
        }))
        .repository(Arc::clone(&repo) as Arc<dyn TicketRepository>)
        .build();

    let report = watcher.tick();
    assert_eq!(report.checkout.unwrap().eligible, 0);
    assert!(repo.tickets().is_empty());
}
