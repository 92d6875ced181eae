//! Top-level polling loop wiring both feeds to their detectors.
//!
//! The watcher owns one [`ChangeDetector`] per feed plus the checkout
//! automation, and drives them all from a single poll tick. Snapshot
//! acquisition is behind [`SnapshotProvider`] so the same loop serves the
//! file-backed CLI mode and in-process embedding.
//!
//! A feed whose provider yields no snapshot this tick is simply skipped; the
//! detector keeps its state and resumes when data returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::checkout::{CheckoutAutomation, CheckoutOutcome, MemoryTicketStore, TicketRepository};
use crate::clock::{Clock, SystemClock};
use crate::detector::{ChangeDetector, CycleOutcome};
use crate::domain::{
    Reservation, Ticket, reservation_notification_exempt, ticket_notification_exempt,
};
use crate::entity::{EntityKind, Snapshot, Watched};
use crate::gate::{AllowAll, PermissionGate, RESERVATION_NOTIFICATIONS, TICKET_NOTIFICATIONS};
use crate::notify::{NotificationSink, TracingSink};
use crate::session::SessionStore;

/// Produces the current full snapshot for one feed.
///
/// Returning `None` means no snapshot is available right now (source
/// unreachable, file missing or malformed); the tick skips the feed.
pub trait SnapshotProvider<T>: Send + Sync {
    /// Fetch the current snapshot, or `None` when unavailable.
    fn fetch(&self) -> Option<Snapshot<T>>;
}

/// On-disk snapshot document read by [`FileSnapshotProvider`].
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct SnapshotFile<T> {
    entities: Vec<T>,
    #[serde(default)]
    added: Option<Vec<T>>,
}

/// Reads a JSON snapshot file on every fetch.
///
/// The file holds `{"entities": [...]}` with an optional `"added"` list of
/// entities the source already knows are new since the previous export.
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    /// Provider reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl<T> SnapshotProvider<T> for FileSnapshotProvider
where
    T: Watched + DeserializeOwned + Send + Sync,
{
    fn fetch(&self) -> Option<Snapshot<T>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read snapshot file");
                return None;
            }
        };
        let file: SnapshotFile<T> = match serde_json::from_str(&contents) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed snapshot file");
                return None;
            }
        };
        let snapshot = Snapshot::new(file.entities);
        Some(match file.added {
            Some(added) => snapshot.with_added(added),
            None => snapshot,
        })
    }
}

/// What one poll tick did, per feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Ticket detector outcome; `None` when no snapshot was available.
    pub tickets: Option<CycleOutcome>,
    /// Reservation detector outcome; `None` when no snapshot was available.
    pub reservations: Option<CycleOutcome>,
    /// Checkout automation outcome; `None` when no reservation snapshot.
    pub checkout: Option<CheckoutOutcome>,
}

/// Builder for [`Watcher`]. Everything except the session store has a
/// default: system clock, allow-all gate, tracing sinks, in-memory ticket
/// repository, no providers.
pub struct WatcherBuilder {
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    gate: Box<dyn PermissionGate>,
    ticket_provider: Option<Box<dyn SnapshotProvider<Ticket>>>,
    reservation_provider: Option<Box<dyn SnapshotProvider<Reservation>>>,
    ticket_sink: Box<dyn NotificationSink<Ticket>>,
    reservation_sink: Box<dyn NotificationSink<Reservation>>,
    repository: Arc<dyn TicketRepository>,
}

impl WatcherBuilder {
    /// Start a builder over `store`.
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            gate: Box::new(AllowAll),
            ticket_provider: None,
            reservation_provider: None,
            ticket_sink: Box::new(TracingSink),
            reservation_sink: Box::new(TracingSink),
            repository: Arc::new(MemoryTicketStore::new()),
        }
    }

    /// Override the clock. Tests use [`crate::clock::FixedClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the permission gate.
    #[must_use]
    pub fn gate(mut self, gate: Box<dyn PermissionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Set the ticket snapshot provider.
    #[must_use]
    pub fn ticket_provider(mut self, provider: Box<dyn SnapshotProvider<Ticket>>) -> Self {
        self.ticket_provider = Some(provider);
        self
    }

    /// Set the reservation snapshot provider.
    #[must_use]
    pub fn reservation_provider(mut self, provider: Box<dyn SnapshotProvider<Reservation>>) -> Self {
        self.reservation_provider = Some(provider);
        self
    }

    /// Set the ticket notification sink.
    #[must_use]
    pub fn ticket_sink(mut self, sink: Box<dyn NotificationSink<Ticket>>) -> Self {
        self.ticket_sink = sink;
        self
    }

    /// Set the reservation notification sink.
    #[must_use]
    pub fn reservation_sink(mut self, sink: Box<dyn NotificationSink<Reservation>>) -> Self {
        self.reservation_sink = sink;
        self
    }

    /// Set the ticket repository used by the checkout automation.
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn TicketRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Finish construction. Loads (or starts) the persisted session.
    #[must_use]
    pub fn build(self) -> Watcher {
        self.store.initialize();
        let ticket_detector = ChangeDetector::new(
            EntityKind::Ticket,
            TICKET_NOTIFICATIONS,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            ticket_notification_exempt,
        );
        let reservation_detector = ChangeDetector::new(
            EntityKind::Reservation,
            RESERVATION_NOTIFICATIONS,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            reservation_notification_exempt,
        );
        let checkout = CheckoutAutomation::new(self.repository, Arc::clone(&self.clock));

        Watcher {
            gate: self.gate,
            ticket_provider: self.ticket_provider,
            reservation_provider: self.reservation_provider,
            ticket_sink: self.ticket_sink,
            reservation_sink: self.reservation_sink,
            ticket_detector,
            reservation_detector,
            checkout,
        }
    }
}

/// Drives both detectors and the checkout automation from a poll loop.
pub struct Watcher {
    gate: Box<dyn PermissionGate>,
    ticket_provider: Option<Box<dyn SnapshotProvider<Ticket>>>,
    reservation_provider: Option<Box<dyn SnapshotProvider<Reservation>>>,
    ticket_sink: Box<dyn NotificationSink<Ticket>>,
    reservation_sink: Box<dyn NotificationSink<Reservation>>,
    ticket_detector: ChangeDetector<Ticket>,
    reservation_detector: ChangeDetector<Reservation>,
    checkout: CheckoutAutomation,
}

impl Watcher {
    /// Start building a watcher over `store`.
    #[must_use]
    pub fn builder(store: Arc<SessionStore>) -> WatcherBuilder {
        WatcherBuilder::new(store)
    }

    /// Run one poll tick: fetch each feed's snapshot and reconcile.
    ///
    /// The reservation snapshot is fetched once and shared between the
    /// reservation detector and the checkout automation.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(provider) = &self.ticket_provider {
            if let Some(snapshot) = provider.fetch() {
                report.tickets = Some(self.ticket_detector.run_cycle(
                    &snapshot,
                    self.gate.as_ref(),
                    self.ticket_sink.as_ref(),
                ));
            } else {
                debug!(entity_kind = %EntityKind::Ticket, "no snapshot this tick");
            }
        }

        if let Some(provider) = &self.reservation_provider {
            if let Some(snapshot) = provider.fetch() {
                report.reservations = Some(self.reservation_detector.run_cycle(
                    &snapshot,
                    self.gate.as_ref(),
                    self.reservation_sink.as_ref(),
                ));
                report.checkout = Some(self.checkout.run_cycle(snapshot.entities()));
            } else {
                debug!(entity_kind = %EntityKind::Reservation, "no snapshot this tick");
            }
        }

        report
    }

    /// Poll until Ctrl-C.
    pub async fn run(&mut self, poll_interval: Duration) -> std::io::Result<()> {
        info!(?poll_interval, "watcher started");
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick();
                    debug!(?report, "tick complete");
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }
}
