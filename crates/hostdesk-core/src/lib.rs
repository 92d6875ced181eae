//! hostdesk-core: change-detection engine for rental operations feeds
//!
//! This crate decides, exactly once per entity and per logical session,
//! whether an entity surfacing in a repeatedly-refreshed full snapshot is
//! genuinely new and worth an operator-facing notification. The feeds
//! (support tickets, reservations) have no change-feed and no ordering
//! guarantees, and the process may restart at any point.
//!
//! # Architecture
//!
//! ```text
//! SnapshotProvider → Watcher::tick()
//!                        │
//!          ┌─────────────┼──────────────────┐
//!          ▼             ▼                  ▼
//!   ChangeDetector  ChangeDetector   CheckoutAutomation
//!     <Ticket>       <Reservation>    (derived tickets)
//!          │             │                  │
//!          └──────► SessionStore ◄──────────┘
//!                 (seen sets, watermarks,
//!                  one persisted document)
//!          │             │
//!          ▼             ▼
//!       NotificationSink (batched, at most once per cycle)
//! ```
//!
//! # Modules
//!
//! - `entity`: watched-entity model and snapshot boundary
//! - `domain`: ticket and reservation records, exclusion rules
//! - `session`: durable per-session seen-sets and watermarks
//! - `fingerprint`: cheap snapshot identity hashing
//! - `detector`: the generic reconciliation state machine
//! - `notify`: notification sink trait and delivery wrappers
//! - `gate`: permission gating for notification feeds
//! - `checkout`: idempotent checkout-ticket automation
//! - `watcher`: cooperative refresh loop wiring it all together
//! - `config`: `hostdesk.toml` configuration
//! - `logging`: tracing setup
//! - `error`: crate error type
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod checkout;
pub mod clock;
pub mod config;
pub mod detector;
pub mod domain;
pub mod entity;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod logging;
pub mod notify;
pub mod session;
pub mod watcher;

pub use error::{Error, Result};
