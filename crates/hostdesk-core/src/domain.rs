//! Ticket and reservation records as the detection core observes them.
//!
//! These are read-only projections of the upstream records: the detector
//! never mutates them. The only component that writes entities at all is the
//! checkout automation, and it writes *new* tickets through the
//! [`crate::checkout::TicketRepository`] seam.
//!
//! The notification-exemption rules for each feed live here too, so the
//! detector stays generic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Watched;

/// Ticket categories used by the operations console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Raised by or on behalf of a guest
    Guest,
    /// Property maintenance work
    Maintenance,
    /// Turnover cleaning
    Cleaning,
    /// Derived departure ticket created by the checkout automation
    CheckoutDeparture,
}

/// A support ticket as observed by the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Stable opaque identifier
    pub id: String,
    /// Creation instant; absent on records with data-quality defects
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Short human-readable subject line
    pub subject: String,
    /// Ticket category
    pub kind: TicketKind,
    /// Reservation this ticket references, if any
    #[serde(default)]
    pub reservation_id: Option<String>,
    /// True for tickets created by automations rather than people
    #[serde(default)]
    pub auto_generated: bool,
}

impl Watched for Ticket {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Reservation lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Guest asked about availability; nothing confirmed
    Inquiry,
    /// Confirmed booking, stay not yet started
    Booked,
    /// Guest is on the property
    CheckedIn,
    /// Departure is due; checkout work can begin
    Checkout,
    /// Guest has left and the stay is settled
    CheckedOut,
    /// Booking was cancelled
    Cancelled,
}

impl ReservationStatus {
    /// True for cancelled bookings, which no automation should touch.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A booking reservation as observed by the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    /// Stable opaque identifier
    pub id: String,
    /// Creation instant; absent on records with data-quality defects
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: ReservationStatus,
    /// Scheduled checkout date, if known
    #[serde(default)]
    pub checkout_date: Option<NaiveDate>,
    /// Guest display name
    pub guest_name: String,
    /// Listing the reservation belongs to
    pub listing_id: String,
    /// True for calendar-block pseudo-reservations (owner stays, maintenance
    /// holds); these are not real bookings
    #[serde(default)]
    pub blocked: bool,
}

impl Watched for Reservation {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Exclusion rule for the ticket feed: system-generated tickets never get a
/// "new ticket" notification. This covers the automation's own derived
/// checkout tickets, which would otherwise echo back as alerts.
#[must_use]
pub fn ticket_notification_exempt(ticket: &Ticket) -> bool {
    ticket.auto_generated || matches!(ticket.kind, TicketKind::CheckoutDeparture)
}

/// Exclusion rule for the reservation feed: calendar blocks are not
/// bookings and never get a "new reservation" notification.
#[must_use]
pub fn reservation_notification_exempt(reservation: &Reservation) -> bool {
    reservation.blocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ticket(kind: TicketKind, auto_generated: bool) -> Ticket {
        Ticket {
            id: "t-1".to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()),
            subject: "Broken lockbox".to_string(),
            kind,
            reservation_id: None,
            auto_generated,
        }
    }

    #[test]
    fn guest_tickets_are_notifiable() {
        assert!(!ticket_notification_exempt(&ticket(TicketKind::Guest, false)));
    }

    #[test]
    fn auto_generated_tickets_are_exempt() {
        assert!(ticket_notification_exempt(&ticket(TicketKind::Guest, true)));
        assert!(ticket_notification_exempt(&ticket(
            TicketKind::CheckoutDeparture,
            false
        )));
    }

    #[test]
    fn blocked_reservations_are_exempt() {
        let mut r = Reservation {
            id: "r-1".to_string(),
            created_at: None,
            status: ReservationStatus::Booked,
            checkout_date: None,
            guest_name: "Dana".to_string(),
            listing_id: "cabin-2".to_string(),
            blocked: true,
        };
        assert!(reservation_notification_exempt(&r));
        r.blocked = false;
        assert!(!reservation_notification_exempt(&r));
    }

    #[test]
    fn reservation_serde_uses_snake_case_status() {
        let r = Reservation {
            id: "r-9".to_string(),
            created_at: None,
            status: ReservationStatus::CheckedIn,
            checkout_date: NaiveDate::from_ymd_opt(2026, 2, 7),
            guest_name: "Lee".to_string(),
            listing_id: "loft-1".to_string(),
            blocked: false,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("checked_in"));
        let back: Reservation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"id":"r-2","status":"booked","guest_name":"Ada","listing_id":"flat-3"}"#;
        let r: Reservation = serde_json::from_str(json).unwrap();
        assert!(r.created_at.is_none());
        assert!(r.checkout_date.is_none());
        assert!(!r.blocked);
    }
}
