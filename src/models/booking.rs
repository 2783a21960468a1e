//! Bookings, their date ranges and the lifecycle they move through.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use super::property::Property;

/// Lifecycle state of a booking.
///
/// `Pending -> Confirmed | Cancelled`, `Confirmed -> Cancelled`.
/// `Cancelled` is terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Why a status transition was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("booking is already confirmed")]
    AlreadyConfirmed,
    #[error("booking is already cancelled")]
    AlreadyCancelled,
}

impl BookingStatus {
    /// State after an owner accepts the booking.
    pub fn accept(self) -> Result<BookingStatus, TransitionError> {
        match self {
            BookingStatus::Pending => Ok(BookingStatus::Confirmed),
            BookingStatus::Confirmed => Err(TransitionError::AlreadyConfirmed),
            BookingStatus::Cancelled => Err(TransitionError::AlreadyCancelled),
        }
    }

    /// State after the booking is cancelled by its guest or owner.
    pub fn cancel(self) -> Result<BookingStatus, TransitionError> {
        match self {
            BookingStatus::Cancelled => Err(TransitionError::AlreadyCancelled),
            BookingStatus::Pending | BookingStatus::Confirmed => Ok(BookingStatus::Cancelled),
        }
    }
}

/// A stay expressed as the half-open range `[start, end)`.
///
/// `end` is the check-out day and is not occupied, so a stay ending on the
/// 5th and another starting on the 5th do not collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` unless `start` is strictly before `end` and both fall
    /// in years 1..=9999. Dates are stored as `YYYY-MM-DD` text and compared
    /// as strings, which only orders correctly for four-digit years.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let storable = |day: NaiveDate| (1..=9999).contains(&day.year());
        (start < end && storable(start) && storable(end)).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// A booking row.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,

    pub property_id: i64,

    /// Guest who requested the stay. For external bookings this is the owner
    /// who entered it.
    pub user_id: i64,

    pub start_date: NaiveDate,

    /// Check-out day, exclusive.
    pub end_date: NaiveDate,

    pub status: BookingStatus,

    /// Guest name for owner-entered bookings of unregistered clients.
    pub client_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Booking dates as shown in the catalog for availability display.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BookingSlot {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
}

/// A booking together with the listing it is for (guest history view).
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithProperty {
    #[serde(flatten)]
    pub booking: Booking,
    pub property: Property,
}

/// A listing with its bookings awaiting the owner's decision.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PropertyBookings {
    #[serde(flatten)]
    pub property: Property,
    pub bookings: Vec<Booking>,
}

/// Counters shown on the owner dashboard.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatistics {
    pub housing_count: i64,
    pub bookings_count: i64,
    pub completed_bookings_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end)).unwrap()
    }

    #[test]
    fn range_requires_start_before_end() {
        assert!(DateRange::new(d("2024-06-05"), d("2024-06-01")).is_none());
        assert!(DateRange::new(d("2024-06-05"), d("2024-06-05")).is_none());
        assert_eq!(range("2024-06-01", "2024-06-05").nights(), 4);
    }

    #[test]
    fn range_rejects_years_outside_four_digits() {
        let far = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        let negative_year = NaiveDate::from_ymd_opt(-1, 1, 1).unwrap();
        assert!(DateRange::new(d("2024-06-01"), far).is_none());
        assert!(DateRange::new(negative_year, d("2024-06-01")).is_none());
        assert!(DateRange::new(d("0001-01-01"), d("9999-12-31")).is_some());
    }

    #[test]
    fn overlapping_ranges_conflict() {
        let confirmed = range("2024-06-01", "2024-06-05");
        assert!(confirmed.overlaps(&range("2024-06-04", "2024-06-08")));
        assert!(confirmed.overlaps(&range("2024-05-28", "2024-06-02")));
        assert!(confirmed.overlaps(&range("2024-06-02", "2024-06-03"))); // contained
        assert!(confirmed.overlaps(&range("2024-05-01", "2024-07-01"))); // containing
    }

    #[test]
    fn checkout_day_is_free() {
        let confirmed = range("2024-06-01", "2024-06-05");
        assert!(!confirmed.overlaps(&range("2024-06-05", "2024-06-08")));
        assert!(!range("2024-06-05", "2024-06-08").overlaps(&confirmed));
        assert!(!confirmed.overlaps(&range("2024-05-28", "2024-06-01")));
    }

    #[test]
    fn pending_can_be_accepted_or_cancelled() {
        assert_eq!(
            BookingStatus::Pending.accept(),
            Ok(BookingStatus::Confirmed)
        );
        assert_eq!(
            BookingStatus::Pending.cancel(),
            Ok(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn terminal_transitions_are_refused() {
        assert_eq!(
            BookingStatus::Confirmed.accept(),
            Err(TransitionError::AlreadyConfirmed)
        );
        assert_eq!(
            BookingStatus::Cancelled.cancel(),
            Err(TransitionError::AlreadyCancelled)
        );
        assert_eq!(
            BookingStatus::Cancelled.accept(),
            Err(TransitionError::AlreadyCancelled)
        );
        assert_eq!(
            BookingStatus::Confirmed.cancel(),
            Ok(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
    }
}
