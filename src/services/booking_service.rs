//! src/services/booking_service.rs
//!
//! BookingService: booking creation, the overlap check against confirmed
//! stays, and the accept/cancel transitions.
//!
//! Date ranges are half-open `[start, end)` everywhere: creation, external
//! bookings and acceptance all use [`DateRange::overlaps`]. The final write of
//! every CONFIRMED row is a single guarded statement, so two requests that both
//! pass the scan cannot both confirm overlapping stays.

use crate::models::{
    booking::{
        Booking, BookingStatus, BookingWithProperty, DateRange, OwnerStatistics,
        PropertyBookings, TransitionError,
    },
    property::{Property, PropertyStatus},
    user::Principal,
};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

const BOOKING_COLUMNS: &str =
    "id, property_id, user_id, start_date, end_date, status, client_name, created_at";

const PROPERTY_COLUMNS: &str = "id, owner_id, category_id, name, description, location, \
     price_per_night, status, created_at";

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking {0} not found")]
    NotFound(i64),
    #[error("property {0} not found")]
    PropertyNotFound(i64),
    #[error("property {0} is not open for booking")]
    PropertyNotBookable(i64),
    #[error("start date must be before end date, both within years 1 to 9999")]
    InvalidRange,
    #[error("the selected dates overlap a confirmed booking")]
    DateConflict,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("owners cannot book their own property")]
    OwnProperty,
    #[error("client name is required")]
    MissingClientName,
    #[error("not allowed to manage this booking")]
    Forbidden,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type BookingResult<T> = Result<T, BookingError>;

/// First confirmed booking whose range intersects `candidate`, skipping
/// `exclude` (the booking being accepted).
pub fn find_conflict<'a>(
    candidate: &DateRange,
    confirmed: &'a [Booking],
    exclude: Option<i64>,
) -> Option<&'a Booking> {
    confirmed.iter().find(|existing| {
        Some(existing.id) != exclude
            && existing.status == BookingStatus::Confirmed
            && existing.range().overlaps(candidate)
    })
}

/// Listing fields needed to authorise booking operations.
#[derive(Debug, Clone, Copy)]
struct PropertyAccess {
    owner_id: i64,
    status: PropertyStatus,
}

#[derive(Clone)]
pub struct BookingService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl BookingService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    fn range(start: NaiveDate, end: NaiveDate) -> BookingResult<DateRange> {
        DateRange::new(start, end).ok_or(BookingError::InvalidRange)
    }

    pub async fn get(&self, booking_id: i64) -> BookingResult<Booking> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"
        ))
        .bind(booking_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BookingError::NotFound(booking_id))
    }

    async fn property_access(&self, property_id: i64) -> BookingResult<PropertyAccess> {
        let row = sqlx::query_as::<_, (i64, PropertyStatus)>(
            "SELECT owner_id, status FROM properties WHERE id = ?",
        )
        .bind(property_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BookingError::PropertyNotFound(property_id))?;
        Ok(PropertyAccess {
            owner_id: row.0,
            status: row.1,
        })
    }

    /// All CONFIRMED bookings of a property, oldest stay first.
    pub async fn confirmed_for_property(&self, property_id: i64) -> BookingResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE property_id = ? AND status = 'CONFIRMED'
             ORDER BY start_date ASC"
        ))
        .bind(property_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// True when `[start, end)` intersects any CONFIRMED booking of the property.
    pub async fn has_conflict(
        &self,
        property_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BookingResult<bool> {
        let candidate = Self::range(start, end)?;
        let confirmed = self.confirmed_for_property(property_id).await?;
        Ok(find_conflict(&candidate, &confirmed, None).is_some())
    }

    /// A guest asks for a stay. The request starts PENDING.
    pub async fn create_booking(
        &self,
        property_id: i64,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BookingResult<Booking> {
        let candidate = Self::range(start, end)?;
        let property = self.property_access(property_id).await?;
        if property.status != PropertyStatus::Approved {
            return Err(BookingError::PropertyNotBookable(property_id));
        }
        if property.owner_id == user_id {
            return Err(BookingError::OwnProperty);
        }

        let confirmed = self.confirmed_for_property(property_id).await?;
        if let Some(existing) = find_conflict(&candidate, &confirmed, None) {
            debug!(
                "booking request on property {} overlaps confirmed booking {}",
                property_id, existing.id
            );
            return Err(BookingError::DateConflict);
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (property_id, user_id, start_date, end_date, status, created_at)
             VALUES (?, ?, ?, ?, 'PENDING', ?)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(property_id)
        .bind(user_id)
        .bind(candidate.start)
        .bind(candidate.end)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        info!(
            booking_id = booking.id,
            property_id, user_id, "booking requested"
        );
        Ok(booking)
    }

    /// An owner records a stay for a client who has no account. The booking
    /// is CONFIRMED immediately, so it is subject to the overlap invariant.
    pub async fn book_external(
        &self,
        actor: &Principal,
        property_id: i64,
        client_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BookingResult<Booking> {
        let client_name = client_name.trim();
        if client_name.is_empty() {
            return Err(BookingError::MissingClientName);
        }
        let candidate = Self::range(start, end)?;
        let property = self.property_access(property_id).await?;
        if !actor.acts_for(property.owner_id) {
            return Err(BookingError::Forbidden);
        }

        let confirmed = self.confirmed_for_property(property_id).await?;
        if find_conflict(&candidate, &confirmed, None).is_some() {
            return Err(BookingError::DateConflict);
        }

        let inserted = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings
                (property_id, user_id, start_date, end_date, status, client_name, created_at)
             SELECT ?, ?, ?, ?, 'CONFIRMED', ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM bookings
                WHERE property_id = ? AND status = 'CONFIRMED'
                  AND start_date < ? AND ? < end_date
             )
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(property_id)
        .bind(actor.user_id)
        .bind(candidate.start)
        .bind(candidate.end)
        .bind(client_name)
        .bind(Utc::now())
        .bind(property_id)
        .bind(candidate.end)
        .bind(candidate.start)
        .fetch_optional(&*self.db)
        .await?;

        // Empty means another request confirmed an overlapping stay after the scan.
        let booking = inserted.ok_or(BookingError::DateConflict)?;
        info!(
            booking_id = booking.id,
            property_id, "external booking recorded"
        );
        Ok(booking)
    }

    /// Owner can manage bookings of their listings; the guest can cancel
    /// their own request; admins can do both.
    async fn ensure_can_manage(
        &self,
        actor: &Principal,
        booking: &Booking,
        guest_allowed: bool,
    ) -> BookingResult<()> {
        if actor.is_admin() || (guest_allowed && booking.user_id == actor.user_id) {
            return Ok(());
        }
        let property = self.property_access(booking.property_id).await?;
        if property.owner_id == actor.user_id {
            Ok(())
        } else {
            Err(BookingError::Forbidden)
        }
    }

    /// PENDING -> CONFIRMED, re-checking overlap against the other confirmed
    /// bookings of the property. Leaves state untouched on failure.
    pub async fn accept(&self, actor: &Principal, booking_id: i64) -> BookingResult<Booking> {
        let booking = self.get(booking_id).await?;
        self.ensure_can_manage(actor, &booking, false).await?;
        booking.status.accept()?;

        let confirmed = self.confirmed_for_property(booking.property_id).await?;
        if let Some(existing) = find_conflict(&booking.range(), &confirmed, Some(booking.id)) {
            debug!(
                "booking {} overlaps confirmed booking {} on property {}",
                booking.id, existing.id, booking.property_id
            );
            return Err(BookingError::DateConflict);
        }

        let updated = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = 'CONFIRMED'
             WHERE id = ? AND status = 'PENDING'
               AND NOT EXISTS (
                 SELECT 1 FROM bookings AS other
                 WHERE other.property_id = bookings.property_id
                   AND other.id <> bookings.id
                   AND other.status = 'CONFIRMED'
                   AND other.start_date < bookings.end_date
                   AND bookings.start_date < other.end_date
               )
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&*self.db)
        .await?;

        match updated {
            Some(booking) => {
                info!(
                    booking_id,
                    property_id = booking.property_id,
                    "booking confirmed"
                );
                Ok(booking)
            }
            None => {
                // Lost a race: either the status moved or an overlapping stay
                // was confirmed in between.
                let current = self.get(booking_id).await?;
                current.status.accept()?;
                Err(BookingError::DateConflict)
            }
        }
    }

    /// PENDING | CONFIRMED -> CANCELLED.
    pub async fn cancel(&self, actor: &Principal, booking_id: i64) -> BookingResult<Booking> {
        let booking = self.get(booking_id).await?;
        self.ensure_can_manage(actor, &booking, true).await?;
        booking.status.cancel()?;

        let updated = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = 'CANCELLED'
             WHERE id = ? AND status <> 'CANCELLED'
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BookingError::Transition(TransitionError::AlreadyCancelled))?;

        info!(
            booking_id,
            property_id = updated.property_id,
            "booking cancelled"
        );
        Ok(updated)
    }

    /// The owner's listings that have at least one PENDING booking.
    pub async fn owner_pending(&self, owner_id: i64) -> BookingResult<Vec<PropertyBookings>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE owner_id = ? ORDER BY id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;

        let pending = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE status = 'PENDING'
               AND property_id IN (SELECT id FROM properties WHERE owner_id = ?)
             ORDER BY start_date ASC"
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;

        let mut by_property: HashMap<i64, Vec<Booking>> = HashMap::new();
        for booking in pending {
            by_property
                .entry(booking.property_id)
                .or_default()
                .push(booking);
        }

        Ok(properties
            .into_iter()
            .filter_map(|property| {
                by_property
                    .remove(&property.id)
                    .map(|bookings| PropertyBookings { property, bookings })
            })
            .collect())
    }

    /// Every booking a user has made, newest first, with its listing.
    pub async fn history(&self, user_id: i64) -> BookingResult<Vec<BookingWithProperty>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE user_id = ?
             ORDER BY start_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;

        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties
             WHERE id IN (SELECT property_id FROM bookings WHERE user_id = ?)"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        let properties: HashMap<i64, Property> =
            properties.into_iter().map(|p| (p.id, p)).collect();

        Ok(bookings
            .into_iter()
            .filter_map(|booking| {
                properties
                    .get(&booking.property_id)
                    .cloned()
                    .map(|property| BookingWithProperty { booking, property })
            })
            .collect())
    }

    pub async fn owner_statistics(&self, owner_id: i64) -> BookingResult<OwnerStatistics> {
        let housing_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(&*self.db)
                .await?;

        let (bookings_count, completed_bookings_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN b.status = 'CONFIRMED' THEN 1 ELSE 0 END), 0)
             FROM bookings b JOIN properties p ON p.id = b.property_id
             WHERE p.owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(&*self.db)
        .await?;

        Ok(OwnerStatistics {
            housing_count,
            bookings_count,
            completed_bookings_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::user::Role,
        test_support::{
            date, file_db, memory_db, principal, remove_file_db, seed_booking, seed_marketplace,
            seed_property, seed_user,
        },
    };
    use chrono::Duration;

    async fn setup() -> (BookingService, crate::test_support::Marketplace) {
        let db = memory_db().await;
        let market = seed_marketplace(&db).await;
        (BookingService::new(db), market)
    }

    async fn confirmed_pairs_are_disjoint(service: &BookingService, property_id: i64) -> bool {
        let confirmed = service.confirmed_for_property(property_id).await.unwrap();
        confirmed.iter().enumerate().all(|(i, a)| {
            confirmed[i + 1..]
                .iter()
                .all(|b| !a.range().overlaps(&b.range()))
        })
    }

    #[tokio::test]
    async fn no_bookings_means_no_conflict() {
        let (service, m) = setup().await;
        let conflict = service
            .has_conflict(m.property, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();
        assert!(!conflict);
    }

    #[tokio::test]
    async fn only_confirmed_bookings_block_dates() {
        let (service, m) = setup().await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Pending,
        )
        .await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Cancelled,
        )
        .await;
        assert!(
            !service
                .has_conflict(m.property, date("2024-06-02"), date("2024-06-03"))
                .await
                .unwrap()
        );

        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        assert!(
            service
                .has_conflict(m.property, date("2024-06-02"), date("2024-06-03"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn create_starts_pending() {
        let (service, m) = setup().await;
        let booking = service
            .create_booking(m.property, m.guest, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.user_id, m.guest);
        assert!(booking.client_name.is_none());
    }

    #[tokio::test]
    async fn create_rejects_bad_range_and_overlap() {
        let (service, m) = setup().await;
        let err = service
            .create_booking(m.property, m.guest, date("2024-06-05"), date("2024-06-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRange));

        let far = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        let err = service
            .create_booking(m.property, m.guest, date("2024-06-01"), far)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRange));

        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        let err = service
            .create_booking(m.property, m.guest, date("2024-06-04"), date("2024-06-08"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DateConflict));

        // Check-in on the previous guest's check-out day is fine.
        service
            .create_booking(m.property, m.guest, date("2024-06-05"), date("2024-06-08"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_requires_approved_listing_of_someone_else() {
        let (service, m) = setup().await;
        let err = service
            .create_booking(m.property, m.owner, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::OwnProperty));

        let pending = seed_property(&service.db, m.owner, m.category, PropertyStatus::Pending).await;
        let err = service
            .create_booking(pending, m.guest, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::PropertyNotBookable(id) if id == pending));

        let err = service
            .create_booking(9999, m.guest, date("2024-06-01"), date("2024-06-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::PropertyNotFound(9999)));
    }

    #[tokio::test]
    async fn accept_conflicting_booking_is_rejected_and_state_kept() {
        let (service, m) = setup().await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        let pending = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-04",
            "2024-06-08",
            BookingStatus::Pending,
        )
        .await;

        let owner = principal(m.owner, Role::Owner);
        let err = service.accept(&owner, pending).await.unwrap_err();
        assert!(matches!(err, BookingError::DateConflict));
        assert_eq!(
            service.get(pending).await.unwrap().status,
            BookingStatus::Pending
        );
        assert!(confirmed_pairs_are_disjoint(&service, m.property).await);
    }

    #[tokio::test]
    async fn accept_adjacent_booking_succeeds() {
        let (service, m) = setup().await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        let pending = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-05",
            "2024-06-08",
            BookingStatus::Pending,
        )
        .await;

        let accepted = service
            .accept(&principal(m.owner, Role::Owner), pending)
            .await
            .unwrap();
        assert_eq!(accepted.status, BookingStatus::Confirmed);
        assert!(confirmed_pairs_are_disjoint(&service, m.property).await);
    }

    #[tokio::test]
    async fn accepting_one_of_two_overlapping_requests_blocks_the_other() {
        let (service, m) = setup().await;
        let first = service
            .create_booking(m.property, m.guest, date("2024-07-01"), date("2024-07-10"))
            .await
            .unwrap();
        let second = service
            .create_booking(m.property, m.guest, date("2024-07-05"), date("2024-07-12"))
            .await
            .unwrap();

        let owner = principal(m.owner, Role::Owner);
        service.accept(&owner, first.id).await.unwrap();
        let err = service.accept(&owner, second.id).await.unwrap_err();
        assert!(matches!(err, BookingError::DateConflict));
        assert!(confirmed_pairs_are_disjoint(&service, m.property).await);
    }

    #[tokio::test]
    async fn accept_twice_reports_already_confirmed() {
        let (service, m) = setup().await;
        let booking = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Pending,
        )
        .await;
        let owner = principal(m.owner, Role::Owner);
        service.accept(&owner, booking).await.unwrap();
        let err = service.accept(&owner, booking).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::Transition(TransitionError::AlreadyConfirmed)
        ));
    }

    #[tokio::test]
    async fn cancelled_booking_cannot_be_accepted() {
        let (service, m) = setup().await;
        let booking = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Cancelled,
        )
        .await;
        let err = service
            .accept(&principal(m.owner, Role::Owner), booking)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::Transition(TransitionError::AlreadyCancelled)
        ));
    }

    #[tokio::test]
    async fn cancel_twice_fails_without_side_effects() {
        let (service, m) = setup().await;
        let booking = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        let guest = principal(m.guest, Role::User);

        let cancelled = service.cancel(&guest, booking).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let err = service.cancel(&guest, booking).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::Transition(TransitionError::AlreadyCancelled)
        ));
        let after = service.get(booking).await.unwrap();
        assert_eq!(after.status, BookingStatus::Cancelled);
        assert_eq!(after.start_date, date("2024-06-01"));
    }

    #[tokio::test]
    async fn strangers_cannot_manage_bookings() {
        let (service, m) = setup().await;
        let stranger = seed_user(&service.db, "stranger", Role::User).await;
        let booking = seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Pending,
        )
        .await;

        let outsider = principal(stranger, Role::User);
        assert!(matches!(
            service.accept(&outsider, booking).await,
            Err(BookingError::Forbidden)
        ));
        assert!(matches!(
            service.cancel(&outsider, booking).await,
            Err(BookingError::Forbidden)
        ));
        // The guest may cancel but not accept their own request.
        assert!(matches!(
            service.accept(&principal(m.guest, Role::User), booking).await,
            Err(BookingError::Forbidden)
        ));
        // Admins may do anything.
        let admin = seed_user(&service.db, "admin", Role::Admin).await;
        service
            .accept(&principal(admin, Role::Admin), booking)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_booking_is_not_found() {
        let (service, m) = setup().await;
        let err = service
            .cancel(&principal(m.owner, Role::Owner), 404)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(404)));
    }

    #[tokio::test]
    async fn external_booking_is_confirmed_and_checked() {
        let (service, m) = setup().await;
        let owner = principal(m.owner, Role::Owner);
        let booking = service
            .book_external(
                &owner,
                m.property,
                "  Ivan Petrov ",
                date("2024-08-01"),
                date("2024-08-03"),
            )
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.client_name.as_deref(), Some("Ivan Petrov"));

        let err = service
            .book_external(
                &owner,
                m.property,
                "Someone",
                date("2024-08-02"),
                date("2024-08-04"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DateConflict));

        let err = service
            .book_external(
                &principal(m.guest, Role::User),
                m.property,
                "Someone",
                date("2024-09-01"),
                date("2024-09-02"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Forbidden));

        let err = service
            .book_external(&owner, m.property, "   ", date("2024-09-01"), date("2024-09-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::MissingClientName));
    }

    #[tokio::test]
    async fn owner_pending_lists_only_properties_with_requests() {
        let (service, m) = setup().await;
        let quiet = seed_property(&service.db, m.owner, m.category, PropertyStatus::Approved).await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Pending,
        )
        .await;
        seed_booking(
            &service.db,
            quiet,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;

        let pending = service.owner_pending(m.owner).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].property.id, m.property);
        assert_eq!(pending[0].bookings.len(), 1);

        assert!(service.owner_pending(m.guest).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_and_statistics() {
        let (service, m) = setup().await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-06-01",
            "2024-06-05",
            BookingStatus::Confirmed,
        )
        .await;
        seed_booking(
            &service.db,
            m.property,
            m.guest,
            "2024-07-01",
            "2024-07-05",
            BookingStatus::Pending,
        )
        .await;

        let history = service.history(m.guest).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].booking.start_date, date("2024-07-01"));
        assert_eq!(history[0].property.id, m.property);

        // Stays an owner records for walk-in clients are listed under the owner.
        service
            .book_external(
                &principal(m.owner, Role::Owner),
                m.property,
                "Walk-in",
                date("2024-08-01"),
                date("2024-08-03"),
            )
            .await
            .unwrap();
        let history = service.history(m.owner).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].booking.client_name.as_deref(), Some("Walk-in"));
        assert_eq!(service.history(m.guest).await.unwrap().len(), 2);

        let stats = service.owner_statistics(m.owner).await.unwrap();
        assert_eq!(
            stats,
            OwnerStatistics {
                housing_count: 1,
                bookings_count: 3,
                completed_bookings_count: 2,
            }
        );
        assert_eq!(
            service.owner_statistics(m.guest).await.unwrap(),
            OwnerStatistics {
                housing_count: 0,
                bookings_count: 0,
                completed_bookings_count: 0,
            }
        );
    }

    /// Outcome counts of two racing writes: (succeeded, rejected as conflict).
    fn tally(results: [BookingResult<Booking>; 2]) -> (usize, usize) {
        results.iter().fold((0, 0), |(ok, conflict), result| match result {
            Ok(_) => (ok + 1, conflict),
            Err(BookingError::DateConflict) => (ok, conflict + 1),
            Err(other) => panic!("unexpected error: {other}"),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_confirm_only_one_overlapping_stay() {
        let (db, path) = file_db().await;
        let m = seed_marketplace(&db).await;
        let service = BookingService::new(db.clone());
        let owner = principal(m.owner, Role::Owner);

        for round in 0..20 {
            let start = date("2030-01-01") + Duration::days(round * 30);
            let first = service
                .create_booking(m.property, m.guest, start, start + Duration::days(9))
                .await
                .unwrap();
            let second = service
                .create_booking(
                    m.property,
                    m.guest,
                    start + Duration::days(4),
                    start + Duration::days(11),
                )
                .await
                .unwrap();

            let a = tokio::spawn({
                let service = service.clone();
                async move { service.accept(&owner, first.id).await }
            });
            let b = tokio::spawn({
                let service = service.clone();
                async move { service.accept(&owner, second.id).await }
            });
            let (a, b) = tokio::join!(a, b);

            assert_eq!(tally([a.unwrap(), b.unwrap()]), (1, 1), "round {round}");
            assert!(confirmed_pairs_are_disjoint(&service, m.property).await);
        }

        remove_file_db(db, path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_external_bookings_record_only_one_overlapping_stay() {
        let (db, path) = file_db().await;
        let m = seed_marketplace(&db).await;
        let service = BookingService::new(db.clone());
        let owner = principal(m.owner, Role::Owner);

        for round in 0..20 {
            let start = date("2030-01-01") + Duration::days(round * 30);
            let spawn_external = |client: &'static str, from: i64, to: i64| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .book_external(
                            &owner,
                            m.property,
                            client,
                            start + Duration::days(from),
                            start + Duration::days(to),
                        )
                        .await
                })
            };
            let (a, b) = tokio::join!(spawn_external("Anna", 0, 9), spawn_external("Boris", 4, 11));

            assert_eq!(tally([a.unwrap(), b.unwrap()]), (1, 1), "round {round}");
            assert!(confirmed_pairs_are_disjoint(&service, m.property).await);
        }

        let confirmed = service.confirmed_for_property(m.property).await.unwrap();
        assert_eq!(confirmed.len(), 20);
        remove_file_db(db, path).await;
    }
}
