//! Listings and the catalog data attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{
    booking::{Booking, BookingSlot},
    user::UserSummary,
};

/// Moderation state of a listing. Only approved listings are bookable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum PropertyStatus {
    Pending,
    Approved,
    Rejected,
}

/// A housing listing.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i64,

    /// User who published the listing.
    pub owner_id: i64,

    pub category_id: i64,

    pub name: String,

    pub description: String,

    /// Free-form address or area.
    pub location: String,

    pub price_per_night: f64,

    pub status: PropertyStatus,

    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Amenity tag a listing can carry (e.g. "Wi-Fi").
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Criterion {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub id: i64,
    pub property_id: i64,
    /// Public path the image is served from, e.g. `/images/<file>`.
    pub image_url: String,
}

/// Catalog card: the listing plus what the list view needs to render it.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub property: Property,
    pub owner: UserSummary,
    pub category: Category,
    pub bookings: Vec<BookingSlot>,
    /// At most one image, the cover.
    pub images: Vec<PropertyImage>,
}

/// Full listing page.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetails {
    #[serde(flatten)]
    pub property: Property,
    pub owner: UserSummary,
    pub category: Category,
    pub bookings: Vec<Booking>,
    pub images: Vec<PropertyImage>,
    pub criteria: Vec<Criterion>,
}

/// Listing returned after an edit.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWithImages {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
}

/// Fields of a new listing.
#[derive(Debug, Clone, Default)]
pub struct NewProperty {
    pub name: String,
    pub description: String,
    pub location: String,
    pub price_per_night: f64,
    pub category_id: i64,
    pub criteria: Vec<i64>,
}

/// Partial edit of a listing. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PropertyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price_per_night: Option<f64>,
    pub category_id: Option<i64>,
    /// Replaces the criteria set when present and non-empty.
    pub criteria: Option<Vec<i64>>,
    pub image_ids_to_delete: Vec<i64>,
}
