//! src/services/property_service.rs
//!
//! PropertyService: the catalog, listing pages and listing CRUD, including
//! images and criteria. Deleting a listing removes everything that hangs off
//! it (bookings, reviews, chats, images) in one transaction.

use crate::{
    models::{
        booking::{Booking, BookingSlot},
        property::{
            CatalogEntry, Category, Criterion, NewProperty, Property, PropertyDetails,
            PropertyImage, PropertyStatus, PropertyUpdate, PropertyWithImages,
        },
        user::{Principal, Role, UserSummary},
    },
    services::upload_service::UploadService,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

const PROPERTY_COLUMNS: &str = "id, owner_id, category_id, name, description, location, \
     price_per_night, status, created_at";

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property {0} not found")]
    NotFound(i64),
    #[error("category {0} not found")]
    CategoryNotFound(i64),
    #[error("one or more criteria do not exist")]
    UnknownCriterion,
    #[error("{0}")]
    Validation(String),
    #[error("only owners can publish listings")]
    NotAnOwner,
    #[error("not allowed to modify property {0}")]
    Forbidden(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PropertyResult<T> = Result<T, PropertyError>;

#[derive(Clone)]
pub struct PropertyService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// Used to drop image files once their rows are gone.
    pub uploads: UploadService,
}

impl PropertyService {
    pub fn new(db: Arc<SqlitePool>, uploads: UploadService) -> Self {
        Self { db, uploads }
    }

    pub async fn get(&self, id: i64) -> PropertyResult<Property> {
        sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(PropertyError::NotFound(id))
    }

    async fn owner_summary(&self, owner_id: i64) -> PropertyResult<UserSummary> {
        let owner = sqlx::query_as::<_, UserSummary>(
            "SELECT id, login, email FROM users WHERE id = ?",
        )
        .bind(owner_id)
        .fetch_one(&*self.db)
        .await?;
        Ok(owner)
    }

    async fn category(&self, category_id: i64) -> PropertyResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(PropertyError::CategoryNotFound(category_id))
    }

    async fn images(&self, property_id: i64, limit: Option<i64>) -> PropertyResult<Vec<PropertyImage>> {
        let images = sqlx::query_as::<_, PropertyImage>(
            "SELECT id, property_id, image_url FROM property_images
             WHERE property_id = ? ORDER BY id ASC LIMIT ?",
        )
        .bind(property_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&*self.db)
        .await?;
        Ok(images)
    }

    async fn criteria(&self, property_id: i64) -> PropertyResult<Vec<Criterion>> {
        let criteria = sqlx::query_as::<_, Criterion>(
            "SELECT c.id, c.name FROM criteria c
             JOIN property_criteria pc ON pc.criterion_id = c.id
             WHERE pc.property_id = ? ORDER BY c.name ASC",
        )
        .bind(property_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(criteria)
    }

    /// Listings visible to `viewer`.
    ///
    /// Anonymous visitors and guests see approved listings of other people,
    /// owners see their own listings in any state, admins see everything.
    pub async fn catalog(&self, viewer: Option<&Principal>) -> PropertyResult<Vec<CatalogEntry>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PROPERTY_COLUMNS} FROM properties"));
        match viewer {
            Some(p) if p.role == Role::Admin => {}
            Some(p) if p.role == Role::Owner => {
                builder.push(" WHERE owner_id = ");
                builder.push_bind(p.user_id);
            }
            other => {
                builder.push(" WHERE status = 'APPROVED' AND owner_id <> ");
                builder.push_bind(other.map(|p| p.user_id).unwrap_or(-1));
            }
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let properties: Vec<Property> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut entries = Vec::with_capacity(properties.len());
        for property in properties {
            let bookings = sqlx::query_as::<_, BookingSlot>(
                "SELECT start_date, end_date, status FROM bookings
                 WHERE property_id = ? AND status <> 'CANCELLED'
                 ORDER BY start_date ASC",
            )
            .bind(property.id)
            .fetch_all(&*self.db)
            .await?;

            entries.push(CatalogEntry {
                owner: self.owner_summary(property.owner_id).await?,
                category: self.category(property.category_id).await?,
                images: self.images(property.id, Some(1)).await?,
                bookings,
                property,
            });
        }

        debug!("catalog returned {} listings", entries.len());
        Ok(entries)
    }

    /// Everything the listing page shows.
    pub async fn details(&self, id: i64) -> PropertyResult<PropertyDetails> {
        let property = self.get(id).await?;
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, property_id, user_id, start_date, end_date, status, client_name, created_at
             FROM bookings WHERE property_id = ? ORDER BY start_date ASC",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;

        Ok(PropertyDetails {
            owner: self.owner_summary(property.owner_id).await?,
            category: self.category(property.category_id).await?,
            images: self.images(id, None).await?,
            criteria: self.criteria(id).await?,
            bookings,
            property,
        })
    }

    fn ensure_can_modify(actor: &Principal, property: &Property) -> PropertyResult<()> {
        if actor.acts_for(property.owner_id) {
            Ok(())
        } else {
            Err(PropertyError::Forbidden(property.id))
        }
    }

    /// Fail unless every id names an existing criterion. Returns the ids deduplicated.
    async fn checked_criteria(&self, ids: &[i64]) -> PropertyResult<Vec<i64>> {
        let unique: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if unique.is_empty() {
            return Ok(unique);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM criteria WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &unique {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let found: i64 = builder.build_query_scalar().fetch_one(&*self.db).await?;

        if found as usize != unique.len() {
            return Err(PropertyError::UnknownCriterion);
        }
        Ok(unique)
    }

    /// Publish a listing. It starts PENDING until an admin approves it.
    pub async fn create(
        &self,
        actor: &Principal,
        new: NewProperty,
        image_urls: &[String],
    ) -> PropertyResult<PropertyDetails> {
        if actor.role == Role::User {
            return Err(PropertyError::NotAnOwner);
        }
        validate_text("name", &new.name)?;
        validate_text("description", &new.description)?;
        validate_text("location", &new.location)?;
        validate_price(new.price_per_night)?;
        self.category(new.category_id).await?;
        let criteria = self.checked_criteria(&new.criteria).await?;

        let mut tx = self.db.begin().await?;
        let property_id: i64 = sqlx::query_scalar(
            "INSERT INTO properties
                (owner_id, category_id, name, description, location, price_per_night, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(actor.user_id)
        .bind(new.category_id)
        .bind(new.name.trim())
        .bind(new.description.trim())
        .bind(new.location.trim())
        .bind(new.price_per_night)
        .bind(PropertyStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        insert_criteria(&mut tx, property_id, &criteria).await?;
        insert_images(&mut tx, property_id, image_urls).await?;
        tx.commit().await?;

        info!(property_id, owner_id = actor.user_id, "listing created");
        self.details(property_id).await
    }

    /// Partial edit: text fields, price, category, criteria and images.
    pub async fn update(
        &self,
        actor: &Principal,
        id: i64,
        update: PropertyUpdate,
        new_image_urls: &[String],
    ) -> PropertyResult<PropertyWithImages> {
        let current = self.get(id).await?;
        Self::ensure_can_modify(actor, &current)?;

        if let Some(name) = &update.name {
            validate_text("name", name)?;
        }
        if let Some(description) = &update.description {
            validate_text("description", description)?;
        }
        if let Some(location) = &update.location {
            validate_text("location", location)?;
        }
        if let Some(price) = update.price_per_night {
            validate_price(price)?;
        }
        if let Some(category_id) = update.category_id {
            self.category(category_id).await?;
        }
        let criteria = match update.criteria.as_deref() {
            Some(ids) if !ids.is_empty() => Some(self.checked_criteria(ids).await?),
            _ => None,
        };

        let mut tx = self.db.begin().await?;

        let mut removed_urls: Vec<String> = Vec::new();
        if !update.image_ids_to_delete.is_empty() {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "DELETE FROM property_images WHERE property_id = ",
            );
            builder.push_bind(id);
            builder.push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for image_id in &update.image_ids_to_delete {
                separated.push_bind(*image_id);
            }
            separated.push_unseparated(") RETURNING image_url");
            removed_urls = builder.build_query_scalar().fetch_all(&mut *tx).await?;
        }

        insert_images(&mut tx, id, new_image_urls).await?;

        sqlx::query(
            "UPDATE properties SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                price_per_night = COALESCE(?, price_per_night),
                category_id = COALESCE(?, category_id)
             WHERE id = ?",
        )
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.description.as_deref().map(str::trim))
        .bind(update.location.as_deref().map(str::trim))
        .bind(update.price_per_night)
        .bind(update.category_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(criteria) = criteria {
            sqlx::query("DELETE FROM property_criteria WHERE property_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_criteria(&mut tx, id, &criteria).await?;
        }

        tx.commit().await?;
        self.uploads
            .remove_urls(removed_urls.iter().map(String::as_str))
            .await;

        info!(property_id = id, "listing updated");
        Ok(PropertyWithImages {
            property: self.get(id).await?,
            images: self.images(id, None).await?,
        })
    }

    /// Remove a listing and everything attached to it.
    pub async fn delete(&self, actor: &Principal, id: i64) -> PropertyResult<()> {
        let property = self.get(id).await?;
        Self::ensure_can_modify(actor, &property)?;

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "DELETE FROM messages WHERE chat_id IN (SELECT id FROM chats WHERE property_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        for table in ["chats", "reviews", "bookings", "property_criteria"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE property_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let image_urls: Vec<String> = sqlx::query_scalar(
            "DELETE FROM property_images WHERE property_id = ? RETURNING image_url",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.uploads
            .remove_urls(image_urls.iter().map(String::as_str))
            .await;

        info!(property_id = id, "listing deleted with its bookings, reviews and chats");
        Ok(())
    }
}

async fn insert_criteria(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    property_id: i64,
    criteria: &[i64],
) -> PropertyResult<()> {
    if criteria.is_empty() {
        return Ok(());
    }
    let mut builder =
        QueryBuilder::<Sqlite>::new("INSERT INTO property_criteria (property_id, criterion_id) ");
    builder.push_values(criteria, |mut row, criterion_id| {
        row.push_bind(property_id).push_bind(*criterion_id);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

async fn insert_images(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    property_id: i64,
    image_urls: &[String],
) -> PropertyResult<()> {
    if image_urls.is_empty() {
        return Ok(());
    }
    let mut builder =
        QueryBuilder::<Sqlite>::new("INSERT INTO property_images (property_id, image_url) ");
    builder.push_values(image_urls, |mut row, url| {
        row.push_bind(property_id).push_bind(url.as_str());
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

fn validate_text(field: &str, value: &str) -> PropertyResult<()> {
    if value.trim().is_empty() {
        return Err(PropertyError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_price(price: f64) -> PropertyResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(PropertyError::Validation(
            "pricePerNight must be a positive number".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::booking::BookingStatus,
        test_support::{
            Marketplace, memory_db, principal, seed_booking, seed_criterion, seed_marketplace,
            seed_property, seed_user,
        },
    };
    use uuid::Uuid;

    async fn setup() -> (PropertyService, Marketplace) {
        let db = memory_db().await;
        let market = seed_marketplace(&db).await;
        let uploads = UploadService::new(
            std::env::temp_dir().join(format!("housing-props-{}", Uuid::new_v4())),
        );
        (PropertyService::new(db, uploads), market)
    }

    fn new_listing(category_id: i64, criteria: Vec<i64>) -> NewProperty {
        NewProperty {
            name: " Loft ".into(),
            description: "Sunny loft".into(),
            location: "Center".into(),
            price_per_night: 80.0,
            category_id,
            criteria,
        }
    }

    #[tokio::test]
    async fn owner_creates_pending_listing_with_criteria_and_images() {
        let (service, m) = setup().await;
        let wifi = seed_criterion(&service.db, "Wi-Fi").await;
        let parking = seed_criterion(&service.db, "Parking").await;

        let details = service
            .create(
                &principal(m.owner, Role::Owner),
                new_listing(m.category, vec![wifi, parking, wifi]),
                &["/images/a.jpg".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(details.property.name, "Loft");
        assert_eq!(details.property.status, PropertyStatus::Pending);
        assert_eq!(details.owner.id, m.owner);
        assert_eq!(details.criteria.len(), 2);
        assert_eq!(details.images.len(), 1);
        assert_eq!(details.images[0].image_url, "/images/a.jpg");
    }

    #[tokio::test]
    async fn create_validates_input() {
        let (service, m) = setup().await;
        let owner = principal(m.owner, Role::Owner);

        assert!(matches!(
            service
                .create(&principal(m.guest, Role::User), new_listing(m.category, vec![]), &[])
                .await,
            Err(PropertyError::NotAnOwner)
        ));

        let mut bad_price = new_listing(m.category, vec![]);
        bad_price.price_per_night = 0.0;
        assert!(matches!(
            service.create(&owner, bad_price, &[]).await,
            Err(PropertyError::Validation(_))
        ));

        let mut blank = new_listing(m.category, vec![]);
        blank.location = "   ".into();
        assert!(matches!(
            service.create(&owner, blank, &[]).await,
            Err(PropertyError::Validation(_))
        ));

        assert!(matches!(
            service.create(&owner, new_listing(777, vec![]), &[]).await,
            Err(PropertyError::CategoryNotFound(777))
        ));
        assert!(matches!(
            service.create(&owner, new_listing(m.category, vec![555]), &[]).await,
            Err(PropertyError::UnknownCriterion)
        ));
    }

    #[tokio::test]
    async fn catalog_visibility_depends_on_viewer() {
        let (service, m) = setup().await;
        let pending = seed_property(&service.db, m.owner, m.category, PropertyStatus::Pending).await;
        let admin = seed_user(&service.db, "admin", Role::Admin).await;

        let anonymous = service.catalog(None).await.unwrap();
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous[0].property.id, m.property);
        assert_eq!(anonymous[0].owner.login, "owner");
        assert_eq!(anonymous[0].category.name, "Apartment");

        let guest = service
            .catalog(Some(&principal(m.guest, Role::User)))
            .await
            .unwrap();
        assert_eq!(guest.len(), 1);

        let owner = service
            .catalog(Some(&principal(m.owner, Role::Owner)))
            .await
            .unwrap();
        let ids: BTreeSet<i64> = owner.iter().map(|e| e.property.id).collect();
        assert_eq!(ids, BTreeSet::from([m.property, pending]));

        let all = service
            .catalog(Some(&principal(admin, Role::Admin)))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn catalog_shows_active_booking_slots() {
        let (service, m) = setup().await;
        seed_booking(&service.db, m.property, m.guest, "2024-06-01", "2024-06-05", BookingStatus::Confirmed).await;
        seed_booking(&service.db, m.property, m.guest, "2024-07-01", "2024-07-05", BookingStatus::Cancelled).await;

        let catalog = service.catalog(None).await.unwrap();
        assert_eq!(catalog[0].bookings.len(), 1);
        assert_eq!(catalog[0].bookings[0].status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn update_edits_fields_criteria_and_images() {
        let (service, m) = setup().await;
        let owner = principal(m.owner, Role::Owner);
        let wifi = seed_criterion(&service.db, "Wi-Fi").await;
        let pool = seed_criterion(&service.db, "Pool").await;
        let created = service
            .create(
                &owner,
                new_listing(m.category, vec![wifi]),
                &["/images/old.jpg".to_string()],
            )
            .await
            .unwrap();
        let old_image = created.images[0].id;

        let updated = service
            .update(
                &owner,
                created.property.id,
                PropertyUpdate {
                    price_per_night: Some(95.5),
                    criteria: Some(vec![pool]),
                    image_ids_to_delete: vec![old_image],
                    ..Default::default()
                },
                &["/images/new.jpg".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(updated.property.price_per_night, 95.5);
        assert_eq!(updated.property.name, "Loft");
        assert_eq!(updated.images.len(), 1);
        assert_eq!(updated.images[0].image_url, "/images/new.jpg");

        let details = service.details(created.property.id).await.unwrap();
        assert_eq!(details.criteria.len(), 1);
        assert_eq!(details.criteria[0].id, pool);
    }

    #[tokio::test]
    async fn only_owner_or_admin_can_edit_or_delete() {
        let (service, m) = setup().await;
        let stranger = principal(m.guest, Role::User);
        assert!(matches!(
            service
                .update(&stranger, m.property, PropertyUpdate::default(), &[])
                .await,
            Err(PropertyError::Forbidden(id)) if id == m.property
        ));
        assert!(matches!(
            service.delete(&stranger, m.property).await,
            Err(PropertyError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(&stranger, 4040).await,
            Err(PropertyError::NotFound(4040))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_bookings_reviews_and_chats() {
        let (service, m) = setup().await;
        seed_booking(&service.db, m.property, m.guest, "2024-06-01", "2024-06-05", BookingStatus::Confirmed).await;
        sqlx::query(
            "INSERT INTO reviews (property_id, user_id, rating, comment, created_at)
             VALUES (?, ?, 5, 'great', ?)",
        )
        .bind(m.property)
        .bind(m.guest)
        .bind(Utc::now())
        .execute(&*service.db)
        .await
        .unwrap();
        let chat: i64 = sqlx::query_scalar(
            "INSERT INTO chats (owner_id, user_id, property_id, created_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(m.owner)
        .bind(m.guest)
        .bind(m.property)
        .bind(Utc::now())
        .fetch_one(&*service.db)
        .await
        .unwrap();
        sqlx::query("INSERT INTO messages (chat_id, sender_id, content, created_at) VALUES (?, ?, 'hi', ?)")
            .bind(chat)
            .bind(m.guest)
            .bind(Utc::now())
            .execute(&*service.db)
            .await
            .unwrap();

        service
            .delete(&principal(m.owner, Role::Owner), m.property)
            .await
            .unwrap();

        for table in ["bookings", "reviews", "chats", "messages", "properties"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&*service.db)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty");
        }
    }
}
