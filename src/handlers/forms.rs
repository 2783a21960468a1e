//! Multipart form parsing for listings and verification uploads.
//!
//! File parts are streamed straight to [`UploadService`]; text parts are
//! collected by name. If parsing fails half way, files already written are
//! removed again.

use crate::{
    errors::AppError,
    models::property::{NewProperty, PropertyUpdate},
    services::upload_service::{UploadKind, UploadService},
};
use axum::extract::{Multipart, multipart::Field};
use futures::StreamExt;
use std::{collections::HashMap, io, str::FromStr};

/// Text fields and stored files of a listing form.
#[derive(Debug, Default)]
pub struct ListingForm {
    fields: HashMap<String, String>,
    criteria: Option<Vec<i64>>,
    image_ids_to_delete: Vec<i64>,
    pub image_urls: Vec<String>,
}

impl ListingForm {
    pub async fn read(uploads: &UploadService, mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ListingForm::default();
        let result = form.fill(uploads, &mut multipart).await;
        if let Err(err) = result {
            uploads.remove_urls(form.image_urls.iter().map(String::as_str)).await;
            return Err(err);
        }
        Ok(form)
    }

    async fn fill(
        &mut self,
        uploads: &UploadService,
        multipart: &mut Multipart,
    ) -> Result<(), AppError> {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() || name == "images" {
                let stored = store_field(uploads, UploadKind::Image, field).await?;
                self.image_urls.push(stored);
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "criteria" => self
                    .criteria
                    .get_or_insert_with(Vec::new)
                    .extend(parse_id_list("criteria", &value)?),
                "imageIdsToDelete" => self
                    .image_ids_to_delete
                    .extend(parse_id_list("imageIdsToDelete", &value)?),
                _ => {
                    self.fields.insert(name, value);
                }
            }
        }
        Ok(())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| AppError::bad_request(format!("`{}` is not a valid number", name)))
            })
            .transpose()
    }

    fn required<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.parsed(name)?
            .ok_or_else(|| AppError::bad_request(format!("`{}` is required", name)))
    }

    /// Fields for a new listing. Text fields are validated by the service.
    pub fn new_property(&self) -> Result<NewProperty, AppError> {
        Ok(NewProperty {
            name: self.text("name").unwrap_or_default(),
            description: self.text("description").unwrap_or_default(),
            location: self.text("location").unwrap_or_default(),
            price_per_night: self.required("pricePerNight")?,
            category_id: self.required("categoryId")?,
            criteria: self.criteria.clone().unwrap_or_default(),
        })
    }

    pub fn property_update(&self) -> Result<PropertyUpdate, AppError> {
        Ok(PropertyUpdate {
            name: self.text("name"),
            description: self.text("description"),
            location: self.text("location"),
            price_per_night: self.parsed("pricePerNight")?,
            category_id: self.parsed("categoryId")?,
            criteria: self.criteria.clone(),
            image_ids_to_delete: self.image_ids_to_delete.clone(),
        })
    }
}

/// Store every file part of a verification upload as a document.
pub async fn read_documents(
    uploads: &UploadService,
    mut multipart: Multipart,
) -> Result<Vec<String>, AppError> {
    let mut urls = Vec::new();
    loop {
        let next = match multipart.next_field().await {
            Ok(next) => next,
            Err(err) => {
                uploads.remove_urls(urls.iter().map(String::as_str)).await;
                return Err(err.into());
            }
        };
        let Some(field) = next else { break };
        if field.file_name().is_none() {
            continue;
        }
        match store_field(uploads, UploadKind::Document, field).await {
            Ok(url) => urls.push(url),
            Err(err) => {
                uploads.remove_urls(urls.iter().map(String::as_str)).await;
                return Err(err);
            }
        }
    }
    Ok(urls)
}

/// Remove files stored for a request whose service call failed.
pub async fn discard_on_error<T>(
    uploads: &UploadService,
    urls: &[String],
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if result.is_err() {
        uploads.remove_urls(urls.iter().map(String::as_str)).await;
    }
    result
}

async fn store_field(
    uploads: &UploadService,
    kind: UploadKind,
    field: Field<'_>,
) -> Result<String, AppError> {
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    let stream = field.map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));

    let stored = uploads
        .store_stream(kind, file_name.as_deref(), content_type.as_deref(), stream)
        .await?;
    tracing::debug!(file = %stored.file_name, size = stored.size_bytes, "upload stored");
    Ok(stored.url)
}

/// `[1, 2]`, `1,2` or a single `1`.
fn parse_id_list(name: &str, raw: &str) -> Result<Vec<i64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let invalid = || AppError::bad_request(format!("`{}` must be a list of ids", name));
    if raw.starts_with('[') {
        return serde_json::from_str::<Vec<i64>>(raw).map_err(|_| invalid());
    }
    raw.split(',')
        .map(|part| part.trim().parse::<i64>().map_err(|_| invalid()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_accept_json_and_csv() {
        assert_eq!(parse_id_list("criteria", "[1, 2,3]").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("criteria", "4, 5").unwrap(), vec![4, 5]);
        assert_eq!(parse_id_list("criteria", "7").unwrap(), vec![7]);
        assert!(parse_id_list("criteria", "").unwrap().is_empty());
        assert!(parse_id_list("criteria", "[1, \"x\"]").is_err());
        assert!(parse_id_list("criteria", "a,b").is_err());
    }

    #[test]
    fn listing_fields_are_parsed() {
        let mut form = ListingForm::default();
        form.fields.insert("name".into(), " Loft ".into());
        form.fields.insert("pricePerNight".into(), "42.5".into());
        form.fields.insert("categoryId".into(), "3".into());
        form.criteria = Some(vec![1]);

        let new = form.new_property().unwrap();
        assert_eq!(new.name, "Loft");
        assert_eq!(new.price_per_night, 42.5);
        assert_eq!(new.category_id, 3);
        assert_eq!(new.criteria, vec![1]);

        let update = form.property_update().unwrap();
        assert_eq!(update.name.as_deref(), Some("Loft"));
        assert_eq!(update.description, None);
        assert_eq!(update.category_id, Some(3));

        form.fields.insert("pricePerNight".into(), "cheap".into());
        assert_eq!(
            form.new_property().unwrap_err().status,
            axum::http::StatusCode::BAD_REQUEST
        );
    }
}
