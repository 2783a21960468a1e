use crate::{
    models::booking::TransitionError,
    services::{
        admin_service::AdminError, auth_service::AuthError, booking_service::BookingError,
        chat_service::ChatError, property_service::PropertyError, review_service::ReviewError,
        upload_service::UploadError, user_service::UserError,
    },
};
use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Error returned by every handler: a status and a client-facing message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Log the cause and answer 500 with a generic message.
    pub fn internal(msg: impl fmt::Display) -> Self {
        tracing::error!("internal error: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            tracing::warn!(status = self.status.as_u16(), "{}", self.message);
        }
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::internal(err)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), err.body_text())
    }
}

// Extractor rejections answer 400 with axum's description.
impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::bad_request(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::bad_request(err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        // A route/handler mismatch, not bad input.
        if err.status().is_server_error() {
            return AppError::internal(err.body_text());
        }
        AppError::bad_request(err.body_text())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(_) | BookingError::PropertyNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            BookingError::PropertyNotBookable(_)
            | BookingError::InvalidRange
            | BookingError::OwnProperty
            | BookingError::MissingClientName => AppError::bad_request(err.to_string()),
            BookingError::Transition(inner) => inner.into(),
            BookingError::DateConflict => AppError::conflict(err.to_string()),
            BookingError::Forbidden => AppError::forbidden(err.to_string()),
            BookingError::Sqlx(e) => e.into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserExists => AppError::conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                AppError::unauthorized(err.to_string())
            }
            AuthError::Validation(_)
            | AuthError::OldPasswordRequired
            | AuthError::WrongOldPassword => AppError::bad_request(err.to_string()),
            AuthError::Inactive => AppError::forbidden(err.to_string()),
            AuthError::UserNotFound(_) => AppError::not_found(err.to_string()),
            AuthError::Hash(_) => AppError::internal(err),
            AuthError::Sqlx(e) => e.into(),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => AppError::not_found(err.to_string()),
            UserError::InvalidRole(_) | UserError::NoDocuments => {
                AppError::bad_request(err.to_string())
            }
            UserError::Forbidden(_) => AppError::forbidden(err.to_string()),
            UserError::Sqlx(e) => e.into(),
        }
    }
}

impl From<PropertyError> for AppError {
    fn from(err: PropertyError) -> Self {
        match err {
            PropertyError::NotFound(_) => AppError::not_found(err.to_string()),
            PropertyError::CategoryNotFound(_)
            | PropertyError::UnknownCriterion
            | PropertyError::Validation(_) => AppError::bad_request(err.to_string()),
            PropertyError::NotAnOwner | PropertyError::Forbidden(_) => {
                AppError::forbidden(err.to_string())
            }
            PropertyError::Sqlx(e) => e.into(),
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::PropertyNotFound(_) => AppError::not_found(err.to_string()),
            ReviewError::InvalidRating | ReviewError::OwnProperty => {
                AppError::bad_request(err.to_string())
            }
            ReviewError::Sqlx(e) => e.into(),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(_) | ChatError::PropertyNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            ChatError::OwnerMismatch | ChatError::EmptyMessage | ChatError::MessageTooLong => {
                AppError::bad_request(err.to_string())
            }
            ChatError::NotParticipant(_) | ChatError::Forbidden => {
                AppError::forbidden(err.to_string())
            }
            ChatError::Sqlx(e) => e.into(),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::MissingName | AdminError::InvalidStatus => {
                AppError::bad_request(err.to_string())
            }
            AdminError::Duplicate(_) | AdminError::CategoryInUse(_) => {
                AppError::conflict(err.to_string())
            }
            AdminError::CategoryNotFound(_)
            | AdminError::CriterionNotFound(_)
            | AdminError::UserNotFound(_)
            | AdminError::PropertyNotFound(_) => AppError::not_found(err.to_string()),
            AdminError::Sqlx(e) => e.into(),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFileName | UploadError::Empty => {
                AppError::bad_request(err.to_string())
            }
            UploadError::UnsupportedContentType(_) => {
                AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string())
            }
            UploadError::NotFound(_) => AppError::not_found(err.to_string()),
            UploadError::Io(e) => AppError::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_errors_map_to_statuses() {
        let cases = [
            (BookingError::NotFound(1), StatusCode::NOT_FOUND),
            (BookingError::InvalidRange, StatusCode::BAD_REQUEST),
            (BookingError::DateConflict, StatusCode::CONFLICT),
            (
                BookingError::Transition(TransitionError::AlreadyCancelled),
                StatusCode::BAD_REQUEST,
            ),
            (BookingError::Forbidden, StatusCode::FORBIDDEN),
            (BookingError::Sqlx(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::from(AuthError::Hash("bcrypt exploded".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn auth_errors_distinguish_401_and_403() {
        assert_eq!(
            AppError::from(AuthError::MissingToken).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::Inactive).status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AuthError::UserExists).status,
            StatusCode::CONFLICT
        );
    }
}
