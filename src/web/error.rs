use std::fmt::Display;

use salvo::prelude::*;
use salvo::writing::Scribe;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::db::DatabaseError;
use crate::media::MediaError;
use crate::utils::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<ValidationErrors>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid(message: impl Into<String>, details: ValidationErrors) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("Unauthorized".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Logs the underlying error and answers with `message` only.
    pub fn internal(message: &str, err: impl Display) -> Self {
        error!("{}: {}", message, err);
        Self::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Scribe for ApiError {
    fn render(self, res: &mut Response) {
        res.status_code(self.status());
        let body = match self {
            Self::BadRequest {
                message,
                details: Some(details),
            } => json!({ "error": message, "details": details }),
            other => json!({ "error": other.to_string() }),
        };
        res.render(Json(body));
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(message) => {
                warn!("constraint violation: {}", message);
                Self::Conflict("Request conflicts with existing data".to_string())
            }
            other => Self::internal("Database error", other),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidKey(_) => Self::bad_request("Invalid file path"),
            MediaError::UnknownKind(_) => Self::bad_request("Invalid file type"),
            MediaError::UnsupportedType { kind, .. } => {
                Self::bad_request(format!("Invalid {kind} format"))
            }
            err @ MediaError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            MediaError::Io(err) => Self::internal("Storage error", err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            err @ AuthError::AdminExists(_) => Self::Conflict(err.to_string()),
            err @ AuthError::WeakPassword => Self::bad_request(err.to_string()),
            AuthError::Database(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use test_case::test_case;

    #[test_case(ApiError::bad_request("x"), StatusCode::BAD_REQUEST)]
    #[test_case(ApiError::unauthorized(), StatusCode::UNAUTHORIZED)]
    #[test_case(ApiError::not_found("x"), StatusCode::NOT_FOUND)]
    #[test_case(ApiError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[test_case(ApiError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE)]
    #[test_case(ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_variants_to_status(err: ApiError, expected: StatusCode) {
        assert_eq!(err.status(), expected);
    }

    #[test]
    fn database_conflicts_become_409_and_other_failures_500() {
        let conflict: ApiError = DatabaseError::Conflict("FOREIGN KEY constraint failed".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let failure: ApiError = DatabaseError::Query("disk I/O error".into()).into();
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.to_string(), "Database error");
    }

    #[test]
    fn media_errors_keep_client_facing_messages() {
        let unsupported: ApiError = MediaError::UnsupportedType {
            kind: MediaKind::Video,
            content_type: "image/png".into(),
        }
        .into();
        assert_eq!(unsupported.to_string(), "Invalid video format");

        let too_large: ApiError = MediaError::TooLarge { size: 20, max: 10 }.into();
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn bad_credentials_are_unauthorized() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
