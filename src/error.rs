//! Error types shared by the service layer and the HTTP transport.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input that the caller can correct (ranges, statement counts, nicknames).
    #[error("{0}")]
    Validation(String),
    /// Party, player, round, statement or session is absent.
    #[error("{0}")]
    NotFound(String),
    /// Caller is not a party member, not the narrator or not an eligible voter.
    #[error("{0}")]
    Unauthorized(String),
    /// Operation is invalid for the current party or round state.
    #[error("{0}")]
    Conflict(String),
    /// Storage backend failed to serve the request.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Stored records contradict each other; the store is corrupted.
    #[error("corrupted party state: {0}")]
    Corrupted(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        let message = err
            .message
            .map(|message| message.into_owned())
            .unwrap_or_else(|| err.code.into_owned());
        ServiceError::Validation(message)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        let first = err
            .field_errors()
            .into_values()
            .flat_map(|errors| errors.iter())
            .next()
            .cloned();
        match first {
            Some(error) => error.into(),
            None => ServiceError::Validation(format!("validation failed: {err}")),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Caller is not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Storage backend unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Unauthorized(message) => AppError::Forbidden(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Corrupted(message) => AppError::Internal(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::from(err).into()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let code = if status.is_server_error() {
            "INTERNAL_ERROR"
        } else {
            "REQUEST_ERROR"
        };

        let payload = Json(ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_keeps_custom_message() {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some("nickname required (1-32 chars)".into());
        let service: ServiceError = err.into();
        assert!(matches!(
            service,
            ServiceError::Validation(ref message) if message == "nickname required (1-32 chars)"
        ));
    }

    #[test]
    fn service_errors_map_to_http_kinds() {
        let conflict: AppError = ServiceError::Conflict("party not in lobby".into()).into();
        assert!(matches!(conflict, AppError::Conflict(_)));

        let auth: AppError = ServiceError::Unauthorized("party member only".into()).into();
        assert!(matches!(auth, AppError::Forbidden(_)));

        let corrupted: AppError = ServiceError::Corrupted("round without party".into()).into();
        assert!(matches!(corrupted, AppError::Internal(_)));
    }
}
