//! Error types for acs-server
//!
//! Every error response body is `{"success": false, "error": <message>}`;
//! duplicate rejections add the duplicate details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ledger::LedgerError;
use crate::models::ProfileSummary;
use crate::registration::RegistrationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request or rejected state transition (400)
    #[error("{0}")]
    BadRequest(String),

    /// Concurrent modification that outlasted the retries (409)
    #[error("{0}")]
    Conflict(String),

    /// External id already registered (409)
    #[error("Profile with external id {0} already exists")]
    DuplicateExternalId(String),

    /// Template too similar to a stored one (409)
    #[error("Template matches an existing profile")]
    DuplicateTemplate {
        matched: ProfileSummary,
        similarity: f64,
    },

    /// A dependency needed to decide the request is down (503)
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// acs-common error
    #[error("{0}")]
    Common(#[from] acs_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_)
            | ApiError::DuplicateExternalId(_)
            | ApiError::DuplicateTemplate { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = match &self {
            ApiError::DuplicateExternalId(_) => json!({
                "success": false,
                "error": self.to_string(),
                "duplicateType": "EXTERNAL_ID",
            }),
            ApiError::DuplicateTemplate {
                matched,
                similarity,
            } => json!({
                "success": false,
                "error": self.to_string(),
                "duplicateType": "TEMPLATE",
                "similarity": format!("{:.2}", similarity),
                "matchedProfile": matched,
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => ApiError::BadRequest(msg),
            LedgerError::Conflict(reason) => ApiError::BadRequest(reason.to_string()),
            contention @ LedgerError::Contention => ApiError::Conflict(contention.to_string()),
            LedgerError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Validation(msg) => ApiError::BadRequest(msg),
            RegistrationError::DuplicateExternalId { external_id } => {
                ApiError::DuplicateExternalId(external_id)
            }
            RegistrationError::DuplicateTemplate {
                matched,
                similarity,
            } => ApiError::DuplicateTemplate {
                matched,
                similarity,
            },
            RegistrationError::Unavailable(e) => ApiError::Unavailable(e.to_string()),
            RegistrationError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::TransitionError;

    #[test]
    fn test_status_mapping() {
        let conflict: ApiError = LedgerError::Conflict(TransitionError::AlreadyClockedIn).into();
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(conflict.to_string(), "Already clocked in");

        let contention: ApiError = LedgerError::Contention.into();
        assert_eq!(contention.status(), StatusCode::CONFLICT);

        let storage: ApiError = LedgerError::Storage(acs_common::Error::Internal("x".into())).into();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let dup: ApiError = RegistrationError::DuplicateExternalId {
            external_id: "E001".into(),
        }
        .into();
        assert_eq!(dup.status(), StatusCode::CONFLICT);
    }
}
