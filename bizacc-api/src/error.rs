/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; domain errors from
/// `bizacc-shared` convert with `?`.
///
/// Access policy failures carry the path the client should go to next
/// (`/login` or `/pending-approval`) in the `redirect` field of the body.
///
/// # Example
///
/// ```
/// use bizacc_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(id: Option<String>) -> ApiResult<Json<Value>> {
///     let id = id.ok_or_else(|| ApiError::NotFound("Record not found".to_string()))?;
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bizacc_shared::auth::jwt::JwtError;
use bizacc_shared::auth::password::PasswordError;
use bizacc_shared::auth::policy::AccessDecision;
use bizacc_shared::auth::workflow::WorkflowError;
use bizacc_shared::customers::CustomerError;
use bizacc_shared::migration::ReconcileError;
use bizacc_shared::models::actor::ActorError;
use bizacc_shared::models::invoice::SalesDocumentError;
use bizacc_shared::models::password_reset::PasswordResetError;
use bizacc_shared::quota::QuotaError;
use bizacc_shared::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401), optionally pointing at the login page
    Unauthorized {
        message: String,
        redirect: Option<&'static str>,
    },

    /// Forbidden (403), optionally pointing at the pending-approval page
    Forbidden {
        message: String,
        redirect: Option<&'static str>,
    },

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - duplicate email, concurrent write
    Conflict(String),

    /// Plan limit reached (402)
    QuotaExceeded(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            redirect: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            redirect: None,
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    /// Where the client should navigate next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized { message, .. } => write!(f, "Unauthorized: {}", message),
            ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details, redirect) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None, None),
            ApiError::Unauthorized { message, redirect } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message, None, redirect)
            }
            ApiError::Forbidden { message, redirect } => {
                (StatusCode::FORBIDDEN, "forbidden", message, None, redirect)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None, None),
            ApiError::QuotaExceeded(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "quota_exceeded", msg, None, None)
            }
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
                None,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
            redirect: redirect.map(str::to_string),
        });

        (status, body).into_response()
    }
}

impl From<AccessDecision> for ApiError {
    fn from(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::RedirectLogin => ApiError::Unauthorized {
                message: "Sign in required".to_string(),
                redirect: decision.redirect(),
            },
            AccessDecision::RedirectPendingApproval => ApiError::Forbidden {
                message: "Account is awaiting approval".to_string(),
                redirect: decision.redirect(),
            },
            AccessDecision::Forbidden | AccessDecision::Allow => {
                ApiError::forbidden("Insufficient permissions")
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::RetriesExhausted { .. } => {
                ApiError::Conflict("The data changed while saving; please retry".to_string())
            }
            StoreError::Corrupt { key, reason } => {
                tracing::error!(%key, %reason, "Refusing to write over unreadable collection");
                ApiError::InternalError("Stored data could not be read; nothing was changed".to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<ActorError> for ApiError {
    fn from(err: ActorError) -> Self {
        match err {
            ActorError::EmailTaken(_) => ApiError::Conflict("Email already registered".to_string()),
            ActorError::NotFound(id) => ApiError::NotFound(format!("User {} not found", id)),
            ActorError::Transition(e) => ApiError::Conflict(e.to_string()),
            ActorError::Store(e) => e.into(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Denied(decision) => decision.into(),
            WorkflowError::Forbidden(msg) => ApiError::forbidden(msg),
            WorkflowError::SelfAction => ApiError::forbidden(err.to_string()),
            WorkflowError::NotFound(id) => ApiError::NotFound(format!("User {} not found", id)),
            WorkflowError::Transition(e) => ApiError::Conflict(e.to_string()),
            WorkflowError::Store(e) => e.into(),
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::LimitExceeded { .. } => ApiError::QuotaExceeded(err.to_string()),
            QuotaError::OrganizationNotFound(org) => {
                ApiError::invalid("organization_id", format!("Unknown organization {}", org))
            }
        }
    }
}

impl From<CustomerError> for ApiError {
    fn from(err: CustomerError) -> Self {
        match err {
            CustomerError::NotFound(id) => ApiError::NotFound(format!("Customer {} not found", id)),
            CustomerError::Forbidden(_) => ApiError::forbidden(err.to_string()),
            CustomerError::EmptyName => ApiError::invalid("name", err.to_string()),
            CustomerError::NoActor => ApiError::unauthorized(err.to_string()),
            CustomerError::Store(e) => e.into(),
            CustomerError::Remote { status, .. } if status < 500 => ApiError::BadRequest(err.to_string()),
            other => ApiError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<SalesDocumentError> for ApiError {
    fn from(err: SalesDocumentError) -> Self {
        match err {
            SalesDocumentError::NoItems => ApiError::invalid("items", err.to_string()),
            SalesDocumentError::NegativeLine(_) => ApiError::invalid("items", err.to_string()),
            SalesDocumentError::Gst(e) => ApiError::invalid("customer_gstin", e.to_string()),
            SalesDocumentError::Quota(e) => e.into(),
            SalesDocumentError::Store(e) => e.into(),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NoActor => ApiError::unauthorized(err.to_string()),
            ReconcileError::Store(e) => e.into(),
        }
    }
}

impl From<PasswordResetError> for ApiError {
    fn from(err: PasswordResetError) -> Self {
        match err {
            PasswordResetError::Store(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized {
                message: "Token expired".to_string(),
                redirect: AccessDecision::RedirectLogin.redirect(),
            },
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            },
            ValidationErrorDetail {
                field: "password".to_string(),
                message: "Password too short".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }

    #[test]
    fn test_policy_decisions_carry_redirects() {
        match ApiError::from(AccessDecision::RedirectPendingApproval) {
            ApiError::Forbidden { redirect, .. } => assert_eq!(redirect, Some("/pending-approval")),
            other => panic!("unexpected {other:?}"),
        }
        match ApiError::from(AccessDecision::RedirectLogin) {
            ApiError::Unauthorized { redirect, .. } => assert_eq!(redirect, Some("/login")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_store_conflict_maps_to_409() {
        let response = ApiError::from(StoreError::Conflict {
            key: "bizacc:invoices".to_string(),
            expected: 1,
            actual: 2,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unreadable_collection_maps_to_500() {
        let response = ApiError::from(StoreError::Corrupt {
            key: "bizacc:allUsers".to_string(),
            reason: "invalid type".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
