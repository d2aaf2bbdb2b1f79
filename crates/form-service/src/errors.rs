//! Form service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients are generic; the underlying cause is logged
//! server-side.

use crate::auth::resolver::ResolveError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every authentication failure.
///
/// Missing, malformed and unknown credentials are indistinguishable to the
/// client.
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required";

/// Authentication failures raised by the identity guard and context binder.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no usable session credential.
    #[error("No session credential on request")]
    CredentialMissing,

    /// The identity resolver could not resolve the credential.
    #[error("Identity resolution failed: {0}")]
    ResolutionFailed(#[from] ResolveError),

    /// A handler asked for the identity but no auth policy bound one.
    #[error("Handler reached without a bound identity")]
    BindingMissing,
}

/// Form service error type.
///
/// Maps to HTTP status codes:
/// - Database, Internal: 500 Internal Server Error
/// - Unauthorized: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl FormError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            FormError::Database(_) | FormError::Internal => 500,
            FormError::Unauthorized => 401,
            FormError::Forbidden(_) => 403,
            FormError::NotFound(_) => 404,
            FormError::BadRequest(_) => 400,
            FormError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            FormError::Database(err) => {
                tracing::error!(target: "form.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            FormError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                UNAUTHORIZED_MESSAGE.to_string(),
            ),
            FormError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            FormError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            FormError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            FormError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "form.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            FormError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"formaura-api\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<sqlx::Error> for FormError {
    fn from(err: sqlx::Error) -> Self {
        FormError::Database(err.to_string())
    }
}

impl From<AuthError> for FormError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::CredentialMissing => FormError::Unauthorized,
            AuthError::ResolutionFailed(_) => FormError::Unauthorized,
            AuthError::BindingMissing => {
                // A route was registered without a freshness policy in front of it.
                tracing::error!(
                    target: "form.auth.context",
                    "Handler requires an identity but none was bound; route is missing an auth policy"
                );
                FormError::Internal
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        FormError::from(self).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            FormError::Database("connection failed".to_string()).to_string(),
            "Database error: connection failed"
        );
        assert_eq!(FormError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(
            FormError::NotFound("form".to_string()).to_string(),
            "Not found: form"
        );
        assert_eq!(FormError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FormError::Database("test".to_string()).status_code(), 500);
        assert_eq!(FormError::Unauthorized.status_code(), 401);
        assert_eq!(FormError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(FormError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(FormError::BadRequest("test".to_string()).status_code(), 400);
        assert_eq!(
            FormError::ServiceUnavailable("test".to_string()).status_code(),
            503
        );
        assert_eq!(FormError::Internal.status_code(), 500);
    }

    #[test]
    fn test_auth_errors_hide_the_failure_kind() {
        let missing = FormError::from(AuthError::CredentialMissing);
        let unknown = FormError::from(AuthError::ResolutionFailed(ResolveError::NotFound));
        let unavailable = FormError::from(AuthError::ResolutionFailed(
            ResolveError::Unavailable("pool timed out".to_string()),
        ));

        assert_eq!(missing.status_code(), 401);
        assert_eq!(unknown.status_code(), 401);
        assert_eq!(unavailable.status_code(), 401);
    }

    #[test]
    fn test_binding_missing_is_internal() {
        let error = FormError::from(AuthError::BindingMissing);
        assert!(matches!(error, FormError::Internal));
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let response = FormError::Database("relation \"forms\" does not exist".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_unauthorized() {
        let response = FormError::Unauthorized.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("realm=\"formaura-api\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body_json["error"]["message"], UNAUTHORIZED_MESSAGE);
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = FormError::NotFound("Resource not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "Resource not found");
    }

    #[tokio::test]
    async fn test_into_response_service_unavailable_is_generic() {
        let response =
            FormError::ServiceUnavailable("database maintenance".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(
            body_json["error"]["message"],
            "Service temporarily unavailable"
        );
    }

    #[tokio::test]
    async fn test_auth_error_into_response() {
        let response = AuthError::BindingMissing.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INTERNAL_ERROR");

        let response = AuthError::CredentialMissing.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
