//! Uniform `{success, message, data}` envelope shared by every router.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::error::ErrorKind;
use crate::tenancy::{CompanyId, CompanyScope};

/// Error response carrying the status code and a client-safe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind.status(), message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Validation, message)
    }

    /// Log the underlying cause and hide it from the client.
    pub fn internal(public_message: &str, cause: &dyn std::fmt::Display) -> Self {
        error!(error = %cause, "{public_message}");
        Self::from_kind(ErrorKind::Internal, public_message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(reason = %rejection.body_text(), "request body rejected");
        let message = match rejection {
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
            _ => "Request body could not be read",
        };
        Self::validation(message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(reason = %rejection.body_text(), "query string rejected");
        Self::validation("Invalid query parameters")
    }
}

/// JSON body extractor whose rejections use the failure envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

/// Query string extractor whose rejections use the failure envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }));
    (status, body).into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    success(StatusCode::OK, "Success", data)
}

/// Parse an identifier path segment, reporting malformed input as a validation error.
pub fn parse_path_id<T: std::str::FromStr>(raw: &str, label: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid {label}")))
}

/// Company context taken from the `:company_id` path segment.
pub fn company_scope(raw: &str) -> Result<CompanyScope, ApiError> {
    parse_path_id::<CompanyId>(raw, "company id").map(CompanyScope::new)
}
