//! HTTP-facing error taxonomy

use crate::events::NotificationFailure;
use crate::params::ParamError;
use crate::search_engine::SearchError;
use crate::sparql::SparqlError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Every way a request can fail
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Query-string contract violated
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Body or argument unusable
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    /// Triplestore failure
    #[error(transparent)]
    Backend(#[from] SparqlError),

    /// Search engine failure
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Notification(#[from] NotificationFailure),

    /// Unexpected failure; the detail is logged, never returned
    #[error("Internal server error")]
    Internal(String),
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Param(_) => StatusCode::BAD_REQUEST,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `HTTP error: <code>\n<message>`
    pub fn message(&self) -> String {
        format!("HTTP error: {}\n{}", self.status_code().as_u16(), self)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            GatewayError::Internal(detail) => error!("Uncaught exception: {}", detail),
            _ if status.is_server_error() => error!("HTTP error: {}", self),
            _ => warn!("HTTP error: [{}] {}", status.as_u16(), self),
        }

        let body = ErrorResponse {
            errors: vec![self.message()],
        };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}
