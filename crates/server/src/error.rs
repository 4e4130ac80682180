//! Error taxonomy for a recommendation request.
//!
//! Each variant maps to its own HTTP status. The response body is built from
//! the error value alone, so producing it cannot fail.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ml_client::MLClientError;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RecommendationError {
    /// Missing or malformed request fields; never reaches the model
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model rejected or failed to process the input
    #[error("Ranking model failed: {0}")]
    ModelInference(#[from] MLClientError),

    /// The model did not answer before the deadline
    #[error("Ranking model did not answer within {0:?}")]
    ModelTimeout(Duration),
}

impl RecommendationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecommendationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RecommendationError::ModelInference(_) => StatusCode::BAD_GATEWAY,
            RecommendationError::ModelTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for RecommendationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RecommendationError::InvalidRequest(reason) => warn!("Rejected request: {}", reason),
            // Model failures are logged where they happen
            _ => debug!("Returning {} for: {}", status, self),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RecommendationError>;
