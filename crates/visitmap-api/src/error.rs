//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use visitmap_core::Reason;

use crate::update::Outcome;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request body could not be read as a write intent at all.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Visit(#[from] visitmap_core::Error),
}

/// HTTP status for each reason. The JSON body carries the precise reason.
pub fn status_for(reason: Reason) -> StatusCode {
  match reason {
    Reason::InvalidActor | Reason::InvalidSubject | Reason::InvalidAction => {
      StatusCode::BAD_REQUEST
    }
    Reason::Locked => StatusCode::LOCKED,
    Reason::Banned => StatusCode::FORBIDDEN,
    Reason::RateLimit => StatusCode::TOO_MANY_REQUESTS,
    Reason::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::BadRequest(m) => (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "error", "error": m })),
      )
        .into_response(),
      ApiError::Visit(e) => {
        let reason = e.reason();
        if reason == Reason::StorageUnavailable {
          tracing::error!(error = %e, "storage unavailable");
        }

        let mut res = (status_for(reason), Json(Outcome::from(&e))).into_response();
        if let Some(secs) = e.retry_after_seconds() {
          res
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res
      }
    }
  }
}
