//! Handler for `POST /update`.
//!
//! The body is a JSON write intent. It is read from the raw bytes rather than
//! through the `Json` extractor so clients that post it as `text/plain` (to
//! avoid a CORS preflight) are accepted too. An empty body, or a JSON value
//! that is not an object, is treated as `{}` and fails validation like any
//! other incomplete intent. Only syntactically invalid JSON is rejected
//! before validation.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use visitmap_core::{
  Reason, VisitService, WriteIntent, policy::AdminPolicy,
  store::{Ledger, RateLimitStore},
};

use crate::error::ApiError;

/// JSON body accepted by `POST /update`. Missing or `null` fields are empty
/// strings; other scalars are taken in their string form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBody {
  #[serde(alias = "pseudo", deserialize_with = "lenient_string")]
  pub actor:   String,
  #[serde(alias = "countryName", alias = "country", deserialize_with = "lenient_string")]
  pub subject: String,
  #[serde(alias = "action", deserialize_with = "lenient_string")]
  pub kind:    String,
}

fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(de)? {
    Value::Null => String::new(),
    Value::String(s) => s,
    other => other.to_string(),
  })
}

impl UpdateBody {
  /// Parse a raw request body.
  pub fn from_bytes(body: &[u8]) -> Result<Self, ApiError> {
    if body.trim_ascii().is_empty() {
      return Ok(Self::default());
    }
    let value: Value = serde_json::from_slice(body)
      .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
      return Ok(Self::default());
    }
    serde_json::from_value(value)
      .map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
  }
}

impl From<UpdateBody> for WriteIntent {
  fn from(b: UpdateBody) -> Self {
    WriteIntent { actor: b.actor, subject: b.subject, kind: b.kind }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Ok,
  Error,
}

/// The result of a write, as rendered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
  pub status:              Status,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason:              Option<Reason>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry_after_seconds: Option<u64>,
}

impl Outcome {
  pub fn ok() -> Self {
    Self { status: Status::Ok, reason: None, retry_after_seconds: None }
  }
}

impl From<&visitmap_core::Error> for Outcome {
  fn from(e: &visitmap_core::Error) -> Self {
    Self {
      status:              Status::Error,
      reason:              Some(e.reason()),
      retry_after_seconds: e.retry_after_seconds(),
    }
  }
}

/// `POST /update` with body `{"actor":"...","subject":"...","kind":"add|remove"}`.
pub async fn handler<S>(
  State(service): State<Arc<VisitService<S>>>,
  body: Bytes,
) -> Result<Json<Outcome>, ApiError>
where
  S: Ledger + RateLimitStore + AdminPolicy + 'static,
{
  let body = UpdateBody::from_bytes(&body)?;
  service.submit(body.into()).await?;
  Ok(Json(Outcome::ok()))
}
