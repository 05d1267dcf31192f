//! Handlers for the read side: `GET /state` and `GET /ping`.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use visitmap_core::{
  VisitService, policy::AdminPolicy, projection::ProjectedState,
  store::{Ledger, RateLimitStore},
};

use crate::error::ApiError;

/// `GET /state`: the projected map.
pub async fn handler<S>(
  State(service): State<Arc<VisitService<S>>>,
) -> Result<Json<ProjectedState>, ApiError>
where
  S: Ledger + RateLimitStore + AdminPolicy + 'static,
{
  Ok(Json(service.state().await?))
}

/// `GET /ping`: liveness.
pub async fn ping() -> Json<Value> {
  Json(json!({ "ok": true, "ts": Utc::now().timestamp_millis() }))
}
