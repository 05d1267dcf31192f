//! JSON HTTP API for visitmap.
//!
//! Exposes an axum [`Router`] backed by a [`VisitService`] over any storage
//! backend. TLS, CORS and tracing layers are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/state` | Projected map: `globalSubjects`, `byActor`, `asOf` |
//! | `POST` | `/update` | Body: `{"actor","subject","kind"}`; returns `{"status":"ok"}` or an error outcome |
//! | `GET`  | `/ping` | Liveness |
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", visitmap_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod state;
pub mod update;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use visitmap_core::{
  VisitService,
  policy::AdminPolicy,
  store::{Ledger, RateLimitStore},
};

pub use error::ApiError;

/// Build the API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<VisitService<S>>) -> Router<()>
where
  S: Ledger + RateLimitStore + AdminPolicy + 'static,
{
  Router::new()
    .route("/state", get(state::handler::<S>))
    .route("/update", post(update::handler::<S>))
    .route("/ping", get(state::ping))
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
