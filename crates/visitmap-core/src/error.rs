//! Error types for `visitmap-core`.
//!
//! Three classes of failure exist and are never converted into one another:
//! validation errors, policy rejections and storage errors. Each maps to a
//! stable machine-readable [`Reason`] so the boundary layer can render a
//! precise message.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid actor handle")]
  InvalidActor,

  #[error("invalid subject identifier")]
  InvalidSubject,

  #[error("invalid action; expected `add` or `remove`")]
  InvalidAction,

  #[error("contributions are locked")]
  Locked,

  #[error("actor is banned")]
  Banned,

  #[error("rate limited; retry after {retry_after:?}")]
  RateLimited { retry_after: Duration },

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error. Used by every call site that touches a store.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  /// The machine-readable reason surfaced to callers.
  pub fn reason(&self) -> Reason {
    match self {
      Self::InvalidActor => Reason::InvalidActor,
      Self::InvalidSubject => Reason::InvalidSubject,
      Self::InvalidAction => Reason::InvalidAction,
      Self::Locked => Reason::Locked,
      Self::Banned => Reason::Banned,
      Self::RateLimited { .. } => Reason::RateLimit,
      Self::Storage(_) => Reason::StorageUnavailable,
    }
  }

  /// Whole seconds the caller should wait, for rate-limit rejections only.
  pub fn retry_after_seconds(&self) -> Option<u64> {
    match self {
      Self::RateLimited { retry_after } => Some(retry_after_seconds(*retry_after)),
      _ => None,
    }
  }
}

/// Stable reason codes, serialised as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
  InvalidActor,
  InvalidSubject,
  InvalidAction,
  Locked,
  Banned,
  RateLimit,
  StorageUnavailable,
}

/// Round a wait up to whole seconds. A rejection never advertises `0`.
pub fn retry_after_seconds(wait: Duration) -> u64 {
  let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
  secs.max(1)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
