//! Storage traits: the ledger and the per-actor rate-limit record.
//!
//! These are the only operations the core needs from persistence: append
//! with an assigned order, an ordered prefix scan, and a per-actor read plus
//! compare-and-set. Any backend providing them is substitutable.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::event::{Event, NewEvent, Sequence};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Append-only, totally ordered event storage.
///
/// The ledger performs no policy checks; it trusts its caller to have passed
/// the admission gate. Appends must be serialised so that sequences are
/// assigned without gaps or reordering.
pub trait Ledger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `event` under the next sequence and return it. Success means the
  /// backend has acknowledged the write.
  fn append(
    &self,
    event: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Every event with a sequence strictly greater than `after`, in order.
  fn scan_after(
    &self,
    after: Sequence,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Every event, in append order. Two scans of the same committed prefix
  /// return identical sequences.
  fn scan_all(&self) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_ {
    self.scan_after(0)
  }
}

// ─── Rate-limit records ──────────────────────────────────────────────────────

/// One `last_accepted_at` record per actor that has ever been admitted.
pub trait RateLimitStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The last admission time for `actor`, if any.
  fn last_accepted<'a>(
    &'a self,
    actor: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  /// Atomically replace the record for `actor` with `new`, but only if the
  /// stored value still equals `expected` (`None` meaning "no record").
  ///
  /// Returns `false`, leaving the record untouched, when another writer got
  /// there first.
  fn compare_and_set<'a>(
    &'a self,
    actor: &'a str,
    expected: Option<DateTime<Utc>>,
    new: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
