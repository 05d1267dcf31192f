//! In-memory backend implementing every storage trait.
//!
//! Nothing survives the process. Used for tests and for running without a
//! database file.

use std::{
  convert::Infallible,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use parking_lot::RwLock;

use crate::{
  event::{Event, NewEvent, Sequence},
  policy::AdminPolicy,
  store::{Ledger, RateLimitStore},
  validate::normalize_actor,
};

#[derive(Default)]
struct Inner {
  /// Index `i` holds the event with sequence `i + 1`.
  events: RwLock<Vec<Event>>,
  rates:  DashMap<String, DateTime<Utc>>,
  bans:   DashSet<String>,
  locked: AtomicBool,
}

/// Cloning is cheap; clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  // ── Administration ────────────────────────────────────────────────────────

  pub fn set_locked(&self, locked: bool) {
    self.inner.locked.store(locked, Ordering::SeqCst);
  }

  /// Returns `false` if the handle was already banned.
  pub fn ban(&self, handle: &str) -> bool { self.inner.bans.insert(normalize_actor(handle)) }

  /// Returns `false` if the handle was not banned.
  pub fn unban(&self, handle: &str) -> bool {
    self.inner.bans.remove(&normalize_actor(handle)).is_some()
  }

  /// Number of stored rate-limit records.
  pub fn rate_limit_records(&self) -> usize { self.inner.rates.len() }
}

impl Ledger for MemoryStore {
  type Error = Infallible;

  async fn append(&self, event: NewEvent) -> Result<Event, Infallible> {
    let mut events = self.inner.events.write();
    let sequence = events.len() as Sequence + 1;
    let event = event.into_event(sequence);
    events.push(event.clone());
    Ok(event)
  }

  async fn scan_after(&self, after: Sequence) -> Result<Vec<Event>, Infallible> {
    let events = self.inner.events.read();
    let start = usize::try_from(after).unwrap_or(0).min(events.len());
    Ok(events[start..].to_vec())
  }
}

impl RateLimitStore for MemoryStore {
  type Error = Infallible;

  async fn last_accepted(&self, actor: &str) -> Result<Option<DateTime<Utc>>, Infallible> {
    Ok(self.inner.rates.get(actor).map(|r| *r))
  }

  async fn compare_and_set(
    &self,
    actor: &str,
    expected: Option<DateTime<Utc>>,
    new: DateTime<Utc>,
  ) -> Result<bool, Infallible> {
    // The entry guard holds the shard lock for the whole compare and swap.
    let swapped = match self.inner.rates.entry(actor.to_owned()) {
      Entry::Occupied(mut slot) => {
        if expected == Some(*slot.get()) {
          slot.insert(new);
          true
        } else {
          false
        }
      }
      Entry::Vacant(slot) => {
        if expected.is_none() {
          slot.insert(new);
          true
        } else {
          false
        }
      }
    };
    Ok(swapped)
  }
}

impl AdminPolicy for MemoryStore {
  type Error = Infallible;

  async fn is_locked(&self) -> Result<bool, Infallible> {
    Ok(self.inner.locked.load(Ordering::SeqCst))
  }

  async fn is_banned(&self, actor: &str) -> Result<bool, Infallible> {
    Ok(self.inner.bans.contains(actor))
  }
}
