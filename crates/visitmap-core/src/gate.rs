//! Admission gate: lock flag, ban set and per-actor rate limit.
//!
//! The rate limit is a per-actor minimum inter-arrival time. It resets on
//! every admitted write rather than on a fixed wall-clock window, so an actor
//! is admitted at most once per interval, indefinitely.
//!
//! Checking and updating the rate-limit record is a single atomic step per
//! actor: the gate reads the record, decides, then issues a compare-and-set
//! against the value it read. Losing that race means another request from
//! the same actor was admitted in between, and the decision is re-evaluated
//! against the fresh record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{Error, Result, policy::AdminPolicy, store::RateLimitStore};

/// Why the gate refused a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  Locked,
  Banned,
  RateLimited { retry_after: Duration },
}

impl From<Rejection> for Error {
  fn from(r: Rejection) -> Self {
    match r {
      Rejection::Locked => Error::Locked,
      Rejection::Banned => Error::Banned,
      Rejection::RateLimited { retry_after } => Error::RateLimited { retry_after },
    }
  }
}

/// Outcome of [`Gate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
  /// The rate-limit record now holds the admission time.
  Admitted,
  /// Nothing was recorded.
  Rejected(Rejection),
}

impl Admission {
  pub fn is_admitted(&self) -> bool { matches!(self, Self::Admitted) }
}

pub struct Gate<R, P> {
  rates:    R,
  policy:   P,
  interval: Duration,
}

impl<R, P> Gate<R, P>
where
  R: RateLimitStore,
  P: AdminPolicy,
{
  pub fn new(rates: R, policy: P, interval: Duration) -> Self {
    Self { rates, policy, interval }
  }

  /// Decide whether `actor` (already normalised and validated) may write at
  /// `now`, recording the admission if so.
  ///
  /// Checks run in order: lock flag, ban set, rate limit. A rejection never
  /// creates or updates a rate-limit record.
  pub async fn admit(&self, actor: &str, now: DateTime<Utc>) -> Result<Admission> {
    if self.policy.is_locked().await.map_err(Error::storage)? {
      return Ok(Admission::Rejected(Rejection::Locked));
    }
    if self.policy.is_banned(actor).await.map_err(Error::storage)? {
      return Ok(Admission::Rejected(Rejection::Banned));
    }

    loop {
      let last = self.rates.last_accepted(actor).await.map_err(Error::storage)?;

      if let Some(last) = last {
        // A record from the future (clock stepped back) counts as "just now".
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.interval {
          let retry_after = self.interval - elapsed;
          debug!(actor, ?retry_after, "rate limited");
          return Ok(Admission::Rejected(Rejection::RateLimited { retry_after }));
        }
      }

      if self
        .rates
        .compare_and_set(actor, last, now)
        .await
        .map_err(Error::storage)?
      {
        debug!(actor, first_write = last.is_none(), "admitted");
        return Ok(Admission::Admitted);
      }

      debug!(actor, "rate-limit record moved underneath us; re-evaluating");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeDelta;

  use super::*;
  use crate::{memory::MemoryStore, policy::StaticPolicy};

  fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
  }

  fn gate(policy: StaticPolicy) -> (Gate<MemoryStore, StaticPolicy>, MemoryStore) {
    let store = MemoryStore::new();
    (Gate::new(store.clone(), policy, Duration::from_secs(8)), store)
  }

  #[tokio::test]
  async fn first_write_creates_record() {
    let (gate, store) = gate(StaticPolicy::open());
    assert_eq!(gate.admit("alice", t(0)).await.unwrap(), Admission::Admitted);
    assert_eq!(store.last_accepted("alice").await.unwrap(), Some(t(0)));
  }

  #[tokio::test]
  async fn minimum_inter_arrival_time() {
    let (gate, store) = gate(StaticPolicy::open());

    assert!(gate.admit("alice", t(0)).await.unwrap().is_admitted());

    let second = gate.admit("alice", t(3)).await.unwrap();
    assert_eq!(
      second,
      Admission::Rejected(Rejection::RateLimited { retry_after: Duration::from_secs(5) })
    );
    // The rejected attempt did not move the window.
    assert_eq!(store.last_accepted("alice").await.unwrap(), Some(t(0)));

    assert!(gate.admit("alice", t(9)).await.unwrap().is_admitted());
    assert_eq!(store.last_accepted("alice").await.unwrap(), Some(t(9)));
  }

  #[tokio::test]
  async fn exactly_one_interval_later_is_admitted() {
    let (gate, _) = gate(StaticPolicy::open());
    assert!(gate.admit("alice", t(0)).await.unwrap().is_admitted());
    assert!(gate.admit("alice", t(8)).await.unwrap().is_admitted());
  }

  #[tokio::test]
  async fn actors_are_limited_independently() {
    let (gate, _) = gate(StaticPolicy::open());
    assert!(gate.admit("alice", t(0)).await.unwrap().is_admitted());
    assert!(gate.admit("bob", t(1)).await.unwrap().is_admitted());
  }

  #[tokio::test]
  async fn lock_wins_over_everything() {
    let mut policy = StaticPolicy::banning(["alice"]);
    policy.locked = true;
    let (gate, store) = gate(policy);

    let outcome = gate.admit("alice", t(0)).await.unwrap();
    assert_eq!(outcome, Admission::Rejected(Rejection::Locked));
    assert_eq!(store.last_accepted("alice").await.unwrap(), None);
  }

  #[tokio::test]
  async fn locked_gate_rejects_fresh_actors() {
    let (gate, store) = gate(StaticPolicy::locked());
    let outcome = gate.admit("bob", t(0)).await.unwrap();
    assert_eq!(outcome, Admission::Rejected(Rejection::Locked));
    assert_eq!(store.rate_limit_records(), 0);
  }

  #[tokio::test]
  async fn banned_actor_never_gets_a_record() {
    let (gate, store) = gate(StaticPolicy::banning(["Mallory"]));
    let outcome = gate.admit("mallory", t(0)).await.unwrap();
    assert_eq!(outcome, Admission::Rejected(Rejection::Banned));
    assert_eq!(store.last_accepted("mallory").await.unwrap(), None);
  }

  #[tokio::test]
  async fn record_in_the_future_blocks_a_full_interval() {
    let (gate, store) = gate(StaticPolicy::open());
    store.compare_and_set("alice", None, t(100)).await.unwrap();
    let outcome = gate.admit("alice", t(0)).await.unwrap();
    assert_eq!(
      outcome,
      Admission::Rejected(Rejection::RateLimited { retry_after: Duration::from_secs(8) })
    );
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_admissions_for_one_actor_admit_once() {
    let store = MemoryStore::new();
    let gate = Arc::new(Gate::new(store, StaticPolicy::open(), Duration::from_secs(8)));

    let mut handles = Vec::new();
    for i in 0..32 {
      let gate = gate.clone();
      // Spread within a single interval.
      let at = t(0) + TimeDelta::milliseconds(i * 100);
      handles.push(tokio::spawn(async move { gate.admit("alice", at).await }));
    }

    let mut admitted = 0;
    for h in handles {
      if h.await.unwrap().unwrap().is_admitted() {
        admitted += 1;
      }
    }
    assert_eq!(admitted, 1);
  }
}
