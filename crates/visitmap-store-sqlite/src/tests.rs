//! Integration tests for `SqliteStore` against an in-memory database.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use visitmap_core::{
  Reason, Rules, VisitService, WriteIntent,
  clock::ManualClock,
  event::{Kind, NewEvent},
  gate::{Admission, Gate},
  policy::AdminPolicy,
  projection::replay,
  store::{Ledger, RateLimitStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t(secs: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn add(actor: &str, subject: &str) -> NewEvent {
  NewEvent {
    recorded_at: t(0),
    actor:       actor.into(),
    subject:     subject.into(),
    kind:        Kind::Add,
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_increasing_sequences() {
  let s = store().await;

  let a = s.append(add("alice", "France")).await.unwrap();
  let b = s.append(add("bob", "Côte d'Ivoire")).await.unwrap();
  assert_eq!(a.sequence, 1);
  assert_eq!(b.sequence, 2);
  assert_eq!(b.subject, "Côte d'Ivoire");
  assert_eq!(s.event_count().await.unwrap(), 2);
}

#[tokio::test]
async fn scan_returns_events_in_append_order() {
  let s = store().await;
  for subject in ["Peru", "Chile", "Japan"] {
    s.append(add("alice", subject)).await.unwrap();
  }

  let all = s.scan_all().await.unwrap();
  let subjects: Vec<_> = all.iter().map(|e| e.subject.as_str()).collect();
  assert_eq!(subjects, ["Peru", "Chile", "Japan"]);
  assert_eq!(all[0].recorded_at, t(0));
  assert_eq!(all[0].kind, Kind::Add);

  // Repeatable.
  assert_eq!(s.scan_all().await.unwrap(), all);

  let tail = s.scan_after(1).await.unwrap();
  assert_eq!(tail.len(), 2);
  assert_eq!(tail[0].sequence, 2);
}

#[tokio::test]
async fn events_cannot_be_rewritten() {
  let s = store().await;
  s.append(add("alice", "France")).await.unwrap();

  let update = s
    .conn_for_tests()
    .call(|conn| Ok(conn.execute("UPDATE events SET subject = 'Peru'", [])?))
    .await;
  assert!(update.is_err());

  let delete = s
    .conn_for_tests()
    .call(|conn| Ok(conn.execute("DELETE FROM events", [])?))
    .await;
  assert!(delete.is_err());

  assert_eq!(s.scan_all().await.unwrap()[0].subject, "France");
}

#[tokio::test]
async fn foreign_rows_with_unknown_kind_are_skipped() {
  let s = store().await;
  s.append(add("alice", "France")).await.unwrap();
  s.conn_for_tests()
    .call(|conn| {
      conn.execute(
        "INSERT INTO events (recorded_at, actor, subject, kind)
         VALUES ('2024-01-01T00:00:00+00:00', 'alice', 'Peru', 'toggle')",
        [],
      )?;
      Ok(())
    })
    .await
    .unwrap();
  s.append(add("alice", "Japan")).await.unwrap();

  let events = s.scan_all().await.unwrap();
  let sequences: Vec<_> = events.iter().map(|e| e.sequence).collect();
  assert_eq!(sequences, [1, 3]);
}

#[tokio::test]
async fn foreign_rows_with_bad_timestamps_do_not_block_reads() {
  let s = store().await;
  let svc = service(&s, Arc::new(ManualClock::new(t(0))));
  svc.submit(WriteIntent::new("alice", "France", "add")).await.unwrap();
  s.conn_for_tests()
    .call(|conn| {
      conn.execute(
        "INSERT INTO events (recorded_at, actor, subject, kind)
         VALUES ('yesterday', 'bob', 'Peru', 'add')",
        [],
      )?;
      Ok(())
    })
    .await
    .unwrap();
  s.append(add("carol", "Japan")).await.unwrap();

  let sequences: Vec<_> = s.scan_all().await.unwrap().iter().map(|e| e.sequence).collect();
  assert_eq!(sequences, [1, 3]);

  let state = svc.state().await.unwrap();
  assert_eq!(state.global_subjects, ["France", "Japan"]);
  assert!(!state.by_actor.contains_key("bob"));
}

#[tokio::test]
async fn ledger_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("visitmap.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.append(add("alice", "France")).await.unwrap();
    s.ban("mallory").await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.scan_all().await.unwrap().len(), 1);
  assert!(s.is_banned("mallory").await.unwrap());
  let next = s.append(add("alice", "Peru")).await.unwrap();
  assert_eq!(next.sequence, 2);
}

// ─── Rate limits ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn compare_and_set_semantics() {
  let s = store().await;

  assert_eq!(s.last_accepted("alice").await.unwrap(), None);
  assert!(!s.compare_and_set("alice", Some(t(0)), t(8)).await.unwrap());
  assert_eq!(s.last_accepted("alice").await.unwrap(), None);

  assert!(s.compare_and_set("alice", None, t(0)).await.unwrap());
  assert!(!s.compare_and_set("alice", None, t(1)).await.unwrap());
  assert_eq!(s.last_accepted("alice").await.unwrap(), Some(t(0)));

  assert!(!s.compare_and_set("alice", Some(t(5)), t(9)).await.unwrap());
  assert!(s.compare_and_set("alice", Some(t(0)), t(9)).await.unwrap());
  assert_eq!(s.last_accepted("alice").await.unwrap(), Some(t(9)));
}

#[tokio::test]
async fn millisecond_precision_round_trips() {
  let s = store().await;
  let at = t(0) + TimeDelta::milliseconds(123);
  assert!(s.compare_and_set("alice", None, at).await.unwrap());
  let read = s.last_accepted("alice").await.unwrap().unwrap();
  assert_eq!(read, at);
  assert!(s.compare_and_set("alice", Some(read), t(10)).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gate_admits_once() {
  let s = store().await;
  let gate = Arc::new(Gate::new(s.clone(), s.clone(), Duration::from_secs(8)));

  let mut handles = Vec::new();
  for i in 0..24 {
    let gate = gate.clone();
    let at = t(0) + TimeDelta::milliseconds(i * 50);
    handles.push(tokio::spawn(async move { gate.admit("alice", at).await }));
  }

  let mut admitted = 0;
  for h in handles {
    if h.await.unwrap().unwrap() == Admission::Admitted {
      admitted += 1;
    }
  }
  assert_eq!(admitted, 1);
}

// ─── Administration ──────────────────────────────────────────────────────────

#[tokio::test]
async fn lock_flag_defaults_to_open() {
  let s = store().await;
  assert!(!s.is_locked().await.unwrap());

  s.set_locked(true).await.unwrap();
  assert!(s.is_locked().await.unwrap());

  s.set_locked(false).await.unwrap();
  assert!(!s.is_locked().await.unwrap());
}

#[tokio::test]
async fn bans_are_normalised_and_listed() {
  let s = store().await;
  assert!(s.ban(" Mallory ").await.unwrap());
  assert!(!s.ban("mallory").await.unwrap());
  assert!(s.ban("eve").await.unwrap());

  assert!(s.is_banned("mallory").await.unwrap());
  assert_eq!(s.list_bans().await.unwrap(), ["eve", "mallory"]);

  assert!(s.unban("MALLORY").await.unwrap());
  assert!(!s.unban("mallory").await.unwrap());
  assert!(!s.is_banned("mallory").await.unwrap());
}

// ─── Full pipeline ───────────────────────────────────────────────────────────

fn service(s: &SqliteStore, clock: Arc<ManualClock>) -> VisitService<SqliteStore> {
  VisitService::new(s.clone(), s.clone(), s.clone(), Rules::default()).with_clock(clock)
}

#[tokio::test]
async fn pipeline_against_sqlite() {
  let s = store().await;
  let clock = Arc::new(ManualClock::new(t(0)));
  let svc = service(&s, clock.clone());

  svc.submit(WriteIntent::new("alice", "France", "add")).await.unwrap();

  clock.set(t(3));
  let err = svc.submit(WriteIntent::new("alice", "Peru", "add")).await.unwrap_err();
  assert_eq!(err.reason(), Reason::RateLimit);
  assert_eq!(err.retry_after_seconds(), Some(5));

  clock.set(t(9));
  svc.submit(WriteIntent::new("alice", "Peru", "add")).await.unwrap();
  svc.submit(WriteIntent::new("bob", "France", "add")).await.unwrap();

  clock.set(t(20));
  svc.submit(WriteIntent::new("alice", "France", "remove")).await.unwrap();

  let state = svc.state().await.unwrap();
  assert_eq!(state.global_subjects, ["France", "Peru"]);
  assert_eq!(state.by_actor["alice"], ["Peru"]);
  assert_eq!(state.by_actor["bob"], ["France"]);

  let full = replay(svc.rules().projection(), &s.scan_all().await.unwrap(), state.as_of);
  assert_eq!(state, full);
}

#[tokio::test]
async fn banned_actor_writes_nothing() {
  let s = store().await;
  s.ban("mallory").await.unwrap();
  let svc = service(&s, Arc::new(ManualClock::new(t(0))));

  let err = svc.submit(WriteIntent::new("mallory", "France", "add")).await.unwrap_err();
  assert_eq!(err.reason(), Reason::Banned);
  assert_eq!(s.event_count().await.unwrap(), 0);
  assert_eq!(s.last_accepted("mallory").await.unwrap(), None);
}

#[tokio::test]
async fn locked_store_rejects_writes() {
  let s = store().await;
  s.set_locked(true).await.unwrap();
  let svc = service(&s, Arc::new(ManualClock::new(t(0))));

  let err = svc.submit(WriteIntent::new("alice", "France", "add")).await.unwrap_err();
  assert_eq!(err.reason(), Reason::Locked);
  assert_eq!(s.event_count().await.unwrap(), 0);
  assert_eq!(s.last_accepted("alice").await.unwrap(), None);
}
