//! [`SqliteStore`]: the SQLite implementation of the visitmap storage traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::warn;
use visitmap_core::{
  event::{Event, NewEvent, Sequence},
  policy::AdminPolicy,
  store::{Ledger, RateLimitStore},
  validate::normalize_actor,
};

use crate::{
  Result,
  encode::{RawEvent, decode_millis, encode_dt, encode_kind, encode_millis},
  schema::{LOCK_KEY, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visitmap store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Administration ────────────────────────────────────────────────────────
  //
  // The administrative surface is the only writer of `bans` and `settings`.

  pub async fn set_locked(&self, locked: bool) -> Result<()> {
    let value = if locked { "true" } else { "false" };
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![LOCK_KEY, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Ban a handle. Returns `false` if it was already banned.
  pub async fn ban(&self, handle: &str) -> Result<bool> {
    let actor  = normalize_actor(handle);
    let at_str = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO bans (actor, banned_at) VALUES (?1, ?2)
           ON CONFLICT(actor) DO NOTHING",
          rusqlite::params![actor, at_str],
        )?;
        Ok(n == 1)
      })
      .await?;
    Ok(inserted)
  }

  /// Lift a ban. Returns `false` if the handle was not banned.
  pub async fn unban(&self, handle: &str) -> Result<bool> {
    let actor = normalize_actor(handle);

    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute("DELETE FROM bans WHERE actor = ?1", rusqlite::params![actor])?;
        Ok(n == 1)
      })
      .await?;
    Ok(removed)
  }

  /// All banned handles, sorted.
  pub async fn list_bans(&self) -> Result<Vec<String>> {
    let bans = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT actor FROM bans ORDER BY actor")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(bans)
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Number of events in the ledger.
  pub async fn event_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?))
      .await?;
    Ok(count.max(0) as u64)
  }
}

// ─── Ledger impl ─────────────────────────────────────────────────────────────

impl Ledger for SqliteStore {
  type Error = crate::Error;

  async fn append(&self, event: NewEvent) -> Result<Event> {
    let recorded_at_str = encode_dt(event.recorded_at);
    let actor           = event.actor.clone();
    let subject         = event.subject.clone();
    let kind_str        = encode_kind(event.kind);

    let sequence: Sequence = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (recorded_at, actor, subject, kind) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![recorded_at_str, actor, subject, kind_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(event.into_event(sequence))
  }

  async fn scan_after(&self, after: Sequence) -> Result<Vec<Event>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT sequence, recorded_at, actor, subject, kind
           FROM events
           WHERE sequence > ?1
           ORDER BY sequence",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![after], |row| {
            Ok(RawEvent {
              sequence:    row.get(0)?,
              recorded_at: row.get(1)?,
              actor:       row.get(2)?,
              subject:     row.get(3)?,
              kind:        row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    let mut events = Vec::with_capacity(raws.len());
    for raw in raws {
      let sequence = raw.sequence;
      match raw.into_event() {
        Ok(Some(event)) => events.push(event),
        Ok(None) => warn!(sequence, "skipping ledger row with unknown kind"),
        Err(e) => warn!(sequence, error = %e, "skipping undecodable ledger row"),
      }
    }
    Ok(events)
  }
}

// ─── RateLimitStore impl ─────────────────────────────────────────────────────

impl RateLimitStore for SqliteStore {
  type Error = crate::Error;

  async fn last_accepted(&self, actor: &str) -> Result<Option<DateTime<Utc>>> {
    let actor = actor.to_owned();

    let ms: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_accepted_ms FROM rate_limits WHERE actor = ?1",
              rusqlite::params![actor],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    ms.map(decode_millis).transpose()
  }

  async fn compare_and_set(
    &self,
    actor:    &str,
    expected: Option<DateTime<Utc>>,
    new:      DateTime<Utc>,
  ) -> Result<bool> {
    let actor       = actor.to_owned();
    let expected_ms = expected.map(encode_millis);
    let new_ms      = encode_millis(new);

    // Each statement runs alone on the connection thread, so the condition
    // and the write cannot be split by another request.
    let swapped = self
      .conn
      .call(move |conn| {
        let n = match expected_ms {
          None => conn.execute(
            "INSERT INTO rate_limits (actor, last_accepted_ms) VALUES (?1, ?2)
             ON CONFLICT(actor) DO NOTHING",
            rusqlite::params![actor, new_ms],
          )?,
          Some(prev) => conn.execute(
            "UPDATE rate_limits SET last_accepted_ms = ?2
             WHERE actor = ?1 AND last_accepted_ms = ?3",
            rusqlite::params![actor, new_ms, prev],
          )?,
        };
        Ok(n == 1)
      })
      .await?;

    Ok(swapped)
  }
}

// ─── AdminPolicy impl ────────────────────────────────────────────────────────

impl AdminPolicy for SqliteStore {
  type Error = crate::Error;

  async fn is_locked(&self) -> Result<bool> {
    let value: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM settings WHERE key = ?1",
              rusqlite::params![LOCK_KEY],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
  }

  async fn is_banned(&self, actor: &str) -> Result<bool> {
    let actor = actor.to_owned();

    let banned = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM bans WHERE actor = ?1",
              rusqlite::params![actor],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(banned)
  }
}
