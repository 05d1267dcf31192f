//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Event timestamps are stored as RFC 3339 strings. Rate-limit timestamps are
//! stored as integer milliseconds so the compare-and-set can match on exact
//! column equality.

use chrono::{DateTime, Utc};
use visitmap_core::{
  event::{Event, Kind},
  validate::parse_kind,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_millis(dt: DateTime<Utc>) -> i64 { dt.timestamp_millis() }

pub fn decode_millis(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or(Error::TimestampRange(ms))
}

// ─── Kind ────────────────────────────────────────────────────────────────────

pub fn encode_kind(k: Kind) -> &'static str { k.as_str() }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub sequence:    i64,
  pub recorded_at: String,
  pub actor:       String,
  pub subject:     String,
  pub kind:        String,
}

impl RawEvent {
  /// Decode the row. Rows whose kind is not a known token decode to `None`.
  /// Both that and a timestamp error can only come from foreign writers; the
  /// scan skips such rows.
  pub fn into_event(self) -> Result<Option<Event>> {
    let Some(kind) = parse_kind(&self.kind) else {
      return Ok(None);
    };
    Ok(Some(Event {
      sequence: self.sequence,
      recorded_at: decode_dt(&self.recorded_at)?,
      actor: self.actor,
      subject: self.subject,
      kind,
    }))
  }
}
