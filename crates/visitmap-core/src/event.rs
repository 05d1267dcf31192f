//! Event types: the unit of the visitmap ledger.
//!
//! An event records that an actor added or removed a subject from their map.
//! Events are never updated or deleted; the current state of the map is
//! computed by replaying them in ledger order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger order key. Assigned by the backend on append; strictly increasing
/// and starting at `1`.
pub type Sequence = i64;

/// What an event does to the actor's set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
  Add,
  Remove,
}

impl Kind {
  /// The token stored in the ledger and accepted on the wire.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Remove => "remove",
    }
  }
}

/// An accepted write. Once appended, no field ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub sequence:    Sequence,
  /// Admission time of the write.
  pub recorded_at: DateTime<Utc>,
  /// Normalised actor handle.
  pub actor:       String,
  /// Normalised subject identifier.
  pub subject:     String,
  pub kind:        Kind,
}

/// Input to [`crate::store::Ledger::append`]. `sequence` is always assigned by
/// the ledger; it is not accepted from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
  pub recorded_at: DateTime<Utc>,
  pub actor:       String,
  pub subject:     String,
  pub kind:        Kind,
}

impl NewEvent {
  /// Attach the ledger-assigned sequence.
  pub fn into_event(self, sequence: Sequence) -> Event {
    Event {
      sequence,
      recorded_at: self.recorded_at,
      actor: self.actor,
      subject: self.subject,
      kind: self.kind,
    }
  }
}
