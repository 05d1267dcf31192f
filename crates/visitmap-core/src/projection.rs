//! Replay of the ledger into the current map.
//!
//! [`replay`] is the reference implementation: a pure fold over events in
//! ledger order. [`Projection`] is the same fold kept open so it can be fed
//! one event at a time, and [`ProjectionCache`] uses that to catch up with
//! the ledger incrementally instead of replaying everything on every read.
//! Both paths must produce identical [`ProjectedState`]s.
//!
//! # Cap policy
//!
//! An actor holds at most `max_subjects_per_actor` subjects. When an `Add`
//! pushes the set over the cap, the set is truncated to its first
//! `max_subjects_per_actor` members in insertion order: the earliest survive
//! and the newest overflow is dropped. Eviction of the oldest is not
//! supported.

use std::{
  borrow::Cow,
  collections::{BTreeMap, BTreeSet},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{
  event::{Event, Kind, Sequence},
  store::Ledger,
  validate::{
    SubjectScheme, is_valid_actor, is_valid_subject, normalize_actor,
    normalize_subject,
  },
};

pub const DEFAULT_MAX_SUBJECTS_PER_ACTOR: usize = 400;

// ─── Output ──────────────────────────────────────────────────────────────────

/// The computed read model. Never stored; always derived from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedState {
  /// Union of every actor's subjects, sorted.
  pub global_subjects: Vec<String>,
  /// Actors with a non-empty set, each set sorted.
  pub by_actor:        BTreeMap<String, Vec<String>>,
  /// When this view was computed.
  pub as_of:           DateTime<Utc>,
}

// ─── Fold ────────────────────────────────────────────────────────────────────

/// Replay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionRules {
  pub max_subjects_per_actor: usize,
  pub subject_scheme:         SubjectScheme,
}

impl Default for ProjectionRules {
  fn default() -> Self {
    Self {
      max_subjects_per_actor: DEFAULT_MAX_SUBJECTS_PER_ACTOR,
      subject_scheme:         SubjectScheme::default(),
    }
  }
}

/// An open fold over the ledger.
#[derive(Debug, Clone)]
pub struct Projection {
  rules:         ProjectionRules,
  /// Per-actor subjects in insertion order.
  by_actor:      BTreeMap<String, Vec<String>>,
  last_sequence: Sequence,
}

impl Projection {
  pub fn new(rules: ProjectionRules) -> Self {
    Self { rules, by_actor: BTreeMap::new(), last_sequence: 0 }
  }

  /// Sequence of the last event folded in; `0` before any.
  pub fn last_sequence(&self) -> Sequence { self.last_sequence }

  /// Fold one event. Events at or below [`Self::last_sequence`] were already
  /// applied and are ignored, so feeding an overlapping scan is harmless.
  pub fn apply(&mut self, event: &Event) {
    if event.sequence <= self.last_sequence {
      return;
    }
    self.last_sequence = event.sequence;

    // Rows written through the service are already canonical. Only legacy or
    // foreign rows pay for normalisation, and those still invalid after it
    // are skipped.
    let scheme = self.rules.subject_scheme;
    let actor = canonical(&event.actor, is_valid_actor, normalize_actor);
    let subject = canonical(
      &event.subject,
      |s| is_valid_subject(s, scheme),
      |s| normalize_subject(s, scheme),
    );
    let (Some(actor), Some(subject)) = (actor, subject) else {
      warn!(sequence = event.sequence, "skipping invalid ledger row");
      return;
    };

    match event.kind {
      Kind::Add => {
        let set = self.by_actor.entry(actor.into_owned()).or_default();
        if !set.iter().any(|s| *s == subject) {
          set.push(subject.into_owned());
        }
        if set.len() > self.rules.max_subjects_per_actor {
          set.truncate(self.rules.max_subjects_per_actor);
        }
      }
      Kind::Remove => {
        if let Some(set) = self.by_actor.get_mut(&*actor)
          && let Some(pos) = set.iter().position(|s| *s == subject)
        {
          set.remove(pos);
        }
      }
    }
  }

  /// Materialise the current state.
  ///
  /// The global set is computed here, once, as a union over actors, so a
  /// `Remove` by one actor never hides a subject another actor still holds.
  pub fn snapshot(&self, as_of: DateTime<Utc>) -> ProjectedState {
    let mut global = BTreeSet::new();
    let mut by_actor = BTreeMap::new();

    for (actor, subjects) in &self.by_actor {
      if subjects.is_empty() {
        continue;
      }
      let mut sorted = subjects.clone();
      sorted.sort();
      global.extend(sorted.iter().cloned());
      by_actor.insert(actor.clone(), sorted);
    }

    ProjectedState {
      global_subjects: global.into_iter().collect(),
      by_actor,
      as_of,
    }
  }
}

/// Borrow `raw` when it is already canonical, otherwise normalise it.
/// `None` when even the normalised form is invalid.
fn canonical<'a>(
  raw: &'a str,
  is_valid: impl Fn(&str) -> bool,
  normalize: impl Fn(&str) -> String,
) -> Option<Cow<'a, str>> {
  if raw.trim().len() == raw.len() && is_valid(raw) {
    return Some(Cow::Borrowed(raw));
  }
  let owned = normalize(raw);
  is_valid(owned.as_str()).then_some(Cow::Owned(owned))
}

/// Full replay: the reference implementation.
pub fn replay<'a, I>(rules: ProjectionRules, events: I, as_of: DateTime<Utc>) -> ProjectedState
where
  I: IntoIterator<Item = &'a Event>,
{
  let mut projection = Projection::new(rules);
  for event in events {
    projection.apply(event);
  }
  projection.snapshot(as_of)
}

// ─── Incremental cache ───────────────────────────────────────────────────────

/// A [`Projection`] kept up to date by reading only the ledger suffix it has
/// not seen yet.
///
/// The mutex is held across the ledger scan so concurrent readers never fold
/// the same suffix twice or out of order.
#[derive(Debug)]
pub struct ProjectionCache {
  projection: Mutex<Projection>,
}

impl ProjectionCache {
  pub fn new(rules: ProjectionRules) -> Self {
    Self { projection: Mutex::new(Projection::new(rules)) }
  }

  /// Catch up with `ledger` and return the current state.
  pub async fn refresh<L: Ledger>(
    &self,
    ledger: &L,
    as_of: DateTime<Utc>,
  ) -> Result<ProjectedState, L::Error> {
    let mut projection = self.projection.lock().await;
    let fresh = ledger.scan_after(projection.last_sequence()).await?;
    for event in &fresh {
      projection.apply(event);
    }
    Ok(projection.snapshot(as_of))
  }
}
