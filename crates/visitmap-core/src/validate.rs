//! Normalisation and shape checks for actors, subjects and action kinds.
//!
//! Everything here is pure. Invalid input is reported as `false` or `None`;
//! callers turn that into a validation [`Error`](crate::Error).

use serde::{Deserialize, Serialize};

use crate::event::Kind;

pub const ACTOR_MIN_LEN: usize = 3;
pub const ACTOR_MAX_LEN: usize = 25;
pub const SUBJECT_MAX_LEN: usize = 80;

/// How subjects are identified on this map.
///
/// Validity is a shape check only; no scheme checks membership in a
/// gazetteer. Mapping identifiers to places is the display layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectScheme {
  /// Free-form country names, case preserved, 1–80 characters.
  #[default]
  Name,
  /// ISO 3166-1 numeric codes (the ids used by the world topology), 1–3
  /// digits.
  Numeric,
  /// ISO 3166-1 alpha-2 codes, uppercased.
  Alpha2,
}

// ─── Actors ──────────────────────────────────────────────────────────────────

/// Trim and lowercase a raw handle.
pub fn normalize_actor(raw: &str) -> String { raw.trim().to_lowercase() }

/// `^[a-z0-9_]{3,25}$`, ASCII only.
pub fn is_valid_actor(actor: &str) -> bool {
  (ACTOR_MIN_LEN..=ACTOR_MAX_LEN).contains(&actor.len())
    && actor
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

// ─── Subjects ────────────────────────────────────────────────────────────────

pub fn normalize_subject(raw: &str, scheme: SubjectScheme) -> String {
  let trimmed = raw.trim();
  match scheme {
    SubjectScheme::Name | SubjectScheme::Numeric => trimmed.to_owned(),
    SubjectScheme::Alpha2 => trimmed.to_ascii_uppercase(),
  }
}

pub fn is_valid_subject(subject: &str, scheme: SubjectScheme) -> bool {
  match scheme {
    SubjectScheme::Name => {
      let len = subject.chars().count();
      len > 0 && len <= SUBJECT_MAX_LEN
    }
    SubjectScheme::Numeric => {
      (1..=3).contains(&subject.len())
        && subject.bytes().all(|b| b.is_ascii_digit())
    }
    SubjectScheme::Alpha2 => {
      subject.len() == 2 && subject.bytes().all(|b| b.is_ascii_uppercase())
    }
  }
}

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Case-insensitive match on `add` / `remove`.
pub fn parse_kind(raw: &str) -> Option<Kind> {
  let token = raw.trim();
  if token.eq_ignore_ascii_case("add") {
    Some(Kind::Add)
  } else if token.eq_ignore_ascii_case("remove") {
    Some(Kind::Remove)
  } else {
    None
  }
}
