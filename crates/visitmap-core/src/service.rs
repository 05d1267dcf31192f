//! [`VisitService`]: the write pipeline and the read path composed.

use std::{sync::Arc, time::Duration};

use chrono::SubsecRound as _;
use tracing::{debug, warn};

use crate::{
  Error, Result,
  clock::{Clock, SystemClock},
  event::{Event, NewEvent},
  gate::{Admission, Gate},
  policy::AdminPolicy,
  projection::{
    DEFAULT_MAX_SUBJECTS_PER_ACTOR, ProjectedState, ProjectionCache,
    ProjectionRules,
  },
  store::{Ledger, RateLimitStore},
  validate::{
    SubjectScheme, is_valid_actor, is_valid_subject, normalize_actor,
    normalize_subject, parse_kind,
  },
};

pub const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(8);

/// Tunables shared by admission and replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
  /// Minimum time between two admitted writes from one actor.
  pub rate_limit_interval:    Duration,
  pub max_subjects_per_actor: usize,
  pub subject_scheme:         SubjectScheme,
}

impl Default for Rules {
  fn default() -> Self {
    Self {
      rate_limit_interval:    DEFAULT_RATE_LIMIT_INTERVAL,
      max_subjects_per_actor: DEFAULT_MAX_SUBJECTS_PER_ACTOR,
      subject_scheme:         SubjectScheme::default(),
    }
  }
}

impl Rules {
  pub fn projection(&self) -> ProjectionRules {
    ProjectionRules {
      max_subjects_per_actor: self.max_subjects_per_actor,
      subject_scheme:         self.subject_scheme,
    }
  }
}

/// A raw, unvalidated write as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct WriteIntent {
  pub actor:   String,
  pub subject: String,
  pub kind:    String,
}

impl WriteIntent {
  pub fn new(
    actor: impl Into<String>,
    subject: impl Into<String>,
    kind: impl Into<String>,
  ) -> Self {
    Self { actor: actor.into(), subject: subject.into(), kind: kind.into() }
  }
}

/// Validator → gate → ledger on the write side; ledger → projector on the
/// read side.
///
/// `L`, `R` and `P` are usually the same backend; they are separate so the
/// policy (or the rate-limit store) can be swapped for a fake.
pub struct VisitService<L, R = L, P = L> {
  ledger: L,
  gate:   Gate<R, P>,
  cache:  ProjectionCache,
  clock:  Arc<dyn Clock>,
  rules:  Rules,
}

impl<L, R, P> VisitService<L, R, P>
where
  L: Ledger,
  R: RateLimitStore,
  P: AdminPolicy,
{
  pub fn new(ledger: L, rates: R, policy: P, rules: Rules) -> Self {
    Self {
      ledger,
      gate: Gate::new(rates, policy, rules.rate_limit_interval),
      cache: ProjectionCache::new(rules.projection()),
      clock: Arc::new(SystemClock),
      rules,
    }
  }

  /// Replace the wall clock, e.g. with a [`crate::clock::ManualClock`].
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn rules(&self) -> &Rules { &self.rules }

  /// Validate, admit and append one write.
  ///
  /// Validation failures are reported in the order actor, subject, action.
  /// Gate rejections and storage failures are propagated unchanged. Nothing
  /// is recorded unless the returned result is `Ok`, except that a storage
  /// failure during the append leaves the actor's admission recorded.
  pub async fn submit(&self, intent: WriteIntent) -> Result<Event> {
    let scheme = self.rules.subject_scheme;

    let actor = normalize_actor(&intent.actor);
    if !is_valid_actor(&actor) {
      return Err(Error::InvalidActor);
    }
    let subject = normalize_subject(&intent.subject, scheme);
    if !is_valid_subject(&subject, scheme) {
      return Err(Error::InvalidSubject);
    }
    let kind = parse_kind(&intent.kind).ok_or(Error::InvalidAction)?;

    // Backends may keep only milliseconds; decide on what will be stored.
    let now = self.clock.now().trunc_subsecs(3);
    match self.gate.admit(&actor, now).await? {
      Admission::Admitted => {}
      Admission::Rejected(rejection) => return Err(rejection.into()),
    }

    let event = self
      .ledger
      .append(NewEvent { recorded_at: now, actor, subject, kind })
      .await
      .map_err(|e| {
        warn!(error = %e, "ledger append failed");
        Error::storage(e)
      })?;

    debug!(
      sequence = event.sequence,
      actor = %event.actor,
      subject = %event.subject,
      kind = event.kind.as_str(),
      "event appended"
    );
    Ok(event)
  }

  /// The current map, caught up with every committed event.
  pub async fn state(&self) -> Result<ProjectedState> {
    let as_of = self.clock.now();
    self.cache.refresh(&self.ledger, as_of).await.map_err(|e| {
      warn!(error = %e, "ledger scan failed");
      Error::storage(e)
    })
  }
}
