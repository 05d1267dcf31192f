//! Administrative policy read by the admission gate.
//!
//! The lock flag and the ban set are owned by an administrative surface
//! outside the core. The gate only ever reads them, through [`AdminPolicy`],
//! at admission time.

use std::{collections::BTreeSet, convert::Infallible, future::Future};

use crate::validate::normalize_actor;

pub trait AdminPolicy: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `true` when all writes must be rejected.
  fn is_locked(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// `true` when `actor` (a normalised handle) is banned.
  fn is_banned<'a>(
    &'a self,
    actor: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

/// A fixed policy, e.g. loaded from configuration or built in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
  pub locked: bool,
  pub banned: BTreeSet<String>,
}

impl StaticPolicy {
  pub fn open() -> Self { Self::default() }

  pub fn locked() -> Self { Self { locked: true, ..Self::default() } }

  /// Build a policy banning `handles`, normalised the same way writes are.
  pub fn banning<I, T>(handles: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    Self {
      locked: false,
      banned: handles.into_iter().map(|h| normalize_actor(h.as_ref())).collect(),
    }
  }
}

impl AdminPolicy for StaticPolicy {
  type Error = Infallible;

  async fn is_locked(&self) -> Result<bool, Infallible> { Ok(self.locked) }

  async fn is_banned(&self, actor: &str) -> Result<bool, Infallible> {
    Ok(self.banned.contains(actor))
  }
}
