//! Runtime configuration, deserialised from `config.toml` and `VISITMAP_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use visitmap_core::{Rules, validate::SubjectScheme};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub rate_limit_seconds:     u64,
  pub max_subjects_per_actor: usize,
  pub subject_scheme:         SubjectScheme,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let rules = Rules::default();
    Self {
      host:                   "127.0.0.1".into(),
      port:                   8080,
      store_path:             PathBuf::from("visitmap.db"),
      rate_limit_seconds:     rules.rate_limit_interval.as_secs(),
      max_subjects_per_actor: rules.max_subjects_per_actor,
      subject_scheme:         rules.subject_scheme,
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and overlay `VISITMAP_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VISITMAP").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    Self::from_config(settings)
  }

  fn from_config(settings: config::Config) -> anyhow::Result<Self> {
    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    if cfg.max_subjects_per_actor == 0 {
      anyhow::bail!("max_subjects_per_actor must be at least 1");
    }
    Ok(cfg)
  }

  pub fn rules(&self) -> Rules {
    Rules {
      rate_limit_interval:    Duration::from_secs(self.rate_limit_seconds),
      max_subjects_per_actor: self.max_subjects_per_actor,
      subject_scheme:         self.subject_scheme,
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn from_toml(toml: &str) -> anyhow::Result<ServerConfig> {
    let settings = Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?;
    ServerConfig::from_config(settings)
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = from_toml("").unwrap();
    assert_eq!(cfg, ServerConfig::default());
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.rules(), Rules::default());
  }

  #[test]
  fn keys_override_defaults() {
    let cfg = from_toml(
      r#"
        port = 9000
        store_path = "/var/lib/visitmap/map.db"
        rate_limit_seconds = 30
        max_subjects_per_actor = 50
        subject_scheme = "alpha2"
      "#,
    )
    .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/visitmap/map.db"));

    let rules = cfg.rules();
    assert_eq!(rules.rate_limit_interval, Duration::from_secs(30));
    assert_eq!(rules.max_subjects_per_actor, 50);
    assert_eq!(rules.subject_scheme, SubjectScheme::Alpha2);
  }

  #[test]
  fn zero_cap_is_rejected() {
    assert!(from_toml("max_subjects_per_actor = 0").is_err());
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    assert!(from_toml(r#"subject_scheme = "iso3""#).is_err());
  }

  #[test]
  fn relative_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("data/map.db")), PathBuf::from("data/map.db"));
  }
}
