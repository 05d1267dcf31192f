//! visitmap server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and serves the JSON API over HTTP. The `admin` subcommands are the
//! only writers of the lock flag and the ban list.
//!
//! ```text
//! visitmap --config /etc/visitmap.toml serve
//! visitmap admin ban some_handle
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use visitmap_core::{
  VisitService,
  policy::AdminPolicy as _,
  validate::{is_valid_actor, normalize_actor},
};
use visitmap_store_sqlite::SqliteStore;

use settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Shared visited-countries map server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Administer the lock flag and the ban list.
  #[command(subcommand)]
  Admin(AdminCommand),
}

#[derive(Subcommand)]
enum AdminCommand {
  /// Reject every write until unlocked.
  Lock,
  Unlock,
  /// Ban a handle.
  Ban { handle: String },
  Unban { handle: String },
  /// List banned handles.
  Bans,
  /// Print the lock flag, ban count and ledger size.
  Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = cfg.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg, store).await,
    Command::Admin(cmd) => admin(cmd, &store).await,
  }
}

async fn serve(cfg: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let rules = cfg.rules();
  info!(
    rate_limit_seconds = rules.rate_limit_interval.as_secs(),
    max_subjects_per_actor = rules.max_subjects_per_actor,
    subject_scheme = ?rules.subject_scheme,
    "rules loaded"
  );

  let service = VisitService::new(store.clone(), store.clone(), store, rules);
  let app = visitmap_api::api_router(Arc::new(service)).layer(TraceLayer::new_for_http());

  let address = cfg.address();
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}

async fn admin(cmd: AdminCommand, store: &SqliteStore) -> anyhow::Result<()> {
  match cmd {
    AdminCommand::Lock => {
      store.set_locked(true).await?;
      println!("locked");
    }
    AdminCommand::Unlock => {
      store.set_locked(false).await?;
      println!("unlocked");
    }
    AdminCommand::Ban { handle } => {
      let actor = normalize_actor(&handle);
      if !is_valid_actor(&actor) {
        anyhow::bail!("{handle:?} is not a valid handle");
      }
      if store.ban(&actor).await? {
        println!("banned {actor}");
      } else {
        println!("{actor} was already banned");
      }
    }
    AdminCommand::Unban { handle } => {
      let actor = normalize_actor(&handle);
      if store.unban(&actor).await? {
        println!("unbanned {actor}");
      } else {
        println!("{actor} was not banned");
      }
    }
    AdminCommand::Bans => {
      for actor in store.list_bans().await? {
        println!("{actor}");
      }
    }
    AdminCommand::Status => {
      let locked = store.is_locked().await?;
      let bans = store.list_bans().await?.len();
      let events = store.event_count().await?;
      println!("locked: {locked}");
      println!("bans:   {bans}");
      println!("events: {events}");
    }
  }
  Ok(())
}
