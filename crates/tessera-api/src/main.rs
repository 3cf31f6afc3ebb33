//! tessera-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `TESSERA_*` environment variables, opens the SQLite store and serves the
//! JSON API over HTTP.
//!
//! # Bootstrapping staff
//!
//! Staff accounts are normally provisioned next to the authentication
//! gateway. To insert one directly:
//!
//! ```text
//! tessera-server --add-staff mverdi --email m.verdi@example.org --full-name "Marco Verdi"
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tessera_api::{AppState, ServerConfig};
use tessera_core::staff::{NewStaff, StaffRole};
use tessera_store_sqlite::{SqliteStore, StoreOptions};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tessera membership application server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Insert an active staff member with this username and exit.
  #[arg(long, value_name = "USERNAME", requires_all = ["email", "full_name"])]
  add_staff: Option<String>,

  /// Email of the staff member created by `--add-staff`.
  #[arg(long)]
  email: Option<String>,

  /// Full name of the staff member created by `--add-staff`.
  #[arg(long)]
  full_name: Option<String>,

  /// Give the staff member created by `--add-staff` the admin role.
  #[arg(long)]
  admin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 3001)?
    .set_default("store_path", "tessera.db")?
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("TESSERA").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  let options = StoreOptions { busy_timeout: server_cfg.busy_timeout() };
  let store = SqliteStore::open_with(&store_path, options)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: add a staff member and exit.
  if let Some(username) = cli.add_staff {
    let staff = store
      .add_staff(NewStaff {
        username,
        email: cli.email.unwrap_or_default(),
        full_name: cli.full_name.unwrap_or_default(),
        role: if cli.admin { StaffRole::Admin } else { StaffRole::Staff },
      })
      .await
      .context("failed to add staff member")?;
    println!("{}", staff.staff_id);
    return Ok(());
  }

  let state = AppState::new(Arc::new(store));
  let app = tessera_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
