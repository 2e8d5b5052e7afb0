mod app;
mod cache;
mod clock;
mod commands;
mod config;
mod event;
mod logging;
mod prefetch;
mod query;
mod session;
mod site;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "limelight")]
#[command(about = "Prefetch and cache coordination for the theatre website data")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/limelight/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep durable records in memory only
  #[arg(long)]
  no_persist: bool,

  #[command(subcommand)]
  command: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  /// Start a session and read commands from stdin (default)
  Run,
  /// Show what the durable store holds
  Status,
  /// Delete durable records
  ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let persist = !args.no_persist;

  let _log_guard = logging::init(&config.log)?;

  match args.command.unwrap_or(Mode::Run) {
    Mode::Run => {
      let session = session::Session::open(&config, persist)?;
      app::App::new(session).run().await?;
    }
    Mode::Status => {
      let stored = session::Session::stored_status(&config, persist)?;
      println!(
        "course metadata cached: {}",
        if stored.course_metadata_cached { "yes" } else { "no" }
      );
      println!(
        "course sync due: {}",
        if stored.course_sync_due { "yes" } else { "no" }
      );
    }
    Mode::ClearCache => {
      session::Session::clear_stored(&config, persist)?;
      println!("durable cache cleared");
    }
  }

  Ok(())
}
