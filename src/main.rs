mod app;
mod cache;
mod cli;
mod commands;
mod config;
mod connectivity;
mod db;
mod draft;
mod event;
mod kv;
mod listing;
mod logging;
mod manager;
mod notify;
mod queue;
mod remote;
mod snapshot;
mod sync;
mod ui;
mod worker;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "billable")]
#[command(about = "Offline-first time entry for the billable server")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/billable/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level unless RUST_LOG says otherwise
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Submit a time entry, queueing it if the server is unreachable
  Add(AddArgs),
  /// Send every pending entry now
  Sync,
  /// List entries waiting to sync
  Pending,
  /// Clients and matters known to the server (last good copy when offline)
  Known,
  /// Inspect or discard the saved entry form
  Draft {
    #[command(subcommand)]
    action: DraftAction,
  },
  /// Manage the offline shell cache
  Shell {
    #[command(subcommand)]
    action: ShellAction,
  },
  /// Live dashboard (default)
  Watch,
}

#[derive(ClapArgs, Debug, Default)]
pub struct AddArgs {
  #[arg(long)]
  pub client: Option<String>,
  #[arg(long)]
  pub matter: Option<String>,
  /// Date of work, YYYY-MM-DD (default: today)
  #[arg(long)]
  pub date: Option<String>,
  #[arg(long)]
  pub hours: Option<String>,
  #[arg(long)]
  pub timekeeper: Option<String>,
  #[arg(long)]
  pub desc: Option<String>,
  /// Save the form as a draft instead of submitting it
  #[arg(long)]
  pub save_draft: bool,
}

#[derive(Subcommand, Debug)]
pub enum DraftAction {
  Show,
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum ShellAction {
  /// Fetch and cache the shell, then activate it
  Install,
  /// Drop every shell cache but the current one
  Activate,
  /// Fetch a path through the shell cache
  Fetch {
    path: String,
    /// Treat the request as a document navigation
    #[arg(long)]
    navigate: bool,
  },
  /// List cache buckets
  Buckets,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let data_dir = config.data_dir()?;
  let _log_guard = logging::init(&data_dir, args.verbose)?;

  let ctx = cli::Context { config, data_dir };

  match args.command.unwrap_or(Command::Watch) {
    Command::Add(add) => cli::add(&ctx, add).await,
    Command::Sync => cli::sync(&ctx).await,
    Command::Pending => cli::pending(&ctx),
    Command::Known => cli::known(&ctx).await,
    Command::Draft { action } => cli::draft(&ctx, action),
    Command::Shell { action } => cli::shell(&ctx, action).await,
    Command::Watch => cli::watch(ctx).await,
  }
}
