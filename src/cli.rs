//! Subcommand handlers.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::{App, Inbound, StateListener};
use crate::cache::{CacheSource, HttpNetwork, ShellRequest, SqliteStorage};
use crate::config::Config;
use crate::connectivity::{spawn_signals, ConnectivityMonitor, ConnectivityProvider, HealthProbe};
use crate::db::Database;
use crate::kv::SqliteKvStore;
use crate::listing;
use crate::manager::{DrainTrigger, OfflineManager, QueueReason, SubmitOutcome};
use crate::notify::{plural, ConsoleNotifier, DashboardNotifier};
use crate::queue::EntryForm;
use crate::remote::HttpEndpoint;
use crate::snapshot::Snapshots;
use crate::sync::DrainReport;
use crate::worker::{cache_name, LifecycleState, PageMessage, ShellWorker, WorkerHandle};
use crate::{AddArgs, DraftAction, ShellAction};

type ConsoleManager = OfflineManager<SqliteKvStore, HttpEndpoint, ConsoleNotifier>;

pub struct Context {
  pub config: Config,
  pub data_dir: PathBuf,
}

impl Context {
  fn kv(&self) -> Result<Arc<SqliteKvStore>> {
    Ok(Arc::new(SqliteKvStore::new(Database::open(&self.data_dir)?)))
  }

  /// The worker gets its own connection to the database file.
  fn spawn_worker(&self) -> Result<(WorkerHandle, mpsc::UnboundedReceiver<PageMessage>)> {
    let storage = Arc::new(SqliteStorage::new(Database::open(&self.data_dir)?));
    let network = Arc::new(HttpNetwork::new(self.config.request_timeout())?);
    let base = self.config.endpoint("/")?;
    Ok(ShellWorker::spawn(storage, network, base))
  }

  async fn monitor(&self) -> Result<(Arc<HealthProbe>, Arc<ConnectivityMonitor>)> {
    let probe = Arc::new(HealthProbe::new(&self.config)?);
    let initial = probe.current().await;
    info!(?initial, "initial connectivity");
    Ok((probe, Arc::new(ConnectivityMonitor::new(initial))))
  }

  /// One-shot commands run without a shell worker: a background sync
  /// registration would not outlive the process.
  async fn console_manager(&self, kv: Arc<SqliteKvStore>) -> Result<ConsoleManager> {
    let (_, monitor) = self.monitor().await?;
    Ok(OfflineManager::new(
      kv,
      Arc::new(HttpEndpoint::new(&self.config)?),
      Arc::new(ConsoleNotifier),
      monitor,
      &self.config,
    ))
  }
}

impl AddArgs {
  fn into_form(self) -> EntryForm {
    EntryForm {
      client: self.client.unwrap_or_default(),
      matter: self.matter.unwrap_or_default(),
      date_of_work: self.date.unwrap_or_default(),
      hours: self.hours.unwrap_or_default(),
      timekeeper: self.timekeeper.unwrap_or_default(),
      desc: self.desc.unwrap_or_default(),
    }
  }
}

pub async fn add(ctx: &Context, args: AddArgs) -> Result<()> {
  let save_draft = args.save_draft;
  let kv = ctx.kv()?;
  let manager = ctx.console_manager(kv.clone()).await?;

  // Blank fields resume from the saved draft.
  let mut form = match manager.draft() {
    Some(draft) => args.into_form().or_from(&draft),
    None => args.into_form(),
  };

  if form.timekeeper.trim().is_empty() && ctx.config.timekeeper.is_none() {
    let known = listing::cached_user_data(&Snapshots::new(kv));
    if let Some(timekeeper) = known.and_then(|user| user.timekeeper) {
      form.timekeeper = timekeeper;
    }
  }

  if save_draft {
    manager.save_draft(&form)?;
    println!("Draft saved.");
    return Ok(());
  }

  match manager.submit(&form).await {
    Ok(SubmitOutcome::Saved { redirect }) => {
      if let Some(location) = redirect {
        println!("Server location: {}", location);
      }
      Ok(())
    }
    Ok(SubmitOutcome::Queued { entry, reason }) => {
      let why = match reason {
        QueueReason::Offline => "server unreachable".to_string(),
        QueueReason::Rejected { status } => format!("server answered {}", status),
        QueueReason::Unreachable => "request failed".to_string(),
      };
      println!(
        "Queued {} ({}); {} pending",
        entry.id,
        why,
        manager.pending_count()
      );
      Ok(())
    }
    Err(e) => {
      if let Err(draft_err) = manager.save_draft(&form) {
        warn!(error = %draft_err, "failed to keep form as draft");
        return Err(e.wrap_err("Entry not submitted"));
      }
      Err(e.wrap_err("Entry not submitted; form kept as draft"))
    }
  }
}

pub async fn sync(ctx: &Context) -> Result<()> {
  let manager = ctx.console_manager(ctx.kv()?).await?;
  let pending = manager.pending_count();

  if pending == 0 {
    println!("Nothing to sync.");
    return Ok(());
  }
  if !manager.connectivity().is_online() {
    println!(
      "Server unreachable; {} {} still pending.",
      pending,
      plural(pending)
    );
    return Ok(());
  }

  let report = manager.drain(DrainTrigger::Manual).await?;
  print_report(&report, manager.pending_count());
  Ok(())
}

fn print_report(report: &DrainReport, remaining: usize) {
  if report.skipped {
    println!("A sync is already running.");
    return;
  }
  if report.rejected > 0 {
    println!("{} rejected by the server, kept for retry.", report.rejected);
  }
  if report.aborted {
    println!("Connection lost during sync.");
  }
  println!("{} {} still pending.", remaining, plural(remaining));
}

pub fn pending(ctx: &Context) -> Result<()> {
  let store = crate::queue::QueueStore::new(ctx.kv()?);
  let entries = store.load();

  if entries.is_empty() {
    println!("No pending entries.");
    return Ok(());
  }

  for entry in &entries {
    println!(
      "{}  {}  {:>6}h  {} / {}  {}",
      entry.id,
      entry.date_of_work,
      entry.hours,
      entry.client,
      entry.matter,
      entry.description
    );
  }
  println!("{} pending {}", entries.len(), plural(entries.len()));
  Ok(())
}

pub async fn known(ctx: &Context) -> Result<()> {
  let (worker, _page) = ctx.spawn_worker()?;
  let snapshots = Snapshots::new(ctx.kv()?);
  let url = ctx.config.endpoint(&ctx.config.server.user_data_path)?;
  let (user, source) = listing::fetch_user_data(&worker, &snapshots, url).await?;

  if source == CacheSource::Cache {
    println!("Server unreachable; showing the last saved copy.");
  }
  if let Some(timekeeper) = &user.timekeeper {
    println!("Timekeeper: {}", timekeeper);
  }
  println!("Clients:");
  for client in &user.clients {
    println!("  {}", client);
  }
  println!("Matters:");
  for matter in &user.matters {
    println!("  {}", matter);
  }
  Ok(())
}

pub fn draft(ctx: &Context, action: DraftAction) -> Result<()> {
  let drafts = crate::draft::DraftStore::new(ctx.kv()?);

  match action {
    DraftAction::Show => match drafts.load() {
      Some(form) => {
        let yaml = serde_yaml::to_string(&form).map_err(|e| eyre!("Failed to print draft: {}", e))?;
        print!("{}", yaml);
      }
      None => println!("No saved draft."),
    },
    DraftAction::Clear => {
      drafts.clear()?;
      println!("Draft cleared.");
    }
  }
  Ok(())
}

pub async fn shell(ctx: &Context, action: ShellAction) -> Result<()> {
  let (worker, _page) = ctx.spawn_worker()?;

  match action {
    ShellAction::Install => {
      worker.install().await?;
      println!("Installed {}", cache_name());
    }
    ShellAction::Activate => {
      let deleted = worker.activate().await?;
      if deleted.is_empty() {
        println!("No stale caches.");
      }
      for name in deleted {
        println!("Deleted {}", name);
      }
    }
    ShellAction::Fetch { path, navigate } => {
      let url = ctx.config.endpoint(&path)?;
      let request = if navigate {
        ShellRequest::navigate(url)
      } else {
        ShellRequest::get(url)
      };
      let result = worker.fetch(request).await?;
      eprintln!("{} ({:?})", result.data.status, result.source);
      print!("{}", result.data.text());
    }
    ShellAction::Buckets => {
      let current = cache_name();
      for name in worker.buckets().await? {
        let marker = if name == current { "*" } else { " " };
        println!("{} {}", marker, name);
      }
    }
  }
  Ok(())
}

pub async fn watch(ctx: Context) -> Result<()> {
  let (reload_tx, reloads) = mpsc::unbounded_channel();
  let notifier = Arc::new(DashboardNotifier::new(reload_tx));
  let (probe, monitor) = ctx.monitor().await?;
  let (worker, page) = ctx.spawn_worker()?;
  let kv = ctx.kv()?;

  if monitor.is_online() && worker.state().await? != LifecycleState::Activated {
    if let Err(e) = worker.install().await {
      warn!(error = %e, "shell not installed, continuing without offline cache");
    }
  }

  let manager = Arc::new(
    OfflineManager::new(
      kv.clone(),
      Arc::new(HttpEndpoint::new(&ctx.config)?),
      notifier,
      monitor.clone(),
      &ctx.config,
    )
    .with_worker(worker.clone()),
  );

  let (drain_tx, drains) = mpsc::unbounded_channel();
  monitor.subscribe(manager.listener(drain_tx));
  let (state_tx, connectivity) = mpsc::unbounded_channel();
  monitor.subscribe(Arc::new(StateListener::new(state_tx)));

  let signals = spawn_signals(probe, monitor.state(), ctx.config.probe_interval());
  tokio::spawn(monitor.clone().run(signals));

  let snapshots = Arc::new(Snapshots::new(kv));
  let mut app = App::new(ctx.config, manager, worker, snapshots);
  app
    .run(Inbound {
      page,
      drains,
      reloads,
      connectivity,
    })
    .await
}
