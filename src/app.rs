use crate::cache::CacheSource;
use crate::commands::{self, Command};
use crate::config::Config;
use crate::connectivity::{ConnectivityListener, ConnectivityState};
use crate::event::{Event, EventHandler};
use crate::kv::SqliteKvStore;
use crate::listing::{self, Listing};
use crate::manager::{DrainTrigger, OfflineManager};
use crate::notify::{DashboardNotifier, Notifier, Surface, ToastKind};
use crate::queue::PendingEntry;
use crate::remote::HttpEndpoint;
use crate::snapshot::Snapshots;
use crate::ui;
use crate::worker::{PageMessage, WorkerHandle, SYNC_TAG};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::{Arc, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type DashboardManager = OfflineManager<SqliteKvStore, HttpEndpoint, DashboardNotifier>;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// View state - each variant owns its data
#[derive(Debug)]
pub enum ViewState {
  Pending {
    entries: Vec<PendingEntry>,
    selected: usize,
  },
  Entries {
    listing: Option<Listing>,
    source: Option<CacheSource>,
    selected: usize,
    loading: bool,
  },
}

/// Channels the dashboard consumes besides terminal input.
pub struct Inbound {
  pub page: mpsc::UnboundedReceiver<PageMessage>,
  pub drains: mpsc::UnboundedReceiver<DrainTrigger>,
  pub reloads: mpsc::UnboundedReceiver<()>,
  pub connectivity: mpsc::UnboundedReceiver<ConnectivityState>,
}

/// Reports monitor transitions to the dashboard loop.
pub struct StateListener {
  tx: mpsc::UnboundedSender<ConnectivityState>,
}

impl StateListener {
  pub fn new(tx: mpsc::UnboundedSender<ConnectivityState>) -> Self {
    Self { tx }
  }
}

impl ConnectivityListener for StateListener {
  fn on_online(&self) {
    let _ = self.tx.send(ConnectivityState::Online);
  }

  fn on_offline(&self) {
    let _ = self.tx.send(ConnectivityState::Offline);
  }
}

/// The `watch` dashboard
pub struct App {
  view: ViewState,
  mode: Mode,
  /// Command input buffer (after pressing :)
  command_input: String,
  selected_suggestion: usize,
  config: Config,
  manager: Arc<DashboardManager>,
  worker: WorkerHandle,
  /// Last good listing and user data for offline viewing
  snapshots: Arc<Snapshots<SqliteKvStore>>,
  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,
  last_error: Option<String>,
  should_quit: bool,
}

impl App {
  pub fn new(
    config: Config,
    manager: Arc<DashboardManager>,
    worker: WorkerHandle,
    snapshots: Arc<Snapshots<SqliteKvStore>>,
  ) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let entries = manager.pending();

    Self {
      view: ViewState::Pending {
        entries,
        selected: 0,
      },
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      config,
      manager,
      worker,
      snapshots,
      event_tx: tx,
      last_error: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, inbound: Inbound) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(100));
    self.event_tx = events.sender();
    events.forward(inbound.page, Event::Page);
    events.forward(inbound.drains, Event::Drain);
    events.forward(inbound.reloads, |()| Event::ReloadListing);
    events.forward(inbound.connectivity, Event::Connectivity);

    if self.manager.connectivity().is_online() {
      self.spawn_drain(DrainTrigger::Startup);
      self.refresh_user_data();
    } else {
      self.manager.notifier().show_offline_banner();
    }

    let result = self.event_loop(&mut terminal, &mut events).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if let Some(mut surface) = self.manager.notifier().surface() {
          surface.tick(Instant::now());
        }
      }
      Event::Connectivity(state) => {
        debug!(?state, "dashboard saw connectivity change");
        if state.is_online() {
          // The dashboard plays the environment's part and fires pending syncs.
          if let Err(e) = self.worker.fire_sync(SYNC_TAG) {
            warn!(error = %e, "could not fire background sync");
          }
        }
      }
      Event::Drain(trigger) => self.spawn_drain(trigger),
      Event::Page(PageMessage::DrainRequested) => self.spawn_drain(DrainTrigger::BackgroundSync),
      Event::DrainFinished(result) => {
        if let Err(e) = result {
          self.last_error = Some(e);
        }
        self.refresh_pending();
      }
      Event::ReloadListing => {
        if matches!(self.view, ViewState::Entries { .. }) {
          self.load_listing();
        }
      }
      Event::ListingLoaded(result) => self.apply_listing(result),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Char('r') => self.refresh_view(),
      KeyCode::Char('s') => self.spawn_drain(DrainTrigger::Manual),
      KeyCode::Tab => self.toggle_view(),
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.autocomplete_suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let suggestions = self.autocomplete_suggestions();
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.command_input.trim().to_lowercase(),
    };

    match cmd.as_str() {
      "pending" => self.show_pending(),
      "entries" => self.show_entries(),
      "sync" => self.spawn_drain(DrainTrigger::Manual),
      "quit" => self.should_quit = true,
      other => {
        self
          .manager
          .notifier()
          .toast(ToastKind::Warning, &format!("Unknown command: {}", other));
      }
    }
    self.command_input.clear();
    self.selected_suggestion = 0;
  }

  fn toggle_view(&mut self) {
    match self.view {
      ViewState::Pending { .. } => self.show_entries(),
      ViewState::Entries { .. } => self.show_pending(),
    }
  }

  fn show_pending(&mut self) {
    self.manager.notifier().set_viewing_listing(false);
    self.view = ViewState::Pending {
      entries: self.manager.pending(),
      selected: 0,
    };
  }

  fn show_entries(&mut self) {
    self.manager.notifier().set_viewing_listing(true);
    self.view = ViewState::Entries {
      listing: None,
      source: None,
      selected: 0,
      loading: true,
    };
    self.load_listing();
  }

  fn refresh_view(&mut self) {
    match self.view {
      ViewState::Pending { .. } => self.refresh_pending(),
      ViewState::Entries { .. } => self.load_listing(),
    }
  }

  fn refresh_pending(&mut self) {
    if let ViewState::Pending { entries, selected } = &mut self.view {
      *entries = self.manager.pending();
      *selected = (*selected).min(entries.len().saturating_sub(1));
    }
  }

  fn spawn_drain(&self, trigger: DrainTrigger) {
    let manager = self.manager.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let result = manager.drain(trigger).await;
      if let Ok(report) = &result {
        if !report.skipped && report.attempted > 0 {
          info!(?trigger, succeeded = report.succeeded, "dashboard drain done");
        }
      }
      let _ = tx.send(Event::DrainFinished(result.map_err(|e| e.to_string())));
    });
  }

  fn load_listing(&mut self) {
    if let ViewState::Entries { loading, .. } = &mut self.view {
      *loading = true;
    }

    let url = match self.config.endpoint(&self.config.server.listing_path) {
      Ok(url) => url,
      Err(e) => {
        self.apply_listing(Err(e.to_string()));
        return;
      }
    };
    let worker = self.worker.clone();
    let snapshots = self.snapshots.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let result = listing::fetch(&worker, &snapshots, url)
        .await
        .map_err(|e| format!("{:#}", e));
      let _ = tx.send(Event::ListingLoaded(result));
    });
  }

  /// Keep the stored clients and matters current for offline `add`.
  fn refresh_user_data(&self) {
    let url = match self.config.endpoint(&self.config.server.user_data_path) {
      Ok(url) => url,
      Err(e) => {
        warn!(error = %e, "bad user data path");
        return;
      }
    };
    let worker = self.worker.clone();
    let snapshots = self.snapshots.clone();

    tokio::spawn(async move {
      match listing::fetch_user_data(&worker, &snapshots, url).await {
        Ok((user, source)) => debug!(clients = user.clients.len(), ?source, "user data refreshed"),
        Err(e) => warn!(error = %e, "user data not refreshed"),
      }
    });
  }

  fn apply_listing(&mut self, result: Result<(Listing, CacheSource), String>) {
    let ViewState::Entries {
      listing,
      source,
      selected,
      loading,
    } = &mut self.view
    else {
      return;
    };

    *loading = false;
    match result {
      Ok((fresh, from)) => {
        *selected = (*selected).min(fresh.entries.len().saturating_sub(1));
        *listing = Some(fresh);
        *source = Some(from);
      }
      Err(e) => {
        warn!(error = %e, "entries listing failed");
        self.last_error = Some(e);
      }
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let (len, selected) = match &mut self.view {
      ViewState::Pending { entries, selected } => (entries.len(), selected),
      ViewState::Entries {
        listing, selected, ..
      } => (listing.as_ref().map_or(0, |l| l.entries.len()), selected),
    };
    if len > 0 {
      *selected = (*selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  // Accessors for UI rendering
  pub fn view(&self) -> &ViewState {
    &self.view
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn server_url(&self) -> &str {
    &self.config.server.url
  }

  pub fn is_online(&self) -> bool {
    self.manager.connectivity().is_online()
  }

  pub fn pending_count(&self) -> usize {
    match &self.view {
      ViewState::Pending { entries, .. } => entries.iter().filter(|e| !e.synced).count(),
      ViewState::Entries { .. } => self.manager.pending_count(),
    }
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn surface(&self) -> Option<MutexGuard<'_, Surface>> {
    self.manager.notifier().surface()
  }
}
