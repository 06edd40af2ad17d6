use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::CacheSource;
use crate::connectivity::ConnectivityState;
use crate::listing::Listing;
use crate::manager::DrainTrigger;
use crate::sync::DrainReport;
use crate::worker::PageMessage;

/// Dashboard events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for notice expiry and redraw
  Tick,
  /// The connectivity monitor changed state
  Connectivity(ConnectivityState),
  /// Something asked for a drain
  Drain(DrainTrigger),
  /// Message posted by the shell worker
  Page(PageMessage),
  DrainFinished(Result<DrainReport, String>),
  /// Scheduled listing refresh after a successful drain
  ReloadListing,
  ListingLoaded(Result<(Listing, CacheSource), String>),
}

/// Merges terminal input, a tick timer and forwarded channels into one stream
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let input = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          _ => continue,
        }
      } else {
        Event::Tick
      };

      if input.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Forward every message from `source` as an event until either side closes.
  pub fn forward<T>(&self, mut source: mpsc::UnboundedReceiver<T>, wrap: fn(T) -> Event)
  where
    T: Send + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while let Some(message) = source.recv().await {
        if tx.send(wrap(message)).is_err() {
          break;
        }
      }
    });
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
