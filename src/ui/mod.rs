mod renderfns;
mod views;

use crate::app::{App, Mode, ViewState};
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let surface = app.surface();
  let banners = surface.as_deref().map_or(0, renderfns::banner_height);

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),       // Header
      Constraint::Length(banners), // Offline / sync banners
      Constraint::Min(1),          // Main content
      Constraint::Length(1),       // Footer
    ])
    .split(frame.area());

  renderfns::draw_header(
    frame,
    chunks[0],
    app.server_url(),
    app.is_online(),
    app.pending_count(),
  );

  let label = match app.view() {
    ViewState::Pending { entries, selected } => {
      views::draw_pending(frame, chunks[2], entries, *selected);
      "Pending"
    }
    ViewState::Entries {
      listing,
      source,
      selected,
      loading,
    } => {
      views::draw_entries(frame, chunks[2], listing.as_ref(), *source, *selected, *loading);
      "Recent entries"
    }
  };

  if let Some(surface) = surface.as_deref() {
    renderfns::draw_banners(frame, chunks[1], surface);
    renderfns::draw_toast(frame, chunks[2], surface);
  }

  if *app.mode() == Mode::Command {
    renderfns::draw_palette(
      frame,
      chunks[2],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }

  renderfns::draw_footer(frame, chunks[3], label, app.last_error());
}
