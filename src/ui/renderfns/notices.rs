use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::notify::{plural, ElementId, Notice, Phase, Surface, ToastKind};

/// Rows the banner strip needs for the current surface.
pub fn banner_height(surface: &Surface) -> u16 {
  surface
    .elements()
    .filter(|(id, _, _)| *id != ElementId::Toast)
    .count() as u16
}

/// Offline and sync banners, stacked in element order.
pub fn draw_banners(frame: &mut Frame, area: Rect, surface: &Surface) {
  let banners = surface
    .elements()
    .filter(|(id, _, _)| *id != ElementId::Toast);

  for (row, (_, notice, phase)) in banners.enumerate() {
    let row = row as u16;
    if row >= area.height {
      break;
    }

    let (text, color) = match notice {
      Notice::Offline => (
        " You're offline. Entries will be saved and synced when connection returns.".to_string(),
        Color::Red,
      ),
      Notice::Syncing { remaining } => (
        format!(" Syncing {} pending {}...", remaining, plural(*remaining)),
        Color::Blue,
      ),
      Notice::Toast { .. } => continue,
    };

    let line_area = Rect::new(area.x, area.y + row, area.width, 1);
    let style = phase_style(Style::default().fg(Color::White).bg(color), phase);
    frame.render_widget(Paragraph::new(text).style(style), line_area);
  }
}

/// Toast in the bottom-right corner of `area`.
pub fn draw_toast(frame: &mut Frame, area: Rect, surface: &Surface) {
  let Some((Notice::Toast { kind, message }, phase)) = surface.get(ElementId::Toast) else {
    return;
  };

  let color = match kind {
    ToastKind::Success => Color::Green,
    ToastKind::Info => Color::Blue,
    ToastKind::Warning => Color::Yellow,
  };

  let width = (message.chars().count() as u16 + 4).min(area.width);
  let height = 3.min(area.height);
  let toast_area = Rect::new(
    area.x + area.width - width,
    area.y + area.height - height,
    width,
    height,
  );

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(phase_style(Style::default().fg(color), phase));

  frame.render_widget(Clear, toast_area);
  frame.render_widget(
    Paragraph::new(message.as_str())
      .block(block)
      .style(phase_style(Style::default().fg(Color::White), phase)),
    toast_area,
  );
}

/// Elements fade in and out by dimming during transitions.
fn phase_style(style: Style, phase: Phase) -> Style {
  match phase {
    Phase::Visible => style,
    Phase::Entering | Phase::Leaving => style.add_modifier(Modifier::DIM),
  }
}
