use crate::queue::PendingEntry;
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_pending(frame: &mut Frame, area: Rect, entries: &[PendingEntry], selected: usize) {
  let block = Block::default()
    .title(format!(" Pending ({}) ", entries.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if entries.is_empty() {
    let paragraph = Paragraph::new("Nothing waiting to sync.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = entries
    .iter()
    .map(|entry| {
      let line = Line::from(vec![
        Span::styled(
          entry.date_of_work.format("%Y-%m-%d").to_string(),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(format!("{:>6}h", entry.hours), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
          format!("{:<20}", truncate(&format!("{} / {}", entry.client, entry.matter), 20)),
          Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(truncate(&entry.description, 50), Style::default().fg(Color::Gray)),
        Span::styled(
          format!("  queued {}", entry.created_at.format("%H:%M:%S")),
          Style::default().fg(Color::DarkGray),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));
  frame.render_stateful_widget(list, area, &mut state);
}
