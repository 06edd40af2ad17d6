use crate::cache::CacheSource;
use crate::listing::Listing;
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_entries(
  frame: &mut Frame,
  area: Rect,
  listing: Option<&Listing>,
  source: Option<CacheSource>,
  selected: usize,
  loading: bool,
) {
  let origin = match source {
    Some(CacheSource::Cache) => " [cached]",
    Some(CacheSource::OfflineFallback) => " [offline]",
    Some(CacheSource::Network) | None => "",
  };
  let title = match (loading, listing) {
    (true, _) => " Recent entries (loading...) ".to_string(),
    (false, Some(listing)) => format!(" Recent entries ({}){} ", listing.entries.len(), origin),
    (false, None) => " Recent entries ".to_string(),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let entries = listing.map(|l| l.entries.as_slice()).unwrap_or_default();
  if entries.is_empty() {
    let content = if loading {
      ""
    } else if listing.is_none() {
      "Listing unavailable. Press r to retry."
    } else {
      "No entries yet."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = entries
    .iter()
    .map(|entry| {
      let line = Line::from(vec![
        Span::styled(format!("{:<10}", entry.date_of_work), Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        Span::styled(format!("{:>6.2}h", entry.hours), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
          format!("{:<20}", truncate(&format!("{} / {}", entry.client, entry.matter), 20)),
          Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
          format!("{:<12}", truncate(entry.timekeeper.as_deref().unwrap_or("-"), 12)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::raw(truncate(&entry.desc, 50)),
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
