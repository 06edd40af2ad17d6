use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom line: current view, plus the last error if there is one
pub fn draw_footer(frame: &mut Frame, area: Rect, view: &str, error: Option<&str>) {
  let mut spans = vec![
    Span::raw(" "),
    Span::styled(view.to_string(), Style::default().fg(Color::Cyan).bold()),
  ];

  if let Some(error) = error {
    spans.push(Span::styled("  │  ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(error.to_string(), Style::default().fg(Color::Red)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
