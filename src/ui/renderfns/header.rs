use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::notify::plural;

/// Header bar: name, server, connectivity and queue depth, then shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, server_url: &str, online: bool, pending: usize) {
  let (state, state_color) = if online {
    ("online", Color::Green)
  } else {
    ("offline", Color::Red)
  };

  let header = Line::from(vec![
    Span::styled(" billable ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", extract_host(server_url)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", state), Style::default().fg(state_color).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} pending {} ", pending, plural(pending)),
      Style::default().fg(Color::Yellow),
    ),
    Span::raw("  "),
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" command", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<s>", Style::default().fg(Color::Cyan)),
    Span::styled(" sync", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<tab>", Style::default().fg(Color::Cyan)),
    Span::styled(" view", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" quit", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn extract_host(url: &str) -> &str {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("http://127.0.0.1:5000"), "127.0.0.1:5000");
    assert_eq!(extract_host("https://time.example.com/app"), "time.example.com");
    assert_eq!(extract_host("localhost"), "localhost");
  }
}
