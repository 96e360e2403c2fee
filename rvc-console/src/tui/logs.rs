//! Logs tab rendering: newest-first, colored by level, with an optional
//! case-sensitive substring filter and a line-wrap toggle.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem};
use ratatui::Frame;

use super::App;
use crate::logging::LogLine;

fn level_color(level: log::Level) -> Color {
    match level {
        log::Level::Error => Color::Red,
        log::Level::Warn => Color::Yellow,
        log::Level::Info => Color::White,
        log::Level::Debug => Color::Magenta,
        log::Level::Trace => Color::DarkGray,
    }
}

/// Chunk `text` into `width`-wide segments, splitting on character
/// boundaries only (no word-wrap). Always returns at least one segment.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|chunk| chunk.iter().collect()).collect()
}

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let filter = app.log_filter();
    let filtered: Vec<&LogLine> = app
        .cached_logs
        .iter()
        .filter(|line| filter.is_empty() || line.text.contains(filter))
        .collect();

    let wrap = app.wrap_enabled();
    let wrap_width = area.width.saturating_sub(2) as usize;

    let tab = app.logs_tab_view();
    let items: Vec<ListItem> = filtered
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let style = Style::default().fg(level_color(line.level));
            let text = if wrap {
                let lines: Vec<Line> = wrap_text(&line.text, wrap_width)
                    .into_iter()
                    .map(|segment| Line::from(Span::styled(segment, style)))
                    .collect();
                Text::from(lines)
            } else {
                Text::from(Line::from(Span::styled(line.text.clone(), style)))
            };
            let mut item = ListItem::new(text);
            if idx == tab.selected {
                item = item.style(Style::default().add_modifier(Modifier::REVERSED));
            }
            item
        })
        .collect();

    let title = if filter.is_empty() {
        "Logs".to_string()
    } else {
        format!("Logs (filter: {filter})")
    };

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}
