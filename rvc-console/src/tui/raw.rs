//! Raw tab rendering: a three-pane master-detail view per CAN interface —
//! the list of known messages on the left, the selected message's latest
//! frame in the middle, and its spec pretty-printed on the right.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use super::{App, TabState};
use crate::engine::RawRecord;

/// Frames older than this no longer show an age suffix in the message list.
const RECENT_AGE_THRESHOLD_SECS: u64 = 600;

fn recent_age_secs(record: &RawRecord) -> Option<u64> {
    record
        .last_received
        .elapsed()
        .ok()
        .map(|elapsed| elapsed.as_secs())
        .filter(|secs| *secs < RECENT_AGE_THRESHOLD_SECS)
}

pub fn draw(frame: &mut Frame, app: &App, idx: usize, area: Rect) {
    let records = &app.cached_raw[idx];
    let tab = app.raw_tab_view(idx);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(35),
            Constraint::Percentage(35),
        ])
        .split(area);

    draw_message_list(frame, app, idx, records, tab, columns[0]);
    draw_frame_detail(frame, records, tab, columns[1]);
    draw_spec_detail(frame, records, tab, columns[2]);
}

fn draw_message_list(
    frame: &mut Frame,
    app: &App,
    idx: usize,
    records: &[RawRecord],
    tab: &TabState,
    area: Rect,
) {
    let items: Vec<ListItem> = records
        .iter()
        .enumerate()
        .map(|(row_idx, record)| {
            let label = match recent_age_secs(record) {
                Some(secs) => format!("{} ({secs}s ago)", record.message_name),
                None => record.message_name.clone(),
            };
            let mut item = ListItem::new(label);
            if row_idx == tab.selected {
                item = item.style(Style::default().add_modifier(Modifier::REVERSED));
            }
            item
        })
        .collect();

    let title = format!(
        "Raw: {} ({} sort)",
        app.interfaces()[idx],
        app.raw_sort().label()
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn draw_frame_detail(frame: &mut Frame, records: &[RawRecord], tab: &TabState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Frame");

    let text = match records.get(tab.selected) {
        Some(record) => {
            let decoded = record
                .decoded
                .iter()
                .map(|(name, value)| format!("  {name} = {value}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "DGN:  {}\nID:   {}\nData: {}\n\nDecoded:\n{}",
                record.dgn_hex, record.raw_id, record.raw_data, decoded
            )
        }
        None => String::new(),
    };

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_spec_detail(frame: &mut Frame, records: &[RawRecord], tab: &TabState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Spec");

    let Some(record) = records.get(tab.selected) else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let pretty = serde_json::to_string_pretty(record.spec.as_ref()).unwrap_or_default();
    let lines: Vec<Line> = pretty
        .lines()
        .map(|line| {
            if line.contains(&record.dgn_hex) {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().bg(Color::Yellow).fg(Color::Black),
                ))
            } else {
                Line::from(line.to_string())
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}
