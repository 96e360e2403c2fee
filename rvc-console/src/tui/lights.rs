//! Lights tab rendering: one row per discovered entity, area/name/status
//! columns, with brightness folded into the status cell and a key hint
//! shown on whichever row is selected.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use ratatui::widgets::{Block, Borders, Cell, Row, Table};
use ratatui::Frame;

use super::{App, TabState};
use crate::engine::{LightState, PowerState};

fn status_text(light: &LightState) -> String {
    match (light.dimmable, light.brightness) {
        (true, Some(pct)) if light.state != PowerState::Unavailable => {
            format!("{} ({pct}%)", light.state.as_str())
        }
        _ => light.state.as_str().to_string(),
    }
}

fn selection_hint(light: &LightState) -> &'static str {
    if light.dimmable {
        "[\u{2190}/\u{2192}: Dim  Enter: Toggle]"
    } else {
        "[Enter: Toggle]"
    }
}

pub fn draw(frame: &mut Frame, app: &App, lights: &[LightState], tab: &TabState, area: Rect) {
    let header = Row::new(vec!["Area", "Name", "Status"]).style(Style::default().add_modifier(Modifier::BOLD));

    let rows = lights.iter().enumerate().map(|(idx, light)| {
        let status_color = match light.state {
            PowerState::On => Color::Green,
            PowerState::Off => Color::Gray,
            PowerState::Unavailable => Color::DarkGray,
        };

        let status = if idx == tab.selected {
            format!("{}  {}", status_text(light), selection_hint(light))
        } else {
            status_text(light)
        };

        let row = Row::new(vec![
            Cell::from(light.suggested_area.clone().unwrap_or_else(|| "-".to_string())),
            Cell::from(light.friendly_name.clone()),
            Cell::from(Text::styled(status, Style::default().fg(status_color))),
        ]);
        if idx == tab.selected {
            row.style(Style::default().add_modifier(Modifier::REVERSED))
        } else {
            row
        }
    });

    let title = format!("Lights ({} sort)", app.lights_sort().label());
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(20),
            Constraint::Percentage(30),
            Constraint::Percentage(50),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));

    frame.render_widget(table, area);
}
