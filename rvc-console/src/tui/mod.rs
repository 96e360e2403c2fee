//! TUI Controller: tab model, keyboard dispatch, and the render loop.
//!
//! Built on `ratatui` + `crossterm`, the terminal stack used elsewhere in
//! the retrieved example pack for tabbed live-data consoles. Terminal
//! setup/teardown follows the standard ratatui idiom: raw mode and the
//! alternate screen are entered once before the first draw and restored by
//! a `Drop` guard so they come back on every exit path, including panics.

mod lights;
mod logs;
mod raw;

use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::{Frame, Terminal};

use crate::clipboard::osc52_sequence;
use crate::command::{digit_to_percent, send_light_command, LightAction};
use crate::engine::{Engine, LightState};
use crate::logging::{ConsoleLogSink, LogLine};

const TICK: Duration = Duration::from_millis(500);
const NOTIFICATION_LIFETIME: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightsSort {
    AreaThenName,
    Name,
    Newest,
}

impl LightsSort {
    fn next(self) -> Self {
        match self {
            LightsSort::AreaThenName => LightsSort::Name,
            LightsSort::Name => LightsSort::Newest,
            LightsSort::Newest => LightsSort::AreaThenName,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LightsSort::AreaThenName => "Area\u{2192}Name",
            LightsSort::Name => "Name",
            LightsSort::Newest => "Newest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSort {
    AToZ,
    Newest,
    Oldest,
}

impl RawSort {
    fn next(self) -> Self {
        match self {
            RawSort::AToZ => RawSort::Newest,
            RawSort::Newest => RawSort::Oldest,
            RawSort::Oldest => RawSort::AToZ,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RawSort::AToZ => "A\u{2192}Z",
            RawSort::Newest => "Newest",
            RawSort::Oldest => "Oldest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Lights,
    Logs,
    Raw(usize),
}

struct TabState {
    selected: usize,
    offset: usize,
}

impl Default for TabState {
    fn default() -> Self {
        TabState { selected: 0, offset: 0 }
    }
}

enum InputMode {
    Normal,
    Prompting { buffer: String },
}

struct Notification {
    message: String,
    at: Instant,
}

/// All TUI-owned state. Single-threaded and cooperative: nothing here is
/// behind a lock because only the UI thread ever touches it.
pub struct App {
    engine: Arc<Engine>,
    log_sink: Arc<ConsoleLogSink>,
    interfaces: Vec<String>,

    active_tab: usize,
    lights_tab: TabState,
    logs_tab: TabState,
    raw_tabs: Vec<TabState>,

    lights_sort: LightsSort,
    raw_sort: RawSort,

    paused: bool,
    wrap_logs: bool,
    log_filter: String,
    input_mode: InputMode,
    notification: Option<Notification>,

    cached_lights: Vec<LightState>,
    cached_logs: Vec<LogLine>,
    cached_raw: Vec<Vec<crate::engine::RawRecord>>,

    /// Height of the last rendered content area (between header and
    /// footer), used to scale PageUp/PageDown jumps to the terminal size.
    content_height: u16,

    should_quit: bool,
    pending_clipboard: Option<String>,
}

impl App {
    pub fn new(engine: Arc<Engine>, log_sink: Arc<ConsoleLogSink>, interfaces: Vec<String>) -> Self {
        let raw_tab_count = interfaces.len();
        App {
            engine,
            log_sink,
            interfaces,
            active_tab: 0,
            lights_tab: TabState::default(),
            logs_tab: TabState::default(),
            raw_tabs: (0..raw_tab_count).map(|_| TabState::default()).collect(),
            lights_sort: LightsSort::AreaThenName,
            raw_sort: RawSort::Newest,
            paused: false,
            wrap_logs: false,
            log_filter: String::new(),
            input_mode: InputMode::Normal,
            notification: None,
            cached_lights: Vec::new(),
            cached_logs: Vec::new(),
            cached_raw: (0..raw_tab_count).map(|_| Vec::new()).collect(),
            content_height: 0,
            should_quit: false,
            pending_clipboard: None,
        }
    }

    fn tab_titles(&self) -> Vec<String> {
        let mut titles = vec!["Lights".to_string(), "Logs".to_string()];
        titles.extend(self.interfaces.iter().map(|i| format!("Raw:{i}")));
        titles
    }

    fn current_tab(&self) -> Tab {
        match self.active_tab {
            0 => Tab::Lights,
            1 => Tab::Logs,
            n => Tab::Raw(n - 2),
        }
    }

    fn notify(&mut self, message: String) {
        self.notification = Some(Notification { message, at: Instant::now() });
    }

    fn refresh_snapshots(&mut self) {
        if self.paused {
            return;
        }
        self.cached_lights = self.engine.snapshot_lights();
        sort_lights(&mut self.cached_lights, self.lights_sort);
        clamp(&mut self.lights_tab, self.cached_lights.len());

        self.cached_logs = self.log_sink.drain_into(&mut self.cached_logs);

        for (idx, interface) in self.interfaces.iter().enumerate() {
            let mut records = self.engine.snapshot_raw(interface);
            sort_raw(&mut records, self.raw_sort);
            clamp(&mut self.raw_tabs[idx], records.len());
            self.cached_raw[idx] = records;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if let InputMode::Prompting { buffer } = &mut self.input_mode {
            match key.code {
                KeyCode::Enter => {
                    self.log_filter = buffer.clone();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Esc => {
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.engine.stop.store(true, std::sync::atomic::Ordering::Relaxed);
                self.should_quit = true;
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                self.paused = !self.paused;
                if !self.paused {
                    self.cached_lights.clear();
                    self.cached_logs.clear();
                    for records in &mut self.cached_raw {
                        records.clear();
                    }
                }
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Prompting { buffer: String::new() };
            }
            KeyCode::Char('w') | KeyCode::Char('W') => self.wrap_logs = !self.wrap_logs,
            KeyCode::Char('s') | KeyCode::Char('S') => self.cycle_sort(),
            KeyCode::Char('c') | KeyCode::Char('C') => self.request_copy(),
            KeyCode::Char(c) if c.is_ascii_digit() && !matches!(self.current_tab(), Tab::Lights) => {
                self.switch_tab_by_digit(c);
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-self.page_size()),
            KeyCode::PageDown => self.move_selection(self.page_size()),
            KeyCode::Home => self.move_selection_to(0),
            KeyCode::End => self.move_selection_to(usize::MAX),
            KeyCode::Enter if self.current_tab() == Tab::Lights => self.dispatch_light_action(LightAction::Toggle),
            KeyCode::Right | KeyCode::Char('+') if self.current_tab() == Tab::Lights => {
                self.dispatch_light_action(LightAction::StepBrightness(10))
            }
            KeyCode::Left | KeyCode::Char('-') if self.current_tab() == Tab::Lights => {
                self.dispatch_light_action(LightAction::StepBrightness(-10))
            }
            KeyCode::Char(c) if c.is_ascii_digit() && self.current_tab() == Tab::Lights => {
                let digit = c.to_digit(10).unwrap() as u8;
                self.dispatch_light_action(LightAction::SetExactBrightness(digit_to_percent(digit)));
            }
            _ => {}
        }
    }

    fn switch_tab_by_digit(&mut self, c: char) {
        if let Some(n) = c.to_digit(10) {
            let n = n as usize;
            if n >= 1 && n <= self.tab_titles().len() {
                self.active_tab = n - 1;
            }
        }
    }

    fn cycle_sort(&mut self) {
        match self.current_tab() {
            Tab::Lights => {
                let selected_id = self.cached_lights.get(self.lights_tab.selected).map(|l| l.entity_id.clone());
                self.lights_sort = self.lights_sort.next();
                sort_lights(&mut self.cached_lights, self.lights_sort);
                reselect(&mut self.lights_tab, &self.cached_lights, selected_id, |l| l.entity_id.clone());
            }
            Tab::Raw(idx) => {
                let selected_name = self.cached_raw[idx]
                    .get(self.raw_tabs[idx].selected)
                    .map(|r| r.message_name.clone());
                self.raw_sort = self.raw_sort.next();
                sort_raw(&mut self.cached_raw[idx], self.raw_sort);
                reselect(&mut self.raw_tabs[idx], &self.cached_raw[idx], selected_name, |r| {
                    r.message_name.clone()
                });
            }
            Tab::Logs => {}
        }
    }

    fn request_copy(&mut self) {
        let text = match self.current_tab() {
            Tab::Logs => self.cached_logs.get(self.logs_tab.selected).map(|l| l.text.clone()),
            Tab::Lights => self.cached_lights.get(self.lights_tab.selected).map(|l| l.entity_id.clone()),
            Tab::Raw(idx) => self.cached_raw[idx]
                .get(self.raw_tabs[idx].selected)
                .map(|r| r.message_name.clone()),
        };
        self.pending_clipboard = text;
    }

    /// A page is the display height minus 5, scaling PageUp/PageDown with
    /// the terminal's current size rather than a fixed row count.
    fn page_size(&self) -> i32 {
        (self.content_height as i32 - 5).max(1)
    }

    fn move_selection(&mut self, delta: i32) {
        let (state, len) = self.active_tab_state_and_len();
        let current = state.selected as i32;
        let max = len.saturating_sub(1) as i32;
        state.selected = (current + delta).clamp(0, max.max(0)) as usize;
    }

    fn move_selection_to(&mut self, target: usize) {
        let (state, len) = self.active_tab_state_and_len();
        state.selected = if target == usize::MAX { len.saturating_sub(1) } else { target.min(len.saturating_sub(1)) };
    }

    fn active_tab_state_and_len(&mut self) -> (&mut TabState, usize) {
        match self.current_tab() {
            Tab::Lights => (&mut self.lights_tab, self.cached_lights.len()),
            Tab::Logs => (&mut self.logs_tab, self.cached_logs.len()),
            Tab::Raw(idx) => (&mut self.raw_tabs[idx], self.cached_raw[idx].len()),
        }
    }

    fn dispatch_light_action(&mut self, action: LightAction) {
        let Some(light) = self.cached_lights.get(self.lights_tab.selected) else {
            return;
        };
        if !light.dimmable && !matches!(action, LightAction::Toggle) {
            return;
        }
        let entity_id = light.entity_id.clone();
        let outcome = send_light_command(&self.engine, &entity_id, action);
        self.notify(outcome.notification(&entity_id));
    }
}

fn clamp(state: &mut TabState, len: usize) {
    if len == 0 {
        state.selected = 0;
        state.offset = 0;
        return;
    }
    state.selected = state.selected.min(len - 1);
}

fn reselect<T>(
    state: &mut TabState,
    items: &[T],
    previous_id: Option<String>,
    id_of: impl Fn(&T) -> String,
) {
    match previous_id {
        Some(id) => {
            state.selected = items.iter().position(|item| id_of(item) == id).unwrap_or(0);
        }
        None => state.selected = 0,
    }
}

fn sort_lights(lights: &mut [LightState], mode: LightsSort) {
    match mode {
        LightsSort::AreaThenName => lights.sort_by(|a, b| {
            a.suggested_area
                .cmp(&b.suggested_area)
                .then(a.friendly_name.cmp(&b.friendly_name))
        }),
        LightsSort::Name => lights.sort_by(|a, b| a.friendly_name.cmp(&b.friendly_name)),
        LightsSort::Newest => lights.sort_by(|a, b| b.last_updated.cmp(&a.last_updated)),
    }
}

fn sort_raw(records: &mut [crate::engine::RawRecord], mode: RawSort) {
    match mode {
        RawSort::AToZ => records.sort_by(|a, b| a.message_name.cmp(&b.message_name)),
        RawSort::Newest => records.sort_by(|a, b| b.last_received.cmp(&a.last_received)),
        RawSort::Oldest => records.sort_by(|a, b| a.last_received.cmp(&b.last_received)),
    }
}

impl ConsoleLogSink {
    /// Drain into a caller-provided buffer, newest first, for the Logs tab.
    fn drain_into(&self, _previous: &mut [LogLine]) -> Vec<LogLine> {
        let mut lines = self.drain();
        lines.reverse();
        lines
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> std::io::Result<Self> {
        enable_raw_mode()?;
        execute!(std::io::stdout(), EnterAlternateScreen)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// Enter the terminal UI and run until the user quits or a fatal error
/// occurs. Raises the engine's stop signal on every exit path so reader
/// threads wind down.
pub fn run(engine: Arc<Engine>, log_sink: Arc<ConsoleLogSink>, interfaces: Vec<String>) -> std::io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine.clone(), log_sink, interfaces);
    let result = run_loop(&mut terminal, &mut app);

    engine.stop.store(true, std::sync::atomic::Ordering::Relaxed);
    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> std::io::Result<()> {
    loop {
        app.refresh_snapshots();
        app.content_height = terminal.size()?.height.saturating_sub(4);
        terminal.draw(|frame| draw(frame, app))?;

        if let Some(text) = app.pending_clipboard.take() {
            use std::io::Write;
            let _ = write!(std::io::stdout(), "{}", osc52_sequence(&text));
        }

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    app.engine.stop.store(true, std::sync::atomic::Ordering::Relaxed);
                    break;
                }
                app.handle_key(key);
            }
        }

        if let Some(notification) = &app.notification {
            if notification.at.elapsed() > NOTIFICATION_LIFETIME {
                app.notification = None;
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);

    match app.current_tab() {
        Tab::Lights => lights::draw(frame, app, &app.cached_lights, app.lights_tab_view(), chunks[1]),
        Tab::Logs => logs::draw(frame, app, chunks[1]),
        Tab::Raw(idx) => raw::draw(frame, app, idx, chunks[1]),
    }

    draw_footer(frame, app, chunks[2]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app.tab_titles().into_iter().map(Line::from).collect();
    let tabs = Tabs::new(titles)
        .select(app.active_tab)
        .block(Block::default().borders(Borders::ALL).title("rvc-console"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan));
    frame.render_widget(tabs, area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let text = if let InputMode::Prompting { buffer } = &app.input_mode {
        format!("Filter: {}_", buffer)
    } else if let Some(notification) = &app.notification {
        notification.message.clone()
    } else {
        let paused = if app.paused { " [PAUSED]" } else { "" };
        format!(
            "Q: quit  P: pause  /: filter  W: wrap  S: sort  C: copy{}",
            paused
        )
    };
    frame.render_widget(Paragraph::new(Span::raw(text)), area);
}

impl App {
    fn lights_tab_view(&self) -> &TabState {
        &self.lights_tab
    }

    pub(crate) fn logs_tab_view(&self) -> &TabState {
        &self.logs_tab
    }

    pub(crate) fn raw_tab_view(&self, idx: usize) -> &TabState {
        &self.raw_tabs[idx]
    }

    pub(crate) fn wrap_enabled(&self) -> bool {
        self.wrap_logs
    }

    pub(crate) fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub(crate) fn lights_sort(&self) -> LightsSort {
        self.lights_sort
    }

    pub(crate) fn raw_sort(&self) -> RawSort {
        self.raw_sort
    }

    pub(crate) fn interfaces(&self) -> &[String] {
        &self.interfaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PowerState;
    use std::time::SystemTime;

    fn light(id: &str, area: &str, name: &str) -> LightState {
        LightState {
            entity_id: id.to_string(),
            friendly_name: name.to_string(),
            suggested_area: Some(area.to_string()),
            dimmable: true,
            last_updated: SystemTime::now(),
            last_interface: None,
            last_raw_values: Default::default(),
            state: PowerState::Off,
            brightness: Some(0),
            prev_brightness: None,
        }
    }

    #[test]
    fn sort_stability_preserves_selection_across_sort_cycles() {
        let mut lights = vec![
            light("b", "Kitchen", "Sink Light"),
            light("a", "Bedroom", "Ceiling"),
            light("c", "Bedroom", "Lamp"),
        ];
        sort_lights(&mut lights, LightsSort::AreaThenName);

        let mut state = TabState { selected: 0, offset: 0 };
        let selected_id = lights[state.selected].entity_id.clone();

        sort_lights(&mut lights, LightsSort::Name);
        reselect(&mut state, &lights, Some(selected_id.clone()), |l| l.entity_id.clone());

        assert_eq!(lights[state.selected].entity_id, selected_id);
    }

    #[test]
    fn reselect_resets_to_top_on_miss() {
        let lights = vec![light("a", "Bedroom", "Ceiling")];
        let mut state = TabState { selected: 0, offset: 0 };
        reselect(&mut state, &lights, Some("missing".to_string()), |l| l.entity_id.clone());
        assert_eq!(state.selected, 0);
    }
}
