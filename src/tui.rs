use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::{Frame, Terminal};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use log::{error, info};

use crate::form::{EntryForm, Step};
use crate::models::{Action, Entry, Outcome, COLUMNS};
use crate::store::{EntryStore, StoreError};

const PAGE: usize = 10;
const SCROLL: usize = 3;
const MESSAGE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: Level,
    pub title: String,
    pub body: String,
    since: Instant,
}

enum Mode {
    Browse,
    Filter,
    /// `row` is the store row being edited; `None` means a new entry.
    Form { row: Option<usize>, form: EntryForm },
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    store: EntryStore,
    mode: Mode,
    filter: String,
    /// Store indices in display order.
    visible: Vec<usize>,
    table_state: TableState,
    matcher: SkimMatcherV2,
}

impl App {
    pub fn new(store: EntryStore) -> Self {
        let mut app = Self {
            store,
            mode: Mode::Browse,
            filter: String::new(),
            visible: Vec::new(),
            table_state: TableState::default(),
            matcher: SkimMatcherV2::default(),
        };
        app.refresh();
        app
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn notice(&self) -> Option<&Notice> {
        match &self.mode {
            Mode::Notice(n) => Some(n),
            _ => None,
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Store index of the highlighted row.
    pub fn selected_row(&self) -> Option<usize> {
        self.table_state
            .selected()
            .and_then(|i| self.visible.get(i).copied())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        if key.kind != KeyEventKind::Press {
            return Control::Continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Control::Quit;
        }

        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => return self.on_browse_key(key),
            Mode::Filter => self.on_filter_key(key),
            Mode::Form { row, form } => self.on_form_key(row, form, key),
            // any key dismisses
            Mode::Notice(_) => {}
        }
        Control::Continue
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.move_up(SCROLL),
            MouseEventKind::ScrollDown => self.move_down(SCROLL),
            _ => {}
        }
    }

    /// Drops informational messages once they have been shown long enough.
    pub fn tick(&mut self) {
        if let Mode::Notice(n) = &self.mode {
            if n.level == Level::Info && n.since.elapsed() > MESSAGE_TTL {
                self.mode = Mode::Browse;
            }
        }
    }

    fn on_browse_key(&mut self, key: KeyEvent) -> Control {
        match key.code {
            KeyCode::Char('q') => return Control::Quit,
            KeyCode::Esc => {
                if self.table_state.selected().is_none() {
                    return Control::Quit;
                }
                self.table_state.select(None);
            }
            KeyCode::Char('/') => self.mode = Mode::Filter,
            KeyCode::Char('a') => {
                self.mode = Mode::Form {
                    row: None,
                    form: EntryForm::new(),
                }
            }
            KeyCode::Char('e') => match self.selected_row() {
                Some(row) => {
                    let form = EntryForm::prefilled(&self.store.entries()[row]);
                    self.mode = Mode::Form {
                        row: Some(row),
                        form,
                    };
                }
                None => self.commit(Action::Edit, Ok(Outcome::NoSelection)),
            },
            KeyCode::Char('d') | KeyCode::Char('x') => {
                let result = self.store.delete(self.selected_row());
                self.commit(Action::Delete, result);
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(1),
            KeyCode::PageUp => self.move_up(PAGE),
            KeyCode::PageDown => self.move_down(PAGE),
            KeyCode::Home => self.select_first(),
            KeyCode::End => self.select_last(),
            _ => {}
        }
        Control::Continue
    }

    fn on_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => return,
            KeyCode::Esc => {
                self.filter.clear();
                self.refresh();
                return;
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.refresh();
            }
            KeyCode::Delete => {
                self.filter.clear();
                self.refresh();
            }
            KeyCode::Up => self.move_up(1),
            KeyCode::Down => self.move_down(1),
            KeyCode::PageUp => self.move_up(PAGE),
            KeyCode::PageDown => self.move_down(PAGE),
            KeyCode::Home => self.select_first(),
            KeyCode::End => self.select_last(),
            KeyCode::Char(c) => {
                self.filter.push(c);
                self.refresh();
            }
            _ => {}
        }
        self.mode = Mode::Filter;
    }

    fn on_form_key(&mut self, row: Option<usize>, mut form: EntryForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return self.submit(row, form.finish(false)),
            KeyCode::Enter => {
                if form.advance() == Step::Confirmed {
                    return self.submit(row, form.finish(true));
                }
            }
            KeyCode::Tab => form.next_field(),
            KeyCode::BackTab => form.prev_field(),
            KeyCode::Backspace => form.pop(),
            KeyCode::Delete => form.clear_field(),
            KeyCode::Char(c) => form.push(c),
            _ => {}
        }
        self.mode = Mode::Form { row, form };
    }

    fn submit(&mut self, row: Option<usize>, entry: Entry) {
        let (action, result) = match row {
            None => (Action::Add, self.store.add(entry)),
            Some(row) => (Action::Edit, self.store.edit(Some(row), entry)),
        };
        self.commit(action, result);
    }

    fn commit(&mut self, action: Action, result: Result<Outcome, StoreError>) {
        self.mode = match result {
            Ok(Outcome::Saved) => {
                info!("{}", action.done_message());
                self.refresh();
                self.message(Level::Info, "Saved", action.done_message())
            }
            Ok(Outcome::Incomplete) => Mode::Browse,
            Ok(Outcome::NoSelection) => match action.no_selection_warning() {
                Some(warning) => self.message(Level::Warning, "No Selection", warning),
                None => Mode::Browse,
            },
            Err(e) => {
                let e = anyhow::Error::from(e);
                error!("{:?} failed: {:#}", action, e);
                // The table may already hold the change; keep showing it.
                self.refresh();
                self.message(Level::Error, "Save failed", &format!("{:#}", e))
            }
        };
    }

    fn message(&self, level: Level, title: &str, body: &str) -> Mode {
        Mode::Notice(Notice {
            level,
            title: title.to_string(),
            body: body.to_string(),
            since: Instant::now(),
        })
    }

    fn refresh(&mut self) {
        let entries = self.store.entries();
        self.visible = if self.filter.is_empty() {
            (0..entries.len()).collect()
        } else {
            let mut scored: Vec<(i64, usize)> = entries
                .iter()
                .enumerate()
                .filter_map(|(i, e)| {
                    let hay = format!("{} {}", e.website, e.username);
                    self.matcher.fuzzy_match(&hay, &self.filter).map(|score| (score, i))
                })
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0));
            scored.into_iter().map(|(_, i)| i).collect()
        };

        let len = self.visible.len();
        let clamped = match self.table_state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => None,
        };
        self.table_state.select(clamped);
    }

    fn move_up(&mut self, by: usize) {
        if self.visible.is_empty() {
            return;
        }
        let i = self.table_state.selected().map_or(0, |i| i.saturating_sub(by));
        self.table_state.select(Some(i));
    }

    fn move_down(&mut self, by: usize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        let i = self.table_state.selected().map_or(0, |i| (i + by).min(last));
        self.table_state.select(Some(i));
    }

    fn select_first(&mut self) {
        if !self.visible.is_empty() {
            self.table_state.select(Some(0));
        }
    }

    fn select_last(&mut self) {
        if !self.visible.is_empty() {
            self.table_state.select(Some(self.visible.len() - 1));
        }
    }
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(3), // filter
            Constraint::Min(1),    // table
            Constraint::Length(1), // footer
        ])
        .split(size);

    let header = Paragraph::new("Account Book -- / filter | j/k navigate | Esc clear selection | q quit");
    f.render_widget(header, chunks[0]);

    let filter_title = match app.mode {
        Mode::Filter => "Filter (type text, Enter to apply)",
        _ => "Filter (press / to edit)",
    };
    let filter = Paragraph::new(app.filter.as_str())
        .block(Block::default().borders(Borders::ALL).title(filter_title));
    f.render_widget(filter, chunks[1]);

    let rows: Vec<Row> = if app.visible.is_empty() {
        let placeholder = if app.filter.is_empty() { "No entries" } else { "No matches" };
        vec![Row::new(vec![placeholder, "", ""])]
    } else {
        app.visible
            .iter()
            .map(|&i| Row::new(app.store.entries()[i].fields()))
            .collect()
    };
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ],
    )
    .header(Row::new(COLUMNS).style(Style::default().add_modifier(Modifier::BOLD)))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Entries ({})", app.visible.len())),
    )
    .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    f.render_stateful_widget(table, chunks[2], &mut app.table_state);

    let footer = Paragraph::new(format!(
        "[a] Add  [e] Edit  [d] Delete | {} | Ctrl+C force quit",
        app.store.path().display()
    ));
    f.render_widget(footer, chunks[3]);

    match &app.mode {
        Mode::Form { row, form } => draw_form(f, size, row.is_some(), form),
        Mode::Notice(notice) => draw_notice(f, size, notice),
        _ => {}
    }
}

fn draw_form(f: &mut Frame, area: Rect, editing: bool, form: &EntryForm) {
    let title = format!(
        "{} -- {}",
        if editing { "Edit entry" } else { "Add entry" },
        form.label()
    );
    let mut lines: Vec<Line> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let style = if i == form.step() {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::raw(format!("{:>9}: ", label)),
                Span::styled(form.value(i).to_string(), style),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from("Enter next/confirm | Tab/Shift+Tab move | Esc cancel"));

    let popup = centered_rect(60, lines.len() as u16 + 2, area);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        popup,
    );
}

fn draw_notice(f: &mut Frame, area: Rect, notice: &Notice) {
    let color = match notice.level {
        Level::Info => Color::Reset,
        Level::Warning => Color::Yellow,
        Level::Error => Color::Red,
    };
    let width = percent_of(area.width, 50);
    // body, one spare row, hint and two borders
    let height = wrapped_lines(&notice.body, width.saturating_sub(2)) + 4;
    let popup = centered_rect(50, height, area);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(notice.body.as_str()),
            Line::from(Span::styled(
                "press any key",
                Style::default().add_modifier(Modifier::DIM),
            )),
        ])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(notice.title.as_str()),
        ),
        popup,
    );
}

/// Rows `text` takes when word-wrapped to `width` columns.
fn wrapped_lines(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .lines()
        .map(|line| {
            let mut rows = 1;
            let mut used = 0;
            for word in line.split_whitespace() {
                let len = word.chars().count();
                if used > 0 && used + 1 + len <= width {
                    used += 1 + len;
                    continue;
                }
                if used > 0 {
                    rows += 1;
                }
                // words longer than a row are split across rows
                rows += (len - 1) / width;
                used = (len - 1) % width + 1;
            }
            rows
        })
        .sum();
    u16::try_from(rows.max(1)).unwrap_or(u16::MAX)
}

fn percent_of(total: u16, percent: u16) -> u16 {
    (u32::from(total) * u32::from(percent) / 100) as u16
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let width = percent_of(area.width, percent_x);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn cleanup_terminal(inside_tmux: bool) -> io::Result<()> {
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    if !inside_tmux {
        crossterm::execute!(stdout, crossterm::event::DisableMouseCapture)?;
    }
    crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Runs the table view until the user quits. The terminal is restored on
/// every exit path.
pub fn run(store: EntryStore) -> anyhow::Result<()> {
    let inside_tmux = std::env::var("TMUX").is_ok();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    if !inside_tmux {
        crossterm::execute!(stdout, crossterm::event::EnableMouseCapture)?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, App::new(store));
    cleanup_terminal(inside_tmux)?;
    terminal.show_cursor()?;
    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> anyhow::Result<()> {
    // 200ms tick rate: long enough for crossterm to assemble multi-byte
    // escape sequences from tmux.
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key) == Control::Quit {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                // Full clear so the next draw picks up the new size cleanly.
                Event::Resize(_, _) => terminal.clear()?,
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }
    }
}
