use crate::{
    address::Address,
    feed::FeedSnapshot,
    game::{
        Choice,
        GameResult,
        PlayState,
        REWARD_SYMBOL,
    },
};
use chrono::Local;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        DisableBracketedPaste,
        EnableBracketedPaste,
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        EnterAlternateScreen,
        LeaveAlternateScreen,
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{
    backend::Backend,
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub type InputEventReceiver = EventStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Play,
    NextTarget,
    PrevTarget,
    CopyTarget,
    RegisterToken,
    RefreshFeed,
}

/// Everything the screen shows that is owned outside the UI.
#[derive(Clone, Debug, Default)]
pub struct AppSnapshot {
    pub play: PlayState,
    pub played_choice: Option<Choice>,
    pub feed: FeedSnapshot,
    pub copied: Option<Address>,
    pub token_symbol: String,
    pub wallet_available: bool,
    pub status: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    EditAddress,
    QuitModal,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    address_input: String,
    choice: Choice,
    target_idx: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl UiState {
    pub fn new(initial_address: impl Into<String>) -> Self {
        let address_input: String = initial_address.into();
        let mode = if address_input.is_empty() {
            Mode::EditAddress
        } else {
            Mode::Normal
        };
        Self {
            mode,
            address_input,
            ..Self::default()
        }
    }

    pub fn address_input(&self) -> &str {
        &self.address_input
    }

    pub fn choice(&self) -> Choice {
        self.choice
    }

    pub fn target_idx(&self) -> usize {
        self.target_idx
    }

    /// Moves the target selection, wrapping around `count` entries.
    pub fn step_target(&mut self, forward: bool, count: usize) {
        if count == 0 {
            self.target_idx = 0;
            return;
        }
        let current = self.target_idx.min(count - 1);
        self.target_idx = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
    }

    pub fn reset_target(&mut self) {
        self.target_idx = 0;
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = draw_on(&mut term, state, snap);
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

fn draw_on<B: Backend>(
    term: &mut Terminal<B>,
    state: &UiState,
    snap: &AppSnapshot,
) -> std::io::Result<()> {
    term.draw(|f| render(f, state, snap)).map(|_| ())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Applies a terminal event to the local UI state and returns what the controller
/// has to do about it, if anything.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => interpret_key(state, key),
        Event::Paste(text) if state.mode == Mode::EditAddress => {
            state
                .address_input
                .extend(text.chars().filter(|c| !c.is_control()));
            Some(UserEvent::Redraw)
        }
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match state.mode {
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::EditAddress => match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                state.address_input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                state.address_input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('e') | KeyCode::Char('i') => {
                state.mode = Mode::EditAddress;
                Some(UserEvent::Redraw)
            }
            KeyCode::Left | KeyCode::Char('h') => {
                state.choice = state.choice.prev();
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Char('l') => {
                state.choice = state.choice.next();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter | KeyCode::Char(' ') => Some(UserEvent::Play),
            KeyCode::Up | KeyCode::Char('k') => Some(UserEvent::PrevTarget),
            KeyCode::Down | KeyCode::Char('j') => Some(UserEvent::NextTarget),
            KeyCode::Char('c') => Some(UserEvent::CopyTarget),
            KeyCode::Char('t') => Some(UserEvent::RegisterToken),
            KeyCode::Char('r') => Some(UserEvent::RefreshFeed),
            _ => None,
        },
    }
}

fn render(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let error_height = if snap.play.error().is_some() { 3 } else { 0 };
    let result_height = snap
        .play
        .result()
        .map_or(0, |result| result_panel_height(result.target_addresses.len()));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // title + token
            Constraint::Length(3),             // address input
            Constraint::Length(5),             // choices
            Constraint::Length(error_height),  // error
            Constraint::Length(result_height), // game result
            Constraint::Min(5),                // recent transactions
            Constraint::Length(3),             // status + help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_address(f, state, chunks[1]);
    draw_choices(f, state, chunks[2], snap);
    if let Some(message) = snap.play.error() {
        draw_error(f, chunks[3], message);
    }
    if let Some(result) = snap.play.result() {
        draw_result(f, state, chunks[4], result, snap);
    }
    draw_transactions(f, chunks[5], &snap.feed, &snap.token_symbol);
    draw_bottom(f, chunks[6], snap);
    if state.mode == Mode::QuitModal {
        draw_quit_modal(f);
    }
}

// Outcome, reward and instruction lines plus borders, one row per target.
fn result_panel_height(targets: usize) -> u16 {
    u16::try_from(targets).unwrap_or(u16::MAX).saturating_add(6)
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let token_hint = if snap.wallet_available {
        format!("t: Add {} Token", snap.token_symbol)
    } else {
        format!("t: Add {} Token (no wallet configured)", snap.token_symbol)
    };
    let title = Line::from(vec![
        Span::styled("Fauce", Style::default().fg(Color::Magenta).bold()),
        Span::styled("Tea", Style::default().fg(Color::Green).bold()),
        Span::styled("Game", Style::default().fg(Color::Magenta).bold()),
        Span::raw("   "),
        Span::styled(token_hint, Style::default().fg(Color::Gray)),
    ]);
    let widget = Paragraph::new(title).block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_address(f: &mut Frame, state: &UiState, area: Rect) {
    let editing = state.mode == Mode::EditAddress;
    let text = if state.address_input.is_empty() && !editing {
        Line::from(Span::styled(
            "Your ETH Address (0x...)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(state.address_input.clone())
    };
    let title = if editing {
        "Address (Enter to finish)"
    } else {
        "Address (e to edit)"
    };
    let border = if editing {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default()
    };
    let widget = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    );
    f.render_widget(widget, area);
    if editing {
        let offset = state.address_input.width() as u16;
        let x = (area.x + 1 + offset).min(area.right().saturating_sub(2));
        f.set_cursor_position((x, area.y + 1));
    }
}

fn draw_choices(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    if snap.play.is_loading() {
        let label = match snap.played_choice {
            Some(choice) => format!("Playing game... ({})", choice.label()),
            None => "Playing game...".to_string(),
        };
        let widget = Paragraph::new(label)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Magenta).bold())
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(widget, area);
        return;
    }
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(area);
    for (rect, choice) in cols.iter().zip(Choice::ALL) {
        let selected = choice == state.choice();
        let style = if selected {
            Style::default().fg(choice_color(choice)).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        let widget = Paragraph::new(vec![Line::from(""), Line::from(choice.label())])
            .alignment(Alignment::Center)
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(style));
        f.render_widget(widget, *rect);
    }
}

fn choice_color(choice: Choice) -> Color {
    match choice {
        Choice::Rock => Color::LightRed,
        Choice::Paper => Color::LightCyan,
        Choice::Scissors => Color::LightMagenta,
    }
}

fn draw_error(f: &mut Frame, area: Rect, message: &str) {
    let widget = Paragraph::new(message.to_string())
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::Red).bold())
        .block(Block::default().borders(Borders::ALL).title("Error"));
    f.render_widget(widget, area);
}

fn draw_result(
    f: &mut Frame,
    state: &UiState,
    area: Rect,
    result: &GameResult,
    snap: &AppSnapshot,
) {
    let outcome_color = if result.is_win() {
        Color::Green
    } else {
        Color::Red
    };
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Result: "),
            Span::styled(
                result.result.to_string(),
                Style::default().fg(outcome_color).bold(),
            ),
        ]),
        Line::from(vec![
            Span::raw("Reward: "),
            Span::styled(
                format!("{} {REWARD_SYMBOL}", result.reward),
                Style::default().fg(Color::Magenta).bold(),
            ),
        ]),
        Line::from("To continue playing:"),
        Line::from(Span::styled(
            format!("{}:", result.continue_instruction()),
            Style::default().fg(Color::Green),
        )),
    ];
    let selected = state.target_idx.min(result.target_addresses.len().saturating_sub(1));
    for (i, addr) in result.target_addresses.iter().enumerate() {
        let marker = if i == selected { ">" } else { " " };
        let copied = snap.copied.as_ref() == Some(addr);
        let badge = if copied {
            Span::styled(" ✓ copied", Style::default().fg(Color::Green))
        } else {
            Span::styled(" [c] copy", Style::default().fg(Color::DarkGray))
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{marker} ")),
            Span::styled(addr.to_string(), Style::default().fg(Color::LightMagenta)),
            badge,
        ]));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Game Result"));
    f.render_widget(widget, area);
}

fn draw_transactions(f: &mut Frame, area: Rect, feed: &FeedSnapshot, symbol: &str) {
    let title = match feed.refreshed_at {
        Some(at) => format!(
            "Recent Transactions (updated {})",
            at.with_timezone(&Local).format("%H:%M:%S")
        ),
        None => "Recent Transactions".to_string(),
    };
    let lines: Vec<Line> = if feed.transactions.is_empty() {
        vec![Line::from(Span::styled(
            "No transactions yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        feed.transactions
            .iter()
            .map(|tx| {
                Line::from(vec![
                    Span::styled(tx.from.shortened(), Style::default().fg(Color::LightMagenta)),
                    Span::raw(" → "),
                    Span::styled(tx.to.shortened(), Style::default().fg(Color::LightMagenta)),
                    Span::raw("  "),
                    Span::styled(
                        format!("{} {symbol}", tx.amount),
                        Style::default().fg(Color::Green),
                    ),
                ])
            })
            .collect()
    };
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let help = [
        "e edit address",
        "←/→ choose",
        "Enter play",
        "↑/↓ target",
        "c copy",
        "t add token",
        "r refresh",
        "q quit",
    ]
    .iter()
    .join(" | ");
    let status = if snap.status.trim().is_empty() {
        "Ready"
    } else {
        snap.status.as_str()
    };
    let widget = Paragraph::new(help)
        .block(Block::default().borders(Borders::ALL).title(status.to_string()));
    f.render_widget(widget, area);
}

fn draw_quit_modal(f: &mut Frame) {
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);
    let widget = Paragraph::new("Quit? (y/n)")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Confirm"));
    f.render_widget(widget, area);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
