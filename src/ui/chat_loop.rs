//! Interactive event loop: draw, poll terminal events, drain the stream
//! channel, repeat. The loop owns the [`App`]; the stream task only holds
//! the channel sender.

use std::error::Error;
use std::io;
use std::time::Duration;

use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    },
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::{mpsc, watch};

use crate::core::app::App;
use crate::core::chat_stream::{StreamDispatcher, StreamMessage};
use crate::core::notice::{Notice, Severity};

const SIDEBAR_WIDTH: u16 = 26;
const INPUT_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 1;

pub struct ChatLoopChannels {
    pub dispatcher: StreamDispatcher,
    pub stream_rx: mpsc::UnboundedReceiver<StreamMessage>,
    pub notice_rx: mpsc::UnboundedReceiver<Notice>,
    pub store_rx: watch::Receiver<u64>,
}

pub async fn run(mut app: App, mut channels: ChatLoopChannels) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut latest_notice: Option<Notice> = None;
    let result = run_loop(&mut app, &mut channels, &mut terminal, &mut latest_notice).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    app: &mut App,
    channels: &mut ChatLoopChannels,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    latest_notice: &mut Option<Notice>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| draw(f, app, latest_notice.as_ref()))?;

        let term_height = terminal.size()?.height;
        let available_height = transcript_height(term_height);

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(());
                    }
                    KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.start_new_conversation().await;
                    }
                    KeyCode::Up if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        if let Some(id) = app.select_previous_conversation() {
                            app.load_conversation(id).await;
                        }
                    }
                    KeyCode::Down if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        if let Some(id) = app.select_next_conversation() {
                            app.load_conversation(id).await;
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(params) = app.submit().await {
                            channels.dispatcher.spawn(params);
                        }
                    }
                    KeyCode::Char(c) => {
                        app.input.push(c);
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Up => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        let max = max_scroll_offset(app, available_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(1).min(max);
                        if app.scroll_offset >= max {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(3);
                    }
                    MouseEventKind::ScrollDown => {
                        let max = max_scroll_offset(app, available_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(3).min(max);
                        if app.scroll_offset >= max {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        // Drain everything the stream task produced since the last frame;
        // deltas apply strictly in channel order.
        while let Ok(message) = channels.stream_rx.try_recv() {
            app.apply_stream_message(message).await;
        }

        while let Ok(notice) = channels.notice_rx.try_recv() {
            *latest_notice = Some(notice);
        }

        if channels.store_rx.has_changed().unwrap_or(false) {
            channels.store_rx.borrow_and_update();
            app.refresh_sidebar().await;
        }

        if app.auto_scroll {
            app.scroll_offset = max_scroll_offset(app, available_height);
        }
    }
}

fn transcript_height(term_height: u16) -> u16 {
    term_height
        .saturating_sub(INPUT_HEIGHT)
        .saturating_sub(STATUS_HEIGHT)
        .saturating_sub(1) // transcript title row
}

fn max_scroll_offset(app: &App, available_height: u16) -> u16 {
    let total_lines = build_transcript_lines(app).len() as u16;
    total_lines.saturating_sub(available_height)
}

fn build_transcript_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for message in &app.messages {
        if message.role.is_assistant() {
            for content_line in message.content.lines() {
                lines.push(Line::from(Span::styled(
                    content_line,
                    Style::default().fg(Color::White),
                )));
            }
            if message.content.is_empty() {
                lines.push(Line::from(Span::styled(
                    "…",
                    Style::default().fg(Color::DarkGray),
                )));
            }
        } else {
            lines.push(Line::from(vec![
                Span::styled(
                    "You: ",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(&message.content, Style::default().fg(Color::Cyan)),
            ]));
        }
        lines.push(Line::from(""));
    }
    lines
}

fn draw(f: &mut Frame, app: &App, latest_notice: Option<&Notice>) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(f.area());

    draw_sidebar(f, app, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(columns[1]);

    draw_transcript(f, app, rows[0]);
    draw_input(f, app, rows[1]);
    draw_status(f, latest_notice, rows[2]);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .sidebar
        .iter()
        .enumerate()
        .map(|(index, summary)| {
            let style = if index == app.selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(summary.title.clone()).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::RIGHT)
            .title("Conversations (^N new)"),
    );
    f.render_widget(list, area);
}

fn draw_transcript(f: &mut Frame, app: &App, area: Rect) {
    let lines = build_transcript_lines(app);
    let available_height = area.height.saturating_sub(1);
    let max_offset = (lines.len() as u16).saturating_sub(available_height);
    let scroll_offset = app.scroll_offset.min(max_offset);

    let title = if app.is_streaming {
        "ShopBot (streaming…)"
    } else {
        "ShopBot"
    };

    let transcript = Paragraph::new(lines)
        .block(Block::default().title(title))
        .wrap(Wrap { trim: true })
        .scroll((scroll_offset, 0));
    f.render_widget(transcript, area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let input_style = if app.is_streaming {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };

    let input = Paragraph::new(app.input.as_str())
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Ask about products (Enter to send, Ctrl+C to quit)"),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(input, area);

    if !app.is_streaming {
        f.set_cursor_position((area.x + app.input.len() as u16 + 1, area.y + 1));
    }
}

fn draw_status(f: &mut Frame, latest_notice: Option<&Notice>, area: Rect) {
    let Some(notice) = latest_notice else {
        return;
    };
    let color = match notice.severity {
        Severity::Info => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    };
    let line = Line::from(vec![
        Span::styled(
            format!("{}: ", notice.title),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(notice.description.as_str(), Style::default().fg(color)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
