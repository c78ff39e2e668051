//! Terminal browser for a [`Playback`], drawn with ratatui.

use crate::command::ViewerAction;
use crate::error::{Error, Result};
use crate::event::FrameRecord;
use crate::playback::{format_local_time, format_xy, Playback, JUMP};
use ratatui::crossterm::event::{self, Event as TermEvent};
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tracing::debug;

const EVENT_COLUMNS: [(&str, Constraint); 9] = [
    ("local_number", Constraint::Length(12)),
    ("timestamp", Constraint::Length(15)),
    ("global_number", Constraint::Length(13)),
    ("keyboard_keys", Constraint::Min(14)),
    ("mouse_buttons", Constraint::Length(16)),
    ("mouse_is_moving", Constraint::Length(15)),
    ("mouse_xy", Constraint::Length(18)),
    ("mouse_delta", Constraint::Length(14)),
    ("raw_input", Constraint::Length(9)),
];

const STATE_COLUMNS: [(&str, Constraint); 4] = [
    ("held_keys", Constraint::Min(20)),
    ("held_buttons", Constraint::Min(20)),
    ("mouse_is_moving", Constraint::Length(15)),
    ("mouse_xy", Constraint::Length(18)),
];

/// Why the browser returned
#[derive(Debug)]
pub enum ViewerExit {
    Quit,
    /// The current frame's image could not be loaded
    FrameUnavailable(Error),
}

/// `<local time> | Frame i/N | filename`
pub fn header_line(frame: &FrameRecord, index: usize, total: usize) -> String {
    format!(
        "{} | Frame {}/{} | {}",
        format_local_time(frame.timestamp),
        index + 1,
        total,
        frame.filename
    )
}

fn header_row<const N: usize>(columns: &[(&'static str, Constraint); N]) -> Row<'static> {
    Row::new(columns.iter().map(|(name, _)| *name))
        .style(Style::default().add_modifier(Modifier::BOLD))
}

fn events_table(frame: &FrameRecord) -> Table<'static> {
    let rows = frame.events.iter().map(|e| {
        Row::new(vec![
            e.number.to_string(),
            format!("{:.4}", e.event.timestamp),
            e.event.global_number.to_string(),
            format!("{:?}", e.event.keyboard_keys),
            format!("{:?}", e.event.mouse_buttons),
            e.event.mouse_is_moving.to_string(),
            format_xy(e.event.mouse_xy),
            format_xy(e.event.mouse_delta),
            e.event.raw_input.to_string(),
        ])
    });
    Table::new(rows, EVENT_COLUMNS.map(|(_, width)| width))
        .header(header_row(&EVENT_COLUMNS))
        .block(Block::default().borders(Borders::ALL).title("Events in this frame"))
}

fn state_table(frame: &FrameRecord) -> Table<'static> {
    let row = Row::new(vec![
        format!("{:?}", frame.held_keys),
        format!("{:?}", frame.held_buttons),
        frame.mouse_is_moving.to_string(),
        format_xy(Some(frame.mouse_xy)),
    ]);
    Table::new([row], STATE_COLUMNS.map(|(_, width)| width))
        .header(header_row(&STATE_COLUMNS))
        .block(Block::default().borders(Borders::ALL).title("Frame State at Capture"))
}

/// Header, per-event table and held-state table for one frame.
pub fn draw_frame(f: &mut Frame, area: Rect, frame: &FrameRecord, index: usize, total: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(4),
        ])
        .split(area);

    f.render_widget(Paragraph::new(header_line(frame, index, total)), chunks[0]);
    if frame.events.is_empty() {
        f.render_widget(
            Paragraph::new("-- no events --").block(Block::default().borders(Borders::ALL)),
            chunks[1],
        );
    } else {
        f.render_widget(events_table(frame), chunks[1]);
    }
    f.render_widget(state_table(frame), chunks[2]);
}

/// Whole browser screen for the current frame of `playback`.
pub fn draw(f: &mut Frame, playback: &Playback, image_size: (u32, u32)) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = format!(
        "Trial {} | {} ({}x{})",
        playback.trial(),
        playback.current_image_path().display(),
        image_size.0,
        image_size.1
    );
    f.render_widget(Paragraph::new(Line::from(title)), chunks[0]);
    draw_frame(f, chunks[1], playback.current(), playback.index(), playback.len());
    f.render_widget(
        Paragraph::new(format!("<- / -> step, Up / Down jump {}, q quit", JUMP)),
        chunks[2],
    );
}

/// Restores the terminal when the browser exits, however it exits.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Browse `playback` until the user quits or a frame image is unavailable.
pub fn run(playback: &mut Playback) -> Result<ViewerExit> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let mut image_size = None;

    loop {
        let size = match image_size {
            Some(size) => size,
            None => match playback.load_current_image() {
                Ok(image) => {
                    image_size = Some(image.dimensions());
                    image.dimensions()
                }
                Err(e) => {
                    debug!("leaving viewer at frame {}: {}", playback.index(), e);
                    return Ok(ViewerExit::FrameUnavailable(e));
                }
            },
        };
        terminal.draw(|f| draw(f, playback, size))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        if let TermEvent::Key(key) = event::read()? {
            match ViewerAction::from_key(key) {
                Some(ViewerAction::Quit) => return Ok(ViewerExit::Quit),
                Some(ViewerAction::Navigate(nav)) => {
                    if playback.navigate(nav) {
                        image_size = None;
                    }
                }
                None => {}
            }
        }
    }
}
