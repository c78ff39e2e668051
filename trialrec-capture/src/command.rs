//! Shell and viewer command parsing.

use crate::error::{Error, Result};
use crate::playback::Navigation;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Start,
    Stop,
    Exit,
    ResetDataset,
    Visualize,
    Help,
}

impl FromStr for ShellCommand {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "start" => Ok(ShellCommand::Start),
            "q" | "stop" => Ok(ShellCommand::Stop),
            "qq" | "exit" | "quit" => Ok(ShellCommand::Exit),
            "n" | "new" | "reset" | "reset-dataset" => Ok(ShellCommand::ResetDataset),
            "v" | "visualize" | "view" => Ok(ShellCommand::Visualize),
            "h" | "help" | "?" => Ok(ShellCommand::Help),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
Commands:
  s  | start          start a new trial
  q  | stop           stop and save the current trial
  n  | reset-dataset  bind a different dataset
  v  | visualize      browse a recorded trial
  qq | exit           quit
  h  | help           show this message";

/// Blank means the last trial.
pub fn parse_trial_input(input: &str) -> Result<Option<u64>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse()
        .map(Some)
        .map_err(|_| Error::InvalidTrialNumber(input.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    Navigate(Navigation),
    Quit,
}

impl ViewerAction {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(ViewerAction::Quit)
            }
            KeyCode::Right => Some(ViewerAction::Navigate(Navigation::Next)),
            KeyCode::Left => Some(ViewerAction::Navigate(Navigation::Previous)),
            KeyCode::Up => Some(ViewerAction::Navigate(Navigation::JumpForward)),
            KeyCode::Down => Some(ViewerAction::Navigate(Navigation::JumpBack)),
            KeyCode::Char('q') | KeyCode::Esc => Some(ViewerAction::Quit),
            _ => None,
        }
    }
}
