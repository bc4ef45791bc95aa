//! Key bindings: arrows and vim-style hjkl.

use crate::grid::Direction;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Steer(Direction),
    Pause,
    Quit,
    /// Ctrl-C: leave from any screen, no questions asked.
    ForceQuit,
    Confirm,
    Restart,
    None,
}

/// Map key event to game action. Arrows and hjkl steer the snake and move the block alike.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::ForceQuit;
    }
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') | KeyCode::Char('P') => Action::Pause,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Confirm,
        KeyCode::Up | KeyCode::Char('k') => Action::Steer(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') => Action::Steer(Direction::Down),
        KeyCode::Left | KeyCode::Char('h') => Action::Steer(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') => Action::Steer(Direction::Right),
        _ => Action::None,
    }
}
