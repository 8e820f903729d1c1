//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] changes and to [`Action`]s that the
//! main loop forwards to the list state machine.  Adding a new keybinding is
//! a single match arm in [`handle_browse_key`] or [`handle_search_key`].
//!
//! ## For contributors
//!
//! To add a new keybinding:
//!
//! 1. Add a method on [`App`] or a variant on [`Action`] for the effect.
//! 2. Add a `KeyCode` match arm that performs or returns it.
//! 3. Update the help text in [`crate::ui::draw_status_bar`].

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::{App, Mode};

/// Work the main loop must hand to the list state machine or router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    FetchNext,
    Reload,
    Search(String),
    OpenSelected,
}

/// Process a single key event.
///
/// Only reacts to key-press events (ignoring release / repeat) so that each
/// physical keypress triggers exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }
    match app.mode {
        Mode::Browse => handle_browse_key(app, key.code),
        Mode::Search => handle_search_key(app, key.code),
    }
}

fn handle_browse_key(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit = true,
        KeyCode::Down | KeyCode::Char('j') => {
            app.select_next();
            return scrolled(app);
        }
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => {
            app.select_last();
            return scrolled(app);
        }
        KeyCode::Char('/') => app.mode = Mode::Search,
        KeyCode::Char('r') => return Action::Reload,
        KeyCode::Enter => return Action::OpenSelected,
        _ => {}
    }
    Action::None
}

fn handle_search_key(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Char(c) => {
            app.query.push(c);
            Action::Search(app.query.clone())
        }
        KeyCode::Backspace => {
            app.query.pop();
            Action::Search(app.query.clone())
        }
        KeyCode::Enter => {
            app.mode = Mode::Browse;
            Action::None
        }
        KeyCode::Esc => {
            app.mode = Mode::Browse;
            app.query.clear();
            Action::Search(String::new())
        }
        _ => Action::None,
    }
}

/// Ask for the next page once the user scrolls near the end.
fn scrolled(app: &App) -> Action {
    if app.near_end() {
        Action::FetchNext
    } else {
        Action::None
    }
}
