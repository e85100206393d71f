//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] mutations.  Keys that need background
//! work return an [`Action`] for the main loop to dispatch.
//!
//! ## For contributors
//!
//! To add a new keybinding:
//!
//! 1. Add a method on [`App`] or an [`Action`] variant for it.
//! 2. Add a `KeyCode` match arm in [`browse_key`].
//! 3. Update the help text in the status bar (`ui::draw_status_bar`).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{Action, App};

/// Process a single key event.
///
/// Only reacts to key-press events so each physical keypress triggers
/// exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit = true;
        return None;
    }

    if app.is_typing() {
        prompt_key(app, key.code)
    } else {
        browse_key(app, key.code)
    }
}

fn browse_key(app: &mut App, code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit = true,
        KeyCode::Char('c') => return Some(Action::CheckNow),
        KeyCode::Char('r') => return Some(Action::Refresh),
        KeyCode::Char('a') => app.begin_dialog(),
        KeyCode::Char(':') => app.begin_command(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        _ => {}
    }
    None
}

fn prompt_key(app: &mut App, code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Enter => return app.submit(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        _ => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Feed;

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app_with_feeds() -> App {
        let mut app = App::new(true);
        app.set_feeds(vec![
            Feed::new("a", "A", "", "o/a"),
            Feed::new("b", "B", "", "o/b"),
        ]);
        app
    }

    #[test]
    fn browse_keys() {
        let mut app = app_with_feeds();
        assert_eq!(press(&mut app, KeyCode::Char('c')), Some(Action::CheckNow));
        assert_eq!(press(&mut app, KeyCode::Char('r')), Some(Action::Refresh));

        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.list_state.selected(), Some(1));
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.list_state.selected(), Some(0));

        press(&mut app, KeyCode::Char('q'));
        assert!(app.quit);
    }

    #[test]
    fn typed_keys_go_to_prompt_not_bindings() {
        let mut app = app_with_feeds();
        press(&mut app, KeyCode::Char(':'));
        for c in "qcheck".chars() {
            assert_eq!(press(&mut app, KeyCode::Char(c)), None);
        }
        assert!(!app.quit);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "qchec");

        press(&mut app, KeyCode::Esc);
        assert!(!app.is_typing());
        assert!(!app.quit);
    }

    #[test]
    fn enter_submits_command() {
        let mut app = app_with_feeds();
        press(&mut app, KeyCode::Char(':'));
        for c in "check".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert_eq!(press(&mut app, KeyCode::Enter), Some(Action::CheckNow));
    }

    #[test]
    fn ctrl_c_quits_even_while_typing() {
        let mut app = app_with_feeds();
        press(&mut app, KeyCode::Char(':'));
        handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.quit);
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app_with_feeds();
        let mut key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(handle_key_event(&mut app, key), None);
        assert!(!app.quit);
    }
}
