//! Keyboard routing.

use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    PanelUp,
    PanelDown,
    ToggleCollapse,
    TogglePause,
    SeekForward,
    SeekBackward,
    SpeedUp,
    SpeedDown,
    SeekStart,
    SeekEnd,
    None,
}

/// Maps a key press to an action; playback keys only apply in replay mode.
#[must_use]
pub fn map_key(code: KeyCode, replay: bool) -> Action {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => Action::PanelUp,
        KeyCode::Down | KeyCode::Char('j') => Action::PanelDown,
        KeyCode::Enter | KeyCode::Char('c') => Action::ToggleCollapse,
        KeyCode::Char(' ') if replay => Action::TogglePause,
        KeyCode::Right if replay => Action::SeekForward,
        KeyCode::Left if replay => Action::SeekBackward,
        KeyCode::Char('+' | '=') if replay => Action::SpeedUp,
        KeyCode::Char('-') if replay => Action::SpeedDown,
        KeyCode::Home if replay => Action::SeekStart,
        KeyCode::End if replay => Action::SeekEnd,
        _ => Action::None,
    }
}
