use crate::sim::PlayerAction;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Cap on events drained per frame so a key flood cannot stall rendering.
const MAX_EVENTS_PER_FRAME: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InputEvent {
    Key { key: KeyCode, mods: KeyModifiers },
    Resize(u16, u16),
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
                out.push(InputEvent::Key {
                    key: k.code,
                    mods: k.modifiers,
                });
            }
            Event::Resize(w, h) => out.push(InputEvent::Resize(w, h)),
            _ => {}
        }
        if out.len() >= MAX_EVENTS_PER_FRAME {
            break;
        }
    }
    Ok(out)
}

pub(crate) fn map_key_to_action(key: KeyCode, mods: KeyModifiers) -> Option<PlayerAction> {
    // raw mode swallows SIGINT, so Ctrl+C is our close signal
    if mods.contains(KeyModifiers::CONTROL) {
        return match key {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(PlayerAction::Quit),
            _ => None,
        };
    }

    match key {
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(PlayerAction::MoveLeft),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(PlayerAction::MoveRight),
        KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Char(' ') => {
            Some(PlayerAction::TogglePause)
        }
        KeyCode::Char('r') | KeyCode::Char('R') => Some(PlayerAction::Restart),
        KeyCode::Esc => Some(PlayerAction::Quit),
        _ => None,
    }
}
