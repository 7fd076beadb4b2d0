//! Terminal keyboard input for a running talk.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::ControlInput;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Map a key press onto a control input.
pub fn map_key(key: &KeyEvent) -> Option<ControlInput> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
            .then_some(ControlInput::Cancel);
    }

    match key.code {
        KeyCode::Char(' ') | KeyCode::Char('p') => Some(ControlInput::TogglePause),
        KeyCode::Right | KeyCode::Char('n') => Some(ControlInput::NextSlide),
        KeyCode::Left | KeyCode::Char('b') => Some(ControlInput::PrevSlide),
        KeyCode::Home | KeyCode::Char('r') => Some(ControlInput::Reset),
        KeyCode::Esc | KeyCode::Char('q') => Some(ControlInput::Cancel),
        KeyCode::Enter => Some(ControlInput::Start),
        _ => None,
    }
}

/// Puts the terminal in raw mode and restores it on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Read keys on a blocking thread until `shutdown` is set or the receiver goes away.
pub fn spawn_key_reader(
    controls: mpsc::Sender<ControlInput>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !shutdown.load(Ordering::Relaxed) {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("Keyboard polling failed: {}", e);
                    return;
                }
            }

            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Keyboard read failed: {}", e);
                    return;
                }
            };

            if let Some(control) = map_key(&key) {
                debug!("Key {:?} -> {:?}", key.code, control);
                if controls.blocking_send(control).is_err() {
                    return;
                }
            }
        }
    })
}
