//! Raw window events to commands.
//!
//! The platform thread pushes [`RawEvent`]s into a bounded queue; a dedicated
//! translator thread maps them onto [`Command`]s. Neither side blocks the
//! other on a full queue except for `quit`, which is never dropped.
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::command::Command;
use crate::types::Bounds;

/// Keys the viewer reacts to. Everything else collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Q,
    N,
    M,
    /// Either super/logo key; chorded with `Q` to quit.
    Super,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Backend-neutral window event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    FramebufferResized(Bounds),
    Key {
        key: Key,
        state: KeyState,
        repeat: bool,
    },
    CloseRequested,
}

/// Stateful mapping from raw events to commands.
#[derive(Debug, Default, Clone)]
pub struct EventTranslator {
    modifier_held: bool,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifier_held(&self) -> bool {
        self.modifier_held
    }

    pub fn translate(&mut self, event: &RawEvent) -> Option<Command> {
        match *event {
            RawEvent::FramebufferResized(_) => Some(Command::Resize),
            RawEvent::CloseRequested => Some(Command::Quit),
            RawEvent::Key {
                key: Key::Super,
                state,
                ..
            } => {
                self.modifier_held = state == KeyState::Pressed;
                None
            }
            RawEvent::Key {
                state: KeyState::Released,
                ..
            } => None,
            RawEvent::Key { repeat: true, .. } => None,
            RawEvent::Key { key, .. } => match key {
                Key::Escape => Some(Command::Quit),
                Key::Q if self.modifier_held => Some(Command::Quit),
                Key::N => Some(Command::NextShader),
                Key::M => Some(Command::LoadImage),
                _ => None,
            },
        }
    }
}

/// Translates events until either side of the pipe disconnects.
pub fn run_translator(events: Receiver<RawEvent>, commands: Sender<Command>) {
    let mut translator = EventTranslator::new();
    for event in events.iter() {
        let Some(command) = translator.translate(&event) else {
            continue;
        };
        tracing::trace!(?event, %command, "translated event");

        if command == Command::Quit {
            if commands.send(command).is_err() {
                break;
            }
            continue;
        }

        match commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(command = %dropped, "command queue full; dropping input");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    tracing::debug!("event translator stopped");
}

pub fn spawn_translator(
    events: Receiver<RawEvent>,
    commands: Sender<Command>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("passview-input".into())
        .spawn(move || run_translator(events, commands))
}
