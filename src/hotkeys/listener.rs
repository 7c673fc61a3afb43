use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use rdev::{listen, Event, EventType, Key};
use tracing::{debug, error};

use crate::hotkeys::machine::{keys, HotkeyBinding, HotkeyStateMachine};
use crate::types::Transition;

/// Map an rdev key to the stable key-code table. Keys outside the
/// table cannot take part in a binding and are dropped.
fn key_to_code(key: &Key) -> Option<u32> {
    match key {
        Key::ControlLeft => Some(keys::CONTROL),
        Key::ControlRight => Some(keys::CONTROL_RIGHT),
        Key::Alt => Some(keys::OPTION),
        Key::AltGr => Some(keys::OPTION_RIGHT),
        Key::ShiftLeft => Some(keys::SHIFT),
        Key::ShiftRight => Some(keys::SHIFT_RIGHT),
        Key::MetaLeft => Some(keys::COMMAND),
        Key::MetaRight => Some(keys::COMMAND_RIGHT),
        Key::Space => Some(keys::SPACE),
        Key::Return => Some(keys::RETURN),
        Key::Tab => Some(keys::TAB),
        Key::Backspace => Some(keys::DELETE),
        Key::Escape => Some(keys::ESCAPE),
        Key::F1 => Some(keys::F1),
        Key::F2 => Some(keys::F2),
        Key::F3 => Some(keys::F3),
        Key::F4 => Some(keys::F4),
        Key::F5 => Some(keys::F5),
        Key::F6 => Some(keys::F6),
        Key::F7 => Some(keys::F7),
        Key::F8 => Some(keys::F8),
        Key::F9 => Some(keys::F9),
        Key::F10 => Some(keys::F10),
        Key::F11 => Some(keys::F11),
        Key::F12 => Some(keys::F12),
        Key::KeyA => Some(keys::A),
        Key::KeyB => Some(keys::B),
        Key::KeyC => Some(keys::C),
        Key::KeyD => Some(keys::D),
        Key::KeyE => Some(keys::E),
        Key::KeyF => Some(keys::F),
        Key::KeyG => Some(keys::G),
        Key::KeyH => Some(keys::H),
        Key::KeyI => Some(keys::I),
        Key::KeyJ => Some(keys::J),
        Key::KeyK => Some(keys::K),
        Key::KeyL => Some(keys::L),
        Key::KeyM => Some(keys::M),
        Key::KeyN => Some(keys::N),
        Key::KeyO => Some(keys::O),
        Key::KeyP => Some(keys::P),
        Key::KeyQ => Some(keys::Q),
        Key::KeyR => Some(keys::R),
        Key::KeyS => Some(keys::S),
        Key::KeyT => Some(keys::T),
        Key::KeyU => Some(keys::U),
        Key::KeyV => Some(keys::V),
        Key::KeyW => Some(keys::W),
        Key::KeyX => Some(keys::X),
        Key::KeyY => Some(keys::Y),
        Key::KeyZ => Some(keys::Z),
        _ => None,
    }
}

/// Run the global keyboard hook and forward hotkey edges to the
/// orchestrator. Re-reads the shared binding on every event so a
/// settings change takes effect without restarting the thread.
/// Blocks for the lifetime of the process; spawn it on its own thread.
pub fn start_hotkey_listener(binding: Arc<Mutex<HotkeyBinding>>, tx: Sender<Transition>) {
    let mut machine = HotkeyStateMachine::new(*binding.lock().unwrap());

    let callback = move |event: Event| {
        let configured = *binding.lock().unwrap();
        if configured != machine.binding() {
            machine.reconfigure(configured);
        }

        let (key, pressed) = match event.event_type {
            EventType::KeyPress(key) => (key, true),
            EventType::KeyRelease(key) => (key, false),
            _ => return,
        };

        if let Some(code) = key_to_code(&key) {
            if let Some(transition) = machine.on_key(code, pressed) {
                debug!(?transition, "hotkey edge");
                // The receiver only goes away at shutdown.
                let _ = tx.send(transition);
            }
        }
    };

    if let Err(e) = listen(callback) {
        error!("hotkey listener error: {:?}", e);
    }
}
