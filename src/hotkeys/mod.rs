pub mod listener;
pub mod machine;

pub use listener::start_hotkey_listener;
pub use machine::{keys, HotkeyBinding, HotkeyStateMachine, Modifiers};
