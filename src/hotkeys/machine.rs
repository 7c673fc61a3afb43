use serde::{Deserialize, Serialize};

use crate::types::Transition;

/// Platform-neutral key codes, following the Carbon virtual-key table
/// so persisted bindings stay stable across layouts.
pub mod keys {
    pub const A: u32 = 0;
    pub const S: u32 = 1;
    pub const D: u32 = 2;
    pub const F: u32 = 3;
    pub const H: u32 = 4;
    pub const G: u32 = 5;
    pub const Z: u32 = 6;
    pub const X: u32 = 7;
    pub const C: u32 = 8;
    pub const V: u32 = 9;
    pub const B: u32 = 11;
    pub const Q: u32 = 12;
    pub const W: u32 = 13;
    pub const E: u32 = 14;
    pub const R: u32 = 15;
    pub const Y: u32 = 16;
    pub const T: u32 = 17;
    pub const O: u32 = 31;
    pub const U: u32 = 32;
    pub const I: u32 = 34;
    pub const P: u32 = 35;
    pub const L: u32 = 37;
    pub const J: u32 = 38;
    pub const K: u32 = 40;
    pub const N: u32 = 45;
    pub const M: u32 = 46;

    pub const RETURN: u32 = 36;
    pub const TAB: u32 = 48;
    pub const SPACE: u32 = 49;
    pub const DELETE: u32 = 51;
    pub const ESCAPE: u32 = 53;

    pub const COMMAND_RIGHT: u32 = 54;
    pub const COMMAND: u32 = 55;
    pub const SHIFT: u32 = 56;
    pub const OPTION: u32 = 58;
    pub const CONTROL: u32 = 59;
    pub const SHIFT_RIGHT: u32 = 60;
    pub const OPTION_RIGHT: u32 = 61;
    pub const CONTROL_RIGHT: u32 = 62;

    pub const F1: u32 = 122;
    pub const F2: u32 = 120;
    pub const F3: u32 = 99;
    pub const F4: u32 = 118;
    pub const F5: u32 = 96;
    pub const F6: u32 = 97;
    pub const F7: u32 = 98;
    pub const F8: u32 = 100;
    pub const F9: u32 = 101;
    pub const F10: u32 = 109;
    pub const F11: u32 = 103;
    pub const F12: u32 = 111;
}

/// Bitset over the four standard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(pub u32);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CONTROL: Modifiers = Modifiers(1 << 0);
    pub const OPTION: Modifiers = Modifiers(1 << 1);
    pub const SHIFT: Modifiers = Modifiers(1 << 2);
    pub const COMMAND: Modifiers = Modifiers(1 << 3);

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// Which modifier bit a key code stands for, if any.
pub fn modifier_bit(code: u32) -> Option<Modifiers> {
    match code {
        keys::CONTROL | keys::CONTROL_RIGHT => Some(Modifiers::CONTROL),
        keys::OPTION | keys::OPTION_RIGHT => Some(Modifiers::OPTION),
        keys::SHIFT | keys::SHIFT_RIGHT => Some(Modifiers::SHIFT),
        keys::COMMAND | keys::COMMAND_RIGHT => Some(Modifiers::COMMAND),
        _ => None,
    }
}

fn key_name(code: u32) -> String {
    let name = match code {
        keys::SPACE => "Space",
        keys::RETURN => "Return",
        keys::TAB => "Tab",
        keys::DELETE => "Delete",
        keys::ESCAPE => "Escape",
        keys::F1 => "F1",
        keys::F2 => "F2",
        keys::F3 => "F3",
        keys::F4 => "F4",
        keys::F5 => "F5",
        keys::F6 => "F6",
        keys::F7 => "F7",
        keys::F8 => "F8",
        keys::F9 => "F9",
        keys::F10 => "F10",
        keys::F11 => "F11",
        keys::F12 => "F12",
        _ => return format!("Key{code}"),
    };
    name.to_string()
}

/// The persisted hotkey: one non-modifier trigger key plus a required
/// modifier set. Round-trips through settings as two scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub key_code: u32,
    pub modifiers: Modifiers,
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            key_code: keys::SPACE,
            modifiers: Modifiers::OPTION,
        }
    }
}

impl HotkeyBinding {
    /// A binding must trigger on a non-modifier key.
    pub fn is_valid(&self) -> bool {
        modifier_bit(self.key_code).is_none()
    }

    pub fn display_string(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.modifiers.contains(Modifiers::CONTROL) {
            parts.push("Ctrl");
        }
        if self.modifiers.contains(Modifiers::OPTION) {
            parts.push("Alt");
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            parts.push("Shift");
        }
        if self.modifiers.contains(Modifiers::COMMAND) {
            parts.push("Meta");
        }
        let key = key_name(self.key_code);
        parts.push(&key);
        parts.join("+")
    }
}

/// Edge detector for the push-to-talk hotkey.
///
/// Consumes the raw key stream and emits `Pressed`/`Released` exactly
/// once per physical hold. A hold starts when the trigger key goes down
/// while every required modifier is already held, and ends on either
/// the trigger key-up or the release of any required modifier,
/// whichever comes first. Auto-repeat key-down events and duplicate
/// hardware edges never produce extra transitions.
pub struct HotkeyStateMachine {
    binding: HotkeyBinding,
    // Rebinds requested mid-hold wait here until the hold resolves.
    pending: Option<HotkeyBinding>,
    active_mods: Modifiers,
    trigger_down: bool,
    held: bool,
}

impl HotkeyStateMachine {
    pub fn new(binding: HotkeyBinding) -> Self {
        Self {
            binding,
            pending: None,
            active_mods: Modifiers::NONE,
            trigger_down: false,
            held: false,
        }
    }

    pub fn binding(&self) -> HotkeyBinding {
        self.pending.unwrap_or(self.binding)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Swap the watched binding. Takes effect immediately while idle;
    /// during a hold it is deferred so the hold resolves under the
    /// binding that started it.
    pub fn reconfigure(&mut self, binding: HotkeyBinding) {
        if self.held {
            self.pending = Some(binding);
        } else {
            self.apply_binding(binding);
        }
    }

    fn apply_binding(&mut self, binding: HotkeyBinding) {
        self.binding = binding;
        self.pending = None;
        // The new trigger key cannot be down at rebind time.
        self.trigger_down = false;
    }

    fn end_hold(&mut self) -> Option<Transition> {
        self.held = false;
        if let Some(binding) = self.pending.take() {
            self.apply_binding(binding);
        }
        Some(Transition::Released)
    }

    /// Feed one key edge. Returns the transition it completes, if any.
    pub fn on_key(&mut self, code: u32, pressed: bool) -> Option<Transition> {
        if let Some(bit) = modifier_bit(code) {
            if pressed {
                self.active_mods.insert(bit);
                return None;
            }
            self.active_mods.remove(bit);
            // A required modifier released early still ends the hold.
            if self.held && self.binding.modifiers.contains(bit) {
                return self.end_hold();
            }
            return None;
        }

        if code != self.binding.key_code {
            return None;
        }

        if pressed {
            if self.trigger_down {
                // Keyboard auto-repeat while the key is held.
                return None;
            }
            self.trigger_down = true;
            if !self.held && self.active_mods.contains(self.binding.modifiers) {
                self.held = true;
                return Some(Transition::Pressed);
            }
            None
        } else {
            self.trigger_down = false;
            if self.held {
                return self.end_hold();
            }
            None
        }
    }
}
