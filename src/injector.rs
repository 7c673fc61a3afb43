use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::notifier::Notify;
use crate::utils::truncate_preview;

/// How long we poll for the saved app to become frontmost again.
const FOCUS_POLL_ATTEMPTS: u32 = 20;
const FOCUS_POLL_INTERVAL: Duration = Duration::from_millis(25);
/// After focus restoration, wait out the user's own modifier release
/// so it cannot land in the middle of the synthetic paste chord.
const PASTE_SETTLE_DELAY: Duration = Duration::from_millis(500);
const PRIMARY_PASTE_RETRIES: u32 = 3;
const PASTE_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// How a delivery ended up. `ClipboardOnly` is a degraded success, not
/// an error: the clipboard already holds the full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    Pasted { strategy: &'static str },
    ClipboardOnly,
}

/// Opaque handle to the application that should receive the text,
/// captured before recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTarget {
    pid: i32,
}

/// The system clipboard seam, injectable for tests.
pub trait ClipboardSink: Send {
    fn set_text(&mut self, text: &str) -> bool;
}

/// arboard-backed clipboard. A fresh handle per write; keeping one
/// open interferes with other clipboard owners on some platforms.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> bool {
        let mut clipboard = match arboard::Clipboard::new() {
            Ok(c) => c,
            Err(e) => {
                warn!("clipboard init failed: {e}");
                return false;
            }
        };
        match clipboard.set_text(text.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to set clipboard: {e}");
                false
            }
        }
    }
}

/// One way of producing the paste keystroke in the focused app. The
/// text is already on the clipboard when a strategy runs.
pub trait PasteStrategy: Send {
    fn name(&self) -> &'static str;
    fn attempt_paste(&mut self) -> bool;
}

/// Scripted keystroke through System Events. First choice on macOS
/// because it goes through the same path as user input.
pub struct AppleScriptKeystroke;

impl PasteStrategy for AppleScriptKeystroke {
    fn name(&self) -> &'static str {
        "applescript"
    }

    fn attempt_paste(&mut self) -> bool {
        std::process::Command::new("osascript")
            .arg("-e")
            .arg(r#"tell application "System Events" to keystroke "v" using command down"#)
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Low-level synthetic key events via enigo (Cmd+V / Ctrl+V).
pub struct SyntheticKeystroke;

impl PasteStrategy for SyntheticKeystroke {
    fn name(&self) -> &'static str {
        "synthetic-keystroke"
    }

    fn attempt_paste(&mut self) -> bool {
        use enigo::{Direction, Enigo, Key, Keyboard, Settings};

        let mut enigo = match Enigo::new(&Settings::default()) {
            Ok(e) => e,
            Err(e) => {
                warn!("enigo init failed: {e:?}");
                return false;
            }
        };

        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        enigo
            .key(modifier, Direction::Press)
            .and_then(|_| enigo.key(Key::Unicode('v'), Direction::Click))
            .and_then(|_| enigo.key(modifier, Direction::Release))
            .is_ok()
    }
}

/// The platform's strategy order.
pub fn default_strategies() -> Vec<Box<dyn PasteStrategy>> {
    #[cfg(target_os = "macos")]
    {
        vec![Box::new(AppleScriptKeystroke), Box::new(SyntheticKeystroke)]
    }
    #[cfg(not(target_os = "macos"))]
    {
        vec![Box::new(SyntheticKeystroke)]
    }
}

/// Delivers a transcription to the app that had focus when the hold
/// began.
///
/// The clipboard write always happens first, so whatever the paste
/// strategies do the user can still paste by hand. Paste failures
/// degrade to a notification; they never surface as errors.
pub struct TextInjector {
    clipboard: Box<dyn ClipboardSink>,
    strategies: Vec<Box<dyn PasteStrategy>>,
    notifier: Arc<dyn Notify>,
    auto_paste: bool,
    focus: Option<FocusTarget>,
}

impl TextInjector {
    pub fn new(notifier: Arc<dyn Notify>, auto_paste: bool) -> Self {
        Self::with_parts(
            Box::new(SystemClipboard),
            default_strategies(),
            notifier,
            auto_paste,
        )
    }

    /// Full seam constructor, used by tests to swap in fakes.
    pub fn with_parts(
        clipboard: Box<dyn ClipboardSink>,
        strategies: Vec<Box<dyn PasteStrategy>>,
        notifier: Arc<dyn Notify>,
        auto_paste: bool,
    ) -> Self {
        Self {
            clipboard,
            strategies,
            notifier,
            auto_paste,
            focus: None,
        }
    }

    /// Capture the frontmost app. Must run at press time; by delivery
    /// time focus may have moved.
    pub fn save_focus_target(&mut self) {
        self.focus = frontmost_app();
        match &self.focus {
            Some(target) => debug!(pid = target.pid, "saved focus target"),
            None => debug!("no focus target available"),
        }
    }

    pub fn deliver(&mut self, text: &str) -> InjectionOutcome {
        // The clipboard is the durable fallback; write it before
        // anything that can fail.
        if !self.clipboard.set_text(text) {
            warn!("clipboard write failed, attempting paste anyway");
        }

        if let Some(target) = self.focus.take() {
            restore_focus(&target);
        }

        if self.auto_paste && !self.strategies.is_empty() {
            thread::sleep(PASTE_SETTLE_DELAY);

            for (index, strategy) in self.strategies.iter_mut().enumerate() {
                let attempts = if index == 0 { PRIMARY_PASTE_RETRIES } else { 1 };
                for attempt in 0..attempts {
                    if attempt > 0 {
                        thread::sleep(PASTE_RETRY_BACKOFF);
                    }
                    if strategy.attempt_paste() {
                        info!(strategy = strategy.name(), "text pasted");
                        return InjectionOutcome::Pasted {
                            strategy: strategy.name(),
                        };
                    }
                    debug!(
                        strategy = strategy.name(),
                        attempt = attempt + 1,
                        "paste attempt failed"
                    );
                }
            }
            warn!("all paste strategies failed, falling back to notification");
        }

        self.notifier.notify(
            "Ready to paste",
            &format!(
                "Press {} to paste: {}",
                paste_shortcut_label(),
                truncate_preview(text)
            ),
        );
        InjectionOutcome::ClipboardOnly
    }
}

fn restore_focus(target: &FocusTarget) {
    activate_app(target);
    for _ in 0..FOCUS_POLL_ATTEMPTS {
        if frontmost_app().as_ref() == Some(target) {
            return;
        }
        thread::sleep(FOCUS_POLL_INTERVAL);
    }
    // Timing out here is non-fatal; the paste attempt proceeds against
    // whatever is frontmost.
    debug!(pid = target.pid, "focus target did not come back to front");
}

fn paste_shortcut_label() -> &'static str {
    if cfg!(target_os = "macos") {
        "Cmd+V"
    } else {
        "Ctrl+V"
    }
}

#[cfg(target_os = "macos")]
fn frontmost_app() -> Option<FocusTarget> {
    let output = std::process::Command::new("osascript")
        .arg("-e")
        .arg(r#"tell application "System Events" to get unix id of first application process whose frontmost is true"#)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let pid = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    Some(FocusTarget { pid })
}

/// The daemon has no windows off macOS, so focus never shifts to us
/// and there is nothing to restore.
#[cfg(not(target_os = "macos"))]
fn frontmost_app() -> Option<FocusTarget> {
    None
}

#[cfg(target_os = "macos")]
fn activate_app(target: &FocusTarget) {
    let script = format!(
        r#"tell application "System Events" to set frontmost of (first application process whose unix id is {}) to true"#,
        target.pid
    );
    if let Err(e) = std::process::Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .status()
    {
        warn!("could not reactivate focus target: {e}");
    }
}

#[cfg(not(target_os = "macos"))]
fn activate_app(_target: &FocusTarget) {}
