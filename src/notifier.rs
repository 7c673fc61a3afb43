#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::process::Command;

use tracing::debug;
#[cfg(any(target_os = "macos", target_os = "linux"))]
use tracing::warn;

/// Fire-and-forget user-visible message. Failures are swallowed; a
/// notification that did not appear must never break a dictation cycle.
pub trait Notify: Send + Sync {
    fn notify(&self, summary: &str, body: &str);
}

/// Sends through the OS notification layer.
pub struct DesktopNotifier;

impl Notify for DesktopNotifier {
    fn notify(&self, summary: &str, body: &str) {
        debug!(summary, body, "user notification");
        send_desktop_notification(summary, body);
    }
}

#[cfg(target_os = "macos")]
fn send_desktop_notification(summary: &str, body: &str) {
    let script = format!(
        "display notification {} with title {}",
        applescript_quote(body),
        applescript_quote(summary)
    );
    match Command::new("osascript").arg("-e").arg(&script).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%status, "osascript notification failed"),
        Err(e) => warn!("could not run osascript: {e}"),
    }
}

#[cfg(target_os = "linux")]
fn send_desktop_notification(summary: &str, body: &str) {
    match Command::new("notify-send").arg(summary).arg(body).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%status, "notify-send failed"),
        Err(e) => warn!("could not run notify-send: {e}"),
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn send_desktop_notification(_summary: &str, _body: &str) {}

#[cfg(target_os = "macos")]
fn applescript_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
