#[cfg(target_os = "windows")]
pub mod windows;

use std::process::Command;

/// Executable names tried on the system search path, in order.
#[cfg(target_os = "windows")]
pub const ENGINE_NAMES: &[&str] = &["gswin64c.exe", "gswin32c.exe", "gs.exe"];

#[cfg(not(target_os = "windows"))]
pub const ENGINE_NAMES: &[&str] = &["gs"];

/// File name of a Ghostscript binary shipped next to our own executable.
#[cfg(target_os = "windows")]
pub const BUNDLED_ENGINE_NAME: &str = "gswin64c.exe";

#[cfg(not(target_os = "windows"))]
pub const BUNDLED_ENGINE_NAME: &str = "gs";

#[cfg(target_os = "windows")]
pub fn hide_console_window(cmd: &mut Command) {
    windows::hide_console_window(cmd);
}

#[cfg(not(target_os = "windows"))]
pub fn hide_console_window(_cmd: &mut Command) {}
