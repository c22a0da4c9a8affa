use crossterm::event;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use std::io;
use std::time::Duration;

/// Enable raw mode for the terminal
pub fn enable_raw() -> io::Result<()> {
    enable_raw_mode()
}

/// Disable raw mode for the terminal
pub fn disable_raw() -> io::Result<()> {
    disable_raw_mode()
}

/// Check if raw mode is enabled
pub fn get_raw_mode() -> io::Result<bool> {
    is_raw_mode_enabled()
}

/// Whether a key event is waiting, without blocking. Only meaningful in raw mode; outside it
/// returns false since terminal input is line-buffered and `poll` would never see a partial line.
pub fn key_available() -> io::Result<bool> {
    if !is_raw_mode_enabled()? {
        return Ok(false);
    }
    event::poll(Duration::from_millis(0))
}
