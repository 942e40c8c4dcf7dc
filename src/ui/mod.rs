//! User interface subsystem - character display + paged device menu.
//!
//! ## Components
//!
//! - **Display**: any `embedded-graphics` target addressed as a grid of
//!   character cells (SSD1306 128×64 OLED on the board)
//! - **Navigation**: page / cursor state machine driven by rotary events
//! - **Render**: draws one page of the device list

pub mod display;
pub mod navigation;
pub mod render;

use crate::error::DisplayError;

/// Display collaborator addressed in character cells.
///
/// Cell coordinates outside [`CharDisplay::size`] yield
/// [`DisplayError::OutOfBounds`]; callers treat that as a soft failure.
pub trait CharDisplay {
    /// `(columns, rows)` of the character grid.
    fn size(&self) -> (u8, u8);

    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Park the write position at a cell.
    fn move_cursor_to(&mut self, col: u8, row: u8) -> Result<(), DisplayError>;

    /// Write `text` starting at a cell. Text running past the last column
    /// is clipped.
    fn write_string(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError>;

    /// Draw the on/off glyph, filled when `on`.
    fn show_glyph(&mut self, col: u8, row: u8, on: bool) -> Result<(), DisplayError>;

    /// Draw the selection indicator.
    fn show_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError>;

    /// Erase the selection indicator.
    fn hide_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError>;

    /// Show `message` and halt in a visible error state. Never returns.
    fn report_fatal_error(&mut self, message: &str) -> !;
}

/// Swallow out-of-bounds failures after logging them; pass the rest on.
pub(crate) fn soft(result: Result<(), DisplayError>) -> Result<(), DisplayError> {
    match result {
        Err(e) if e.is_soft() => {
            warn!("Display: {} ignored", e);
            Ok(())
        }
        other => other,
    }
}
