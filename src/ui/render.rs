//! Device-list page rendering.
//!
//! Row layout (16-column display):
//!
//! ```text
//! col  0     1 ............ 13   14 15
//!     [>] [ device name     ] [ glyph ]
//! ```

use crate::config::{CURSOR_COL, ONOFF_GLYPH_COLS};
use crate::device_config::ConfigStore;
use crate::error::Error;
use crate::ui::navigation::NavigationState;
use crate::ui::{soft, CharDisplay};

/// First column of the on/off glyph.
pub fn glyph_col<D: CharDisplay>(display: &D) -> u8 {
    display.size().0.saturating_sub(ONOFF_GLYPH_COLS)
}

/// Characters available for a device name between cursor and glyph.
pub fn name_width<D: CharDisplay>(display: &D) -> usize {
    usize::from(glyph_col(display).saturating_sub(CURSOR_COL + 1))
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Clear the screen and draw every populated row of `page`.
///
/// The cursor is left to the caller.
pub fn draw_page<D: CharDisplay>(
    display: &mut D,
    config: &ConfigStore,
    nav: &NavigationState,
    page: usize,
) -> Result<(), Error> {
    if page >= nav.total_pages() {
        error!("Invalid page number {}", page);
        return Err(Error::PageOutOfRange(page));
    }

    soft(display.clear())?;

    let first = nav.first_device(page);
    let width = name_width(display);
    let glyph = glyph_col(display);

    for row in 0..nav.rows_on_page(page) {
        let id = first + row;
        let on = config.is_on(id).ok_or(Error::DeviceOutOfRange(id))?;
        // Row index is below the display's u8 row count.
        let screen_row = row as u8;

        match config.device_name(id) {
            Some(name) => soft(display.write_string(
                CURSOR_COL + 1,
                screen_row,
                truncate_chars(name, width),
            ))?,
            None => warn!("No name for device {}", id),
        }
        soft(display.show_glyph(glyph, screen_row, on))?;
    }

    debug!("Drew page {} ({} rows)", page, nav.rows_on_page(page));
    Ok(())
}

/// Redraw only the glyph on `row`.
pub fn update_glyph<D: CharDisplay>(display: &mut D, row: usize, on: bool) -> Result<(), Error> {
    let col = glyph_col(display);
    soft(display.show_glyph(col, row as u8, on))?;
    Ok(())
}
