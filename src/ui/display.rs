//! Character-grid rendering on an `embedded-graphics` target.
//!
//! The panel is split into `cols × rows` cells of
//! [`CELL_WIDTH_PX`] × [`CELL_HEIGHT_PX`] pixels. Each cell holds one
//! `FONT_6X10` character; the on/off glyph spans [`ONOFF_GLYPH_COLS`]
//! cells and the cursor fills one.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{
    PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, RoundedRectangle, Triangle,
};
use embedded_graphics::text::{Baseline, Text};

use crate::config::{CELL_HEIGHT_PX, CELL_WIDTH_PX, ONOFF_GLYPH_COLS};
use crate::error::DisplayError;

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn fill(color: BinaryColor) -> PrimitiveStyle<BinaryColor> {
    PrimitiveStyle::with_fill(color)
}

/// A draw target addressed as a grid of character cells.
pub struct GridDisplay<T> {
    target: T,
    cols: u8,
    rows: u8,
    /// Write position left by the last `move_cursor_to` / `write_string`.
    position: (u8, u8),
}

impl<T> GridDisplay<T>
where
    T: DrawTarget<Color = BinaryColor>,
{
    pub fn new(target: T, cols: u8, rows: u8) -> Self {
        Self { target, cols, rows, position: (0, 0) }
    }

    pub fn size(&self) -> (u8, u8) {
        (self.cols, self.rows)
    }

    /// Current write position `(col, row)`.
    pub fn position(&self) -> (u8, u8) {
        self.position
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn release(self) -> T {
        self.target
    }

    fn check(&self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col < self.cols && row < self.rows {
            Ok(())
        } else {
            Err(DisplayError::OutOfBounds { col, row })
        }
    }

    fn origin(col: u8, row: u8) -> Point {
        Point::new(
            (u32::from(col) * CELL_WIDTH_PX) as i32,
            (u32::from(row) * CELL_HEIGHT_PX) as i32,
        )
    }

    /// Blank `width` cells starting at `(col, row)`, clipped to the grid.
    fn blank(&mut self, col: u8, row: u8, width: u8) -> Result<(), DisplayError> {
        let width = width.min(self.cols - col);
        let area = Rectangle::new(
            Self::origin(col, row),
            Size::new(u32::from(width) * CELL_WIDTH_PX, CELL_HEIGHT_PX),
        );
        area.into_styled(fill(BinaryColor::Off))
            .draw(&mut self.target)
            .map_err(|_| DisplayError::Bus)
    }

    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.position = (0, 0);
        self.target.clear(BinaryColor::Off).map_err(|_| DisplayError::Bus)
    }

    pub fn move_cursor_to(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.position = (col, row);
        Ok(())
    }

    pub fn write_string(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError> {
        self.check(col, row)?;
        let mut col = col;
        let mut utf8 = [0u8; 4];
        for c in text.chars() {
            if col >= self.cols {
                break;
            }
            self.blank(col, row, 1)?;
            let at = Self::origin(col, row) + Point::new(1, 3);
            Text::with_baseline(c.encode_utf8(&mut utf8), at, text_style(), Baseline::Top)
                .draw(&mut self.target)
                .map_err(|_| DisplayError::Bus)?;
            col += 1;
        }
        self.position = (col.min(self.cols - 1), row);
        Ok(())
    }

    /// Two-cell pill: filled when on, outlined when off.
    pub fn show_glyph(&mut self, col: u8, row: u8, on: bool) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.blank(col, row, ONOFF_GLYPH_COLS)?;

        let width = u32::from(ONOFF_GLYPH_COLS.min(self.cols - col)) * CELL_WIDTH_PX;
        let pill = RoundedRectangle::with_equal_corners(
            Rectangle::new(
                Self::origin(col, row) + Point::new(1, 4),
                Size::new(width.saturating_sub(2), CELL_HEIGHT_PX - 8),
            ),
            Size::new(4, 4),
        );
        let style = if on {
            fill(BinaryColor::On)
        } else {
            PrimitiveStyleBuilder::new()
                .stroke_color(BinaryColor::On)
                .stroke_width(1)
                .fill_color(BinaryColor::Off)
                .build()
        };
        pill.into_styled(style)
            .draw(&mut self.target)
            .map_err(|_| DisplayError::Bus)
    }

    /// Right-pointing arrow filling one cell.
    pub fn show_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.blank(col, row, 1)?;
        let o = Self::origin(col, row);
        Triangle::new(o + Point::new(1, 3), o + Point::new(1, 12), o + Point::new(6, 7))
            .into_styled(fill(BinaryColor::On))
            .draw(&mut self.target)
            .map_err(|_| DisplayError::Bus)
    }

    pub fn hide_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check(col, row)?;
        self.blank(col, row, 1)
    }

    /// Power-on screen.
    pub fn draw_greeting(&mut self) -> Result<(), DisplayError> {
        self.clear()?;
        self.write_string(0, 0, "Relay Board")?;
        if self.rows > 1 {
            self.write_string(0, 1, "starting...")?;
        }
        Ok(())
    }

    /// Fatal-error screen: `ERR:<label>`, clipped to the first row.
    pub fn draw_error(&mut self, label: &str) -> Result<(), DisplayError> {
        self.clear()?;
        self.write_string(0, 0, "ERR:")?;
        if self.cols > 4 {
            self.write_string(4, 0, label)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SSD1306 panel (board only)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "embedded")]
pub use panel::{OledPanel, Panel};

#[cfg(feature = "embedded")]
mod panel {
    use embassy_time::{block_for, Duration};
    use ssd1306::mode::BufferedGraphicsMode;
    use ssd1306::prelude::*;
    use ssd1306::I2CDisplayInterface;
    use ssd1306::Ssd1306;

    use super::GridDisplay;
    use crate::config::{DISPLAY_COLS, DISPLAY_ROWS, FATAL_BLINK_MS};
    use crate::error::DisplayError;
    use crate::ui::CharDisplay;

    /// Type alias for the concrete display driver.
    ///
    /// Generic over the I²C implementation so callers pass in their HAL's
    /// I²C peripheral.
    pub type Panel<I2C> =
        Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

    /// SSD1306 OLED as a [`CharDisplay`]; every operation is flushed.
    pub struct OledPanel<I2C> {
        grid: GridDisplay<Panel<I2C>>,
    }

    impl<I2C> OledPanel<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        /// Initialise the SSD1306 display and clear the screen.
        pub fn init(i2c: I2C) -> Result<Self, DisplayError> {
            let interface = I2CDisplayInterface::new(i2c);
            let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            display.init().map_err(|_| DisplayError::Bus)?;
            display.clear_buffer();
            display.flush().map_err(|_| DisplayError::Bus)?;
            Ok(Self {
                grid: GridDisplay::new(display, DISPLAY_COLS, DISPLAY_ROWS),
            })
        }

        fn flush(&mut self) -> Result<(), DisplayError> {
            self.grid.target_mut().flush().map_err(|_| DisplayError::Bus)
        }

        pub fn greet(&mut self) -> Result<(), DisplayError> {
            self.grid.draw_greeting()?;
            self.flush()
        }
    }

    impl<I2C> CharDisplay for OledPanel<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        fn size(&self) -> (u8, u8) {
            self.grid.size()
        }

        fn clear(&mut self) -> Result<(), DisplayError> {
            self.grid.clear()?;
            self.flush()
        }

        fn move_cursor_to(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
            self.grid.move_cursor_to(col, row)
        }

        fn write_string(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError> {
            self.grid.write_string(col, row, text)?;
            self.flush()
        }

        fn show_glyph(&mut self, col: u8, row: u8, on: bool) -> Result<(), DisplayError> {
            self.grid.show_glyph(col, row, on)?;
            self.flush()
        }

        fn show_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
            self.grid.show_cursor(col, row)?;
            self.flush()
        }

        fn hide_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
            self.grid.hide_cursor(col, row)?;
            self.flush()
        }

        fn report_fatal_error(&mut self, message: &str) -> ! {
            error!("FATAL: {}", message);
            let _ = self.grid.draw_error(message);
            let _ = self.flush();

            let blink = Duration::from_millis(u64::from(FATAL_BLINK_MS));
            let mut on = true;
            loop {
                block_for(blink);
                on = !on;
                let _ = self.grid.target_mut().set_display_on(on);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
