//! Page / cursor state machine for the device menu.
//!
//! The flat device list is split into pages of `rows_per_page` devices.
//! The last page holds `N % R` devices when that is nonzero. Transitions
//! are pure: each returns a [`NavCommand`] describing the screen work the
//! caller has to do.

use crate::error::Error;
use crate::rotary::RotaryEvent;

/// Screen work requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavCommand {
    /// Draw `page`, then put the cursor on `to_row`.
    Redraw { page: usize, from_row: usize, to_row: usize },
    /// Same page: hide the cursor on `from_row`, show it on `to_row`.
    MoveCursor { from_row: usize, to_row: usize },
    /// Flip `device`, whose glyph sits on `row`.
    Toggle { device: usize, row: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationState {
    total_devices: usize,
    rows_per_page: usize,
    total_pages: usize,
    current_page: usize,
    on_screen_index: usize,
}

impl NavigationState {
    /// Start on page 0, row 0.
    pub fn new(total_devices: usize, rows_per_page: usize) -> Result<Self, Error> {
        if rows_per_page == 0 {
            return Err(Error::NoRows);
        }
        if total_devices == 0 {
            return Err(Error::InvalidDeviceCount);
        }
        Ok(Self {
            total_devices,
            rows_per_page,
            total_pages: total_devices.div_ceil(rows_per_page),
            current_page: 0,
            on_screen_index: 0,
        })
    }

    pub fn total_devices(&self) -> usize {
        self.total_devices
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn on_screen_index(&self) -> usize {
        self.on_screen_index
    }

    /// Absolute id of the device under the cursor.
    pub fn selected_device(&self) -> usize {
        self.first_device(self.current_page) + self.on_screen_index
    }

    pub fn first_device(&self, page: usize) -> usize {
        page * self.rows_per_page
    }

    /// Devices shown on `page`; 0 for a page that does not exist.
    pub fn rows_on_page(&self, page: usize) -> usize {
        if page >= self.total_pages {
            return 0;
        }
        let tail = self.total_devices % self.rows_per_page;
        if page == self.total_pages - 1 && tail != 0 {
            tail
        } else {
            self.rows_per_page
        }
    }

    fn last_page(&self) -> usize {
        self.total_pages - 1
    }

    fn check(&self, target: usize) -> Result<(), Error> {
        if target < self.total_devices {
            Ok(())
        } else {
            error!("Navigation target {} out of range", target);
            Err(Error::DeviceOutOfRange(target))
        }
    }

    /// Cursor up. From the top row, go to the previous page (wrapping to
    /// the last) and select its last populated row.
    pub fn on_up(&mut self, target: usize) -> Result<NavCommand, Error> {
        self.check(target)?;
        let from_row = self.on_screen_index;

        if from_row > 0 {
            self.on_screen_index -= 1;
            return Ok(NavCommand::MoveCursor { from_row, to_row: self.on_screen_index });
        }

        self.current_page = if self.current_page == 0 {
            self.last_page()
        } else {
            self.current_page - 1
        };
        self.on_screen_index = self.rows_on_page(self.current_page) - 1;
        Ok(NavCommand::Redraw {
            page: self.current_page,
            from_row,
            to_row: self.on_screen_index,
        })
    }

    /// Cursor down. From the last populated row, or when the position
    /// wrapped to 0, go to the next page (wrapping to page 0), row 0.
    pub fn on_down(&mut self, target: usize) -> Result<NavCommand, Error> {
        self.check(target)?;
        let from_row = self.on_screen_index;
        let bottom = from_row + 1 >= self.rows_on_page(self.current_page);

        if !bottom && target != 0 {
            self.on_screen_index += 1;
            return Ok(NavCommand::MoveCursor { from_row, to_row: self.on_screen_index });
        }

        self.current_page = if target == 0 || self.current_page == self.last_page() {
            0
        } else {
            self.current_page + 1
        };
        self.on_screen_index = 0;
        Ok(NavCommand::Redraw { page: self.current_page, from_row, to_row: 0 })
    }

    /// Knob pushed: toggle `target` in place. `target` must be the device
    /// under the cursor, otherwise the row glyph would show another relay.
    pub fn on_button(&mut self, target: usize) -> Result<NavCommand, Error> {
        self.check(target)?;
        let selected = self.selected_device();
        if target != selected {
            error!("Button target {} but cursor is on {}", target, selected);
            return Err(Error::DeviceOutOfRange(target));
        }
        Ok(NavCommand::Toggle { device: target, row: self.on_screen_index })
    }

    pub fn on_event(&mut self, event: RotaryEvent, target: usize) -> Result<NavCommand, Error> {
        match event {
            RotaryEvent::Up => self.on_up(target),
            RotaryEvent::Down => self.on_down(target),
            RotaryEvent::ButtonPressed => self.on_button(target),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
