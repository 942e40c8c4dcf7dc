//! Event dispatcher tying the menu to the relays.
//!
//! [`RelayBoard`] owns every collaborator and runs one navigation
//! transition per decoder event:
//!
//! - `Up` / `Down` move the cursor, redrawing when the page changes.
//! - `ButtonPressed` flips the selected device, persists the status
//!   document and refreshes that row's glyph.

use embedded_hal::digital::OutputPin;

use crate::config::CURSOR_COL;
use crate::device_config::ConfigStore;
use crate::error::Error;
use crate::relay::DeviceController;
use crate::rotary::RotaryEvent;
use crate::storage::StatusStorage;
use crate::ui::navigation::{NavCommand, NavigationState};
use crate::ui::render::{draw_page, update_glyph};
use crate::ui::{soft, CharDisplay};

pub struct RelayBoard<D, P, S> {
    display: D,
    config: ConfigStore,
    controller: DeviceController<P>,
    storage: S,
    nav: NavigationState,
}

impl<D, P, S> RelayBoard<D, P, S>
where
    D: CharDisplay,
    P: OutputPin,
    S: StatusStorage,
{
    /// `nav` must be sized for `config`'s devices and the display's rows,
    /// see [`menu_for`].
    pub fn new(
        display: D,
        config: ConfigStore,
        controller: DeviceController<P>,
        storage: S,
        nav: NavigationState,
    ) -> Self {
        info!(
            "Menu: {} devices on {} pages of {} rows",
            nav.total_devices(),
            nav.total_pages(),
            nav.rows_per_page()
        );
        Self { display, config, controller, storage, nav }
    }

    /// Draw page 0 with the cursor on the first row.
    pub fn start(&mut self) -> Result<(), Error> {
        draw_page(&mut self.display, &self.config, &self.nav, 0)?;
        self.place_cursor(0)
    }

    fn place_cursor(&mut self, row: usize) -> Result<(), Error> {
        let row = row as u8;
        soft(self.display.show_cursor(CURSOR_COL, row))?;
        soft(self.display.move_cursor_to(CURSOR_COL, row))?;
        Ok(())
    }

    /// Run one decoder event. `position` is the decoder's absolute
    /// position reported with it.
    pub async fn dispatch(&mut self, event: RotaryEvent, position: usize) -> Result<(), Error> {
        match self.nav.on_event(event, position)? {
            NavCommand::Redraw { page, to_row, .. } => {
                draw_page(&mut self.display, &self.config, &self.nav, page)?;
                self.place_cursor(to_row)
            }
            NavCommand::MoveCursor { from_row, to_row } => {
                soft(self.display.hide_cursor(CURSOR_COL, from_row as u8))?;
                self.place_cursor(to_row)
            }
            NavCommand::Toggle { device, row } => {
                let on = !self
                    .config
                    .is_on(device)
                    .ok_or(Error::DeviceOutOfRange(device))?;
                self.controller
                    .set_device_on_off(&mut self.config, &mut self.storage, device, on)
                    .await?;
                update_glyph(&mut self.display, row, on)
            }
        }
    }

    /// Report `error` on the display and stop for good.
    pub fn halt(&mut self, error: &Error) -> ! {
        fatal(&mut self.display, error)
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear down, handing back the status storage.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Navigation state for `config`, one device per display row.
pub fn menu_for<D: CharDisplay>(display: &D, config: &ConfigStore) -> Result<NavigationState, Error> {
    NavigationState::new(config.total_devices(), usize::from(display.size().1))
}

/// Log `error` and hand its label to the display's fatal path.
pub fn fatal<D: CharDisplay>(display: &mut D, error: &Error) -> ! {
    error!("Fatal: {}", error);
    display.report_fatal_error(error.label())
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
