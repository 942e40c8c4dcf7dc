//! Device controller - relay output lines.
//!
//! Owns one output handle per device. Lines are only ever acquired in
//! [`DeviceController::init`], after the whole line map has been checked,
//! so a bad configuration never leaves the bank half-driven.

use embedded_hal::digital::{OutputPin, PinState};
use heapless::Vec;

use crate::config::{MAX_DEVICES, MAX_LINE, RESERVED_LINES};
use crate::device_config::ConfigStore;
use crate::error::{ConfigError, Error};
use crate::storage::StatusStorage;

/// Hands out exclusive control of output lines by number.
pub trait LineAllocator {
    type Line: OutputPin;

    /// Take `line` and configure it as an output, initially `on`.
    fn acquire(&mut self, line: u8, on: bool) -> Result<Self::Line, Error>;
}

pub struct DeviceController<P> {
    lines: Vec<P, MAX_DEVICES>,
}

impl<P: OutputPin> DeviceController<P> {
    /// Acquire every device's line and drive it to its saved state.
    pub fn init<A>(config: &ConfigStore, allocator: &mut A) -> Result<Self, Error>
    where
        A: LineAllocator<Line = P>,
    {
        if !config.is_loaded() {
            return Err(ConfigError::NotLoaded.into());
        }
        let identity = config.device_identity();
        let status = config.device_status();
        if identity.is_empty() || status.is_empty() {
            return Err(ConfigError::Empty.into());
        }

        check_line_map(identity.iter().map(|d| d.line))?;

        let mut lines = Vec::new();
        for (device, state) in identity.iter().zip(status) {
            let pin = allocator.acquire(device.line, state.on)?;
            info!(
                "Device {} on line {} restored {}",
                device.id,
                device.line,
                if state.on { "ON" } else { "OFF" }
            );
            // config holds at most MAX_DEVICES entries
            let _ = lines.push(pin);
        }

        Ok(Self { lines })
    }

    pub fn device_count(&self) -> usize {
        self.lines.len()
    }

    /// Switch device `id` and persist the whole status document.
    ///
    /// The line is driven before the status is saved.
    pub async fn set_device_on_off<S: StatusStorage>(
        &mut self,
        config: &mut ConfigStore,
        storage: &mut S,
        id: usize,
        on: bool,
    ) -> Result<(), Error> {
        let pin = self.lines.get_mut(id).ok_or_else(|| {
            error!("Toggle for unknown device {}", id);
            Error::DeviceOutOfRange(id)
        })?;

        pin.set_state(PinState::from(on)).map_err(|_| Error::Gpio)?;
        info!("Device {} switched {}", id, if on { "ON" } else { "OFF" });

        config.set_status(id, on)?;
        config.persist(storage).await
    }
}

/// Reject reserved, non-existent and shared lines.
fn check_line_map(lines: impl Iterator<Item = u8> + Clone) -> Result<(), ConfigError> {
    for (i, line) in lines.clone().enumerate() {
        if RESERVED_LINES.contains(&line) {
            error!("Line {} is reserved for a peripheral", line);
            return Err(ConfigError::ReservedLine(line));
        }
        if line > MAX_LINE {
            return Err(ConfigError::InvalidLine(line));
        }
        if lines.clone().take(i).any(|earlier| earlier == line) {
            error!("Line {} claimed by more than one device", line);
            return Err(ConfigError::LineReused(line));
        }
    }
    Ok(())
}
