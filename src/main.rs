//! relayboard firmware for the nRF52840.
//!
//! A rotary encoder walks a paged list of relays on a 128×64 OLED; pushing
//! the knob toggles the selected relay. Relay states are kept in internal
//! flash and restored at power-on.
//!
//! # Boot order
//!
//! 1. Display (every later failure is reported on it)
//! 2. Device configuration: compiled-in identity + status from flash
//! 3. Relay lines, driven to their saved state
//! 4. Rotary decoder
//! 5. First page, then the poll loop
//!
//! Any error after the display is up is fatal: `ERR:<label>` is shown and
//! the panel blinks until power is cycled.

#![no_std]
#![no_main]

use defmt::info;
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_time::{Instant, Timer};
use {defmt_rtt as _, panic_probe as _};

use relayboard::app::{fatal, menu_for, RelayBoard};
use relayboard::config::{
    ENCODER_DIRECTION_INVERTED, EVENT_POLL_MS, GREETING_MS, IDLE_POLL_MS, MAX_LINE,
};
use relayboard::device_config::ConfigStore;
use relayboard::error::{ConfigError, Error};
use relayboard::relay::{DeviceController, LineAllocator};
use relayboard::rotary::RotaryDecoder;
use relayboard::storage::FlashStatusStorage;
use relayboard::ui::display::OledPanel;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

/// Device names and relay lines. Never rewritten.
static IDENTITY_DOC: &[u8] = include_bytes!("../data/devices.json");

/// Status used when flash holds none (first boot).
static FACTORY_STATUS_DOC: &[u8] = include_bytes!("../data/devicestate.json");

/// Hands out relay outputs by `pin_port` number.
struct NrfLines;

impl LineAllocator for NrfLines {
    type Line = Output<'static>;

    fn acquire(&mut self, line: u8, on: bool) -> Result<Self::Line, Error> {
        if line > MAX_LINE {
            return Err(ConfigError::InvalidLine(line).into());
        }
        // SAFETY: `DeviceController::init` has rejected lines owned by a
        // peripheral and lines claimed twice, and it is the only caller.
        let pin = unsafe { AnyPin::steal(line) };
        Ok(Output::new(pin, Level::from(on), OutputDrive::Standard))
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    info!("relayboard starting");

    // Display first: errors from here on are routed to it.
    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let mut display = match OledPanel::init(i2c) {
        Ok(display) => display,
        Err(e) => defmt::panic!("display init failed: {}", e),
    };
    if let Err(e) = display.greet() {
        fatal(&mut display, &e.into());
    }
    Timer::after_millis(GREETING_MS).await;

    let mut storage = FlashStatusStorage::new(BlockingAsync::new(Nvmc::new(p.NVMC)));
    let mut config = ConfigStore::new();
    if let Err(e) = config
        .load_persisted(IDENTITY_DOC, &mut storage, FACTORY_STATUS_DOC)
        .await
    {
        fatal(&mut display, &e);
    }

    let controller = match DeviceController::init(&config, &mut NrfLines) {
        Ok(controller) => controller,
        Err(e) => fatal(&mut display, &e),
    };

    let mut decoder = match RotaryDecoder::new(
        Input::new(p.P0_11, Pull::Up),
        Input::new(p.P0_12, Pull::Up),
        Input::new(p.P0_24, Pull::Up),
        config.total_devices(),
    ) {
        Ok(decoder) => decoder.with_inverted_direction(ENCODER_DIRECTION_INVERTED),
        Err(e) => fatal(&mut display, &e),
    };

    let nav = match menu_for(&display, &config) {
        Ok(nav) => nav,
        Err(e) => fatal(&mut display, &e),
    };
    let mut board = RelayBoard::new(display, config, controller, storage, nav);
    if let Err(e) = board.start() {
        board.halt(&e);
    }
    info!("relayboard ready");

    for reading in decoder.readings(|| Instant::now().as_millis()) {
        let reading = match reading {
            Ok(reading) => reading,
            Err(e) => board.halt(&e),
        };
        let Some(event) = reading.event else {
            Timer::after_millis(IDLE_POLL_MS).await;
            continue;
        };
        if let Err(e) = board.dispatch(event, reading.position).await {
            board.halt(&e);
        }
        Timer::after_millis(EVENT_POLL_MS).await;
    }
}
