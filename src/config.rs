//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and storage
//! constants live here so they can be tuned in one place.

// GPIO pin assignments (nRF52840-DK defaults)
//
// Lines are identified by their `pin_port` number (port * 32 + pin), the
// same number the identity document uses for relay outputs.
//
//   Encoder CLK    → P0.11
//   Encoder DT     → P0.12
//   Encoder SW     → P0.24
//   I²C SDA        → P0.26
//   I²C SCL        → P0.27

pub const I2C_SDA_LINE: u8 = 26;
pub const I2C_SCL_LINE: u8 = 27;
pub const ENCODER_CLOCK_LINE: u8 = 11;
pub const ENCODER_DATA_LINE: u8 = 12;
pub const ENCODER_SWITCH_LINE: u8 = 24;

/// Lines owned by peripherals. A relay mapped onto one of these is a
/// configuration error.
pub const RESERVED_LINES: [u8; 5] = [
    I2C_SDA_LINE,
    I2C_SCL_LINE,
    ENCODER_CLOCK_LINE,
    ENCODER_DATA_LINE,
    ENCODER_SWITCH_LINE,
];

/// Highest valid `pin_port` number on the nRF52840 (P1.15).
pub const MAX_LINE: u8 = 47;

// Display

/// Character grid columns.
pub const DISPLAY_COLS: u8 = 16;

/// Character grid rows, i.e. devices per page.
pub const DISPLAY_ROWS: u8 = 4;

/// Cell size in pixels. 16 × 8 px columns and 4 × 16 px rows fill the
/// 128×64 SSD1306 panel.
pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

/// Columns taken by the on/off glyph at the right edge of each row.
pub const ONOFF_GLYPH_COLS: u8 = 2;

/// Column holding the selection cursor.
pub const CURSOR_COL: u8 = 0;

/// I²C address of the OLED.
pub const DISPLAY_I2C_ADDR: u8 = 0x3C;

/// Greeting screen duration at power-on (ms).
pub const GREETING_MS: u64 = 2000;

/// Backlight blink half-period while halted on a fatal error (ms).
pub const FATAL_BLINK_MS: u32 = 1000;

// Rotary encoder & poll loop

/// Window after a button press during which no input is reported (ms).
/// Absorbs contact bounce; sub-second repeat presses are not delivered.
pub const BUTTON_REFRACTORY_MS: u64 = 1000;

/// Sleep between polls when nothing happened (ms).
pub const IDLE_POLL_MS: u64 = 10;

/// Sleep after an event was handled (ms).
pub const EVENT_POLL_MS: u64 = 5;

/// Swap Up and Down if the encoder is mounted the other way round.
pub const ENCODER_DIRECTION_INVERTED: bool = false;

// Devices

/// Maximum number of relays the board can drive.
pub const MAX_DEVICES: usize = 32;

/// Maximum device name length (characters); longer names are truncated.
pub const MAX_NAME_LEN: usize = 32;

/// Key of the device-count field in both documents.
pub const COUNT_TAG: &str = "numdevices";

/// Serialized status document capacity.
/// `{"numdevices":32,` + 32 × `"NN":0,` ≈ 250 bytes.
pub const STATUS_DOC_CAPACITY: usize = 512;

// Status storage

/// Flash page index where status storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for status storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
