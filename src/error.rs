//! Unified error type for relayboard.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.
//!
//! Every error except [`DisplayError::OutOfBounds`] is fatal: the binary
//! shows [`Error::label`] on the display and halts.

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Device identity / status documents are inconsistent or unreadable.
    Config(ConfigError),

    /// Persisting or reading back the status document failed.
    Storage(StorageError),

    /// The display collaborator rejected an operation.
    Display(DisplayError),

    /// Reading or driving a digital line failed.
    Gpio,

    /// Rotary decoder armed with a device count of zero.
    InvalidDeviceCount,

    /// Display reports zero rows, so no page can hold a device.
    NoRows,

    /// A device id at or beyond the configured device count.
    DeviceOutOfRange(usize),

    /// A page number at or beyond the page count.
    PageOutOfRange(usize),
}

/// Configuration document errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// One of the documents has no `numdevices` field.
    MissingCountTag,

    /// `numdevices` appears more than once in one document.
    DuplicateCountTag,

    /// Identity and status documents declare different device counts.
    CountMismatch { identity: usize, status: usize },

    /// A document is not valid JSON or has values of the wrong type.
    Malformed,

    /// Declared device count exceeds [`crate::config::MAX_DEVICES`].
    TooManyDevices(usize),

    /// An id in `0..count` has no entry.
    MissingEntry(usize),

    /// An entry with an id at or above the declared count.
    UnexpectedEntry(usize),

    /// The same id appears twice in one document.
    DuplicateEntry(usize),

    /// A status value other than `0` or `1`.
    InvalidStatus(usize),

    /// A key that is neither `numdevices` nor a decimal device id.
    InvalidKey,

    /// Accessed before a successful load.
    NotLoaded,

    /// Loaded configuration holds no devices.
    Empty,

    /// Output line collides with a line reserved for a peripheral.
    ReservedLine(u8),

    /// Output line claimed by more than one device.
    LineReused(u8),

    /// Output line does not exist on this board.
    InvalidLine(u8),
}

/// Status persistence errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash read/write/erase failed.
    Flash,

    /// Buffer too small for the stored document.
    BufferTooSmall,

    /// Status document could not be serialized.
    Encode,

    /// Document read back after a write differs from what was written.
    VerifyMismatch,
}

/// Display collaborator errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Cell coordinates outside the character grid. Soft failure.
    OutOfBounds { col: u8, row: u8 },

    /// I²C transaction to the display failed.
    Bus,
}

impl DisplayError {
    /// Out-of-bounds draws are diagnosed and skipped, never fatal.
    pub fn is_soft(&self) -> bool {
        matches!(self, DisplayError::OutOfBounds { .. })
    }
}

impl Error {
    /// Short tag for the fatal-error screen.
    pub fn label(&self) -> &'static str {
        match self {
            Error::Config(e) => e.label(),
            Error::Storage(StorageError::VerifyMismatch) => "save verify",
            Error::Storage(_) => "storage",
            Error::Display(_) => "display",
            Error::Gpio => "gpio",
            Error::InvalidDeviceCount => "total <= 0",
            Error::NoRows => "no rows",
            Error::DeviceOutOfRange(_) => "device id",
            Error::PageOutOfRange(_) => "page no.",
        }
    }
}

impl ConfigError {
    fn label(&self) -> &'static str {
        match self {
            ConfigError::MissingCountTag => "no count tag",
            ConfigError::DuplicateCountTag => "count twice",
            ConfigError::CountMismatch { .. } => "count mismatch",
            ConfigError::Malformed => "bad document",
            ConfigError::TooManyDevices(_) => "too many dev",
            ConfigError::MissingEntry(_) => "missing id",
            ConfigError::UnexpectedEntry(_) => "extra id",
            ConfigError::DuplicateEntry(_) => "duplicate id",
            ConfigError::InvalidStatus(_) => "bad status",
            ConfigError::InvalidKey => "bad key",
            ConfigError::NotLoaded => "not conf",
            ConfigError::Empty => "config err",
            ConfigError::ReservedLine(_) => "line reserved",
            ConfigError::LineReused(_) => "line re-used",
            ConfigError::InvalidLine(_) => "bad line",
        }
    }
}

// Convenience conversions

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<DisplayError> for Error {
    fn from(e: DisplayError) -> Self {
        Error::Display(e)
    }
}
