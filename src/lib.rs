//! relayboard - menu-driven relay control board.
//!
//! Everything except hardware bring-up lives here so it can be tested on
//! the host (no embedded hardware required):
//!
//! - [`device_config`]: identity + status documents, persistence
//! - [`rotary`]: encoder decoding
//! - [`relay`]: relay output lines
//! - [`ui`]: character grid, navigation, page rendering
//! - [`app`]: event dispatcher
//!
//! Usage: `cargo test --lib` / `cargo test --features testing --test integration`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and is only built with the `embedded` feature.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "testing", not(test)))]
extern crate std;

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod app;
pub mod config;
pub mod device_config;
pub mod error;
pub mod relay;
pub mod rotary;
pub mod storage;
pub mod ui;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use app::RelayBoard;
pub use device_config::{ConfigStore, DeviceIdentity, DeviceStatus};
pub use error::{ConfigError, DisplayError, Error, StorageError};
pub use rotary::{Reading, RotaryDecoder, RotaryEvent};
