//! Persistent storage for the device status document.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` crate.
//! The whole serialized status document is one item under a single key;
//! every save replaces it, so a boot always sees the last complete write.
//!
//! Storage layout:
//!   - One item, key [`KEY_STATUS_DOCUMENT`], value = status JSON bytes.
//!   - Flash pages are managed by `sequential-storage` which handles wear
//!     levelling and GC.

use core::ops::Range;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;

use crate::config::{STATUS_DOC_CAPACITY, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::error::StorageError;

/// Flash page size for nRF52840 (4 KB).
pub const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
pub const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
pub const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key for the status document in the map storage.
const KEY_STATUS_DOCUMENT: u8 = 0x02;

/// Scratch space for one map item: key, length header and document.
const ITEM_BUF_SIZE: usize = STATUS_DOC_CAPACITY + 16;

/// Somewhere the status document can be kept across power cycles.
#[allow(async_fn_in_trait)]
pub trait StatusStorage {
    /// Read the stored document into `buf`.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    async fn load<'a>(&mut self, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError>;

    /// Replace the stored document with `doc`.
    async fn save(&mut self, doc: &[u8]) -> Result<(), StorageError>;
}

/// [`StatusStorage`] on a NOR flash region.
pub struct FlashStatusStorage<F> {
    flash: F,
    range: Range<u32>,
}

impl<F: NorFlash> FlashStatusStorage<F> {
    /// Use the region reserved in `memory.x`.
    pub fn new(flash: F) -> Self {
        Self::with_range(flash, STORAGE_START..STORAGE_END)
    }

    /// Use an explicit page-aligned region.
    pub fn with_range(flash: F, range: Range<u32>) -> Self {
        Self { flash, range }
    }

    pub fn release(self) -> F {
        self.flash
    }
}

impl<F: NorFlash> StatusStorage for FlashStatusStorage<F> {
    async fn load<'a>(&mut self, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError> {
        let mut item_buf = [0u8; ITEM_BUF_SIZE];

        let stored = sequential_storage::map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut item_buf,
            &KEY_STATUS_DOCUMENT,
        )
        .await
        .map_err(|_| {
            error!("Flash read error");
            StorageError::Flash
        })?;

        let Some(data) = stored else {
            info!("No status document in flash");
            return Ok(None);
        };
        if data.len() > buf.len() {
            warn!("Stored status document ({} bytes) exceeds buffer", data.len());
            return Err(StorageError::BufferTooSmall);
        }

        let out = &mut buf[..data.len()];
        out.copy_from_slice(data);
        debug!("Loaded status document ({} bytes)", out.len());
        Ok(Some(out))
    }

    async fn save(&mut self, doc: &[u8]) -> Result<(), StorageError> {
        if doc.len() > STATUS_DOC_CAPACITY {
            return Err(StorageError::BufferTooSmall);
        }
        let mut item_buf = [0u8; ITEM_BUF_SIZE];

        sequential_storage::map::store_item::<u8, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut item_buf,
            &KEY_STATUS_DOCUMENT,
            &doc,
        )
        .await
        .map_err(|_| {
            error!("Flash write error");
            StorageError::Flash
        })?;

        info!("Saved status document ({} bytes)", doc.len());
        Ok(())
    }
}
