//! Device configuration store.
//!
//! Owns the two paired data sources:
//!
//! - **Identity** (`id -> name, output line`) - compiled into the image,
//!   never rewritten.
//! - **Status** (`id -> on/off`) - loaded from storage at boot, mutated on
//!   every toggle and rewritten in full after each mutation.
//!
//! Both documents must declare the same device count and cover exactly the
//! ids `0..count`, otherwise nothing else is allowed to initialise.

mod document;

use heapless::{String, Vec};

use crate::config::{MAX_DEVICES, MAX_NAME_LEN, STATUS_DOC_CAPACITY};
use crate::error::{ConfigError, Error, StorageError};
use crate::storage::StatusStorage;

use document::{parse_identity, parse_status, StatusDocument};

/// Immutable per-boot identity of one switchable device.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    pub id: usize,
    /// Display name (at most [`MAX_NAME_LEN`] characters).
    pub name: String<MAX_NAME_LEN>,
    /// Output line (`pin_port` number) driving the relay.
    pub line: u8,
}

/// Last known on/off state of one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus {
    pub id: usize,
    pub on: bool,
}

/// Validated identity + status collections.
pub struct ConfigStore {
    identity: Vec<DeviceIdentity, MAX_DEVICES>,
    status: Vec<DeviceStatus, MAX_DEVICES>,
    total_devices: usize,
    loaded: bool,
}

impl ConfigStore {
    /// Create an empty (not yet loaded) store.
    pub const fn new() -> Self {
        Self {
            identity: Vec::new(),
            status: Vec::new(),
            total_devices: 0,
            loaded: false,
        }
    }

    fn reset(&mut self) {
        self.identity.clear();
        self.status.clear();
        self.total_devices = 0;
        self.loaded = false;
    }

    /// Parse and validate both documents.
    ///
    /// Any previously loaded state is dropped first, so a failed reload
    /// leaves the store empty rather than half old, half new.
    pub fn load(&mut self, identity: &[u8], status: &[u8]) -> Result<(), ConfigError> {
        self.reset();

        let identity = parse_identity(identity)?.0;
        let status = parse_status(status)?.0;

        let (Some(identity_count), Some(status_count)) = (identity.count, status.count) else {
            return Err(ConfigError::MissingCountTag);
        };
        if identity_count != status_count {
            return Err(ConfigError::CountMismatch {
                identity: identity_count,
                status: status_count,
            });
        }
        let count = identity_count;
        if count > MAX_DEVICES {
            return Err(ConfigError::TooManyDevices(count));
        }
        if let Some(problem) = identity.problem.or(status.problem) {
            return Err(problem);
        }

        for id in count..MAX_DEVICES {
            if identity.entries[id].is_some() || status.entries[id].is_some() {
                return Err(ConfigError::UnexpectedEntry(id));
            }
        }

        for (id, (record, on)) in identity
            .entries
            .into_iter()
            .zip(status.entries)
            .take(count)
            .enumerate()
        {
            let (Some((name, line)), Some(on)) = (record, on) else {
                self.reset();
                return Err(ConfigError::MissingEntry(id));
            };
            // Capacity is MAX_DEVICES and count <= MAX_DEVICES.
            let _ = self.identity.push(DeviceIdentity { id, name: name.0, line });
            let _ = self.status.push(DeviceStatus { id, on });
        }

        self.total_devices = count;
        self.loaded = true;
        info!("Loaded configuration for {} devices", count);
        Ok(())
    }

    /// Load the identity document together with the status document held
    /// by `storage`.
    ///
    /// On first boot storage is empty: `factory_status` is used instead and
    /// written back immediately so later boots find it.
    pub async fn load_persisted<S: StatusStorage>(
        &mut self,
        identity: &[u8],
        storage: &mut S,
        factory_status: &[u8],
    ) -> Result<(), Error> {
        let mut buf = [0u8; STATUS_DOC_CAPACITY];
        match storage.load(&mut buf).await? {
            Some(status) => self.load(identity, status)?,
            None => {
                info!("No stored status document, using factory defaults");
                self.load(identity, factory_status)?;
                self.persist(storage).await?;
            }
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Validated device count (0 until a load succeeds).
    pub fn total_devices(&self) -> usize {
        self.total_devices
    }

    /// Name of device `id`, `None` when out of range.
    pub fn device_name(&self, id: usize) -> Option<&str> {
        self.identity.get(id).map(|d| d.name.as_str())
    }

    /// Read view of the identity collection, ordered by id.
    pub fn device_identity(&self) -> &[DeviceIdentity] {
        &self.identity
    }

    /// Read view of the status collection, ordered by id.
    pub fn device_status(&self) -> &[DeviceStatus] {
        &self.status
    }

    /// Current on/off state of device `id`, `None` when out of range.
    pub fn is_on(&self, id: usize) -> Option<bool> {
        self.status.get(id).map(|s| s.on)
    }

    /// Update the in-memory status of one device. Does not persist.
    pub(crate) fn set_status(&mut self, id: usize, on: bool) -> Result<(), Error> {
        let entry = self.status.get_mut(id).ok_or(Error::DeviceOutOfRange(id))?;
        entry.on = on;
        Ok(())
    }

    /// Serialize the whole status collection into `buf`.
    pub fn encode_status(&self, buf: &mut [u8]) -> Result<usize, StorageError> {
        serde_json_core::to_slice(&StatusDocument(&self.status), buf).map_err(|_| StorageError::Encode)
    }

    /// Rewrite the entire status document and read it back.
    ///
    /// The read-back must match byte for byte; a mismatch means storage
    /// would hand stale values to the next boot.
    pub async fn persist<S: StatusStorage>(&self, storage: &mut S) -> Result<(), Error> {
        if !self.loaded {
            return Err(ConfigError::NotLoaded.into());
        }

        let mut out = [0u8; STATUS_DOC_CAPACITY];
        let len = self.encode_status(&mut out)?;
        let written = &out[..len];
        storage.save(written).await?;

        let mut check = [0u8; STATUS_DOC_CAPACITY];
        match storage.load(&mut check).await? {
            Some(stored) if stored == written => {
                debug!("Status document persisted ({} bytes)", len);
                Ok(())
            }
            _ => {
                error!("Status document read-back differs from what was written");
                Err(StorageError::VerifyMismatch.into())
            }
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;
    use embassy_futures::block_on;

    const IDENTITY: &[u8] =
        br#"{"numdevices":3,"0":["Hall Light",2],"1":["Pump",28],"2":["Fan",30]}"#;
    const STATUS: &[u8] = br#"{"numdevices":3,"0":0,"1":1,"2":0}"#;

    fn loaded() -> ConfigStore {
        let mut store = ConfigStore::new();
        store.load(IDENTITY, STATUS).unwrap();
        store
    }

    #[test]
    fn load_exposes_both_collections() {
        let store = loaded();
        assert!(store.is_loaded());
        assert_eq!(store.total_devices(), 3);
        assert_eq!(store.device_name(1), Some("Pump"));
        assert_eq!(store.device_identity()[2].line, 30);
        assert_eq!(store.is_on(1), Some(true));
        assert_eq!(store.device_status().len(), 3);
    }

    #[test]
    fn device_name_out_of_range_is_none() {
        let store = loaded();
        assert_eq!(store.device_name(3), None);
        assert_eq!(store.device_name(usize::MAX), None);
    }

    #[test]
    fn missing_count_tag_in_either_document() {
        let mut store = ConfigStore::new();
        assert_eq!(
            store.load(br#"{"0":["A",2]}"#, br#"{"numdevices":1,"0":0}"#),
            Err(ConfigError::MissingCountTag)
        );
        assert_eq!(
            store.load(br#"{"numdevices":1,"0":["A",2]}"#, br#"{"0":0}"#),
            Err(ConfigError::MissingCountTag)
        );
    }

    #[test]
    fn repeated_count_tag_is_rejected() {
        let mut store = ConfigStore::new();
        assert_eq!(
            store.load(
                br#"{"numdevices":1,"0":["A",2]}"#,
                br#"{"numdevices":1,"0":0,"numdevices":1}"#,
            ),
            Err(ConfigError::DuplicateCountTag)
        );
        assert!(!store.is_loaded());
    }

    #[test]
    fn count_mismatch_is_never_truncated() {
        let mut store = ConfigStore::new();
        let result = store.load(
            br#"{"numdevices":3,"0":["A",2],"1":["B",3],"2":["C",4]}"#,
            br#"{"numdevices":4,"0":0,"1":0,"2":0,"3":0}"#,
        );
        assert_eq!(result, Err(ConfigError::CountMismatch { identity: 3, status: 4 }));
        assert_eq!(store.total_devices(), 0);
        assert!(store.device_identity().is_empty());
    }

    #[test]
    fn missing_and_extra_ids_are_rejected() {
        let mut store = ConfigStore::new();
        assert_eq!(
            store.load(br#"{"numdevices":2,"0":["A",2]}"#, br#"{"numdevices":2,"0":0,"1":0}"#),
            Err(ConfigError::MissingEntry(1))
        );
        assert_eq!(
            store.load(
                br#"{"numdevices":1,"0":["A",2]}"#,
                br#"{"numdevices":1,"0":0,"1":0}"#
            ),
            Err(ConfigError::UnexpectedEntry(1))
        );
    }

    #[test]
    fn too_many_devices() {
        let mut store = ConfigStore::new();
        assert_eq!(
            store.load(br#"{"numdevices":40}"#, br#"{"numdevices":40}"#),
            Err(ConfigError::TooManyDevices(40))
        );
    }

    #[test]
    fn failed_reload_leaves_store_empty() {
        let mut store = loaded();
        assert!(store.load(IDENTITY, b"{").is_err());
        assert!(!store.is_loaded());
        assert_eq!(store.total_devices(), 0);
        assert_eq!(store.device_name(0), None);

        store.load(IDENTITY, STATUS).unwrap();
        assert_eq!(store.total_devices(), 3);
    }

    #[test]
    fn set_status_out_of_range() {
        let mut store = loaded();
        assert_eq!(store.set_status(3, true), Err(Error::DeviceOutOfRange(3)));
        store.set_status(0, true).unwrap();
        assert_eq!(store.is_on(0), Some(true));
    }

    #[test]
    fn persist_writes_the_whole_document() {
        let mut store = loaded();
        let mut storage = MemoryStorage::new();
        store.set_status(2, true).unwrap();
        block_on(store.persist(&mut storage)).unwrap();
        assert_eq!(storage.contents(), Some(&br#"{"numdevices":3,"0":0,"1":1,"2":1}"#[..]));
        assert_eq!(storage.saves, 1);
    }

    #[test]
    fn persist_detects_read_back_mismatch() {
        let store = loaded();
        let mut storage = MemoryStorage::new();
        storage.corrupt_reads = true;
        assert_eq!(
            block_on(store.persist(&mut storage)),
            Err(Error::Storage(StorageError::VerifyMismatch))
        );
    }

    #[test]
    fn persist_before_load_is_refused() {
        let store = ConfigStore::new();
        let mut storage = MemoryStorage::new();
        assert_eq!(
            block_on(store.persist(&mut storage)),
            Err(Error::Config(ConfigError::NotLoaded))
        );
        assert_eq!(storage.saves, 0);
    }

    #[test]
    fn first_boot_seeds_storage_with_factory_status() {
        let mut store = ConfigStore::new();
        let mut storage = MemoryStorage::new();
        block_on(store.load_persisted(IDENTITY, &mut storage, STATUS)).unwrap();
        assert_eq!(store.is_on(1), Some(true));
        assert_eq!(storage.contents(), Some(STATUS));
    }

    #[test]
    fn stored_status_wins_over_factory_defaults() {
        let mut store = ConfigStore::new();
        let mut storage = MemoryStorage::with_contents(br#"{"numdevices":3,"0":1,"1":0,"2":1}"#);
        block_on(store.load_persisted(IDENTITY, &mut storage, STATUS)).unwrap();
        assert_eq!(store.is_on(0), Some(true));
        assert_eq!(store.is_on(1), Some(false));
        assert_eq!(storage.saves, 0);
    }
}
