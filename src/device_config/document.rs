//! JSON wire format of the two device documents.
//!
//! Identity document (compiled in, read-only):
//! ```text
//! { "numdevices": 3, "0": ["Hall Light", 2], "1": ["Pump", 28], "2": ["Fan", 30] }
//! ```
//! Status document (persisted, rewritten on every toggle):
//! ```text
//! { "numdevices": 3, "0": 0, "1": 1, "2": 0 }
//! ```
//!
//! Parsing only collects what the document says. Semantic problems that
//! serde cannot express without losing detail (unknown keys, duplicate or
//! out-of-range ids, bad status values) are recorded in `problem` and
//! turned into a [`ConfigError`] by the store.

use core::fmt::{self, Write as _};

use heapless::String;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{COUNT_TAG, MAX_DEVICES, MAX_NAME_LEN};
use crate::error::ConfigError;

use super::DeviceStatus;

/// Device name, truncated to [`MAX_NAME_LEN`] characters while parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Name(pub String<MAX_NAME_LEN>);

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = Name;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a device name")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Name, E> {
                let mut name = String::new();
                for c in v.chars().take(MAX_NAME_LEN) {
                    // Multi-byte characters can fill the buffer before the
                    // character budget runs out.
                    if name.push(c).is_err() {
                        break;
                    }
                }
                Ok(Name(name))
            }
        }

        deserializer.deserialize_str(NameVisitor)
    }
}

enum Key {
    Count,
    Device(usize),
    Invalid,
}

fn classify_key(key: &str) -> Key {
    if key == COUNT_TAG {
        return Key::Count;
    }
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Key::Invalid;
    }
    match key.parse::<usize>() {
        Ok(id) => Key::Device(id),
        Err(_) => Key::Invalid,
    }
}

/// Per-id slots plus the first problem spotted while parsing.
pub(crate) struct Slots<T> {
    pub count: Option<usize>,
    pub entries: [Option<T>; MAX_DEVICES],
    pub problem: Option<ConfigError>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            count: None,
            entries: core::array::from_fn(|_| None),
            problem: None,
        }
    }

    fn note(&mut self, problem: ConfigError) {
        if self.problem.is_none() {
            self.problem = Some(problem);
        }
    }

    fn set_count(&mut self, count: usize) {
        if self.count.is_some() {
            self.note(ConfigError::DuplicateCountTag);
        } else {
            self.count = Some(count);
        }
    }

    fn insert(&mut self, id: usize, value: T) {
        match self.entries.get_mut(id) {
            Some(slot) if slot.is_some() => self.note(ConfigError::DuplicateEntry(id)),
            Some(slot) => *slot = Some(value),
            None => self.note(ConfigError::UnexpectedEntry(id)),
        }
    }
}

/// Parsed identity document: `id -> (name, output line)`.
pub(crate) struct IdentityDocument(pub Slots<(Name, u8)>);

/// Parsed status document: `id -> on`.
pub(crate) struct StatusSlots(pub Slots<bool>);

impl<'de> Deserialize<'de> for IdentityDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdentityVisitor;

        impl<'de> Visitor<'de> for IdentityVisitor {
            type Value = IdentityDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a device identity map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut slots = Slots::new();
                while let Some(key) = map.next_key::<&'de str>()? {
                    match classify_key(key) {
                        Key::Count => slots.set_count(map.next_value::<u32>()? as usize),
                        Key::Device(id) => {
                            let record: (Name, u8) = map.next_value()?;
                            slots.insert(id, record);
                        }
                        Key::Invalid => {
                            map.next_value::<IgnoredAny>()?;
                            slots.note(ConfigError::InvalidKey);
                        }
                    }
                }
                Ok(IdentityDocument(slots))
            }
        }

        deserializer.deserialize_map(IdentityVisitor)
    }
}

impl<'de> Deserialize<'de> for StatusSlots {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = StatusSlots;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a device status map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut slots = Slots::new();
                while let Some(key) = map.next_key::<&'de str>()? {
                    match classify_key(key) {
                        Key::Count => slots.set_count(map.next_value::<u32>()? as usize),
                        Key::Device(id) => match map.next_value::<u8>()? {
                            0 => slots.insert(id, false),
                            1 => slots.insert(id, true),
                            _ => slots.note(ConfigError::InvalidStatus(id)),
                        },
                        Key::Invalid => {
                            map.next_value::<IgnoredAny>()?;
                            slots.note(ConfigError::InvalidKey);
                        }
                    }
                }
                Ok(StatusSlots(slots))
            }
        }

        deserializer.deserialize_map(StatusVisitor)
    }
}

pub(crate) fn parse_identity(bytes: &[u8]) -> Result<IdentityDocument, ConfigError> {
    serde_json_core::from_slice::<IdentityDocument>(bytes)
        .map(|(doc, _)| doc)
        .map_err(|_| ConfigError::Malformed)
}

pub(crate) fn parse_status(bytes: &[u8]) -> Result<StatusSlots, ConfigError> {
    serde_json_core::from_slice::<StatusSlots>(bytes)
        .map(|(doc, _)| doc)
        .map_err(|_| ConfigError::Malformed)
}

/// Serializable view of the whole status collection.
pub(crate) struct StatusDocument<'a>(pub &'a [DeviceStatus]);

impl Serialize for StatusDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() + 1))?;
        map.serialize_entry(COUNT_TAG, &(self.0.len() as u32))?;
        for status in self.0 {
            // ids are below MAX_DEVICES, two digits at most
            let mut key: String<4> = String::new();
            let _ = write!(key, "{}", status.id);
            map.serialize_entry(key.as_str(), &u8::from(status.on))?;
        }
        map.end()
    }
}
