//! Composite vehicle keys and the table that names them.
//!
//! A composite key packs three identifiers into one integer: the tank id in the high bits, then
//! a 4-bit country id, then a 4-bit vehicle type id.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const COUNTRY_SHIFT: u32 = 4;
const TANK_SHIFT: u32 = 8;
const NIBBLE: u64 = 0xf;
const TANK_LIMIT: u64 = 1 << (64 - TANK_SHIFT);

/// Vehicle type id that identifies the tank itself rather than a variant of it.
pub const BASE_TYPE_ID: u8 = 1;

/// The three identifiers carried by a [`CompositeKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TankKey {
    pub tank_id: u64,
    pub country_id: u8,
    pub type_id: u8,
}

/// A packed `tank_id << 8 | country_id << 4 | type_id` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(pub u64);

impl CompositeKey {
    /// Pack the three identifiers. Fails if any of them doesn't fit its bit field.
    pub fn pack(tank_id: u64, country_id: u8, type_id: u8) -> Result<CompositeKey> {
        if u64::from(country_id) > NIBBLE {
            return Err(Error::KeyFieldOverflow {
                field: "country_id",
                value: country_id.into(),
            });
        }
        if u64::from(type_id) > NIBBLE {
            return Err(Error::KeyFieldOverflow {
                field: "type_id",
                value: type_id.into(),
            });
        }
        if tank_id >= TANK_LIMIT {
            return Err(Error::KeyFieldOverflow {
                field: "tank_id",
                value: tank_id,
            });
        }
        Ok(CompositeKey(
            tank_id << TANK_SHIFT | u64::from(country_id) << COUNTRY_SHIFT | u64::from(type_id),
        ))
    }

    pub fn unpack(self) -> TankKey {
        TankKey {
            tank_id: self.0 >> TANK_SHIFT,
            country_id: ((self.0 >> COUNTRY_SHIFT) & NIBBLE) as u8,
            type_id: (self.0 & NIBBLE) as u8,
        }
    }

    /// The key of the same tank with the base vehicle type.
    pub fn base(self) -> CompositeKey {
        CompositeKey(self.0 & !NIBBLE | u64::from(BASE_TYPE_ID))
    }
}

impl From<TankKey> for CompositeKey {
    /// Pack without range checks; out-of-range fields are masked off.
    fn from(key: TankKey) -> Self {
        CompositeKey(
            key.tank_id << TANK_SHIFT
                | (u64::from(key.country_id) & NIBBLE) << COUNTRY_SHIFT
                | (u64::from(key.type_id) & NIBBLE),
        )
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The names a vehicle is shown under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "NameWire")]
pub struct TankName {
    pub title: String,
    /// Abbreviated title. Falls back to `title` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
}

impl TankName {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            short: None,
        }
    }

    pub fn with_short<S: Into<String>>(mut self, short: S) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn short_title(&self) -> &str {
        self.short.as_deref().unwrap_or(&self.title)
    }
}

impl From<&str> for TankName {
    fn from(title: &str) -> Self {
        Self::new(title)
    }
}

impl From<String> for TankName {
    fn from(title: String) -> Self {
        Self::new(title)
    }
}

impl fmt::Display for TankName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// A key table entry is either a bare title or an object with both titles.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameWire {
    Title(String),
    Full {
        title: String,
        #[serde(default, alias = "title_short")]
        short: Option<String>,
    },
}

impl From<NameWire> for TankName {
    fn from(wire: NameWire) -> Self {
        match wire {
            NameWire::Title(title) => TankName::new(title),
            NameWire::Full { title, short } => TankName { title, short },
        }
    }
}

/// Display names for composite keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyTable {
    names: HashMap<CompositeKey, TankName>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: Into<TankName>>(&mut self, key: CompositeKey, name: N) -> Option<TankName> {
        self.names.insert(key, name.into())
    }

    pub fn get(&self, key: CompositeKey) -> Option<&TankName> {
        self.names.get(&key)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name a key. See [`resolve`].
    pub fn resolve(&self, key: CompositeKey) -> Result<&TankName> {
        resolve(key, self)
    }
}

impl<N: Into<TankName>> FromIterator<(CompositeKey, N)> for KeyTable {
    fn from_iter<I: IntoIterator<Item = (CompositeKey, N)>>(iter: I) -> Self {
        KeyTable {
            names: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

/// Find the names for a key.
///
/// The exact key is tried first, then the same tank under the base vehicle type.
pub fn resolve(key: CompositeKey, table: &KeyTable) -> Result<&TankName> {
    table
        .get(key)
        .or_else(|| table.get(key.base()))
        .ok_or(Error::UnknownKey(key.0))
}
