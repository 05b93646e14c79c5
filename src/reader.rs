/*!

Reading whole dossier caches.

Each raw record goes through the same steps:

1. Read the version tag, an `i16` at the start of the record.
2. Pick the layout registered for that version.
3. Decode the fixed-size body and assemble it into a tree. Bytes past the body are left alone.
4. Take the fragment offset field out of the body. It gives the byte offset of the fragment block
   within the record.
5. Decode the fragment block.

A record that fails at any step is set aside with its error, and the rest of the cache is still
read.

*/

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use educe::Educe;
use serde::{Deserialize, Serialize, Serializer};

use crate::cache::{CacheFile, RawRecord};
use crate::decode::read_scalar;
use crate::error::{Error, Result};
use crate::fragment::{FragmentLayout, Fragments};
use crate::key::{CompositeKey, TankName};
use crate::marker::{ByteOrder, TypeCode};
use crate::owner::CacheOwner;
use crate::record::{decode_tree, Record};
use crate::registry::Registry;
use crate::schema::PATH_SEPARATOR;
use crate::timestamp::Timestamp;
use crate::tree::{Child, Removed};

/// Name of the body field that holds the fragment block's offset, unless configured otherwise.
pub const DEFAULT_FRAGMENT_OFFSET_FIELD: &str = "fragspos";

/// How records are keyed in a [`Dossier`].
#[derive(Educe, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[educe(Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyBy {
    /// The display name from the registry's key table. Records with unknown keys fail.
    #[educe(Default)]
    Name,
    /// The raw composite key. No names are looked up.
    Composite,
}

/// Settings for a [`CacheReader`].
#[derive(Educe, Clone, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ReaderConfig {
    /// Body field giving the fragment block's offset, with `/` between nested segments. If
    /// empty, no fragment block is read.
    #[educe(Default(expression = String::from(DEFAULT_FRAGMENT_OFFSET_FIELD)))]
    pub fragment_offset_field: String,
    /// Byte order of the version tag at the start of each record.
    pub version_byte_order: ByteOrder,
    /// Layout of the fragment block.
    pub fragments: FragmentLayout,
    pub key_by: KeyBy,
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragment_offset_field(mut self, field: impl Into<String>) -> Self {
        self.fragment_offset_field = field.into();
        self
    }

    pub fn version_byte_order(mut self, order: ByteOrder) -> Self {
        self.version_byte_order = order;
        self
    }

    pub fn fragments(mut self, fragments: FragmentLayout) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn key_by(mut self, key_by: KeyBy) -> Self {
        self.key_by = key_by;
        self
    }
}

/// One decoded record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DossierRecord {
    #[serde(skip)]
    pub version: i16,
    pub timestamp: Timestamp,
    pub body: Record,
    pub fragments: Fragments,
}

/// The key a record is filed under in a [`Dossier`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Name(TankName),
    Composite(CompositeKey),
}

impl RecordKey {
    pub fn name(&self) -> Option<&TankName> {
        match self {
            RecordKey::Name(name) => Some(name),
            RecordKey::Composite(_) => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordKey::Name(name) => fmt::Display::fmt(name, f),
            RecordKey::Composite(key) => fmt::Display::fmt(key, f),
        }
    }
}

impl Serialize for RecordKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A record that couldn't be read.
#[derive(Debug, Serialize)]
pub struct RecordFailure {
    pub dossier_type: i64,
    pub key: CompositeKey,
    #[serde(serialize_with = "display_error")]
    pub error: Error,
}

fn display_error<S: Serializer>(error: &Error, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Everything read out of one cache.
#[derive(Debug, Default, Serialize)]
pub struct Dossier {
    pub version: i64,
    pub owner: Option<CacheOwner>,
    /// Decoded records, in cache order.
    #[serde(serialize_with = "records_as_map")]
    pub records: Vec<(RecordKey, DossierRecord)>,
    pub failures: Vec<RecordFailure>,
}

fn records_as_map<S: Serializer>(
    records: &[(RecordKey, DossierRecord)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(records.iter().map(|(k, r)| (k, r)))
}

impl Dossier {
    pub fn get(&self, key: &RecordKey) -> Option<&DossierRecord> {
        self.records.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    /// Search records by display name, ignoring case.
    ///
    /// In strict mode the name must match exactly and only the first match is returned.
    /// Otherwise every record whose name contains `query` is returned. Records keyed by composite
    /// key have no name and never match.
    pub fn find_by_name(&self, query: &str, strict: bool) -> Vec<(&str, &DossierRecord)> {
        self.search(query, strict, TankName::title)
    }

    /// Like [`find_by_name`](Self::find_by_name), but matches short titles.
    pub fn find_by_short_name(&self, query: &str, strict: bool) -> Vec<(&str, &DossierRecord)> {
        self.search(query, strict, TankName::short_title)
    }

    fn search<'s>(
        &'s self,
        query: &str,
        strict: bool,
        title: fn(&TankName) -> &str,
    ) -> Vec<(&'s str, &'s DossierRecord)> {
        let query = query.to_lowercase();
        let mut named = self
            .records
            .iter()
            .filter_map(|(k, r)| k.name().map(|name| (title(name), r)));
        if strict {
            named
                .find(|(name, _)| name.to_lowercase() == query)
                .into_iter()
                .collect()
        } else {
            named
                .filter(|(name, _)| name.to_lowercase().contains(&query))
                .collect()
        }
    }
}

/// Decodes cache records against a [`Registry`].
#[derive(Clone, Debug)]
pub struct CacheReader<'a> {
    registry: &'a Registry,
    config: ReaderConfig,
}

impl<'a> CacheReader<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_config(registry, ReaderConfig::default())
    }

    pub fn with_config(registry: &'a Registry, config: ReaderConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    fn read_version(&self, data: &[u8]) -> Result<i16> {
        let mut buf = data;
        let version = read_scalar(
            &mut buf,
            TypeCode::I16,
            self.config.version_byte_order,
            "read record version",
        )?;
        // An `h` field always decodes to an i16-sized integer.
        Ok(version.as_i64().and_then(|v| i16::try_from(v).ok()).unwrap_or_default())
    }

    // Pull the fragment offset out of the body and check it lands inside the record.
    fn take_fragment_offset(&self, body: &mut Record, data_len: usize) -> Result<usize> {
        let field = &self.config.fragment_offset_field;
        let bad = |reason: String| Error::InvalidFragmentOffset {
            field: field.clone(),
            reason,
        };
        let path: Vec<String> = field.split(PATH_SEPARATOR).map(String::from).collect();
        let value = match body.remove(&path) {
            Ok(Removed::Removed(Child::Leaf(v))) => v,
            Ok(Removed::Removed(Child::Tree(_))) => {
                return Err(bad("field is a group, not a value".into()))
            }
            Ok(Removed::Rejected) => return Err(bad("field is locked".into())),
            Err(_) => return Err(bad("field missing from body".into())),
        };
        let offset = value
            .as_int()
            .ok_or_else(|| bad(format!("{} isn't an integer", value)))?;
        match offset.as_usize() {
            Some(o) if o <= data_len => Ok(o),
            _ => Err(bad(format!(
                "offset {} is outside the {}-byte record",
                offset, data_len
            ))),
        }
    }

    /// Decode one raw record.
    pub fn decode_record(
        &self,
        key: CompositeKey,
        timestamp: Timestamp,
        data: &[u8],
    ) -> Result<DossierRecord> {
        let version = self.read_version(data)?;
        let layout = self.registry.layout(version)?;
        let mut body = decode_tree(layout, data, false)?;

        let fragments = if self.config.fragment_offset_field.is_empty() {
            Fragments::new()
        } else {
            let offset = self.take_fragment_offset(&mut body, data.len())?;
            self.config.fragments.decode(&data[offset..])?
        };

        tracing::debug!(
            key = key.0,
            version,
            fragments = fragments.len(),
            "decoded dossier record"
        );
        Ok(DossierRecord {
            version,
            timestamp,
            body,
            fragments,
        })
    }

    fn read_one(&self, raw: &RawRecord) -> Result<(RecordKey, DossierRecord)> {
        let record = self.decode_record(raw.key, raw.timestamp, &raw.data)?;
        let key = match self.config.key_by {
            KeyBy::Name => RecordKey::Name(self.registry.resolve(raw.key)?.clone()),
            KeyBy::Composite => RecordKey::Composite(raw.key),
        };
        Ok((key, record))
    }

    /// Decode every record of a cache. Failed records are collected rather than ending the read.
    pub fn read(&self, cache: &CacheFile) -> Dossier {
        let mut dossier = Dossier {
            version: cache.version,
            ..Dossier::default()
        };
        for raw in cache.records.iter() {
            match self.read_one(raw) {
                Ok(entry) => dossier.records.push(entry),
                Err(error) => {
                    tracing::warn!(
                        key = raw.key.0,
                        dossier_type = raw.dossier_type,
                        %error,
                        "skipping dossier record"
                    );
                    dossier.failures.push(RecordFailure {
                        dossier_type: raw.dossier_type,
                        key: raw.key,
                        error,
                    });
                }
            }
        }
        dossier
    }

    /// Load a JSON cache export and read it. The owner is taken from the file name.
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Dossier> {
        let path = path.as_ref();
        let cache = CacheFile::from_json_reader(BufReader::new(File::open(path)?))?;
        let mut dossier = self.read(&cache);
        dossier.owner = CacheOwner::from_path(path);
        tracing::info!(
            path = %path.display(),
            records = dossier.records.len(),
            failures = dossier.failures.len(),
            "read dossier cache"
        );
        Ok(dossier)
    }
}
