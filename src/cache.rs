//! The dossier cache container.
//!
//! A cache holds a container version and a list of records. On the wire it is the nested tuple
//! `(version, [((dossier_type, key), (timestamp, data)), ...])`, in whatever serde format the
//! caller has it in. `data` is the raw record: a byte string, a sequence of bytes, or text where
//! every character stands for one byte (Latin-1).

use std::fmt;
use std::io::Read;

use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};

use crate::error::Result;
use crate::key::CompositeKey;
use crate::timestamp::Timestamp;

/// One undecoded record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub dossier_type: i64,
    pub key: CompositeKey,
    pub timestamp: Timestamp,
    pub data: Vec<u8>,
}

/// A whole cache file, before any record is decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "CacheWire", into = "CacheWire")]
pub struct CacheFile {
    pub version: i64,
    pub records: Vec<RawRecord>,
}

type RecordWire = ((i64, CompositeKey), (Timestamp, RawBytes));

#[derive(serde::Serialize, serde::Deserialize)]
struct CacheWire(i64, Vec<RecordWire>);

impl From<CacheWire> for CacheFile {
    fn from(wire: CacheWire) -> Self {
        CacheFile {
            version: wire.0,
            records: wire
                .1
                .into_iter()
                .map(|((dossier_type, key), (timestamp, data))| RawRecord {
                    dossier_type,
                    key,
                    timestamp,
                    data: data.0,
                })
                .collect(),
        }
    }
}

impl From<CacheFile> for CacheWire {
    fn from(file: CacheFile) -> Self {
        CacheWire(
            file.version,
            file.records
                .into_iter()
                .map(|r| ((r.dossier_type, r.key), (r.timestamp, RawBytes(r.data))))
                .collect(),
        )
    }
}

impl CacheFile {
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Record bytes that tolerate the several ways a cache export may spell them.
struct RawBytes(Vec<u8>);

impl Serialize for RawBytes {
    /// Human-readable formats get Latin-1 text, others get a byte string.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let text: String = self.0.iter().map(|&b| b as char).collect();
            serializer.serialize_str(&text)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for RawBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = RawBytes;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "record bytes, a byte sequence, or Latin-1 text")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Self::Value, E> {
                Ok(RawBytes(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(
                self,
                v: Vec<u8>,
            ) -> std::result::Result<Self::Value, E> {
                Ok(RawBytes(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                v.chars()
                    .map(|c| u8::try_from(u32::from(c)).ok())
                    .collect::<Option<Vec<u8>>>()
                    .map(RawBytes)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &"Latin-1 text"))
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(RawBytes(out))
            }
        }

        deserializer.deserialize_any(BytesVisitor)
    }
}
