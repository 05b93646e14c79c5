//! dossier-pack decodes fixed-layout binary records described by small text schemas, and
//! assembles them into nested trees that can be locked and merged.
//!
//! The pieces, from the bottom up:
//!
//! - A schema language for fixed binary layouts: a byte order symbol, then one typed field or
//! 	pad run per line. Field names split on `/` into nested segments. See [`schema`].
//! - A decoder that reads raw bytes under a compiled [`StructLayout`], and an encoder that
//! 	writes them back out.
//! - [`PathTree`], a nested container addressed by key sequences. Each node can be
//! 	write-locked, and whole trees merge leaf by leaf under caller-chosen policies.
//! - A versioned cache reader that picks the layout matching each record's version tag,
//! 	decodes its body and trailing fragment block, and names it through a key table.
//!
//! ```
//! use dossier_pack::{decode_tree, StructLayout};
//!
//! let layout = StructLayout::compile("<\nB\tinfo/kind\nH\tinfo/count\n").unwrap();
//! let record = decode_tree(&layout, &[3, 0x10, 0x00], true).unwrap();
//! let count = record.get_leaf(&["info".to_string(), "count".to_string()]).unwrap();
//! assert_eq!(count.as_u64(), Some(16));
//! ```

mod error;
mod integer;
mod marker;
mod owner;
mod timestamp;
mod value;

pub mod cache;
pub mod decode;
pub mod encode;
pub mod fragment;
pub mod key;
pub mod reader;
pub mod record;
pub mod registry;
pub mod schema;
pub mod tree;

pub use self::cache::{CacheFile, RawRecord};
pub use self::decode::{decode, DecodedField};
pub use self::encode::encode;
pub use self::error::{Error, Result};
pub use self::fragment::{FragmentLayout, Fragments};
pub use self::integer::Integer;
pub use self::key::{resolve, CompositeKey, KeyTable, TankKey, TankName};
pub use self::marker::{ByteOrder, TypeCode};
pub use self::owner::CacheOwner;
pub use self::reader::{
    CacheReader, Dossier, DossierRecord, KeyBy, ReaderConfig, RecordFailure, RecordKey,
};
pub use self::record::{assemble, decode_tree, Record};
pub use self::registry::Registry;
pub use self::schema::{FieldSpec, StructLayout};
pub use self::timestamp::Timestamp;
pub use self::tree::{merge, merged, paths, Child, MergeOptions, PathTree, Policy, Removed, SetOutcome};
pub use self::value::Value;
