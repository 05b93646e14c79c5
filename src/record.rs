//! Folding decoded fields into a tree.

use crate::decode::{decode, DecodedField};
use crate::error::Result;
use crate::schema::StructLayout;
use crate::tree::PathTree;
use crate::value::Value;

/// The tree a record body is assembled into: name segments down to decoded values.
pub type Record = PathTree<String, Value>;

/// Build a tree out of decoded fields, in order. A field whose path runs through an earlier
/// field's leaf replaces that leaf.
pub fn assemble<'a, I>(fields: I) -> Result<Record>
where
    I: IntoIterator<Item = DecodedField<'a>>,
{
    let mut tree = Record::new();
    for field in fields {
        tree.set(field.path, field.value)?;
    }
    Ok(tree)
}

/// Decode a record body and assemble it in one step.
pub fn decode_tree(layout: &StructLayout, data: &[u8], force_length: bool) -> Result<Record> {
    assemble(decode(layout, data, force_length)?)
}
