//! The variable-length fragment block that trails a record body.
//!
//! A fragment block is a count followed by two parallel arrays of that length. The first array
//! holds identifiers and the second holds the matching counts, so the block reads as a map from
//! identifier to count.

use std::collections::HashMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde::ser::{SerializeMap, Serializer};

use crate::decode::read_scalar;
use crate::error::{Error, Result};
use crate::integer::Integer;
use crate::marker::{ByteOrder, TypeCode};
use crate::value::Value;

/// Type codes and byte order of a fragment block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayoutFields")]
pub struct FragmentLayout {
    byte_order: ByteOrder,
    count: TypeCode,
    keys: TypeCode,
    values: TypeCode,
}

// Deserialized form, checked through `FragmentLayout::new`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutFields {
    byte_order: ByteOrder,
    count: TypeCode,
    keys: TypeCode,
    values: TypeCode,
}

impl TryFrom<LayoutFields> for FragmentLayout {
    type Error = Error;

    fn try_from(f: LayoutFields) -> Result<Self> {
        FragmentLayout::new(f.byte_order, f.count, f.keys, f.values)
    }
}

impl Default for FragmentLayout {
    /// Native order, a short count, long identifiers and short counts.
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Native,
            count: TypeCode::I16,
            keys: TypeCode::Long,
            values: TypeCode::I16,
        }
    }
}

fn integer_code(code: TypeCode, role: &str) -> Result<TypeCode> {
    if code.is_integer() {
        Ok(code)
    } else {
        Err(Error::SchemaSyntax {
            line: 0,
            text: format!("fragment {} must be an integer type, not '{}'", role, code),
        })
    }
}

impl FragmentLayout {
    /// Set up a fragment layout. All three codes must be integer types.
    pub fn new(
        byte_order: ByteOrder,
        count: TypeCode,
        keys: TypeCode,
        values: TypeCode,
    ) -> Result<Self> {
        Ok(Self {
            byte_order,
            count: integer_code(count, "count")?,
            keys: integer_code(keys, "keys")?,
            values: integer_code(values, "values")?,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of bytes a block with `count` entries occupies.
    pub fn block_size(&self, count: usize) -> usize {
        let order = self.byte_order;
        let pair = self.keys.width(order) + self.values.width(order);
        self.count.width(order).saturating_add(count.saturating_mul(pair))
    }

    /// Decode the fragment block at the start of `data`. Bytes after the block are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<Fragments> {
        let order = self.byte_order;
        let mut buf = data;
        let count = int_of(read_scalar(&mut buf, self.count, order, "decode fragment count")?);
        let count = match count.as_usize() {
            Some(n) => n,
            None => return Err(Error::InvalidFragmentCount(count.as_i64().unwrap_or(i64::MIN))),
        };

        let needed = self.block_size(count);
        if data.len() < needed {
            return Err(Error::LengthMismatch {
                step: "decode fragment arrays",
                expected: needed,
                actual: data.len(),
                exact: false,
            });
        }

        let key_width = self.keys.width(order) * count;
        let (mut keys, mut values) = buf.split_at(key_width);
        let mut fragments = Fragments::with_capacity(count);
        for _ in 0..count {
            let key = int_of(read_scalar(&mut keys, self.keys, order, "decode fragment key")?);
            let value = int_of(read_scalar(
                &mut values,
                self.values,
                order,
                "decode fragment value",
            )?);
            fragments.insert(key, value);
        }
        Ok(fragments)
    }

    /// Encode a fragment block, the inverse of [`decode`](Self::decode).
    pub fn encode(&self, fragments: &Fragments) -> Result<Vec<u8>> {
        let order = self.byte_order;
        let mut out = Vec::with_capacity(self.block_size(fragments.len()));
        crate::encode::write_scalar(
            &mut out,
            &Value::from(fragments.len() as u64),
            self.count,
            order,
            "fragment count",
        )?;
        for (key, _) in fragments.iter() {
            crate::encode::write_scalar(&mut out, &Value::Int(*key), self.keys, order, "fragment key")?;
        }
        for (_, value) in fragments.iter() {
            crate::encode::write_scalar(
                &mut out,
                &Value::Int(*value),
                self.values,
                order,
                "fragment value",
            )?;
        }
        Ok(out)
    }
}

// Fragment layouts only take integer codes, so every value read here is an integer.
fn int_of(value: Value) -> Integer {
    value.as_int().unwrap_or_default()
}

/// Identifier to count, in block order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragments {
    entries: Vec<(Integer, Integer)>,
    index: HashMap<Integer, usize>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert an entry. A repeated identifier keeps its original position and takes the new
    /// count.
    pub fn insert<K: Into<Integer>, V: Into<Integer>>(&mut self, key: K, value: V) {
        let (key, value) = (key.into(), value.into());
        match self.index.get(&key) {
            Some(&at) => self.entries[at].1 = value,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get<K: Into<Integer>>(&self, key: K) -> Option<Integer> {
        self.index.get(&key.into()).map(|&at| self.entries[at].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Integer, &Integer)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Sum of all counts.
    pub fn total(&self) -> i64 {
        self.entries
            .iter()
            .filter_map(|(_, v)| v.as_i64())
            .sum()
    }
}

impl<K: Into<Integer>, V: Into<Integer>> FromIterator<(K, V)> for Fragments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fragments = Fragments::new();
        for (k, v) in iter {
            fragments.insert(k, v);
        }
        fragments
    }
}

impl Serialize for Fragments {
    /// Serialized as a map. Identifiers become string keys so text formats can carry them.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in self.entries.iter() {
            map.serialize_entry(&k.to_string(), v)?;
        }
        map.end()
    }
}

impl TryFrom<&[u8]> for Fragments {
    type Error = Error;

    /// Decode with the default layout.
    fn try_from(data: &[u8]) -> Result<Self> {
        FragmentLayout::default().decode(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn block(count: i16, keys: &[i32], values: &[i16]) -> Vec<u8> {
        let mut data = count.to_ne_bytes().to_vec();
        for k in keys {
            data.extend_from_slice(&k.to_ne_bytes());
        }
        for v in values {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        data
    }

    #[test]
    fn zipped_pairs() {
        let data = block(2, &[10, 11], &[5, 7]);
        let fragments = FragmentLayout::default().decode(&data).unwrap();
        let expected: Fragments = vec![(10i32, 5i16), (11, 7)].into_iter().collect();
        assert_eq!(fragments, expected);
        assert_eq!(fragments.get(11), Some(Integer::from(7)));
        assert_eq!(fragments.total(), 12);
        assert_eq!(
            serde_json::to_value(&fragments).unwrap(),
            serde_json::json!({"10": 5, "11": 7})
        );
    }

    #[test]
    fn empty_block() {
        let fragments = Fragments::try_from(&block(0, &[], &[])[..]).unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn trailing_ignored() {
        let mut data = block(1, &[3], &[9]);
        data.extend_from_slice(&[0xff; 5]);
        let fragments = FragmentLayout::default().decode(&data).unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn short_blocks() {
        let layout = FragmentLayout::default();
        assert!(matches!(
            layout.decode(&[1]),
            Err(Error::LengthMismatch { expected: 2, actual: 1, .. })
        ));
        let mut data = block(2, &[10, 11], &[5, 7]);
        data.pop();
        match layout.decode(&data) {
            Err(Error::LengthMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 2 + 2 * 4 + 2 * 2);
                assert_eq!(actual, expected - 1);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn negative_count() {
        assert!(matches!(
            FragmentLayout::default().decode(&block(-1, &[], &[])),
            Err(Error::InvalidFragmentCount(-1))
        ));
    }

    #[test]
    fn duplicate_keys_replace() {
        let data = block(3, &[4, 5, 4], &[1, 2, 3]);
        let fragments = FragmentLayout::default().decode(&data).unwrap();
        let pairs: Vec<(i64, i64)> = fragments
            .iter()
            .map(|(k, v)| (k.as_i64().unwrap(), v.as_i64().unwrap()))
            .collect();
        assert_eq!(pairs, vec![(4, 3), (5, 2)]);
    }

    #[test]
    fn full_block() {
        let keys: Vec<i32> = (0..i32::from(i16::MAX)).collect();
        let values: Vec<i16> = (0..i16::MAX).collect();
        let data = block(i16::MAX, &keys, &values);
        let mut fragments = FragmentLayout::default().decode(&data).unwrap();
        assert_eq!(fragments.len(), i16::MAX as usize);
        assert_eq!(fragments.get(32766), Some(Integer::from(32766i16)));
        fragments.insert(0, 7);
        assert_eq!(fragments.len(), i16::MAX as usize);
        assert_eq!(fragments.iter().next(), Some((&Integer::from(0), &Integer::from(7))));
    }

    #[test]
    fn big_endian_layout() {
        let layout =
            FragmentLayout::new(ByteOrder::Big, TypeCode::U8, TypeCode::U16, TypeCode::U8).unwrap();
        let fragments = layout.decode(&[1, 0x01, 0x00, 9]).unwrap();
        assert_eq!(fragments.get(256u16), Some(Integer::from(9u8)));
        assert_eq!(layout.encode(&fragments).unwrap(), vec![1, 0x01, 0x00, 9]);
    }

    #[test]
    fn layout_from_json() {
        let layout: FragmentLayout = serde_json::from_str(
            r#"{"byte_order": "<", "count": "H", "keys": "I", "values": "B"}"#,
        )
        .unwrap();
        assert_eq!(
            layout,
            FragmentLayout::new(ByteOrder::Little, TypeCode::U16, TypeCode::U32, TypeCode::U8)
                .unwrap()
        );
        assert!(serde_json::from_str::<FragmentLayout>(
            r#"{"byte_order": "<", "count": "x", "keys": "I", "values": "B"}"#
        )
        .is_err());
    }

    #[test]
    fn non_integer_codes() {
        assert!(FragmentLayout::new(ByteOrder::Native, TypeCode::F32, TypeCode::I32, TypeCode::I16)
            .is_err());
        assert!(FragmentLayout::new(ByteOrder::Native, TypeCode::I16, TypeCode::Pad, TypeCode::I16)
            .is_err());
    }
}
