use std::fmt;

use serde::ser::{Serialize, Serializer};

use crate::integer::Integer;

/// A single decoded field value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(Integer),
    Bool(bool),
    /// A raw byte from a `c` field.
    Char(u8),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn as_int(&self) -> Option<Integer> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|v| v.as_i64())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(|v| v.as_u64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(ref v) => fmt::Display::fmt(v, f),
            Value::Bool(v) => fmt::Display::fmt(&v, f),
            Value::Char(v) => write!(f, "{:?}", v as char),
            Value::F32(v) => fmt::Display::fmt(&v, f),
            Value::F64(v) => fmt::Display::fmt(&v, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Int(ref v) => v.serialize(serializer),
            Value::Bool(v) => serializer.serialize_bool(v),
            Value::Char(v) => serializer.serialize_u8(v),
            Value::F32(v) => serializer.serialize_f32(v),
            Value::F64(v) => serializer.serialize_f64(v),
        }
    }
}

macro_rules! impl_value_from_int {
    ($($t: ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(Integer::from(v))
                }
            }
        )*
    };
}

impl_value_from_int!(u8, u16, u32, u64, i8, i16, i32, i64, Integer);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accessors() {
        let v = Value::from(-4i16);
        assert!(v.is_int());
        assert_eq!(v.as_i64(), Some(-4));
        assert_eq!(v.as_u64(), None);
        assert_eq!(Value::from(2.5f32).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Char(b'a').as_int(), None);
    }

    #[test]
    fn serializes_bare() {
        let json = serde_json::to_string(&vec![
            Value::from(26i32),
            Value::Bool(false),
            Value::Char(b'A'),
            Value::from(0.5f64),
        ])
        .unwrap();
        assert_eq!(json, "[26,false,65,0.5]");
    }
}
