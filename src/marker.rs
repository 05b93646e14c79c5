use std::convert::TryFrom;
use std::fmt;

use serde::{
    de::{Deserialize, Deserializer, Error as DeError, Unexpected},
    ser::{Serialize, Serializer},
};

/// Byte order and alignment rule of a layout. This is the first line of every schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// `@`: native byte order, native sizes, native alignment.
    NativeAligned,
    /// `=`: native byte order, standard sizes, no alignment.
    Native,
    /// `<`: little-endian, standard sizes, no alignment.
    Little,
    /// `>`: big-endian, standard sizes, no alignment.
    Big,
    /// `!`: network order (big-endian), standard sizes, no alignment.
    Network,
}

impl ByteOrder {
    /// Construct a byte order from its schema symbol.
    pub fn from_char(c: char) -> Option<ByteOrder> {
        match c {
            '@' => Some(ByteOrder::NativeAligned),
            '=' => Some(ByteOrder::Native),
            '<' => Some(ByteOrder::Little),
            '>' => Some(ByteOrder::Big),
            '!' => Some(ByteOrder::Network),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ByteOrder::NativeAligned => '@',
            ByteOrder::Native => '=',
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::Network => '!',
        }
    }

    /// Whether fields are padded to their natural alignment.
    pub fn aligned(self) -> bool {
        matches!(self, ByteOrder::NativeAligned)
    }

    /// Whether native sizes are used instead of the standard ones.
    pub fn native_sizes(self) -> bool {
        matches!(self, ByteOrder::NativeAligned)
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Native
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Numeric class of a single field, given as one format character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// `x`: pad byte, produces no value.
    Pad,
    /// `c`: a single raw byte.
    Char,
    /// `b`
    I8,
    /// `B`
    U8,
    /// `?`
    Bool,
    /// `h`
    I16,
    /// `H`
    U16,
    /// `i`
    I32,
    /// `I`
    U32,
    /// `l`: C `long`. 4 bytes with standard sizes.
    Long,
    /// `L`: C `unsigned long`. 4 bytes with standard sizes.
    ULong,
    /// `q`
    I64,
    /// `Q`
    U64,
    /// `f`
    F32,
    /// `d`
    F64,
}

impl TypeCode {
    /// Construct a type code from its format character.
    pub fn from_char(c: char) -> Option<TypeCode> {
        use self::TypeCode::*;
        Some(match c {
            'x' => Pad,
            'c' => Char,
            'b' => I8,
            'B' => U8,
            '?' => Bool,
            'h' => I16,
            'H' => U16,
            'i' => I32,
            'I' => U32,
            'l' => Long,
            'L' => ULong,
            'q' => I64,
            'Q' => U64,
            'f' => F32,
            'd' => F64,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        use self::TypeCode::*;
        match self {
            Pad => 'x',
            Char => 'c',
            I8 => 'b',
            U8 => 'B',
            Bool => '?',
            I16 => 'h',
            U16 => 'H',
            I32 => 'i',
            U32 => 'I',
            Long => 'l',
            ULong => 'L',
            I64 => 'q',
            U64 => 'Q',
            F32 => 'f',
            F64 => 'd',
        }
    }

    /// Width in bytes of one element under the given byte order's size rule.
    pub fn width(self, order: ByteOrder) -> usize {
        use self::TypeCode::*;
        match self {
            Pad | Char | I8 | U8 | Bool => 1,
            I16 | U16 => 2,
            I32 | U32 | F32 => 4,
            Long | ULong => {
                if order.native_sizes() {
                    std::mem::size_of::<std::os::raw::c_long>()
                } else {
                    4
                }
            }
            I64 | U64 | F64 => 8,
        }
    }

    /// Alignment of one element under the given byte order. Pads are never aligned.
    pub fn alignment(self, order: ByteOrder) -> usize {
        if order.aligned() && self != TypeCode::Pad {
            self.width(order)
        } else {
            1
        }
    }

    pub fn is_integer(self) -> bool {
        use self::TypeCode::*;
        matches!(
            self,
            I8 | U8 | I16 | U16 | I32 | U32 | Long | ULong | I64 | U64
        )
    }

    pub fn is_signed(self) -> bool {
        use self::TypeCode::*;
        matches!(self, I8 | I16 | I32 | Long | I64)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for ByteOrder {
    type Error = char;
    fn try_from(c: char) -> Result<Self, char> {
        ByteOrder::from_char(c).ok_or(c)
    }
}

impl TryFrom<char> for TypeCode {
    type Error = char;
    fn try_from(c: char) -> Result<Self, char> {
        TypeCode::from_char(c).ok_or(c)
    }
}

/// Pull the single character out of a one-character string.
fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl Serialize for ByteOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

impl<'de> Deserialize<'de> for ByteOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        single_char(&s)
            .and_then(ByteOrder::from_char)
            .ok_or_else(|| D::Error::invalid_value(Unexpected::Str(&s), &"one of @ = < > !"))
    }
}

impl Serialize for TypeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

impl<'de> Deserialize<'de> for TypeCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        single_char(&s)
            .and_then(TypeCode::from_char)
            .ok_or_else(|| D::Error::invalid_value(Unexpected::Str(&s), &"a struct type code"))
    }
}
