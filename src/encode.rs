//! Writing a record tree back out under a [`StructLayout`].

use std::convert::TryFrom;
use std::io;

use byteorder::{BigEndian, LittleEndian, NativeEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::integer::Integer;
use crate::marker::{ByteOrder, TypeCode};
use crate::record::Record;
use crate::schema::StructLayout;
use crate::value::Value;

fn int<T: TryFrom<Integer>>(value: &Value) -> Option<T> {
    value.as_int().and_then(|v| T::try_from(v).ok())
}

fn float32(value: &Value) -> Option<f32> {
    match *value {
        Value::F32(v) => Some(v),
        Value::F64(v) if !v.is_finite() || v.abs() <= f32::MAX as f64 => Some(v as f32),
        _ => None,
    }
}

// `None` means the value doesn't fit the code.
fn write_value<B: byteorder::ByteOrder>(
    out: &mut Vec<u8>,
    value: &Value,
    code: TypeCode,
    order: ByteOrder,
) -> Option<io::Result<()>> {
    use self::TypeCode::*;
    Some(match (code, value) {
        (Char, Value::Char(c)) => out.write_u8(*c),
        (Bool, Value::Bool(b)) => out.write_u8(*b as u8),
        (I8, _) => out.write_i8(int(value)?),
        (U8, _) => out.write_u8(int(value)?),
        (I16, _) => out.write_i16::<B>(int(value)?),
        (U16, _) => out.write_u16::<B>(int(value)?),
        (I32, _) => out.write_i32::<B>(int(value)?),
        (U32, _) => out.write_u32::<B>(int(value)?),
        (Long, _) if code.width(order) == 8 => out.write_i64::<B>(int(value)?),
        (Long, _) => out.write_i32::<B>(int(value)?),
        (ULong, _) if code.width(order) == 8 => out.write_u64::<B>(int(value)?),
        (ULong, _) => out.write_u32::<B>(int(value)?),
        (I64, _) => out.write_i64::<B>(int(value)?),
        (U64, _) => out.write_u64::<B>(int(value)?),
        (F32, _) => out.write_f32::<B>(float32(value)?),
        (F64, _) => out.write_f64::<B>(value.as_f64()?),
        _ => return None,
    })
}

/// Append a single non-pad value. `path` names the value in the error if it doesn't fit.
pub(crate) fn write_scalar(
    out: &mut Vec<u8>,
    value: &Value,
    code: TypeCode,
    order: ByteOrder,
    path: &str,
) -> Result<()> {
    let res = match order {
        ByteOrder::NativeAligned | ByteOrder::Native => {
            write_value::<NativeEndian>(out, value, code, order)
        }
        ByteOrder::Little => write_value::<LittleEndian>(out, value, code, order),
        ByteOrder::Big | ByteOrder::Network => write_value::<BigEndian>(out, value, code, order),
    };
    match res {
        Some(res) => Ok(res?),
        None => Err(Error::ValueOutOfRange {
            path: path.to_string(),
            code: code.as_char(),
        }),
    }
}

/// Encode a record tree into exactly [`StructLayout::size`] bytes.
///
/// Every named field is looked up in `record` by its path. Pads and alignment gaps are written
/// as zeros.
pub fn encode(layout: &StructLayout, record: &Record) -> Result<Vec<u8>> {
    let order = layout.byte_order();
    let mut out = Vec::with_capacity(layout.size());
    for (field, offset) in layout.fields().iter().zip(layout.offsets().iter()) {
        out.resize(*offset, 0);
        if field.is_pad() {
            out.resize(offset + field.width(order), 0);
            continue;
        }
        let value = record.get_leaf(field.path())?;
        write_scalar(&mut out, value, field.code(), order, &field.name())?;
    }
    out.resize(layout.size(), 0);
    Ok(out)
}
