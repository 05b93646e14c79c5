//! Decoding raw bytes under a [`StructLayout`].

use byteorder::{BigEndian, LittleEndian, NativeEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::marker::{ByteOrder, TypeCode};
use crate::schema::StructLayout;
use crate::value::Value;

/// One named field pulled out of a record, in layout order.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedField<'a> {
    pub path: &'a [String],
    pub value: Value,
}

fn too_short(step: &'static str, expected: usize, actual: usize) -> Error {
    Error::LengthMismatch {
        step,
        expected,
        actual,
        exact: false,
    }
}

fn read_value<B: byteorder::ByteOrder>(
    buf: &mut &[u8],
    code: TypeCode,
    order: ByteOrder,
) -> std::io::Result<Value> {
    use self::TypeCode::*;
    Ok(match code {
        Char => Value::Char(buf.read_u8()?),
        I8 => Value::from(buf.read_i8()?),
        U8 => Value::from(buf.read_u8()?),
        Bool => Value::Bool(buf.read_u8()? != 0),
        I16 => Value::from(buf.read_i16::<B>()?),
        U16 => Value::from(buf.read_u16::<B>()?),
        I32 => Value::from(buf.read_i32::<B>()?),
        U32 => Value::from(buf.read_u32::<B>()?),
        Long if code.width(order) == 8 => Value::from(buf.read_i64::<B>()?),
        Long => Value::from(buf.read_i32::<B>()?),
        ULong if code.width(order) == 8 => Value::from(buf.read_u64::<B>()?),
        ULong => Value::from(buf.read_u32::<B>()?),
        I64 => Value::from(buf.read_i64::<B>()?),
        U64 => Value::from(buf.read_u64::<B>()?),
        F32 => Value::F32(buf.read_f32::<B>()?),
        F64 => Value::F64(buf.read_f64::<B>()?),
        Pad => unreachable!("pad fields are skipped before reading"),
    })
}

/// Read a single non-pad value from the front of `buf`, advancing it.
pub(crate) fn read_scalar(
    buf: &mut &[u8],
    code: TypeCode,
    order: ByteOrder,
    step: &'static str,
) -> Result<Value> {
    let width = code.width(order);
    let actual = buf.len();
    let res = match order {
        ByteOrder::NativeAligned | ByteOrder::Native => read_value::<NativeEndian>(buf, code, order),
        ByteOrder::Little => read_value::<LittleEndian>(buf, code, order),
        ByteOrder::Big | ByteOrder::Network => read_value::<BigEndian>(buf, code, order),
    };
    res.map_err(|_| too_short(step, width, actual))
}

/// Decode a record's named fields.
///
/// With `force_length` set, `data` must be exactly [`StructLayout::size`] bytes. Otherwise it must
/// be at least that long, and anything after the layout's end is left alone.
pub fn decode<'a>(
    layout: &'a StructLayout,
    data: &[u8],
    force_length: bool,
) -> Result<Vec<DecodedField<'a>>> {
    let size = layout.size();
    if (force_length && data.len() != size) || data.len() < size {
        return Err(Error::LengthMismatch {
            step: "decode struct",
            expected: size,
            actual: data.len(),
            exact: force_length,
        });
    }
    let data = &data[..size];

    let order = layout.byte_order();
    let mut out = Vec::with_capacity(layout.fields().len());
    for (field, offset) in layout.fields().iter().zip(layout.offsets().iter()) {
        if field.is_pad() {
            continue;
        }
        let mut buf = &data[*offset..];
        let value = read_scalar(&mut buf, field.code(), order, "decode field")?;
        out.push(DecodedField {
            path: field.path(),
            value,
        });
    }

    let expected = layout.named_count();
    if out.len() != expected {
        return Err(Error::DecodeArity {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}
