/*!

Structure definition schemas.

A schema describes one fixed-layout binary record. The first line holds the byte order symbol,
and every following line declares either a named field or a run of pad bytes:

```text
=
b	tankdata/version
l	tankdata/creationTime
6x
h	series/sniperSeries
H	fragspos
```

- The byte order symbol is one of `@` (native, aligned), `=` (native, standard sizes), `<`
  (little-endian), `>` (big-endian), or `!` (network).
- A named field is a type code, a tab, and a name. The name may be split into nested segments
  with `/`, which is how the decoded record becomes a tree.
- A pad declaration stands alone on its line: an optional repeat count followed by `x`. Pad bytes
  are skipped when decoding and produce no value.
- Blank lines are ignored.

Compiled layouts are immutable. Their size is fixed by the type codes and the byte order's size
and alignment rule.

*/

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::marker::{ByteOrder, TypeCode};

/// Separator between the segments of a field name.
pub const PATH_SEPARATOR: char = '/';

/// Tab-separated columns a schema line may have at most.
const MAX_COLUMNS: usize = 2;

struct Patterns {
    pad: Regex,
    name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        pad: Regex::new(r"^(\d*)x$").expect("pad pattern is valid"),
        name: Regex::new(r"^[^/\s]+(/[^/\s]+)*$").expect("name pattern is valid"),
    })
}

/// One line of a schema: either a named field or a run of pad bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    code: TypeCode,
    repeat: usize,
    path: Vec<String>,
}

impl FieldSpec {
    /// A run of `count` pad bytes.
    pub fn pad(count: usize) -> Self {
        Self {
            code: TypeCode::Pad,
            repeat: count,
            path: Vec::new(),
        }
    }

    /// A named field. The path must not be empty, and the code may not be a pad.
    pub fn named<S: Into<String>>(code: TypeCode, path: impl IntoIterator<Item = S>) -> Self {
        Self {
            code,
            repeat: 1,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn code(&self) -> TypeCode {
        self.code
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// The name segments of this field. Empty for pads.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn is_pad(&self) -> bool {
        self.code == TypeCode::Pad
    }

    /// The field's name as written in the schema, with segments joined by `/`.
    pub fn name(&self) -> String {
        self.path.join("/")
    }

    /// Number of bytes this field occupies, not counting alignment. Saturates at `usize::MAX`.
    pub fn width(&self, order: ByteOrder) -> usize {
        self.code.width(order).saturating_mul(self.repeat)
    }

    fn format_fragment(&self) -> String {
        if self.is_pad() && self.repeat != 1 {
            format!("{}x", self.repeat)
        } else {
            self.code.as_char().to_string()
        }
    }
}

/// A compiled schema: the byte order plus the ordered field declarations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructLayout {
    byte_order: ByteOrder,
    fields: Vec<FieldSpec>,
    offsets: Vec<usize>,
    size: usize,
}

impl StructLayout {
    /// Build a layout from already-parsed fields.
    pub fn new(byte_order: ByteOrder, fields: Vec<FieldSpec>) -> Result<Self> {
        for (index, field) in fields.iter().enumerate() {
            let bad = if field.is_pad() {
                !field.path.is_empty()
            } else {
                field.path.is_empty() || field.path.iter().any(|s| s.is_empty()) || field.repeat != 1
            };
            if bad {
                return Err(Error::SchemaSyntax {
                    line: index + 2,
                    text: field.format_fragment(),
                });
            }
        }

        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for (index, field) in fields.iter().enumerate() {
            let align = field.code.alignment(byte_order);
            let start = offset
                .checked_add(align - 1)
                .map(|end| end / align * align);
            let end = start.and_then(|start| {
                field
                    .code
                    .width(byte_order)
                    .checked_mul(field.repeat)
                    .and_then(|width| start.checked_add(width))
                    .map(|end| (start, end))
            });
            let (start, end) = end.ok_or_else(|| Error::SchemaSyntax {
                line: index + 2,
                text: field.format_fragment(),
            })?;
            offsets.push(start);
            offset = end;
        }

        Ok(Self {
            byte_order,
            fields,
            offsets,
            size: offset,
        })
    }

    /// Compile schema text into a layout.
    pub fn compile(text: &str) -> Result<Self> {
        let patterns = patterns();
        let mut lines = text.lines();

        let symbol = lines
            .next()
            .map(str::trim)
            .ok_or_else(|| Error::InvalidByteOrder(String::new()))?;
        let byte_order = {
            let mut chars = symbol.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ByteOrder::from_char(c),
                _ => None,
            }
        }
        .ok_or_else(|| Error::InvalidByteOrder(symbol.to_string()))?;

        let mut fields = Vec::new();
        for (index, raw) in lines.enumerate() {
            let line = index + 2;
            if raw.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = raw.split('\t').map(str::trim).collect();
            if columns.len() > MAX_COLUMNS {
                return Err(Error::SchemaSyntax {
                    line,
                    text: raw.to_string(),
                });
            }

            if columns.len() == 1 {
                let caps = patterns.pad.captures(columns[0]).ok_or_else(|| {
                    Error::SchemaSyntax {
                        line,
                        text: raw.to_string(),
                    }
                })?;
                let count = match caps.get(1).map(|m| m.as_str()) {
                    None | Some("") => 1,
                    Some(digits) => digits.parse().map_err(|_| Error::SchemaSyntax {
                        line,
                        text: raw.to_string(),
                    })?,
                };
                fields.push(FieldSpec::pad(count));
                continue;
            }

            let (code, name) = (columns[0], columns[1]);
            let code = {
                let mut chars = code.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => TypeCode::from_char(c),
                    _ => None,
                }
            }
            .ok_or_else(|| Error::UnknownTypeCode {
                line,
                code: code.to_string(),
            })?;
            if code == TypeCode::Pad || !patterns.name.is_match(name) {
                return Err(Error::SchemaSyntax {
                    line,
                    text: raw.to_string(),
                });
            }
            fields.push(FieldSpec::named(code, name.split(PATH_SEPARATOR)));
        }

        let layout = Self::new(byte_order, fields)?;
        tracing::trace!(
            format = %layout.format_string(),
            size = layout.size,
            "compiled struct layout"
        );
        Ok(layout)
    }

    /// Read and compile a schema file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::compile(&text)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// All field declarations, pads included, in order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The fields that produce values, in order.
    pub fn named_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_pad())
    }

    pub fn named_count(&self) -> usize {
        self.named_fields().count()
    }

    /// Total number of bytes a record under this layout occupies.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offsets of each field, pads included, matching [`fields`](Self::fields).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The byte order symbol followed by every type code in order, e.g. `=i6xh`.
    pub fn format_string(&self) -> String {
        let mut s = String::with_capacity(self.fields.len() + 1);
        s.push(self.byte_order.as_char());
        for field in self.fields.iter() {
            s.push_str(&field.format_fragment());
        }
        s
    }
}

impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.byte_order)?;
        for field in self.fields.iter() {
            if field.is_pad() {
                writeln!(f, "{}x", field.repeat)?;
            } else {
                writeln!(f, "{}\t{}", field.code, field.name())?;
            }
        }
        Ok(())
    }
}
