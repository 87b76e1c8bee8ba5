//! Byte layouts for the accounts this crate reads and writes.
//!
//! Every record is described by a [`Layout`]: a discriminator prefix followed
//! by a table of typed fields. A single cursor-based routine decodes any
//! layout into [`Fields`], and the record types convert from those. Integers
//! are little-endian, addresses are 32 raw bytes, optional values carry a one
//! byte presence flag and strings are length-prefixed and null padded to a
//! fixed capacity.

use solana_sdk::pubkey::{Pubkey, PUBKEY_BYTES};

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    Bool,
    U16,
    U32,
    U64,
    I64,
    Pubkey,
    /// u32 length prefix followed by exactly that many bytes
    String,
    /// u32 length prefix followed by the string padded with nulls to `capacity`
    PaddedString(usize),
    /// One byte flag, payload present only when the flag is 1
    Option(&'static FieldKind),
    /// u32 element count followed by that many structs
    Vec(&'static [Field]),
    /// Fields laid out inline
    Struct(&'static [Field]),
}

impl FieldKind {
    /// Fewest bytes a value of this kind can occupy
    pub const fn min_width(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::Bool => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 | FieldKind::I64 => 8,
            FieldKind::Pubkey => PUBKEY_BYTES,
            FieldKind::String => 4,
            FieldKind::PaddedString(capacity) => 4 + *capacity,
            FieldKind::Option(_) => 1,
            FieldKind::Vec(_) => 4,
            FieldKind::Struct(fields) => {
                let mut size = 0;
                let mut i = 0;
                while i < fields.len() {
                    size += fields[i].kind.min_width();
                    i += 1;
                }
                size
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    pub version: u16,
    pub discriminator: &'static [u8],
    pub fields: &'static [Field],
}

impl Layout {
    pub const fn min_size(&self) -> usize {
        let mut size = self.discriminator.len();
        let mut i = 0;
        while i < self.fields.len() {
            size += self.fields[i].kind.min_width();
            i += 1;
        }
        size
    }

    /// Byte offset of `name` assuming every optional before it is absent.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = self.discriminator.len();
        for field in self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += field.kind.min_width();
        }
        None
    }

    pub fn decode(&self, data: &[u8]) -> Result<Fields, DecodeError> {
        if data.len() < self.min_size() {
            return Err(DecodeError::Truncated {
                layout: self.name,
                needed: self.min_size(),
                actual: data.len(),
            });
        }
        let (discriminator, rest) = data.split_at(self.discriminator.len());
        if discriminator != self.discriminator {
            return Err(DecodeError::DiscriminatorMismatch {
                layout: self.name,
                actual: discriminator.to_vec(),
            });
        }
        let mut cursor = Cursor {
            layout: self.name,
            data: rest,
        };
        cursor.read_struct(self.fields)
    }

    pub fn encode(&self, fields: &Fields) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(self.min_size());
        out.extend_from_slice(self.discriminator);
        write_struct(self.name, self.fields, fields, &mut out)?;
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    Bool(bool),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Pubkey(Pubkey),
    Str(String),
    Option(Option<Box<Value>>),
    List(Vec<Fields>),
    Struct(Fields),
}

/// Decoded field values in layout order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(&'static str, Value)>);

macro_rules! getter {
    ($fn:ident, $variant:ident, $ty:ty) => {
        pub fn $fn(&self, name: &'static str) -> Result<$ty, DecodeError> {
            match self.get(name)? {
                Value::$variant(value) => Ok(value.clone()),
                other => Err(DecodeError::invalid(name, format!("unexpected {other:?}"))),
            }
        }
    };
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.0.push((name, value));
        self
    }

    pub fn get(&self, name: &'static str) -> Result<&Value, DecodeError> {
        self.0
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| DecodeError::invalid(name, "missing field"))
    }

    getter!(u8, U8, u8);
    getter!(bool, Bool, bool);
    getter!(u16, U16, u16);
    getter!(u64, U64, u64);
    getter!(i64, I64, i64);
    getter!(pubkey, Pubkey, Pubkey);
    getter!(string, Str, String);
    getter!(list, List, Vec<Fields>);

    pub fn option_i64(&self, name: &'static str) -> Result<Option<i64>, DecodeError> {
        match self.get(name)? {
            Value::Option(None) => Ok(None),
            Value::Option(Some(value)) => match value.as_ref() {
                Value::I64(value) => Ok(Some(*value)),
                other => Err(DecodeError::invalid(name, format!("unexpected {other:?}"))),
            },
            other => Err(DecodeError::invalid(name, format!("unexpected {other:?}"))),
        }
    }

    pub fn option_list(&self, name: &'static str) -> Result<Option<Vec<Fields>>, DecodeError> {
        match self.get(name)? {
            Value::Option(None) => Ok(None),
            Value::Option(Some(value)) => match value.as_ref() {
                Value::List(items) => Ok(Some(items.clone())),
                other => Err(DecodeError::invalid(name, format!("unexpected {other:?}"))),
            },
            other => Err(DecodeError::invalid(name, format!("unexpected {other:?}"))),
        }
    }
}

struct Cursor<'a> {
    layout: &'static str,
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < len {
            return Err(DecodeError::Truncated {
                layout: self.layout,
                needed: len,
                actual: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_flag(&mut self, name: &'static str) -> Result<bool, DecodeError> {
        match self.take_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::invalid(name, format!("flag byte {other}"))),
        }
    }

    fn read_struct(&mut self, fields: &'static [Field]) -> Result<Fields, DecodeError> {
        let mut out = Fields::new();
        for field in fields {
            let value = self.read(field.name, &field.kind)?;
            out = out.with(field.name, value);
        }
        Ok(out)
    }

    fn read(&mut self, name: &'static str, kind: &FieldKind) -> Result<Value, DecodeError> {
        Ok(match kind {
            FieldKind::U8 => Value::U8(self.take_array::<1>()?[0]),
            FieldKind::Bool => Value::Bool(self.read_flag(name)?),
            FieldKind::U16 => Value::U16(u16::from_le_bytes(self.take_array()?)),
            FieldKind::U32 => Value::U32(u32::from_le_bytes(self.take_array()?)),
            FieldKind::U64 => Value::U64(u64::from_le_bytes(self.take_array()?)),
            FieldKind::I64 => Value::I64(i64::from_le_bytes(self.take_array()?)),
            FieldKind::Pubkey => Value::Pubkey(Pubkey::new_from_array(self.take_array()?)),
            FieldKind::String | FieldKind::PaddedString(_) => {
                let len = u32::from_le_bytes(self.take_array()?) as usize;
                let bytes = self.take(len)?;
                let trimmed = match bytes.iter().rposition(|b| *b != 0) {
                    Some(last) => &bytes[..=last],
                    None => &[],
                };
                let value = std::str::from_utf8(trimmed)
                    .map_err(|_| DecodeError::InvalidUtf8 { field: name })?;
                Value::Str(value.to_string())
            }
            FieldKind::Option(inner) => {
                if self.read_flag(name)? {
                    Value::Option(Some(Box::new(self.read(name, inner)?)))
                } else {
                    Value::Option(None)
                }
            }
            FieldKind::Vec(fields) => {
                let len = u32::from_le_bytes(self.take_array()?) as usize;
                let min_item: usize = fields.iter().map(|f| f.kind.min_width()).sum();
                if self.data.len() < len.saturating_mul(min_item) {
                    return Err(DecodeError::Truncated {
                        layout: self.layout,
                        needed: len.saturating_mul(min_item),
                        actual: self.data.len(),
                    });
                }
                let items = (0..len)
                    .map(|_| self.read_struct(*fields))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(items)
            }
            FieldKind::Struct(fields) => Value::Struct(self.read_struct(*fields)?),
        })
    }
}

fn write_struct(
    layout: &'static str,
    kinds: &'static [Field],
    fields: &Fields,
    out: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    for field in kinds {
        write_value(layout, field.name, &field.kind, fields.get(field.name)?, out)?;
    }
    Ok(())
}

fn write_value(
    layout: &'static str,
    name: &'static str,
    kind: &FieldKind,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    match (kind, value) {
        (FieldKind::U8, Value::U8(v)) => out.push(*v),
        (FieldKind::Bool, Value::Bool(v)) => out.push(*v as u8),
        (FieldKind::U16, Value::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::U32, Value::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::U64, Value::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::I64, Value::I64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::Pubkey, Value::Pubkey(v)) => out.extend_from_slice(v.as_ref()),
        (FieldKind::String, Value::Str(v)) => {
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
        (FieldKind::PaddedString(capacity), Value::Str(v)) => {
            if v.len() > *capacity {
                return Err(DecodeError::invalid(
                    name,
                    format!("{} bytes exceeds capacity {capacity}", v.len()),
                ));
            }
            out.extend_from_slice(&(*capacity as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
            out.resize(out.len() + capacity - v.len(), 0);
        }
        (FieldKind::Option(_), Value::Option(None)) => out.push(0),
        (FieldKind::Option(inner), Value::Option(Some(v))) => {
            out.push(1);
            write_value(layout, name, inner, v, out)?;
        }
        (FieldKind::Vec(item_fields), Value::List(items)) => {
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                write_struct(layout, *item_fields, item, out)?;
            }
        }
        (FieldKind::Struct(item_fields), Value::Struct(item)) => {
            write_struct(layout, *item_fields, item, out)?;
        }
        (kind, value) => {
            return Err(DecodeError::invalid(
                name,
                format!("{value:?} does not fit {kind:?} in {layout}"),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &[Field] = &[
        Field::new("key", FieldKind::Pubkey),
        Field::new("weight", FieldKind::U8),
    ];
    const SAMPLE: Layout = Layout {
        name: "Sample",
        version: 1,
        discriminator: &[9, 9],
        fields: &[
            Field::new("amount", FieldKind::U64),
            Field::new("deadline", FieldKind::Option(&FieldKind::I64)),
            Field::new("label", FieldKind::PaddedString(8)),
            Field::new("items", FieldKind::Option(&FieldKind::Vec(ITEM))),
            Field::new("flag", FieldKind::Bool),
        ],
    };
    const ITEM_KEY: Pubkey = Pubkey::new_from_array([7; 32]);

    fn sample(deadline: Option<i64>) -> Fields {
        Fields::new()
            .with("amount", Value::U64(42))
            .with(
                "deadline",
                Value::Option(deadline.map(|d| Box::new(Value::I64(d)))),
            )
            .with("label", Value::Str("abc".to_string()))
            .with(
                "items",
                Value::Option(Some(Box::new(Value::List(vec![Fields::new()
                    .with("key", Value::Pubkey(ITEM_KEY))
                    .with("weight", Value::U8(100))])))),
            )
            .with("flag", Value::Bool(true))
    }

    #[test]
    fn min_size_counts_minimum_widths() {
        // 2 + 8 + 1 + (4 + 8) + 1 + 1
        assert_eq!(SAMPLE.min_size(), 25);
        assert_eq!(SAMPLE.offset_of("label"), Some(11));
        assert_eq!(SAMPLE.offset_of("nope"), None);
    }

    #[test]
    fn optional_payload_only_consumed_when_present() {
        let without = SAMPLE.encode(&sample(None)).unwrap();
        let with = SAMPLE.encode(&sample(Some(-5))).unwrap();
        assert_eq!(with.len(), without.len() + 8);
        assert_eq!(SAMPLE.decode(&without).unwrap(), sample(None));
        assert_eq!(SAMPLE.decode(&with).unwrap(), sample(Some(-5)));
    }

    #[test]
    fn strings_are_padded_and_trimmed() {
        let bytes = SAMPLE.encode(&sample(None)).unwrap();
        let label = SAMPLE.offset_of("label").unwrap();
        assert_eq!(&bytes[label..label + 4], &8u32.to_le_bytes());
        assert_eq!(&bytes[label + 4..label + 12], b"abc\0\0\0\0\0");
        assert_eq!(SAMPLE.decode(&bytes).unwrap().string("label").unwrap(), "abc");
    }

    #[test]
    fn short_buffer_is_truncated() {
        let bytes = SAMPLE.encode(&sample(Some(1))).unwrap();
        assert!(matches!(
            SAMPLE.decode(&bytes[..10]),
            Err(DecodeError::Truncated { needed: 25, actual: 10, .. })
        ));
        // long enough for the minimum but the present optional and list run off the end
        assert!(matches!(
            SAMPLE.decode(&bytes[..bytes.len() - 3]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn wrong_discriminator_is_rejected() {
        let mut bytes = SAMPLE.encode(&sample(None)).unwrap();
        bytes[0] = 1;
        assert!(matches!(
            SAMPLE.decode(&bytes),
            Err(DecodeError::DiscriminatorMismatch { .. })
        ));
    }

    #[test]
    fn invalid_flag_and_utf8_are_rejected() {
        let mut bytes = SAMPLE.encode(&sample(None)).unwrap();
        bytes[10] = 7;
        assert!(matches!(
            SAMPLE.decode(&bytes),
            Err(DecodeError::InvalidValue { field: "deadline", .. })
        ));

        let mut bytes = SAMPLE.encode(&sample(None)).unwrap();
        let label = SAMPLE.offset_of("label").unwrap() + 4;
        bytes[label] = 0xff;
        assert!(matches!(
            SAMPLE.decode(&bytes),
            Err(DecodeError::InvalidUtf8 { field: "label" })
        ));
    }

    #[test]
    fn encode_rejects_oversized_string() {
        let fields = Fields::new()
            .with("amount", Value::U64(1))
            .with("deadline", Value::Option(None))
            .with("label", Value::Str("far too long".to_string()))
            .with("items", Value::Option(None))
            .with("flag", Value::Bool(false));
        assert!(matches!(
            SAMPLE.encode(&fields),
            Err(DecodeError::InvalidValue { field: "label", .. })
        ));
    }
}
