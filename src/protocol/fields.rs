//! Table-driven field layouts for command bodies.
//!
//! Each command kind owns a list of [`VersionedLayout`]s. A layout is
//! resolved once for the negotiated [`ProtocolVersion`] and then applied
//! generically: [`Layout::decode`] turns body bytes into [`FieldValues`],
//! [`Layout::encode`] turns [`FieldValues`] back into bytes, checking every
//! value against its wire encoding first.
//!
//! All multi-byte fields are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::{Error, ProtocolVersion, Result};

/// Integer width used by scaled and flag encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    I16,
    U32,
    I32,
}

impl Width {
    fn size(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 | Width::I16 => 2,
            Width::U32 | Width::I32 => 4,
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            Width::U8 => (0, u8::MAX as i64),
            Width::U16 => (0, u16::MAX as i64),
            Width::I16 => (i16::MIN as i64, i16::MAX as i64),
            Width::U32 => (0, u32::MAX as i64),
            Width::I32 => (i32::MIN as i64, i32::MAX as i64),
        }
    }

    fn read(self, mut src: &[u8]) -> i64 {
        match self {
            Width::U8 => src.get_u8() as i64,
            Width::U16 => src.get_u16() as i64,
            Width::I16 => src.get_i16() as i64,
            Width::U32 => src.get_u32() as i64,
            Width::I32 => src.get_i32() as i64,
        }
    }

    fn write(self, mut dst: &mut [u8], value: i64) {
        match self {
            Width::U8 => dst.put_u8(value as u8),
            Width::U16 => dst.put_u16(value as u16),
            Width::I16 => dst.put_i16(value as i16),
            Width::U32 => dst.put_u32(value as u32),
            Width::I32 => dst.put_i32(value as i32),
        }
    }
}

/// Wire encoding of a single field
#[derive(Debug, Clone, Copy)]
pub enum Wire {
    /// Plain integer
    Int(Width),
    /// One byte, non-zero is true
    Bool,
    /// IEEE 754 single precision
    F32,
    /// Fixed-point value: `wire = round(value * scale)`, value limited to `min..=max`
    Scaled {
        width: Width,
        scale: f64,
        min: f64,
        max: f64,
    },
    /// NUL-padded ASCII of fixed length
    Ascii(usize),
    /// Bit mask
    Flags(Width),
    /// `u16` count followed by `count` sub-records of `stride` bytes. Must be
    /// the last field of its layout.
    Records {
        stride: usize,
        fields: &'static [Field],
    },
}

impl Wire {
    pub const U8: Wire = Wire::Int(Width::U8);
    pub const U16: Wire = Wire::Int(Width::U16);
    pub const I16: Wire = Wire::Int(Width::I16);
    pub const U32: Wire = Wire::Int(Width::U32);
    pub const I32: Wire = Wire::Int(Width::I32);

    /// Fixed size at the field offset
    fn size(&self) -> usize {
        match self {
            Wire::Int(width) | Wire::Flags(width) => width.size(),
            Wire::Scaled { width, .. } => width.size(),
            Wire::Bool => 1,
            Wire::F32 => 4,
            Wire::Ascii(len) => *len,
            Wire::Records { .. } => 2,
        }
    }
}

/// A named field at a fixed byte offset
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub wire: Wire,
    /// Trailing field that older firmware may omit
    pub optional: bool,
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, wire: Wire) -> Self {
        Field {
            name,
            offset,
            wire,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, offset: usize, wire: Wire) -> Self {
        Field {
            name,
            offset,
            wire,
            optional: true,
        }
    }

    pub(crate) fn end(&self) -> usize {
        self.offset + self.wire.size()
    }
}

/// Shorthand for a scaled field
pub const fn scaled(width: Width, scale: f64, min: f64, max: f64) -> Wire {
    Wire::Scaled {
        width,
        scale,
        min,
        max,
    }
}

/// Body layout for one version range of a command
#[derive(Debug)]
pub struct Layout {
    /// Full encoded length of the fixed part, padding included
    pub len: usize,
    pub fields: &'static [Field],
}

/// Layout valid from `since` until the next entry's `since`
#[derive(Debug)]
pub struct VersionedLayout {
    pub since: ProtocolVersion,
    pub layout: &'static Layout,
}

/// Picks the layout in effect for `version`. Versions older than every entry
/// use the oldest layout.
pub fn resolve(table: &'static [VersionedLayout], version: ProtocolVersion) -> Result<&'static Layout> {
    let first = table
        .first()
        .ok_or_else(|| Error::framing("command has no field table"))?;
    Ok(table
        .iter()
        .rev()
        .find(|entry| entry.since <= version)
        .unwrap_or(first)
        .layout)
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Records(Vec<FieldValues>),
}

/// Field values keyed by name, in layout order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldValues {
    values: Vec<(&'static str, Value)>,
}

impl FieldValues {
    pub fn new() -> Self {
        FieldValues::default()
    }

    fn push(mut self, name: &'static str, value: Value) -> Self {
        self.values.push((name, value));
        self
    }

    pub fn int(self, name: &'static str, value: impl Into<i64>) -> Self {
        self.push(name, Value::Int(value.into()))
    }

    pub fn float(self, name: &'static str, value: f64) -> Self {
        self.push(name, Value::Float(value))
    }

    pub fn boolean(self, name: &'static str, value: bool) -> Self {
        self.push(name, Value::Bool(value))
    }

    pub fn text(self, name: &'static str, value: impl Into<String>) -> Self {
        self.push(name, Value::Text(value.into()))
    }

    pub fn records(self, name: &'static str, value: Vec<FieldValues>) -> Self {
        self.push(name, Value::Records(value))
    }

    /// Adds the value only when present
    pub fn maybe_int(self, name: &'static str, value: Option<impl Into<i64>>) -> Self {
        match value {
            Some(v) => self.int(name, v),
            None => self,
        }
    }

    pub fn maybe_float(self, name: &'static str, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.float(name, v),
            None => self,
        }
    }

    pub fn maybe_boolean(self, name: &'static str, value: Option<bool>) -> Self {
        match value {
            Some(v) => self.boolean(name, v),
            None => self,
        }
    }

    /// Drops a value the target layout does not carry
    pub fn without(mut self, name: &str) -> Self {
        self.values.retain(|(n, _)| *n != name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| Error::framing(format!("missing field {}", name)))
    }

    fn integer<T: TryFrom<i64>>(&self, name: &str) -> Result<T> {
        match self.require(name)? {
            Value::Int(v) => T::try_from(*v)
                .map_err(|_| Error::framing(format!("field {} value {} out of range", name, v))),
            other => Err(Error::framing(format!("field {} is not an integer: {:?}", name, other))),
        }
    }

    pub fn u8(&self, name: &str) -> Result<u8> {
        self.integer(name)
    }

    pub fn u16(&self, name: &str) -> Result<u16> {
        self.integer(name)
    }

    pub fn i16(&self, name: &str) -> Result<i16> {
        self.integer(name)
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        self.integer(name)
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            Value::Bool(v) => Ok(*v),
            other => Err(Error::framing(format!("field {} is not a bool: {:?}", name, other))),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            other => Err(Error::framing(format!("field {} is not a float: {:?}", name, other))),
        }
    }

    pub fn string(&self, name: &str) -> Result<String> {
        match self.require(name)? {
            Value::Text(v) => Ok(v.clone()),
            other => Err(Error::framing(format!("field {} is not text: {:?}", name, other))),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[FieldValues]> {
        match self.require(name)? {
            Value::Records(v) => Ok(v),
            other => Err(Error::framing(format!("field {} is not a record list: {:?}", name, other))),
        }
    }

    pub fn opt_u8(&self, name: &str) -> Result<Option<u8>> {
        match self.get(name) {
            Some(_) => self.u8(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            Some(_) => self.bool(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name) {
            Some(_) => self.f64(name).map(Some),
            None => Ok(None),
        }
    }
}

impl Layout {
    /// Minimum body length: the end of the last required field
    pub fn min_len(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| !f.optional)
            .map(Field::end)
            .max()
            .unwrap_or(0)
    }

    /// Decodes a body. Optional trailing fields are left out of the result
    /// when the body stops before them.
    pub fn decode(&self, body: &[u8]) -> Result<FieldValues> {
        decode_fields(self.fields, body)
    }

    /// Encodes values. Optional fields with no value shorten the body to
    /// [`Layout::min_len`]; a missing required field, or a value this
    /// layout has no field for, is an encoding error.
    pub fn encode(&self, values: &FieldValues) -> Result<Bytes> {
        check_carried(self.fields, values)?;
        let mut dst = BytesMut::zeroed(self.len);
        let mut truncate = false;
        let mut tail = BytesMut::new();

        for field in self.fields {
            let value = match values.get(field.name) {
                Some(v) => v,
                None if field.optional => {
                    truncate = true;
                    continue;
                }
                None => {
                    return Err(Error::encoding(format!(
                        "field {} is required by this protocol version",
                        field.name
                    )))
                }
            };
            if let Wire::Records { stride, fields } = field.wire {
                let Value::Records(items) = value else {
                    return Err(Error::encoding(format!("field {} expects records", field.name)));
                };
                if items.len() > u16::MAX as usize {
                    return Err(Error::encoding(format!("too many {} records", field.name)));
                }
                Width::U16.write(&mut dst[field.offset..], items.len() as i64);
                for item in items {
                    check_carried(fields, item)?;
                    let mut record = BytesMut::zeroed(stride);
                    for sub in fields {
                        let sub_value = item.get(sub.name).ok_or_else(|| {
                            Error::encoding(format!("record field {} missing", sub.name))
                        })?;
                        write_field(sub, sub_value, &mut record)?;
                    }
                    tail.extend_from_slice(&record);
                }
            } else {
                write_field(field, value, &mut dst)?;
            }
        }

        if truncate {
            dst.truncate(self.min_len());
        }
        dst.extend_from_slice(&tail);
        Ok(dst.freeze())
    }
}

fn check_carried(fields: &[Field], values: &FieldValues) -> Result<()> {
    match values
        .values
        .iter()
        .find(|(name, _)| !fields.iter().any(|f| f.name == *name))
    {
        Some((name, _)) => Err(Error::encoding(format!(
            "field {} is not carried by this protocol version",
            name
        ))),
        None => Ok(()),
    }
}

fn decode_fields(fields: &'static [Field], body: &[u8]) -> Result<FieldValues> {
    let mut values = FieldValues::new();
    for field in fields {
        if body.len() < field.end() {
            if field.optional {
                continue;
            }
            return Err(Error::framing(format!(
                "body of {} bytes too short for field {} ending at {}",
                body.len(),
                field.name,
                field.end()
            )));
        }
        let at = &body[field.offset..];
        let value = match field.wire {
            Wire::Int(width) | Wire::Flags(width) => Value::Int(width.read(at)),
            Wire::Bool => Value::Bool(at[0] != 0),
            Wire::F32 => Value::Float((&at[..4]).get_f32() as f64),
            Wire::Scaled { width, scale, .. } => Value::Float(width.read(at) as f64 / scale),
            Wire::Ascii(len) => {
                let raw = &at[..len];
                let end = raw.iter().position(|b| *b == 0).unwrap_or(len);
                Value::Text(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
            Wire::Records { stride, fields } => {
                let count = Width::U16.read(at) as usize;
                let start = field.offset + 2;
                let needed = start + count * stride;
                if body.len() < needed {
                    return Err(Error::framing(format!(
                        "{} {} records need {} bytes, body has {}",
                        count,
                        field.name,
                        needed,
                        body.len()
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for chunk in body[start..needed].chunks_exact(stride) {
                    items.push(decode_fields(fields, chunk)?);
                }
                Value::Records(items)
            }
        };
        values = values.push(field.name, value);
    }
    Ok(values)
}

fn write_field(field: &Field, value: &Value, dst: &mut [u8]) -> Result<()> {
    let at = &mut dst[field.offset..];
    match (field.wire, value) {
        (Wire::Int(width), Value::Int(v)) | (Wire::Flags(width), Value::Int(v)) => {
            check_width(field, width, *v)?;
            width.write(at, *v);
        }
        (Wire::Bool, Value::Bool(v)) => at[0] = *v as u8,
        (Wire::F32, Value::Float(v)) => {
            if !v.is_finite() || v.abs() > f32::MAX as f64 {
                return Err(Error::encoding(format!("{} = {} is not a finite f32", field.name, v)));
            }
            (&mut at[..4]).put_f32(*v as f32);
        }
        (Wire::Scaled { width, scale, min, max }, Value::Float(v)) => {
            const EPSILON: f64 = 1e-9;
            if !v.is_finite() || *v < min - EPSILON || *v > max + EPSILON {
                return Err(Error::encoding(format!(
                    "{} = {} outside {}..={}",
                    field.name, v, min, max
                )));
            }
            let raw = (v * scale).round() as i64;
            check_width(field, width, raw)?;
            width.write(at, raw);
        }
        (Wire::Ascii(len), Value::Text(s)) => {
            if !s.is_ascii() || s.bytes().any(|b| b == 0) {
                return Err(Error::encoding(format!("{} must be printable ASCII", field.name)));
            }
            if s.len() > len {
                return Err(Error::encoding(format!(
                    "{} is {} bytes, limit is {}",
                    field.name,
                    s.len(),
                    len
                )));
            }
            at[..s.len()].copy_from_slice(s.as_bytes());
        }
        (wire, value) => {
            return Err(Error::encoding(format!(
                "field {} cannot encode {:?} as {:?}",
                field.name, value, wire
            )))
        }
    }
    Ok(())
}

fn check_width(field: &Field, width: Width, value: i64) -> Result<()> {
    let (lo, hi) = width.range();
    if value < lo || value > hi {
        return Err(Error::encoding(format!(
            "{} = {} does not fit {:?}",
            field.name, value, width
        )));
    }
    Ok(())
}
