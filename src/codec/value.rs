//! ValueData
//!
//! A tagged scalar used for every typed field of the keyspace: hash fields,
//! list scores, set members, sorted-set scores and members, string values.
//!
//! ## Encoding
//! ```text
//! ┌──────────┬─────────────────────────────────────────────┐
//! │ Type (1) │ Payload                                     │
//! └──────────┴─────────────────────────────────────────────┘
//!   0 Empty    (none)
//!   1 Integer  zigzag varint
//!   2 Double   8-byte IEEE-754, big-endian
//!   3 Bytes    varint length + raw bytes
//! ```
//!
//! The `Bytes` payload is a [`Cow`]: decoding with `borrow = true` yields a
//! view into the source buffer whose lifetime ties it to that buffer, which
//! is what the comparator uses to avoid allocating on every key comparison.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::{AddAssign, DivAssign};

use bytes::BufMut;

use crate::error::{AtlasError, Result};

use super::buffer::{write_fixed_f64, write_var_i64, write_var_slice, BufferReader};

/// Encoded type tag of a [`ValueData`]
///
/// The numeric tag order is also the cross-type comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    Empty = 0,
    Integer = 1,
    Double = 2,
    Bytes = 3,
}

impl ValueType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueType::Empty),
            1 => Some(ValueType::Integer),
            2 => Some(ValueType::Double),
            3 => Some(ValueType::Bytes),
            _ => None,
        }
    }
}

/// Outcome of [`ValueData::to_number`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberConversion {
    /// Bytes parsed as a number; the variant changed in place
    Converted,
    /// Already numeric
    Unchanged,
    /// Empty, or bytes that are not a number
    Failed,
}

/// A tagged scalar value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValueData<'a> {
    #[default]
    Empty,
    Integer(i64),
    Double(f64),
    Bytes(Cow<'a, [u8]>),
}

impl ValueData<'static> {
    /// Owned bytes, no numeric conversion
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        ValueData::Bytes(Cow::Owned(value.into()))
    }

    /// Build a value from raw argument bytes
    ///
    /// With `auto_convert`, an empty input is `Empty`, an input starting with
    /// a digit or sign is tried as an integer and then as a double, and
    /// anything else stays literal bytes.
    pub fn from_slice(value: &[u8], auto_convert: bool) -> Self {
        let mut v = ValueData::Empty;
        v.set_value(value, auto_convert);
        v
    }
}

impl<'a> ValueData<'a> {
    /// Bytes viewed from an external buffer
    pub fn borrowed(value: &'a [u8]) -> Self {
        ValueData::Bytes(Cow::Borrowed(value))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::Empty => ValueType::Empty,
            ValueData::Integer(_) => ValueType::Integer,
            ValueData::Double(_) => ValueType::Double,
            ValueData::Bytes(_) => ValueType::Bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ValueData::Empty)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueData::Integer(_) | ValueData::Double(_))
    }

    /// Byte payload, if this is a `Bytes` value (owned or borrowed)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ValueData::Bytes(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    /// Detach from any source buffer
    pub fn into_owned(self) -> ValueData<'static> {
        match self {
            ValueData::Empty => ValueData::Empty,
            ValueData::Integer(i) => ValueData::Integer(i),
            ValueData::Double(d) => ValueData::Double(d),
            ValueData::Bytes(b) => ValueData::Bytes(Cow::Owned(b.into_owned())),
        }
    }

    pub fn set_value(&mut self, value: &[u8], auto_convert: bool) {
        if !auto_convert {
            *self = ValueData::Bytes(Cow::Owned(value.to_vec()));
            return;
        }
        let first = match value.first() {
            Some(&b) => b,
            None => {
                *self = ValueData::Empty;
                return;
            }
        };
        if first != b'+' && first != b'-' && !first.is_ascii_digit() {
            *self = ValueData::Bytes(Cow::Owned(value.to_vec()));
        } else if let Some(i) = parse_i64(value) {
            *self = ValueData::Integer(i);
        } else if let Some(d) = parse_f64(value) {
            *self = ValueData::Double(d);
        } else {
            *self = ValueData::Bytes(Cow::Owned(value.to_vec()));
        }
    }

    pub fn clear(&mut self) {
        *self = ValueData::Empty;
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.value_type() as u8);
        match self {
            ValueData::Empty => {}
            ValueData::Integer(i) => write_var_i64(buf, *i),
            ValueData::Double(d) => write_fixed_f64(buf, *d),
            ValueData::Bytes(b) => write_var_slice(buf, b),
        }
    }

    /// Decode one value; `borrow` keeps byte payloads as views into `reader`'s buffer
    pub fn decode(reader: &mut BufferReader<'a>, borrow: bool) -> Option<Self> {
        let tag = ValueType::from_u8(reader.read_u8()?)?;
        let value = match tag {
            ValueType::Empty => ValueData::Empty,
            ValueType::Integer => ValueData::Integer(reader.read_var_i64()?),
            ValueType::Double => ValueData::Double(reader.read_fixed_f64()?),
            ValueType::Bytes => {
                let raw = reader.read_var_slice()?;
                if borrow {
                    ValueData::Bytes(Cow::Borrowed(raw))
                } else {
                    ValueData::Bytes(Cow::Owned(raw.to_vec()))
                }
            }
        };
        Some(value)
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Type tag first, then numeric or lexicographic comparison
    pub fn compare(&self, other: &ValueData<'_>) -> Ordering {
        match (self, other) {
            (ValueData::Empty, ValueData::Empty) => Ordering::Equal,
            (ValueData::Integer(a), ValueData::Integer(b)) => a.cmp(b),
            (ValueData::Double(a), ValueData::Double(b)) => compare_f64(*a, *b),
            (ValueData::Bytes(a), ValueData::Bytes(b)) => a.as_ref().cmp(b.as_ref()),
            _ => self.value_type().cmp(&other.value_type()),
        }
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Add an integer delta; fails on `Bytes` and on overflow, leaving the value unchanged
    pub fn incrby(&mut self, delta: i64) -> Result<()> {
        match self {
            ValueData::Bytes(_) => Err(AtlasError::TypeMismatch(
                "value is not an integer".to_string(),
            )),
            ValueData::Empty => {
                *self = ValueData::Integer(delta);
                Ok(())
            }
            ValueData::Integer(i) => {
                *i = i.checked_add(delta).ok_or_else(|| {
                    AtlasError::TypeMismatch("increment would overflow".to_string())
                })?;
                Ok(())
            }
            ValueData::Double(d) => {
                *d += delta as f64;
                Ok(())
            }
        }
    }

    /// Add a float delta, promoting the value to `Double`; fails on `Bytes`
    pub fn incrby_float(&mut self, delta: f64) -> Result<()> {
        let current = match self {
            ValueData::Bytes(_) => {
                return Err(AtlasError::TypeMismatch(
                    "value is not a valid float".to_string(),
                ))
            }
            ValueData::Empty => 0.0,
            ValueData::Integer(i) => *i as f64,
            ValueData::Double(d) => *d,
        };
        *self = ValueData::Double(current + delta);
        Ok(())
    }

    /// Numeric view; NaN for `Empty` and `Bytes`
    pub fn number_value(&self) -> f64 {
        match self {
            ValueData::Integer(i) => *i as f64,
            ValueData::Double(d) => *d,
            _ => f64::NAN,
        }
    }

    /// Parse a `Bytes` payload as an integer, then as a double
    pub fn to_number(&mut self) -> NumberConversion {
        let parsed = match self {
            ValueData::Empty => return NumberConversion::Failed,
            ValueData::Integer(_) | ValueData::Double(_) => return NumberConversion::Unchanged,
            ValueData::Bytes(b) => match parse_i64(b.as_ref()) {
                Some(i) => ValueData::Integer(i),
                None => match parse_f64(b.as_ref()) {
                    Some(d) => ValueData::Double(d),
                    None => return NumberConversion::Failed,
                },
            },
        };
        *self = parsed;
        NumberConversion::Converted
    }

    /// Replace a numeric value with its string rendering as `Bytes`
    pub fn to_bytes(&mut self) {
        if self.is_numeric() {
            *self = ValueData::Bytes(Cow::Owned(self.render()));
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Integers as decimal, doubles with 17 significant digits, bytes verbatim
    pub fn render(&self) -> Vec<u8> {
        match self {
            ValueData::Empty => Vec::new(),
            ValueData::Integer(i) => i.to_string().into_bytes(),
            ValueData::Double(d) => format_double(*d).into_bytes(),
            ValueData::Bytes(b) => b.to_vec(),
        }
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.render()).into_owned()
    }
}

impl AddAssign<&ValueData<'_>> for ValueData<'_> {
    /// Numeric accumulate; an empty receiver starts from integer zero
    fn add_assign(&mut self, other: &ValueData<'_>) {
        if self.is_empty() {
            *self = ValueData::Integer(0);
        }
        match (&*self, other) {
            (&ValueData::Integer(a), &ValueData::Integer(b)) => {
                *self = ValueData::Integer(a.wrapping_add(b));
            }
            (&ValueData::Integer(a), &ValueData::Double(b)) => {
                *self = ValueData::Double(a as f64 + b);
            }
            (&ValueData::Double(a), &ValueData::Integer(b)) => {
                *self = ValueData::Double(a + b as f64);
            }
            (&ValueData::Double(a), &ValueData::Double(b)) => {
                *self = ValueData::Double(a + b);
            }
            // Empty adds nothing; bytes take no part in arithmetic
            _ => {}
        }
    }
}

impl DivAssign<u32> for ValueData<'_> {
    /// Average helper: divides into a `Double`; dividing by zero saturates to `f64::MAX`
    fn div_assign(&mut self, count: u32) {
        if self.is_empty() {
            *self = ValueData::Integer(0);
        }
        if matches!(self, ValueData::Bytes(_)) {
            return;
        }
        let total = self.number_value();
        *self = if count != 0 {
            ValueData::Double(total / count as f64)
        } else {
            ValueData::Double(f64::MAX)
        };
    }
}

impl From<i64> for ValueData<'static> {
    fn from(v: i64) -> Self {
        ValueData::Integer(v)
    }
}

impl From<f64> for ValueData<'static> {
    fn from(v: f64) -> Self {
        ValueData::Double(v)
    }
}

impl From<&str> for ValueData<'static> {
    fn from(v: &str) -> Self {
        ValueData::bytes(v.as_bytes())
    }
}

impl From<Vec<u8>> for ValueData<'static> {
    fn from(v: Vec<u8>) -> Self {
        ValueData::Bytes(Cow::Owned(v))
    }
}

// =============================================================================
// Numeric helpers
// =============================================================================

/// Numeric order for doubles; NaN falls back to IEEE total order so the
/// result stays a total order
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Strict decimal i64 parse (optional sign, no whitespace)
pub fn parse_i64(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// Decimal or scientific double parse; NaN is rejected
pub fn parse_f64(raw: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(raw).ok()?;
    let v: f64 = s.parse().ok()?;
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

/// `%.17g` rendering, with infinities spelled `inf` / `-inf`
pub fn format_double(v: f64) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.16e}", v);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..17).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (16 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, v))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
