//! Meta-value records
//!
//! One meta record per logical collection, stored under the collection's
//! `*_META` key. It carries the cardinality, flags and expiration that let
//! commands answer TYPE / TTL / LEN style questions without a range scan.
//!
//! ## Format
//! ```text
//! ┌─────────────┬──────────┬──────────────────┬──────────────────────┐
//! │ Version (1) │ Type (1) │ varint expireat  │ type-specific body   │
//! └─────────────┴──────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! Encoding an unsupported type degrades to a header-only record; decoding
//! one fails, since the body layout cannot be guessed.

use bytes::BufMut;

use super::buffer::{write_var_i64, write_var_u64, BufferReader};
use super::key::{decode_value, encode_value, KeyType};
use super::value::ValueData;

/// Current meta record version
pub const META_VERSION: u8 = 1;

/// STRING_META body: the value of a plain string key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringMeta {
    pub value: ValueData<'static>,
}

/// HASH_META body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HashMeta {
    pub size: i64,
    /// Fields stored inline in this record instead of as HASH_FIELD keys
    pub ziped: bool,
    pub values: Vec<(ValueData<'static>, ValueData<'static>)>,
}

/// LIST_META body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListMeta {
    pub size: i64,
    pub min_score: ValueData<'static>,
    pub max_score: ValueData<'static>,
    pub ziped: bool,
    pub values: Vec<ValueData<'static>>,
}

/// ZSET_META body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZSetMeta {
    pub size: i64,
    pub ziped: bool,
    /// Inline `(score, member)` pairs when `ziped`
    pub values: Vec<(ValueData<'static>, ValueData<'static>)>,
}

/// SET_META body
///
/// `min` / `max` cache the member bounds of an expanded set. They are only
/// trustworthy while the set is neither ziped nor dirty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMeta {
    pub size: i64,
    pub ziped: bool,
    pub dirty: bool,
    pub min: ValueData<'static>,
    pub max: ValueData<'static>,
    pub values: Vec<ValueData<'static>>,
}

impl SetMeta {
    /// Drop the cached bounds when they can no longer be trusted
    pub fn invalidate_bounds(&mut self) {
        if self.ziped || self.dirty {
            self.min.clear();
            self.max.clear();
        }
    }
}

/// BITSET_META body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitSetMeta {
    pub bitcount: u64,
    pub min: u64,
    pub max: u64,
}

/// Typed body of a meta record
#[derive(Debug, Clone, PartialEq)]
pub enum MetaBody {
    /// Header-only record (existence/TTL probes, or types without a body)
    HeaderOnly(KeyType),
    String(StringMeta),
    Hash(HashMeta),
    List(ListMeta),
    ZSet(ZSetMeta),
    Set(SetMeta),
    BitSet(BitSetMeta),
}

impl MetaBody {
    pub fn key_type(&self) -> KeyType {
        match self {
            MetaBody::HeaderOnly(t) => *t,
            MetaBody::String(_) => KeyType::StringMeta,
            MetaBody::Hash(_) => KeyType::HashMeta,
            MetaBody::List(_) => KeyType::ListMeta,
            MetaBody::ZSet(_) => KeyType::ZSetMeta,
            MetaBody::Set(_) => KeyType::SetMeta,
            MetaBody::BitSet(_) => KeyType::BitSetMeta,
        }
    }
}

/// A per-collection meta record
#[derive(Debug, Clone, PartialEq)]
pub struct MetaValue {
    pub version: u8,
    /// Absolute expiration timestamp; 0 means no expiration
    pub expireat: u64,
    pub body: MetaBody,
}

impl MetaValue {
    pub fn new(body: MetaBody) -> Self {
        Self {
            version: META_VERSION,
            expireat: 0,
            body,
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.body.key_type()
    }

    pub fn is_header_only(&self) -> bool {
        matches!(self.body, MetaBody::HeaderOnly(_))
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a meta record
///
/// A SET_META that is ziped or dirty has its cached bounds cleared first,
/// so stale bounds never reach storage.
pub fn encode_meta<B: BufMut>(buf: &mut B, meta: &mut MetaValue) {
    buf.put_u8(meta.version);
    buf.put_u8(meta.key_type() as u8);
    write_var_u64(buf, meta.expireat);
    match &mut meta.body {
        MetaBody::String(m) => encode_value(buf, &m.value),
        MetaBody::Hash(m) => {
            write_var_i64(buf, m.size);
            put_bool(buf, m.ziped);
            if m.ziped {
                write_var_u64(buf, m.values.len() as u64);
                for (field, value) in &m.values {
                    encode_value(buf, field);
                    encode_value(buf, value);
                }
            }
        }
        MetaBody::List(m) => {
            write_var_i64(buf, m.size);
            encode_value(buf, &m.min_score);
            encode_value(buf, &m.max_score);
            put_bool(buf, m.ziped);
            if m.ziped {
                encode_values(buf, &m.values);
            }
        }
        MetaBody::ZSet(m) => {
            write_var_i64(buf, m.size);
            put_bool(buf, m.ziped);
            if m.ziped {
                write_var_u64(buf, m.values.len() as u64);
                for (score, member) in &m.values {
                    encode_value(buf, score);
                    encode_value(buf, member);
                }
            }
        }
        MetaBody::Set(m) => {
            m.invalidate_bounds();
            write_var_i64(buf, m.size);
            put_bool(buf, m.ziped);
            put_bool(buf, m.dirty);
            encode_value(buf, &m.min);
            encode_value(buf, &m.max);
            if m.ziped {
                encode_values(buf, &m.values);
            }
        }
        MetaBody::BitSet(m) => {
            write_var_u64(buf, m.bitcount);
            write_var_u64(buf, m.min);
            write_var_u64(buf, m.max);
        }
        MetaBody::HeaderOnly(t) => {
            tracing::warn!("Unsupported meta type:{}", t.name());
        }
    }
}

/// Encode into a fresh buffer
pub fn encode_meta_to_vec(meta: &mut MetaValue) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    encode_meta(&mut buf, meta);
    buf
}

fn put_bool<B: BufMut>(buf: &mut B, v: bool) {
    buf.put_u8(v as u8);
}

fn encode_values<B: BufMut>(buf: &mut B, values: &[ValueData<'static>]) {
    write_var_u64(buf, values.len() as u64);
    for v in values {
        encode_value(buf, v);
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a meta record
///
/// With `only_head`, the body is not inspected and a header-only record is
/// returned. A failed header read, an unknown or body-less type, or a failed
/// body read is logged and yields `None`.
pub fn decode_meta(data: &[u8], only_head: bool) -> Option<MetaValue> {
    let mut reader = BufferReader::new(data);
    let header = (|| {
        let version = reader.read_u8()?;
        let tag = reader.read_u8()?;
        let expireat = reader.read_var_u64()?;
        Some((version, tag, expireat))
    })();
    let (version, tag, expireat) = match header {
        Some(h) => h,
        None => {
            tracing::error!("Decode meta header failed.");
            return None;
        }
    };
    let key_type = match KeyType::from_u8(tag) {
        Some(t) => t,
        None => {
            tracing::error!("Unsupported meta type:{}", tag);
            return None;
        }
    };

    if only_head {
        return Some(MetaValue {
            version,
            expireat,
            body: MetaBody::HeaderOnly(key_type),
        });
    }

    let body = match key_type {
        KeyType::StringMeta => decode_string_meta(&mut reader).map(MetaBody::String),
        KeyType::HashMeta => decode_hash_meta(&mut reader).map(MetaBody::Hash),
        KeyType::ListMeta => decode_list_meta(&mut reader).map(MetaBody::List),
        KeyType::ZSetMeta => decode_zset_meta(&mut reader).map(MetaBody::ZSet),
        KeyType::SetMeta => decode_set_meta(&mut reader).map(MetaBody::Set),
        KeyType::BitSetMeta => decode_bitset_meta(&mut reader).map(MetaBody::BitSet),
        other => {
            tracing::error!("Unsupported meta type:{}", other.name());
            return None;
        }
    };

    match body {
        Some(body) => Some(MetaValue {
            version,
            expireat,
            body,
        }),
        None => {
            tracing::error!("Decode {} meta body failed.", key_type.name());
            None
        }
    }
}

fn read_bool(reader: &mut BufferReader<'_>) -> Option<bool> {
    match reader.read_u8()? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

fn read_count(reader: &mut BufferReader<'_>) -> Option<usize> {
    let n = reader.read_var_u64()?;
    // every element takes at least one byte
    if n > reader.remaining() as u64 {
        return None;
    }
    Some(n as usize)
}

fn decode_values(reader: &mut BufferReader<'_>) -> Option<Vec<ValueData<'static>>> {
    let n = read_count(reader)?;
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        values.push(decode_value(reader)?);
    }
    Some(values)
}

fn decode_pairs(
    reader: &mut BufferReader<'_>,
) -> Option<Vec<(ValueData<'static>, ValueData<'static>)>> {
    let n = read_count(reader)?;
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let a = decode_value(reader)?;
        let b = decode_value(reader)?;
        values.push((a, b));
    }
    Some(values)
}

fn decode_string_meta(reader: &mut BufferReader<'_>) -> Option<StringMeta> {
    Some(StringMeta {
        value: decode_value(reader)?,
    })
}

fn decode_hash_meta(reader: &mut BufferReader<'_>) -> Option<HashMeta> {
    let size = reader.read_var_i64()?;
    let ziped = read_bool(reader)?;
    let values = if ziped { decode_pairs(reader)? } else { Vec::new() };
    Some(HashMeta {
        size,
        ziped,
        values,
    })
}

fn decode_list_meta(reader: &mut BufferReader<'_>) -> Option<ListMeta> {
    let size = reader.read_var_i64()?;
    let min_score = decode_value(reader)?;
    let max_score = decode_value(reader)?;
    let ziped = read_bool(reader)?;
    let values = if ziped { decode_values(reader)? } else { Vec::new() };
    Some(ListMeta {
        size,
        min_score,
        max_score,
        ziped,
        values,
    })
}

fn decode_zset_meta(reader: &mut BufferReader<'_>) -> Option<ZSetMeta> {
    let size = reader.read_var_i64()?;
    let ziped = read_bool(reader)?;
    let values = if ziped { decode_pairs(reader)? } else { Vec::new() };
    Some(ZSetMeta {
        size,
        ziped,
        values,
    })
}

fn decode_set_meta(reader: &mut BufferReader<'_>) -> Option<SetMeta> {
    let size = reader.read_var_i64()?;
    let ziped = read_bool(reader)?;
    let dirty = read_bool(reader)?;
    let min = decode_value(reader)?;
    let max = decode_value(reader)?;
    let values = if ziped { decode_values(reader)? } else { Vec::new() };
    Some(SetMeta {
        size,
        ziped,
        dirty,
        min,
        max,
        values,
    })
}

fn decode_bitset_meta(reader: &mut BufferReader<'_>) -> Option<BitSetMeta> {
    Some(BitSetMeta {
        bitcount: reader.read_var_u64()?,
        min: reader.read_var_u64()?,
        max: reader.read_var_u64()?,
    })
}
