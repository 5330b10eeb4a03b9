//! Key encoding
//!
//! Every logical element of every data structure is one key in a single flat
//! keyspace:
//!
//! ```text
//! ┌──────────────────────────┬───────────────────────┬──────────────────────┐
//! │ Header: (db<<8)|type (4) │ varint len + user key │ type-specific fields │
//! └──────────────────────────┴───────────────────────┴──────────────────────┘
//! ```
//!
//! | Type                   | Trailing fields                 |
//! |------------------------|---------------------------------|
//! | HASH_FIELD             | field `ValueData`               |
//! | LIST_ELEMENT           | score `ValueData`               |
//! | SET_ELEMENT            | member `ValueData`              |
//! | ZSET_ELEMENT           | score `ValueData`, member `ValueData` |
//! | ZSET_ELEMENT_NODE      | member `ValueData`              |
//! | BITSET_ELEMENT         | varint bit index                |
//! | KEY_EXPIRATION_ELEMENT | varint expire timestamp         |
//! | metas, SCRIPT          | (none)                          |

use bytes::BufMut;

use super::buffer::{write_fixed_u32, write_var_slice, write_var_u64, BufferReader};
use super::value::ValueData;

/// Logical database id; only the low 24 bits are encoded
pub type DbId = u32;

/// Largest encodable database id
pub const MAX_DB_ID: DbId = 0x00FF_FFFF;

/// Discriminant of a key in the flat keyspace
///
/// The tag values are part of the on-disk format and of the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum KeyType {
    KeyMeta = 0,
    StringMeta = 1,
    HashMeta = 2,
    HashField = 3,
    ListMeta = 4,
    ListElement = 5,
    SetMeta = 6,
    SetElement = 7,
    ZSetMeta = 8,
    ZSetElement = 9,
    ZSetElementNode = 10,
    BitSetMeta = 11,
    BitSetElement = 12,
    KeyExpirationElement = 13,
    Script = 14,
}

impl KeyType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        let t = match tag {
            0 => KeyType::KeyMeta,
            1 => KeyType::StringMeta,
            2 => KeyType::HashMeta,
            3 => KeyType::HashField,
            4 => KeyType::ListMeta,
            5 => KeyType::ListElement,
            6 => KeyType::SetMeta,
            7 => KeyType::SetElement,
            8 => KeyType::ZSetMeta,
            9 => KeyType::ZSetElement,
            10 => KeyType::ZSetElementNode,
            11 => KeyType::BitSetMeta,
            12 => KeyType::BitSetElement,
            13 => KeyType::KeyExpirationElement,
            14 => KeyType::Script,
            _ => return None,
        };
        Some(t)
    }

    /// Upper-case name as used in logs and dumps
    pub fn name(self) -> &'static str {
        match self {
            KeyType::KeyMeta => "KEY_META",
            KeyType::StringMeta => "STRING_META",
            KeyType::HashMeta => "HASH_META",
            KeyType::HashField => "HASH_FIELD",
            KeyType::ListMeta => "LIST_META",
            KeyType::ListElement => "LIST_ELEMENT",
            KeyType::SetMeta => "SET_META",
            KeyType::SetElement => "SET_ELEMENT",
            KeyType::ZSetMeta => "ZSET_META",
            KeyType::ZSetElement => "ZSET_ELEMENT",
            KeyType::ZSetElementNode => "ZSET_ELEMENT_NODE",
            KeyType::BitSetMeta => "BITSET_META",
            KeyType::BitSetElement => "BITSET_ELEMENT",
            KeyType::KeyExpirationElement => "KEY_EXPIRATION_ELEMENT",
            KeyType::Script => "SCRIPT",
        }
    }
}

/// Type-specific payload of a key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyKind {
    KeyMeta,
    StringMeta,
    HashMeta,
    HashField { field: ValueData<'static> },
    ListMeta,
    ListElement { score: ValueData<'static> },
    SetMeta,
    SetElement { member: ValueData<'static> },
    ZSetMeta,
    ZSetElement { score: ValueData<'static>, member: ValueData<'static> },
    ZSetElementNode { member: ValueData<'static> },
    BitSetMeta,
    BitSetElement { index: u64 },
    KeyExpiration { expireat: u64 },
    Script,
}

impl KeyKind {
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyKind::KeyMeta => KeyType::KeyMeta,
            KeyKind::StringMeta => KeyType::StringMeta,
            KeyKind::HashMeta => KeyType::HashMeta,
            KeyKind::HashField { .. } => KeyType::HashField,
            KeyKind::ListMeta => KeyType::ListMeta,
            KeyKind::ListElement { .. } => KeyType::ListElement,
            KeyKind::SetMeta => KeyType::SetMeta,
            KeyKind::SetElement { .. } => KeyType::SetElement,
            KeyKind::ZSetMeta => KeyType::ZSetMeta,
            KeyKind::ZSetElement { .. } => KeyType::ZSetElement,
            KeyKind::ZSetElementNode { .. } => KeyType::ZSetElementNode,
            KeyKind::BitSetMeta => KeyType::BitSetMeta,
            KeyKind::BitSetElement { .. } => KeyType::BitSetElement,
            KeyKind::KeyExpiration { .. } => KeyType::KeyExpirationElement,
            KeyKind::Script => KeyType::Script,
        }
    }

    /// The payload-free kind for a type that carries no trailing fields
    pub fn without_payload(key_type: KeyType) -> Option<Self> {
        let kind = match key_type {
            KeyType::KeyMeta => KeyKind::KeyMeta,
            KeyType::StringMeta => KeyKind::StringMeta,
            KeyType::HashMeta => KeyKind::HashMeta,
            KeyType::ListMeta => KeyKind::ListMeta,
            KeyType::SetMeta => KeyKind::SetMeta,
            KeyType::ZSetMeta => KeyKind::ZSetMeta,
            KeyType::BitSetMeta => KeyKind::BitSetMeta,
            KeyType::Script => KeyKind::Script,
            _ => return None,
        };
        Some(kind)
    }
}

/// A fully identified key: database, user key and typed payload
///
/// `db` must not exceed [`MAX_DB_ID`]; the constructors enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyObject {
    pub db: DbId,
    pub key: Vec<u8>,
    pub kind: KeyKind,
}

impl KeyObject {
    /// Build a key, refusing a `db` wider than 24 bits
    ///
    /// Every typed constructor below goes through here, so a key built by
    /// them always encodes its own `db`.
    pub fn new(db: DbId, key: impl Into<Vec<u8>>, kind: KeyKind) -> Option<Self> {
        if db > MAX_DB_ID {
            return None;
        }
        Some(Self {
            db,
            key: key.into(),
            kind,
        })
    }

    /// Payload-free key of the given type
    ///
    /// Returns `None` for types that require trailing fields.
    pub fn meta(db: DbId, key: impl Into<Vec<u8>>, key_type: KeyType) -> Option<Self> {
        Self::new(db, key, KeyKind::without_payload(key_type)?)
    }

    pub fn hash_field(db: DbId, key: impl Into<Vec<u8>>, field: ValueData<'static>) -> Option<Self> {
        Self::new(db, key, KeyKind::HashField { field })
    }

    pub fn list_element(
        db: DbId,
        key: impl Into<Vec<u8>>,
        score: ValueData<'static>,
    ) -> Option<Self> {
        Self::new(db, key, KeyKind::ListElement { score })
    }

    pub fn set_element(
        db: DbId,
        key: impl Into<Vec<u8>>,
        member: ValueData<'static>,
    ) -> Option<Self> {
        Self::new(db, key, KeyKind::SetElement { member })
    }

    pub fn zset_element(
        db: DbId,
        key: impl Into<Vec<u8>>,
        score: ValueData<'static>,
        member: ValueData<'static>,
    ) -> Option<Self> {
        Self::new(db, key, KeyKind::ZSetElement { score, member })
    }

    pub fn zset_node(db: DbId, key: impl Into<Vec<u8>>, member: ValueData<'static>) -> Option<Self> {
        Self::new(db, key, KeyKind::ZSetElementNode { member })
    }

    pub fn bitset_element(db: DbId, key: impl Into<Vec<u8>>, index: u64) -> Option<Self> {
        Self::new(db, key, KeyKind::BitSetElement { index })
    }

    pub fn expiration(db: DbId, key: impl Into<Vec<u8>>, expireat: u64) -> Option<Self> {
        Self::new(db, key, KeyKind::KeyExpiration { expireat })
    }

    pub fn key_type(&self) -> KeyType {
        self.kind.key_type()
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.key.len());
        encode_key(&mut buf, self);
        buf
    }
}

// =============================================================================
// Key codec
// =============================================================================

/// `db` is range-checked by [`KeyObject::new`]
fn pack_header(db: DbId, key_type: KeyType) -> u32 {
    ((db & MAX_DB_ID) << 8) | key_type as u32
}

pub fn encode_key<B: BufMut>(buf: &mut B, key: &KeyObject) {
    write_fixed_u32(buf, pack_header(key.db, key.key_type()));
    write_var_slice(buf, &key.key);
    match &key.kind {
        KeyKind::HashField { field } => encode_value(buf, field),
        KeyKind::ListElement { score } => encode_value(buf, score),
        KeyKind::SetElement { member } => encode_value(buf, member),
        KeyKind::ZSetElement { score, member } => {
            encode_value(buf, score);
            encode_value(buf, member);
        }
        KeyKind::ZSetElementNode { member } => encode_value(buf, member),
        KeyKind::BitSetElement { index } => write_var_u64(buf, *index),
        KeyKind::KeyExpiration { expireat } => write_var_u64(buf, *expireat),
        KeyKind::KeyMeta
        | KeyKind::StringMeta
        | KeyKind::HashMeta
        | KeyKind::ListMeta
        | KeyKind::SetMeta
        | KeyKind::ZSetMeta
        | KeyKind::BitSetMeta
        | KeyKind::Script => {}
    }
}

/// Read only the 4-byte header: `(db, type)`
pub fn peek_dbkey_header(key: &[u8]) -> Option<(DbId, KeyType)> {
    let header = BufferReader::new(key).read_fixed_u32()?;
    let key_type = KeyType::from_u8((header & 0xFF) as u8)?;
    Some((header >> 8, key_type))
}

/// Decode an encoded key
///
/// With `expected`, the decoded db, type and user key must all match it,
/// otherwise the key is reported as absent. Any short read yields `None`.
pub fn decode_key(key: &[u8], expected: Option<&KeyObject>) -> Option<KeyObject> {
    let mut reader = BufferReader::new(key);
    let header = reader.read_fixed_u32()?;
    let tag = (header & 0xFF) as u8;
    let db = header >> 8;
    if let Some(exp) = expected {
        if tag != exp.key_type() as u8 || db != exp.db {
            return None;
        }
    }
    let key_type = KeyType::from_u8(tag)?;

    let user_key = reader.read_var_slice()?;
    if let Some(exp) = expected {
        if user_key != exp.key.as_slice() {
            return None;
        }
    }

    let kind = match key_type {
        KeyType::HashField => KeyKind::HashField {
            field: decode_value(&mut reader)?,
        },
        KeyType::ListElement => KeyKind::ListElement {
            score: decode_value(&mut reader)?,
        },
        KeyType::SetElement => KeyKind::SetElement {
            member: decode_value(&mut reader)?,
        },
        KeyType::ZSetElement => {
            let score = decode_value(&mut reader)?;
            let member = decode_value(&mut reader)?;
            KeyKind::ZSetElement { score, member }
        }
        KeyType::ZSetElementNode => KeyKind::ZSetElementNode {
            member: decode_value(&mut reader)?,
        },
        KeyType::BitSetElement => KeyKind::BitSetElement {
            index: reader.read_var_u64()?,
        },
        KeyType::KeyExpirationElement => KeyKind::KeyExpiration {
            expireat: reader.read_var_u64()?,
        },
        other => KeyKind::without_payload(other)?,
    };

    Some(KeyObject {
        db,
        key: user_key.to_vec(),
        kind,
    })
}

// =============================================================================
// Value codec
// =============================================================================

pub fn encode_value<B: BufMut>(buf: &mut B, value: &ValueData<'_>) {
    value.encode(buf);
}

/// Decode one owned value from the reader
pub fn decode_value(reader: &mut BufferReader<'_>) -> Option<ValueData<'static>> {
    ValueData::decode(reader, false).map(ValueData::into_owned)
}

/// Decode a whole byte string as one value
pub fn decode_value_by_bytes(bytes: &[u8]) -> Option<ValueData<'static>> {
    decode_value(&mut BufferReader::new(bytes))
}

/// Smallest byte string above every string sharing `key` as a prefix
///
/// Scanning backward, the first byte below 0x7F is incremented; when every
/// byte is at or above 0x7F a NUL byte is appended instead. Use it as the
/// exclusive end of a `[key, next_key(key))` prefix scan.
///
/// The bound is exact under byte order when the last byte of `key` is below
/// 0x7F. Under [`ArdbComparator`](crate::comparator::ArdbComparator) the
/// user key is compared as a whole, so the range over an encoded
/// `header + user key` prefix also reaches longer user keys (`"user1"` for
/// `"user"`); stop such scans with [`decode_key`] and an expected key.
pub fn next_key(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] < 0x7F {
            next[i] += 1;
            return next;
        }
    }
    next.push(0);
    next
}
