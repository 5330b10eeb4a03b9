//! Binary codec for the flat keyspace
//!
//! Every Redis-style structure is flattened into ordered byte-string keys:
//!
//! ```text
//!   STRING  k          -> STRING_META(k)                     = value
//!   HASH    k {f: v}   -> HASH_META(k)                       = meta
//!                         HASH_FIELD(k, f)                   = v
//!   LIST    k [v...]   -> LIST_META(k), LIST_ELEMENT(k, idx) = v
//!   SET     k {m...}   -> SET_META(k),  SET_ELEMENT(k, m)
//!   ZSET    k {m: s}   -> ZSET_META(k), ZSET_ELEMENT(k, s, m)
//!                         ZSET_ELEMENT_NODE(k, m)            = s
//!   BITSET  k          -> BITSET_META(k), BITSET_ELEMENT(k, i) = bits
//!   TTL     k @ t      -> KEY_EXPIRATION_ELEMENT(k, t)
//! ```
//!
//! Decoders never raise: a short or malformed buffer yields `None` and the
//! caller treats it as "not this key".

pub mod buffer;
pub mod key;
pub mod meta;
pub mod object;
pub mod value;

pub use buffer::BufferReader;
pub use key::{
    decode_key, decode_value, decode_value_by_bytes, encode_key, encode_value, next_key,
    peek_dbkey_header, DbId, KeyKind, KeyObject, KeyType, MAX_DB_ID,
};
pub use meta::{
    decode_meta, encode_meta, encode_meta_to_vec, BitSetMeta, HashMeta, ListMeta, MetaBody,
    MetaValue, SetMeta, StringMeta, ZSetMeta, META_VERSION,
};
pub use object::{decode_value_obj, encode_value_obj, ValueObject};
pub use value::{
    compare_f64, format_double, parse_f64, parse_i64, NumberConversion, ValueData, ValueType,
};
