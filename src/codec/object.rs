//! Element value objects
//!
//! The value stored under an element key depends on the key's type:
//!
//! | Key type                               | Stored value                              |
//! |----------------------------------------|-------------------------------------------|
//! | KEY_META                               | full meta record                          |
//! | ZSET_ELEMENT_NODE                      | score `ValueData`, varint n, n attr pairs |
//! | HASH_FIELD, LIST_ELEMENT, ZSET_ELEMENT, SCRIPT | one `ValueData`                   |
//! | BITSET_ELEMENT                         | var-slice of raw bit bytes                |
//! | everything else                        | nothing                                   |

use std::collections::BTreeMap;

use bytes::BufMut;

use super::buffer::{write_var_slice, write_var_u64, BufferReader};
use super::key::{decode_value, encode_value, KeyType};
use super::meta::{decode_meta, encode_meta, MetaValue};
use super::value::ValueData;

/// Decoded value of an element key
#[derive(Debug, Clone, PartialEq)]
pub enum ValueObject {
    Meta(MetaValue),
    Common(ValueData<'static>),
    /// Member -> score index entry, with optional attributes
    ZSetNode {
        score: ValueData<'static>,
        attrs: BTreeMap<Vec<u8>, Vec<u8>>,
    },
    BitSetElement {
        bits: Vec<u8>,
    },
    Empty,
}

/// Decode the value stored under a key of `key_type`
///
/// Returns `None` when the bytes do not hold the expected layout.
pub fn decode_value_obj(key_type: KeyType, data: &[u8]) -> Option<ValueObject> {
    let mut reader = BufferReader::new(data);
    let obj = match key_type {
        KeyType::KeyMeta => ValueObject::Meta(decode_meta(data, false)?),
        KeyType::ZSetElementNode => {
            let score = decode_value(&mut reader)?;
            let n = reader.read_var_u64()?;
            let mut attrs = BTreeMap::new();
            for _ in 0..n {
                let name = reader.read_var_slice()?.to_vec();
                let value = reader.read_var_slice()?.to_vec();
                attrs.insert(name, value);
            }
            ValueObject::ZSetNode { score, attrs }
        }
        KeyType::HashField | KeyType::ListElement | KeyType::ZSetElement | KeyType::Script => {
            ValueObject::Common(decode_value(&mut reader)?)
        }
        KeyType::BitSetElement => ValueObject::BitSetElement {
            bits: reader.read_var_slice()?.to_vec(),
        },
        _ => ValueObject::Empty,
    };
    Some(obj)
}

/// Encode a value object
///
/// Meta records go through [`encode_meta`] and may have their cached set
/// bounds cleared on the way.
pub fn encode_value_obj<B: BufMut>(buf: &mut B, obj: &mut ValueObject) {
    match obj {
        ValueObject::Meta(meta) => encode_meta(buf, meta),
        ValueObject::Common(value) => encode_value(buf, value),
        ValueObject::ZSetNode { score, attrs } => {
            encode_value(buf, score);
            write_var_u64(buf, attrs.len() as u64);
            for (name, value) in attrs.iter() {
                write_var_slice(buf, name);
                write_var_slice(buf, value);
            }
        }
        ValueObject::BitSetElement { bits } => write_var_slice(buf, bits),
        ValueObject::Empty => {}
    }
}

impl ValueObject {
    /// Encode into a fresh buffer
    pub fn encode(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_value_obj(&mut buf, self);
        buf
    }
}
