//! Key comparator
//!
//! Gives the flat keyspace its semantic order. The engine sorts every key
//! with it, so range scans by hash field, list score, set member, sorted-set
//! score or expiration time are plain forward iterations.
//!
//! ## Order
//! ```text
//!   db  ->  type tag  ->  user key  ->  type-specific secondary field
//!
//!   HASH_FIELD / SET_ELEMENT / ZSET_ELEMENT_NODE   member value
//!   LIST_ELEMENT                                   numeric score
//!   ZSET_ELEMENT                                   numeric score, then member
//!   BITSET_ELEMENT                                 bit index
//!   KEY_EXPIRATION_ELEMENT                         expire time, then user key
//! ```
//!
//! KEY_EXPIRATION_ELEMENT skips the user-key step so every key expiring at
//! the same instant sits in one contiguous run.
//!
//! A component that fails to decode on one side sorts before the same
//! component on the other side; when it fails on both sides the keys compare
//! equal. There is no bytewise tie-break: two keys that compare equal name
//! the same slot in the store.
//!
//! Changing any rule here reorders existing data. Every comparator carries a
//! stable [`KeyComparator::NAME`] that the engine persists and checks on open.

use std::cmp::Ordering;

use crate::codec::buffer::BufferReader;
use crate::codec::key::KeyType;
use crate::codec::value::{compare_f64, ValueData};

/// A total order over encoded keys with a stable identity
pub trait KeyComparator: Send + Sync + 'static {
    /// Identity persisted with the store; must never change for a given order
    const NAME: &'static str;

    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

/// The semantic keyspace order
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdbComparator;

impl KeyComparator for ArdbComparator {
    const NAME: &'static str = "AtlasRDB.KeyComparator";

    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        compare_keys(a, b)
    }
}

/// Plain lexicographic byte order, for raw keyspaces
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    const NAME: &'static str = "AtlasRDB.BytewiseComparator";

    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Order two presence-checked components, comparing only when both exist
fn compare_present<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Numeric scores compare by value; anything else falls back to the value order
fn compare_score(a: &ValueData<'_>, b: &ValueData<'_>) -> Ordering {
    if a.is_numeric() && b.is_numeric() {
        compare_f64(a.number_value(), b.number_value())
    } else {
        a.compare(b)
    }
}

fn compare_values(ra: &mut BufferReader<'_>, rb: &mut BufferReader<'_>) -> Ordering {
    compare_present(ValueData::decode(ra, true), ValueData::decode(rb, true), |x, y| {
        x.compare(&y)
    })
}

/// Compare two encoded keys
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    let mut ra = BufferReader::new(a);
    let mut rb = BufferReader::new(b);

    let (ha, hb) = match (ra.read_fixed_u32(), rb.read_fixed_u32()) {
        (Some(x), Some(y)) => (x, y),
        (x, y) => return compare_present(x, y, |_, _| Ordering::Equal),
    };
    let ord = (ha >> 8).cmp(&(hb >> 8));
    if ord != Ordering::Equal {
        return ord;
    }
    let (ta, tb) = ((ha & 0xFF) as u8, (hb & 0xFF) as u8);
    let ord = ta.cmp(&tb);
    if ord != Ordering::Equal {
        return ord;
    }

    let (ka, kb) = match (ra.read_var_slice(), rb.read_var_slice()) {
        (Some(x), Some(y)) => (x, y),
        (x, y) => return compare_present(x, y, |_, _| Ordering::Equal),
    };

    let key_type = KeyType::from_u8(ta);
    if key_type != Some(KeyType::KeyExpirationElement) {
        let ord = ka.cmp(kb);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match key_type {
        Some(KeyType::HashField | KeyType::SetElement | KeyType::ZSetElementNode) => {
            compare_values(&mut ra, &mut rb)
        }
        Some(KeyType::ListElement) => compare_present(
            ValueData::decode(&mut ra, true),
            ValueData::decode(&mut rb, true),
            |x, y| compare_score(&x, &y),
        ),
        Some(KeyType::ZSetElement) => {
            let ord = compare_present(
                ValueData::decode(&mut ra, true),
                ValueData::decode(&mut rb, true),
                |x, y| compare_score(&x, &y),
            );
            if ord != Ordering::Equal {
                return ord;
            }
            compare_values(&mut ra, &mut rb)
        }
        Some(KeyType::BitSetElement) => {
            compare_present(ra.read_var_u64(), rb.read_var_u64(), |x, y| x.cmp(&y))
        }
        Some(KeyType::KeyExpirationElement) => {
            let ord = compare_present(ra.read_var_u64(), rb.read_var_u64(), |x, y| x.cmp(&y));
            if ord != Ordering::Equal {
                return ord;
            }
            ka.cmp(kb)
        }
        _ => Ordering::Equal,
    }
}
