//! Tests for ValueData
//!
//! These tests verify:
//! - Wire encoding of every variant
//! - Numeric coercion from raw argument bytes
//! - Cross-type and same-type ordering
//! - Arithmetic (incrby, incrby_float, +=, /=)
//! - `%.17g` rendering

use std::cmp::Ordering;

use atlasrdb::codec::{
    format_double, BufferReader, NumberConversion, ValueData, ValueType,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn encode(v: &ValueData<'_>) -> Vec<u8> {
    let mut buf = Vec::new();
    v.encode(&mut buf);
    buf
}

fn decode_owned(bytes: &[u8]) -> Option<ValueData<'static>> {
    ValueData::decode(&mut BufferReader::new(bytes), false).map(ValueData::into_owned)
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_value_encoding_layout() {
    assert_eq!(encode(&ValueData::Empty), vec![0]);
    assert_eq!(encode(&ValueData::Integer(-1)), vec![1, 1]);
    assert_eq!(encode(&ValueData::Integer(300)), vec![1, 0xD8, 0x04]);
    assert_eq!(
        encode(&ValueData::Double(1.0)),
        vec![2, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(encode(&ValueData::from("ab")), vec![3, 2, b'a', b'b']);
}

#[test]
fn test_value_decode_each_variant() {
    for v in [
        ValueData::Empty,
        ValueData::Integer(i64::MIN),
        ValueData::Double(-2.25),
        ValueData::from("member"),
    ] {
        assert_eq!(decode_owned(&encode(&v)), Some(v));
    }
}

#[test]
fn test_value_decode_borrowed_views_source() {
    let bytes = encode(&ValueData::from("view"));
    let mut reader = BufferReader::new(&bytes);
    let v = ValueData::decode(&mut reader, true).unwrap();
    match &v {
        ValueData::Bytes(std::borrow::Cow::Borrowed(b)) => assert_eq!(*b, b"view"),
        other => panic!("expected borrowed bytes, got {:?}", other),
    }
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn test_value_decode_truncated_fails() {
    assert_eq!(decode_owned(&[]), None);
    assert_eq!(decode_owned(&[2, 0x3F, 0xF0]), None);
    assert_eq!(decode_owned(&[3, 5, b'a']), None);
    assert_eq!(decode_owned(&[9]), None);
}

// =============================================================================
// Coercion Tests
// =============================================================================

#[test]
fn test_value_auto_convert() {
    assert_eq!(ValueData::from_slice(b"123", true), ValueData::Integer(123));
    assert_eq!(ValueData::from_slice(b"1.5e3", true), ValueData::Double(1500.0));
    assert_eq!(ValueData::from_slice(b"abc", true), ValueData::from("abc"));
    assert_eq!(ValueData::from_slice(b"", true), ValueData::Empty);
    assert_eq!(ValueData::from_slice(b"-7", true), ValueData::Integer(-7));
    assert_eq!(ValueData::from_slice(b"12abc", true), ValueData::from("12abc"));
}

#[test]
fn test_value_without_auto_convert_keeps_bytes() {
    assert_eq!(ValueData::from_slice(b"123", false), ValueData::from("123"));
}

#[test]
fn test_value_to_number() {
    let mut v = ValueData::from("42");
    assert_eq!(v.to_number(), NumberConversion::Converted);
    assert_eq!(v, ValueData::Integer(42));
    assert_eq!(v.to_number(), NumberConversion::Unchanged);

    let mut d = ValueData::from("0.25");
    assert_eq!(d.to_number(), NumberConversion::Converted);
    assert_eq!(d, ValueData::Double(0.25));

    let mut bad = ValueData::from("nope");
    assert_eq!(bad.to_number(), NumberConversion::Failed);
    assert_eq!(bad, ValueData::from("nope"));

    assert_eq!(ValueData::Empty.to_number(), NumberConversion::Failed);
}

#[test]
fn test_value_to_bytes_renders_numbers() {
    let mut v = ValueData::Integer(-15);
    v.to_bytes();
    assert_eq!(v, ValueData::from("-15"));

    let mut d = ValueData::Double(2.5);
    d.to_bytes();
    assert_eq!(d, ValueData::from("2.5"));
}

// =============================================================================
// Comparison Tests
// =============================================================================

#[test]
fn test_value_cross_type_order_follows_tag() {
    assert!(ValueType::Empty < ValueType::Integer);
    assert!(ValueType::Integer < ValueType::Double);
    assert!(ValueType::Double < ValueType::Bytes);

    assert_eq!(ValueData::Empty.compare(&ValueData::Integer(-5)), Ordering::Less);
    assert_eq!(ValueData::Integer(100).compare(&ValueData::Double(1.0)), Ordering::Less);
    assert_eq!(ValueData::Double(1e300).compare(&ValueData::from("")), Ordering::Less);
}

#[test]
fn test_value_same_type_order() {
    assert_eq!(ValueData::Integer(-2).compare(&ValueData::Integer(1)), Ordering::Less);
    assert_eq!(ValueData::Double(2.0).compare(&ValueData::Double(2.0)), Ordering::Equal);
    assert_eq!(ValueData::from("b").compare(&ValueData::from("ab")), Ordering::Greater);
    assert_eq!(ValueData::from("ab").compare(&ValueData::borrowed(b"ab")), Ordering::Equal);
}

// =============================================================================
// Arithmetic Tests
// =============================================================================

#[test]
fn test_value_incrby() {
    let mut v = ValueData::Integer(10);
    v.incrby(5).unwrap();
    assert_eq!(v, ValueData::Integer(15));

    let mut empty = ValueData::Empty;
    empty.incrby(3).unwrap();
    assert_eq!(empty, ValueData::Integer(3));
}

#[test]
fn test_value_incrby_on_bytes_fails_unchanged() {
    let mut v = ValueData::from("text");
    assert!(v.incrby(1).is_err());
    assert_eq!(v, ValueData::from("text"));
    assert!(v.incrby_float(1.0).is_err());
    assert_eq!(v, ValueData::from("text"));
}

#[test]
fn test_value_incrby_overflow_fails() {
    let mut v = ValueData::Integer(i64::MAX);
    assert!(v.incrby(1).is_err());
    assert_eq!(v, ValueData::Integer(i64::MAX));
}

#[test]
fn test_value_incrby_float_promotes() {
    let mut empty = ValueData::Empty;
    empty.incrby_float(1.5).unwrap();
    assert_eq!(empty, ValueData::Double(1.5));

    let mut int = ValueData::Integer(2);
    int.incrby_float(0.5).unwrap();
    assert_eq!(int, ValueData::Double(2.5));
}

#[test]
fn test_value_add_assign() {
    let mut acc = ValueData::Empty;
    acc += &ValueData::Integer(4);
    assert_eq!(acc, ValueData::Integer(4));
    acc += &ValueData::Double(0.5);
    assert_eq!(acc, ValueData::Double(4.5));

    let mut bytes = ValueData::from("x");
    bytes += &ValueData::Integer(1);
    assert_eq!(bytes, ValueData::from("x"));
}

#[test]
fn test_value_div_assign_average() {
    let mut total = ValueData::Integer(9);
    total /= 2;
    assert_eq!(total, ValueData::Double(4.5));

    let mut zero = ValueData::Integer(1);
    zero /= 0;
    assert_eq!(zero, ValueData::Double(f64::MAX));
}

// =============================================================================
// Rendering Tests
// =============================================================================

#[test]
fn test_format_double() {
    assert_eq!(format_double(1.5), "1.5");
    assert_eq!(format_double(3.0), "3");
    assert_eq!(format_double(0.1), "0.10000000000000001");
    assert_eq!(format_double(1e20), "1e+20");
    assert_eq!(format_double(f64::INFINITY), "inf");
    assert_eq!(format_double(f64::NEG_INFINITY), "-inf");
}

#[test]
fn test_value_as_string() {
    assert_eq!(ValueData::Integer(-3).as_string(), "-3");
    assert_eq!(ValueData::from("hi").as_string(), "hi");
    assert_eq!(ValueData::Empty.as_string(), "");
}
