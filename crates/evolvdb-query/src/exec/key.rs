//! Byte encoding of hash keys.
//!
//! Joins and aggregations hash values by an encoding under which values
//! that compare equal produce equal bytes: `Int(1)`, `BigInt(1)` and
//! `Float(1.0)` all encode the same. Integers keep their exact value, so
//! `BigInt(2^53 + 1)` and the float it rounds to stay distinct, matching
//! [`compare_values`](crate::exec::compare_values).

use evolvdb_core::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;

/// Appends the normalized encoding of `value` to `buf`.
pub fn encode_key_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => encode_integer(i64::from(*i), buf),
        Value::BigInt(i) => encode_integer(*i, buf),
        Value::Float(f) => encode_float(*f, buf),
        Value::String(s) => {
            buf.push(TAG_STRING);
            buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

fn encode_integer(i: i64, buf: &mut Vec<u8>) {
    buf.push(TAG_INTEGER);
    buf.extend_from_slice(&i.to_le_bytes());
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn encode_float(f: f64, buf: &mut Vec<u8>) {
    // Integral floats in i64 range share the integer encoding.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        encode_integer(f as i64, buf);
        return;
    }
    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
    buf.push(TAG_FLOAT);
    buf.extend_from_slice(&bits.to_le_bytes());
}

/// Encodes a composite key, such as the group-by values of one row.
///
/// Nulls are encoded, so rows with null group values form one group.
#[must_use]
pub fn encode_key(values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 9);
    for value in values {
        encode_key_value(value, &mut buf);
    }
    buf
}

/// Encodes an equi-join key, or `None` for a null key, which never matches.
#[must_use]
pub fn join_key(value: &Value) -> Option<Vec<u8>> {
    if value.is_null() {
        return None;
    }
    let mut buf = Vec::with_capacity(9);
    encode_key_value(value, &mut buf);
    Some(buf)
}
