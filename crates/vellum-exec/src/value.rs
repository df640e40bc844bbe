//! Runtime values.
//!
//! A small closed set of SQL-ish types. Values serialize into tuples with a
//! one-byte null tag so decoding never needs out-of-band null bitmaps.

use std::cmp::Ordering;
use std::fmt;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Variable-length string.
    Varchar,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 32-bit signed integer.
    Integer(i32),
    /// Boolean.
    Boolean(bool),
    /// Variable-length string.
    Varchar(String),
}

impl Value {
    /// Whether this value is NULL.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interprets the value as a boolean; NULL is false.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            _ => false,
        }
    }

    /// Extracts an integer, if that is what this is.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Three-way comparison between same-typed values.
    ///
    /// NULL orders before everything, matching the sort operators'
    /// nulls-first behavior.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Varchar(a), Value::Varchar(b)) => a.cmp(b),
            (a, b) => panic!("comparing values of different types: {a:?} vs {b:?}"),
        }
    }

    /// Addition for aggregate accumulation; NULL propagates.
    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(*b)),
            (a, b) => panic!("adding incompatible values: {a:?} + {b:?}"),
        }
    }

    /// Appends the value's encoding: a null tag byte, then the payload.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Null => buf.push(0),
            Value::Integer(i) => {
                buf.push(1);
                buf.extend_from_slice(&i.to_le_bytes());
            }
            Value::Boolean(b) => {
                buf.push(1);
                buf.push(*b as u8);
            }
            Value::Varchar(s) => {
                buf.push(1);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Decodes one value of `data_type` from `buf`, returning it and the
    /// number of bytes consumed.
    pub fn deserialize_from(buf: &[u8], data_type: DataType) -> (Value, usize) {
        if buf[0] == 0 {
            return (Value::Null, 1);
        }
        let body = &buf[1..];
        match data_type {
            DataType::Integer => {
                let v = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                (Value::Integer(v), 5)
            }
            DataType::Boolean => (Value::Boolean(body[0] != 0), 2),
            DataType::Varchar => {
                let len = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
                let s = String::from_utf8_lossy(&body[4..4 + len]).into_owned();
                (Value::Varchar(s), 5 + len)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Varchar(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_round_trips() {
        for (value, data_type) in [
            (Value::Integer(-7), DataType::Integer),
            (Value::Boolean(true), DataType::Boolean),
            (Value::Varchar("hello".into()), DataType::Varchar),
            (Value::Null, DataType::Integer),
            (Value::Varchar(String::new()), DataType::Varchar),
        ] {
            let mut buf = Vec::new();
            value.serialize_into(&mut buf);
            let (decoded, consumed) = Value::deserialize_from(&buf, data_type);
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn null_orders_first() {
        assert_eq!(Value::Null.compare(&Value::Integer(0)), Ordering::Less);
        assert_eq!(Value::Integer(0).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn add_propagates_null() {
        assert_eq!(Value::Integer(2).add(&Value::Integer(3)), Value::Integer(5));
        assert!(Value::Null.add(&Value::Integer(3)).is_null());
    }
}
