//! Purpose: Encode and decode typed scalar cell values to and from byte strings.
//! Exports: `Value`, `ValueKind`, `encode`, `decode`, `decode_or_panic`, per-type helpers.
//! Role: Deterministic cell value codec shared by the API and CLI.
//! Invariants: Integers, floats and timestamps are exactly 8 bytes; booleans exactly 1 byte.
//! Invariants: Integers are plain two's-complement big-endian, so byte order only sorts
//! values of the same sign (negatives sort after positives). Keep it that way.
//! Invariants: Timestamps are microseconds since the Unix epoch.

use crate::core::error::{Error, ErrorKind};
use crate::core::term::{Term, decode_term, encode_term};
use bstr::BString;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Raw,
    String,
    Structured,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Term,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Raw => "raw",
            ValueKind::String => "string",
            ValueKind::Structured => "structured",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Term => "term",
        }
    }
}

/// A typed cell value, chosen explicitly by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Raw(Vec<u8>),
    /// Bytes assumed to already be text; never validated.
    String(BString),
    Structured(serde_json::Value),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(OffsetDateTime),
    Term(Term),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Raw(_) => ValueKind::Raw,
            Value::String(_) => ValueKind::String,
            Value::Structured(_) => ValueKind::Structured,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Term(_) => ValueKind::Term,
        }
    }
}

pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
    let bytes = match value {
        Value::Raw(bytes) => bytes.clone(),
        Value::String(text) => text.to_vec(),
        Value::Structured(doc) => serde_json::to_vec(doc).map_err(|err| {
            Error::new(ErrorKind::InvalidStructured)
                .with_message("failed to encode structured value")
                .with_source(err)
        })?,
        Value::Integer(value) => encode_integer(*value).to_vec(),
        Value::Float(value) => encode_float(*value).to_vec(),
        Value::Boolean(value) => vec![encode_boolean(*value)],
        Value::Timestamp(value) => encode_timestamp(*value).to_vec(),
        Value::Term(term) => encode_term(term)?,
    };
    Ok(bytes)
}

pub fn decode(kind: ValueKind, bytes: &[u8]) -> Result<Value, Error> {
    let value = match kind {
        ValueKind::Raw => Value::Raw(bytes.to_vec()),
        ValueKind::String => Value::String(BString::from(bytes)),
        ValueKind::Structured => Value::Structured(decode_structured(bytes)?),
        ValueKind::Integer => Value::Integer(decode_integer(bytes)?),
        ValueKind::Float => Value::Float(decode_float(bytes)?),
        ValueKind::Boolean => Value::Boolean(decode_boolean(bytes)?),
        ValueKind::Timestamp => Value::Timestamp(decode_timestamp(bytes)?),
        ValueKind::Term => Value::Term(decode_term(bytes)?),
    };
    Ok(value)
}

/// Like [`decode`], but panics on malformed input.
#[track_caller]
pub fn decode_or_panic(kind: ValueKind, bytes: &[u8]) -> Value {
    match decode(kind, bytes) {
        Ok(value) => value,
        Err(err) => panic!("failed to decode {} cell: {err}", kind.as_str()),
    }
}

pub fn encode_integer(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn decode_integer(bytes: &[u8]) -> Result<i64, Error> {
    fixed_8(bytes, ErrorKind::InvalidInteger).map(i64::from_be_bytes)
}

pub fn encode_float(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn decode_float(bytes: &[u8]) -> Result<f64, Error> {
    fixed_8(bytes, ErrorKind::InvalidFloat).map(f64::from_be_bytes)
}

pub fn encode_boolean(value: bool) -> u8 {
    u8::from(value)
}

pub fn decode_boolean(bytes: &[u8]) -> Result<bool, Error> {
    match bytes {
        [0x01] => Ok(true),
        [0x00] => Ok(false),
        _ => Err(Error::new(ErrorKind::InvalidBoolean)
            .with_message(format!("expected a single 0x00 or 0x01 byte, got {} bytes", bytes.len()))),
    }
}

pub fn encode_timestamp(value: OffsetDateTime) -> [u8; 8] {
    // Floor to whole microseconds so pre-epoch instants stay monotonic.
    let micros = value.unix_timestamp_nanos().div_euclid(1_000) as i64;
    micros.to_be_bytes()
}

pub fn decode_timestamp(bytes: &[u8]) -> Result<OffsetDateTime, Error> {
    let micros = fixed_8(bytes, ErrorKind::InvalidDatetime).map(i64::from_be_bytes)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).map_err(|err| {
        Error::new(ErrorKind::InvalidDatetime)
            .with_message(format!("timestamp {micros}us is out of range"))
            .with_source(err)
    })
}

pub fn decode_structured(bytes: &[u8]) -> Result<serde_json::Value, Error> {
    serde_json::from_slice(bytes).map_err(|err| {
        Error::new(ErrorKind::InvalidStructured)
            .with_message(err.to_string())
            .with_source(err)
    })
}

fn fixed_8(bytes: &[u8], kind: ErrorKind) -> Result<[u8; 8], Error> {
    <[u8; 8]>::try_from(bytes).map_err(|_| {
        Error::new(kind).with_message(format!("expected 8 bytes, got {}", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::{
        Value, ValueKind, decode, decode_boolean, decode_or_panic, encode, encode_integer,
    };
    use crate::core::error::ErrorKind;
    use crate::core::term::Term;
    use bstr::BString;
    use serde_json::json;
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn round_trip(value: Value) {
        let bytes = encode(&value).expect("encode");
        let decoded = decode(value.kind(), &bytes).expect("decode");
        assert_eq!(decoded, value);
    }

    #[test]
    fn scalar_values_round_trip() {
        for value in [0, -1, 1, i64::MAX, i64::MIN] {
            round_trip(Value::Integer(value));
        }
        for value in [0.0, -0.0, -12.5, f64::MAX, f64::MIN_POSITIVE, f64::INFINITY] {
            round_trip(Value::Float(value));
        }
        round_trip(Value::Boolean(true));
        round_trip(Value::Boolean(false));
        round_trip(Value::Timestamp(OffsetDateTime::UNIX_EPOCH));
        round_trip(Value::Timestamp(datetime!(2024-02-29 13:45:10.123456 UTC)));
        round_trip(Value::Timestamp(datetime!(1969-12-31 23:59:59.999999 UTC)));
    }

    #[test]
    fn opaque_values_round_trip() {
        round_trip(Value::Raw(vec![0, 255, 7]));
        round_trip(Value::String(BString::from("héllo")));
        round_trip(Value::String(BString::from(&b"not utf8 \xff"[..])));
        round_trip(Value::Structured(json!({"a": [1, 2, {"b": null}]})));
        round_trip(Value::Term(Term::List(vec![Term::Int(1), Term::Text("x".into())])));
    }

    #[test]
    fn fixed_widths_are_exact() {
        assert_eq!(encode(&Value::Integer(5)).expect("encode").len(), 8);
        assert_eq!(encode(&Value::Float(5.0)).expect("encode").len(), 8);
        assert_eq!(encode(&Value::Boolean(true)).expect("encode"), vec![1]);
        assert_eq!(
            encode(&Value::Timestamp(OffsetDateTime::UNIX_EPOCH)).expect("encode"),
            vec![0; 8]
        );
        assert_eq!(encode_integer(1), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn three_byte_input_yields_typed_errors() {
        let cases = [
            (ValueKind::Integer, ErrorKind::InvalidInteger),
            (ValueKind::Float, ErrorKind::InvalidFloat),
            (ValueKind::Boolean, ErrorKind::InvalidBoolean),
            (ValueKind::Timestamp, ErrorKind::InvalidDatetime),
        ];
        for (kind, expected) in cases {
            let err = decode(kind, &[1, 2, 3]).expect_err("three bytes");
            assert_eq!(err.kind(), expected);
        }
    }

    #[test]
    fn boolean_rejects_other_bytes() {
        assert_eq!(decode_boolean(&[2]).expect_err("2").kind(), ErrorKind::InvalidBoolean);
        assert_eq!(decode_boolean(&[]).expect_err("empty").kind(), ErrorKind::InvalidBoolean);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let err = decode(ValueKind::Timestamp, &i64::MAX.to_be_bytes()).expect_err("range");
        assert_eq!(err.kind(), ErrorKind::InvalidDatetime);
    }

    #[test]
    fn structured_parse_error_is_surfaced() {
        let err = decode(ValueKind::Structured, b"{\"a\":").expect_err("parse");
        assert_eq!(err.kind(), ErrorKind::InvalidStructured);
        assert!(err.message().unwrap_or_default().contains("EOF"));
    }

    #[test]
    fn negative_integers_sort_after_positive_bytes() {
        let negative = encode(&Value::Integer(-1)).expect("encode");
        let positive = encode(&Value::Integer(1)).expect("encode");
        let larger = encode(&Value::Integer(1_000)).expect("encode");
        assert!(negative > positive);
        assert!(larger > positive);
    }

    #[test]
    fn text_and_raw_never_fail() {
        assert!(decode(ValueKind::String, &[0xff, 0xfe]).is_ok());
        assert!(decode(ValueKind::Raw, &[]).is_ok());
    }

    #[test]
    #[should_panic(expected = "invalid_integer_format")]
    fn decode_or_panic_fails_fast() {
        decode_or_panic(ValueKind::Integer, &[1, 2, 3]);
    }

    #[test]
    fn decode_or_panic_returns_value() {
        assert_eq!(
            decode_or_panic(ValueKind::Boolean, &[1]),
            Value::Boolean(true)
        );
    }
}
