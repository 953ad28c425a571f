//! Purpose: Convert typed cell values between CLI text and JSON views.
//! Role: Binary helper for `encode` / `decode`; keeps JSON shapes out of the library.
//! Invariants: Raw bytes and term byte strings are rendered as lowercase hex.
//! Invariants: Term maps with all-text keys render as objects; others as `[key, value]` pairs.
#![allow(clippy::result_large_err)]

use bstr::{BString, ByteSlice};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use widerow::api::{Error, ErrorKind, Term, Value as CellValue, ValueKind};

/// Parse CLI input text for `kind` into a typed value.
pub fn parse_cli_value(kind: ValueKind, input: &str) -> Result<CellValue, Error> {
    let value = match kind {
        ValueKind::Raw => CellValue::Raw(hex::decode(input).map_err(|err| {
            usage(format!("raw values are hex: {err}"))
        })?),
        ValueKind::String => CellValue::String(BString::from(input)),
        ValueKind::Structured => CellValue::Structured(parse_json(input)?),
        ValueKind::Integer => CellValue::Integer(
            input
                .trim()
                .parse()
                .map_err(|_| usage(format!("not an integer: {input}")))?,
        ),
        ValueKind::Float => CellValue::Float(
            input
                .trim()
                .parse()
                .map_err(|_| usage(format!("not a float: {input}")))?,
        ),
        ValueKind::Boolean => match input.trim() {
            "true" => CellValue::Boolean(true),
            "false" => CellValue::Boolean(false),
            _ => return Err(usage("booleans are `true` or `false`")),
        },
        ValueKind::Timestamp => {
            let parsed = OffsetDateTime::parse(input.trim(), &Rfc3339).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("not an RFC 3339 timestamp: {input}"))
                    .with_hint("Example: 2024-01-01T00:00:00Z")
                    .with_source(err)
            })?;
            CellValue::Timestamp(parsed)
        }
        ValueKind::Term => CellValue::Term(term_from_json(&parse_json(input)?)),
    };
    Ok(value)
}

/// Render a decoded value as JSON for output.
pub fn value_to_json(value: &CellValue) -> Result<Value, Error> {
    let json = match value {
        CellValue::Raw(bytes) => json!(hex::encode(bytes)),
        CellValue::String(text) => json!(text.to_str_lossy()),
        CellValue::Structured(value) => value.clone(),
        CellValue::Integer(value) => json!(value),
        CellValue::Float(value) => float_json(*value),
        CellValue::Boolean(value) => json!(value),
        CellValue::Timestamp(value) => {
            let text = value.format(&Rfc3339).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to format timestamp")
                    .with_source(err)
            })?;
            json!(text)
        }
        CellValue::Term(term) => term_to_json(term),
    };
    Ok(json)
}

pub fn term_from_json(value: &Value) -> Term {
    match value {
        Value::Null => Term::Nil,
        Value::Bool(value) => Term::Bool(*value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Term::Int(value),
            None => Term::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => Term::Text(text.clone()),
        Value::Array(items) => Term::List(items.iter().map(term_from_json).collect()),
        Value::Object(map) => Term::Map(
            map.iter()
                .map(|(key, value)| (Term::Text(key.clone()), term_from_json(value)))
                .collect(),
        ),
    }
}

pub fn term_to_json(term: &Term) -> Value {
    match term {
        Term::Nil => Value::Null,
        Term::Bool(value) => json!(value),
        Term::Int(value) => json!(value),
        Term::Float(value) => float_json(*value),
        Term::Bytes(bytes) => json!({ "bytes": hex::encode(bytes) }),
        Term::Text(text) => json!(text),
        Term::List(items) => Value::Array(items.iter().map(term_to_json).collect()),
        Term::Map(entries) => {
            let all_text = entries.iter().all(|(key, _)| matches!(key, Term::Text(_)));
            if all_text {
                let mut map = Map::new();
                for (key, value) in entries {
                    if let Term::Text(key) = key {
                        map.insert(key.clone(), term_to_json(value));
                    }
                }
                Value::Object(map)
            } else {
                Value::Array(
                    entries
                        .iter()
                        .map(|(key, value)| json!([term_to_json(key), term_to_json(value)]))
                        .collect(),
                )
            }
        }
    }
}

// JSON has no NaN or infinities.
fn float_json(value: f64) -> Value {
    if value.is_finite() {
        json!(value)
    } else {
        json!(value.to_string())
    }
}

fn parse_json(input: &str) -> Result<Value, Error> {
    serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("value is not valid JSON")
            .with_source(err)
    })
}

fn usage(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Usage).with_message(message)
}
