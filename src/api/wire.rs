//! Purpose: JSON shapes shared by the remote client, the emulator, fixtures and CLI output.
//! Exports: `WireBytes`, `bytes_serde`, wire structs for row sets, chunks, rows and errors.
//! Role: Single place that decides how raw byte strings and row structures look on the wire.
//! Invariants: Bytes serialize as a JSON string when valid UTF-8, otherwise as a byte array.
//! Invariants: Both byte forms are accepted on input.
//! Invariants: Absent chunk fields stay absent across a round trip.

use crate::api::filter::RowFilter;
use crate::core::chunk::{ChunkEvent, RowStatus};
use crate::core::error::{Error, ErrorKind};
use crate::core::range::{RowRange, RowSet};
use crate::core::row::{Cell, Column, Family, Row};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Raw byte string with the text-or-array JSON encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WireBytes(pub Vec<u8>);

impl From<Vec<u8>> for WireBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for WireBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for WireBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(self.0.iter()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BytesRepr {
    Text(String),
    Raw(Vec<u8>),
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match BytesRepr::deserialize(deserializer)? {
            BytesRepr::Text(text) => Self(text.into_bytes()),
            BytesRepr::Raw(bytes) => Self(bytes),
        })
    }
}

/// `#[serde(with = "bytes_serde")]` adapter for plain `Vec<u8>` fields.
pub mod bytes_serde {
    use super::WireBytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        WireBytes(bytes.to_vec()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        WireBytes::deserialize(deserializer).map(|bytes| bytes.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireBound {
    Unbounded,
    Closed(WireBytes),
    Open(WireBytes),
}

impl From<Bound<&[u8]>> for WireBound {
    fn from(bound: Bound<&[u8]>) -> Self {
        match bound {
            Bound::Included(key) => WireBound::Closed(key.into()),
            Bound::Excluded(key) => WireBound::Open(key.into()),
            Bound::Unbounded => WireBound::Unbounded,
        }
    }
}

impl From<WireBound> for Bound<Vec<u8>> {
    fn from(bound: WireBound) -> Self {
        match bound {
            WireBound::Closed(key) => Bound::Included(key.0),
            WireBound::Open(key) => Bound::Excluded(key.0),
            WireBound::Unbounded => Bound::Unbounded,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireRange {
    pub start: WireBound,
    pub end: WireBound,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireRowSet {
    #[serde(default)]
    pub keys: Vec<WireBytes>,
    #[serde(default)]
    pub ranges: Vec<WireRange>,
}

impl From<&RowSet> for WireRowSet {
    fn from(set: &RowSet) -> Self {
        Self {
            keys: set.keys().iter().map(|key| key.as_slice().into()).collect(),
            ranges: set
                .ranges()
                .iter()
                .map(|range| WireRange {
                    start: range.start().into(),
                    end: range.end().into(),
                })
                .collect(),
        }
    }
}

impl From<WireRowSet> for RowSet {
    fn from(wire: WireRowSet) -> Self {
        let mut set = RowSet::from_keys(wire.keys.into_iter().map(|key| key.0));
        for range in wire.ranges {
            set = set.with_range(RowRange::with_bounds(range.start.into(), range.end.into()));
        }
        set
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireStatus {
    #[default]
    None,
    Commit,
    Reset,
}

impl WireStatus {
    fn is_none(&self) -> bool {
        matches!(self, WireStatus::None)
    }
}

/// One line of a read-rows JSONL response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_key: Option<WireBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<WireBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<WireBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "WireStatus::is_none")]
    pub status: WireStatus,
}

impl From<&ChunkEvent> for WireChunk {
    fn from(chunk: &ChunkEvent) -> Self {
        Self {
            row_key: chunk.row_key.clone().map(WireBytes),
            family: chunk.family.clone(),
            qualifier: chunk.qualifier.clone().map(WireBytes),
            timestamp: chunk.timestamp,
            value: chunk.value.clone().map(WireBytes),
            labels: chunk.labels.clone(),
            status: match chunk.status {
                RowStatus::None => WireStatus::None,
                RowStatus::Commit => WireStatus::Commit,
                RowStatus::Reset => WireStatus::Reset,
            },
        }
    }
}

impl From<WireChunk> for ChunkEvent {
    fn from(wire: WireChunk) -> Self {
        ChunkEvent {
            row_key: wire.row_key.map(|key| key.0),
            family: wire.family,
            qualifier: wire.qualifier.map(|qualifier| qualifier.0),
            timestamp: wire.timestamp,
            value: wire.value.map(|value| value.0),
            labels: wire.labels,
            status: match wire.status {
                WireStatus::None => RowStatus::None,
                WireStatus::Commit => RowStatus::Commit,
                WireStatus::Reset => RowStatus::Reset,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadRowsRequest {
    pub row_set: WireRowSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
    pub rows_limit: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireCell {
    pub value: WireBytes,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireColumn {
    pub qualifier: WireBytes,
    #[serde(default)]
    pub cells: Vec<WireCell>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireFamily {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<WireColumn>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WireRow {
    pub key: WireBytes,
    #[serde(default)]
    pub families: Vec<WireFamily>,
}

impl From<&Row> for WireRow {
    fn from(row: &Row) -> Self {
        Self {
            key: row.key().into(),
            families: row
                .families
                .iter()
                .map(|family| WireFamily {
                    name: family.name.clone(),
                    columns: family
                        .columns
                        .iter()
                        .map(|column| WireColumn {
                            qualifier: column.qualifier.as_slice().into(),
                            cells: column
                                .cells
                                .iter()
                                .map(|cell| WireCell {
                                    value: cell.value.as_slice().into(),
                                    timestamp: cell.timestamp,
                                    labels: cell.labels.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl From<WireRow> for Row {
    fn from(wire: WireRow) -> Self {
        let mut row = Row::new(wire.key.0);
        row.families = wire
            .families
            .into_iter()
            .map(|family| Family {
                name: family.name,
                columns: family
                    .columns
                    .into_iter()
                    .map(|column| Column {
                        qualifier: column.qualifier.0,
                        cells: column
                            .cells
                            .into_iter()
                            .map(|cell| Cell {
                                value: cell.value.0,
                                timestamp: cell.timestamp,
                                labels: cell.labels,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        row
    }
}

/// `{"tables": {"<name>": [row, ...]}}`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<WireRow>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: WireError,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        Self {
            error: WireError {
                kind: err.kind().as_str().to_string(),
                message: err.message().map(str::to_string),
                hint: err.hint().map(str::to_string),
                table: err.table().map(str::to_string),
            },
        }
    }
}

impl From<WireError> for Error {
    fn from(wire: WireError) -> Self {
        let mut err = Error::new(ErrorKind::parse(&wire.kind).unwrap_or(ErrorKind::Internal));
        if let Some(message) = wire.message {
            err = err.with_message(message);
        }
        if let Some(hint) = wire.hint {
            err = err.with_hint(hint);
        }
        if let Some(table) = wire.table {
            err = err.with_table(table);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorEnvelope, WireBytes, WireChunk, WireRow, WireRowSet};
    use crate::core::chunk::ChunkEvent;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::range::{RowRange, RowSet};
    use crate::core::row::{Cell, Row};
    use serde_json::json;

    #[test]
    fn bytes_use_text_when_possible() {
        assert_eq!(serde_json::to_value(WireBytes(b"abc".to_vec())).expect("json"), json!("abc"));
        assert_eq!(
            serde_json::to_value(WireBytes(vec![0x61, 0xff])).expect("json"),
            json!([97, 255])
        );
        let parsed: WireBytes = serde_json::from_value(json!([0, 1])).expect("array");
        assert_eq!(parsed.0, vec![0, 1]);
        let parsed: WireBytes = serde_json::from_value(json!("hi")).expect("text");
        assert_eq!(parsed.0, b"hi".to_vec());
    }

    #[test]
    fn row_set_shape_matches_protocol() {
        let set = RowSet::from_keys(["k"]).with_range(RowRange::prefix(vec![b'a', 0xff]));
        let value = serde_json::to_value(WireRowSet::from(&set)).expect("json");
        assert_eq!(
            value,
            json!({
                "keys": ["k"],
                "ranges": [{"start": {"closed": [97, 255]}, "end": {"open": "b"}}]
            })
        );
        let back: WireRowSet = serde_json::from_value(value).expect("parse");
        assert_eq!(RowSet::from(back), set);

        let unbounded = serde_json::to_value(WireRowSet::from(&RowSet::all())).expect("json");
        assert_eq!(unbounded, json!({"keys": [], "ranges": [{"start": "unbounded", "end": "unbounded"}]}));
    }

    #[test]
    fn chunk_lines_keep_absent_fields_absent() {
        let chunk = ChunkEvent::new().with_row_key("r").commit();
        let value = serde_json::to_value(WireChunk::from(&chunk)).expect("json");
        assert_eq!(value, json!({"row_key": "r", "status": "commit"}));

        let parsed: WireChunk =
            serde_json::from_value(json!({"value": "v", "timestamp": 3})).expect("parse");
        let event = ChunkEvent::from(parsed);
        assert_eq!(event.family, None);
        assert_eq!(event.value, Some(b"v".to_vec()));
        assert_eq!(event.timestamp, Some(3));
    }

    #[test]
    fn rows_convert_both_ways() {
        let mut row = Row::new("r1");
        row.push_cell("cf", b"q", Cell::new(vec![0xff], 5).with_labels(["l"]));
        let wire = WireRow::from(&row);
        let value = serde_json::to_value(&wire).expect("json");
        assert_eq!(
            value,
            json!({"key": "r1", "families": [{"name": "cf", "columns": [
                {"qualifier": "q", "cells": [{"value": [255], "timestamp": 5, "labels": ["l"]}]}
            ]}]})
        );
        assert_eq!(Row::from(wire), row);
    }

    #[test]
    fn error_envelope_round_trips_kind() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("unknown table")
            .with_table("t");
        let envelope = ErrorEnvelope::from(&err);
        let text = serde_json::to_string(&envelope).expect("json");
        let parsed: ErrorEnvelope = serde_json::from_str(&text).expect("parse");
        let back = Error::from(parsed.error);
        assert_eq!(back.kind(), ErrorKind::NotFound);
        assert_eq!(back.table(), Some("t"));

        let unknown: ErrorEnvelope =
            serde_json::from_value(json!({"error": {"kind": "mystery"}})).expect("parse");
        assert_eq!(Error::from(unknown.error).kind(), ErrorKind::Internal);
    }
}
