//! Purpose: Opaque row filter algebra passed through to fetch collaborators.
//! Exports: `RowFilter`, `chain`, `interleave`, `condition`.
//! Role: Typed, serde-serializable description of server-side filtering.
//! Invariants: Nothing in this crate evaluates filters; they are forwarded verbatim.

use crate::api::wire::bytes_serde;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    /// Every sub-filter in sequence (logical AND).
    Chain(Vec<RowFilter>),
    /// Union of every sub-filter's output (logical OR).
    Interleave(Vec<RowFilter>),
    Condition {
        predicate: Box<RowFilter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        true_filter: Option<Box<RowFilter>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        false_filter: Option<Box<RowFilter>>,
    },
    PassAll,
    BlockAll,
    RowKeyRegex(#[serde(with = "bytes_serde")] Vec<u8>),
    FamilyNameRegex(String),
    ColumnQualifierRegex(#[serde(with = "bytes_serde")] Vec<u8>),
    ValueRegex(#[serde(with = "bytes_serde")] Vec<u8>),
    TimestampRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_micros: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_micros: Option<i64>,
    },
    CellsPerRowLimit(u32),
    CellsPerRowOffset(u32),
    CellsPerColumnLimit(u32),
    StripValue,
    ApplyLabel(String),
}

pub fn chain(filters: impl IntoIterator<Item = RowFilter>) -> RowFilter {
    RowFilter::Chain(filters.into_iter().collect())
}

pub fn interleave(filters: impl IntoIterator<Item = RowFilter>) -> RowFilter {
    RowFilter::Interleave(filters.into_iter().collect())
}

pub fn condition(
    predicate: RowFilter,
    true_filter: Option<RowFilter>,
    false_filter: Option<RowFilter>,
) -> RowFilter {
    RowFilter::Condition {
        predicate: Box::new(predicate),
        true_filter: true_filter.map(Box::new),
        false_filter: false_filter.map(Box::new),
    }
}
