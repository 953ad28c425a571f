//! Purpose: In-process fetch collaborator over sorted in-memory tables.
//! Exports: `MemoryStore`, `row_chunks`.
//! Role: Backs fixture-driven CLI scans, the HTTP emulator, and tests.
//! Invariants: Rows are returned in ascending key order, at most `rows_limit` per batch.
//! Invariants: Filters are accepted and ignored; an empty row set matches nothing.
//! Invariants: Each batch seeks to the lowest key the row set can match instead of walking the table.
#![allow(clippy::result_large_err)]

use crate::api::fetch::{Fetch, FetchRequest};
use crate::api::wire::Fixture;
use crate::core::chunk::{ChunkEvent, RowStatus};
use crate::core::error::{Error, ErrorKind};
use crate::core::range::RowSet;
use crate::core::row::Row;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, BTreeMap<Vec<u8>, Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty table; existing rows are kept.
    pub fn create_table(&mut self, table: impl Into<String>) {
        self.tables.entry(table.into()).or_default();
    }

    /// Insert or replace a row, creating the table if needed.
    pub fn insert_row(&mut self, table: impl Into<String>, row: Row) {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(row.key().to_vec(), row);
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(BTreeMap::len)
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut store = Self::new();
        for (table, rows) in fixture.tables {
            store.create_table(table.clone());
            for row in rows {
                store.insert_row(table.clone(), Row::from(row));
            }
        }
        store
    }

    pub fn from_fixture_str(text: &str) -> Result<Self, Error> {
        let fixture: Fixture = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid fixture json")
                .with_hint("Fixtures look like {\"tables\": {\"name\": [{\"key\": ..., \"families\": [...]}]}}.")
                .with_source(err)
        })?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn load_fixture(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read fixture {}", path.display()))
                .with_source(err)
        })?;
        let store = Self::from_fixture_str(&text)?;
        debug!(path = %path.display(), tables = store.tables.len(), "fixture loaded");
        Ok(store)
    }
}

impl Fetch for MemoryStore {
    /// A `rows_limit` of zero means no limit.
    fn fetch_batch(&self, request: &FetchRequest<'_>) -> Result<Vec<ChunkEvent>, Error> {
        request.cancel.check()?;
        let table = request.table.as_str();
        let rows = self.tables.get(table).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("unknown table")
                .with_table(table)
        })?;
        let limit = match request.rows_limit {
            0 => usize::MAX,
            limit => limit,
        };
        let chunks = rows
            .range::<[u8], _>((seek_start(request.row_set), Bound::Unbounded))
            .map(|(_, row)| row)
            .filter(|row| request.row_set.contains(row.key()))
            .take(limit)
            .flat_map(row_chunks)
            .collect();
        Ok(chunks)
    }
}

/// Lowest key any member of `row_set` can match; the seek point for a batch.
fn seek_start(row_set: &RowSet) -> Bound<&[u8]> {
    let mut lowest: Option<&[u8]> = None;
    for range in row_set.ranges() {
        match range.start() {
            Bound::Unbounded => return Bound::Unbounded,
            Bound::Included(start) | Bound::Excluded(start) => {
                lowest = Some(lowest.map_or(start, |low| low.min(start)));
            }
        }
    }
    for key in row_set.keys() {
        lowest = Some(lowest.map_or(key.as_slice(), |low| low.min(key.as_slice())));
    }
    match lowest {
        Some(low) => Bound::Included(low),
        None => Bound::Unbounded,
    }
}

/// Render a row as the chunk-events a well-behaved store would stream.
///
/// The first chunk carries the key, every cell gets its own fully populated
/// chunk, and the last chunk commits. A row with no cells is one commit chunk.
pub fn row_chunks(row: &Row) -> Vec<ChunkEvent> {
    let mut chunks: Vec<ChunkEvent> = Vec::with_capacity(row.cell_count().max(1));
    for family in &row.families {
        for column in &family.columns {
            for cell in &column.cells {
                let mut chunk = ChunkEvent::new().with_cell(
                    family.name.clone(),
                    column.qualifier.clone(),
                    cell.timestamp,
                    cell.value.clone(),
                );
                if !cell.labels.is_empty() {
                    chunk = chunk.with_labels(cell.labels.iter().cloned());
                }
                chunks.push(chunk);
            }
        }
    }
    if chunks.is_empty() {
        chunks.push(ChunkEvent::new());
    }
    if let Some(first) = chunks.first_mut() {
        first.row_key = Some(row.key().to_vec());
    }
    if let Some(last) = chunks.last_mut() {
        last.status = RowStatus::Commit;
    }
    chunks
}
