//! Purpose: Resumable, forward-only row scans over a fetch collaborator.
//! Exports: `Scan`, `ScanOptions`, `read_row`, `read_rows`.
//! Role: Turns bounded batch reads into one ordered stream of rows.
//! Invariants: After each batch the first range still in use restarts just past the last yielded key.
//! Invariants: A fetch error or an empty batch exhausts the scan permanently; nothing retries.
//! Invariants: No row key at or before the last yielded key is yielded again.
//! Notes: One consumer per scan; independent scans may run on different threads.
#![allow(clippy::result_large_err)]

use crate::api::fetch::{CancelToken, Fetch, FetchRequest, TableRef};
use crate::api::filter::RowFilter;
use crate::core::chunk::assemble;
use crate::core::error::{Error, ErrorKind};
use crate::core::range::RowSet;
use crate::core::row::Row;
use bstr::BStr;
use std::collections::VecDeque;
use tracing::{debug, warn};

const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Row ceiling for each fetch.
    pub batch_size: usize,
    pub filter: Option<RowFilter>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            filter: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Scan<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    table: TableRef,
    options: ScanOptions,
    row_set: RowSet,
    buffer: VecDeque<Row>,
    last_key: Option<Vec<u8>>,
    resume_pending: bool,
    exhausted: bool,
    cancel: CancelToken,
    batches: usize,
    yielded: usize,
}

impl<'a, F: Fetch + ?Sized> Scan<'a, F> {
    pub fn open(
        fetcher: &'a F,
        table: TableRef,
        row_set: RowSet,
        options: ScanOptions,
    ) -> Result<Self, Error> {
        if options.batch_size == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch size must be at least 1")
                .with_table(table.as_str()));
        }
        Ok(Self {
            fetcher,
            table,
            options,
            row_set,
            buffer: VecDeque::new(),
            last_key: None,
            resume_pending: false,
            exhausted: false,
            cancel: CancelToken::new(),
            batches: 0,
            yielded: 0,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Row set used for the most recent fetch (or the next one, before any fetch).
    pub fn effective_row_set(&self) -> &RowSet {
        &self.row_set
    }

    pub fn batches_fetched(&self) -> usize {
        self.batches
    }

    pub fn rows_yielded(&self) -> usize {
        self.yielded
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Handle that aborts in-flight and future fetches from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn next_row(&mut self) -> Result<Option<Row>, Error> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                self.last_key = Some(row.key().to_vec());
                self.yielded += 1;
                return Ok(Some(row));
            }
            if self.exhausted {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                debug!(table = %self.table, "scan cancelled");
                self.exhausted = true;
                return Ok(None);
            }
            self.fetch_next_batch()?;
        }
    }

    /// Stop the scan and release buffered rows. Safe to call more than once.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.buffer.clear();
        self.exhausted = true;
    }

    fn fetch_next_batch(&mut self) -> Result<(), Error> {
        if self.resume_pending {
            if let Some(last) = &self.last_key {
                self.row_set = self.row_set.resume_after(last);
                debug!(
                    table = %self.table,
                    after = %BStr::new(last),
                    keys = self.row_set.keys().len(),
                    ranges = self.row_set.ranges().len(),
                    "scan resumes past last key"
                );
            }
            self.resume_pending = false;
        }
        if self.row_set.is_empty() {
            debug!(table = %self.table, "row set selects nothing; scan finished");
            self.exhausted = true;
            return Ok(());
        }

        let request = FetchRequest {
            table: &self.table,
            row_set: &self.row_set,
            filter: self.options.filter.as_ref(),
            rows_limit: self.options.batch_size,
            cancel: &self.cancel,
        };
        let chunks = match self.fetcher.fetch_batch(&request) {
            Ok(chunks) => chunks,
            Err(err) => {
                self.exhausted = true;
                if err.kind() == ErrorKind::Cancelled && self.cancel.is_cancelled() {
                    debug!(table = %self.table, "fetch aborted by cancellation");
                    return Ok(());
                }
                return Err(err);
            }
        };
        self.batches += 1;
        if chunks.is_empty() {
            debug!(table = %self.table, batch = self.batches, "empty batch; scan finished");
            self.exhausted = true;
            return Ok(());
        }

        let (rows, dangling) = assemble(chunks);
        if dangling > 0 {
            debug!(
                table = %self.table,
                cells = dangling,
                "batch ended inside an uncommitted row; partial row dropped"
            );
        }
        let assembled = rows.len();
        let last_key = self.last_key.as_deref();
        let fresh: Vec<Row> = rows
            .into_iter()
            .filter(|row| last_key.is_none_or(|last| row.key() > last))
            .collect();
        debug!(
            table = %self.table,
            batch = self.batches,
            rows_limit = self.options.batch_size,
            rows = assembled,
            fresh = fresh.len(),
            "batch fetched"
        );
        if fresh.is_empty() {
            // Later ranges are never narrowed; when they overlap what was
            // already delivered they can return nothing new.
            warn!(
                table = %self.table,
                batch = self.batches,
                "batch held no rows past the last yielded key; ending scan"
            );
            self.exhausted = true;
            return Ok(());
        }
        self.buffer.extend(fresh);
        self.resume_pending = true;
        Ok(())
    }
}

impl<F: Fetch + ?Sized> Iterator for Scan<'_, F> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl<F: Fetch + ?Sized> Drop for Scan<'_, F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read a single row by key.
pub fn read_row<F: Fetch + ?Sized>(
    fetcher: &F,
    table: TableRef,
    key: impl Into<Vec<u8>>,
    filter: Option<RowFilter>,
) -> Result<Option<Row>, Error> {
    let mut options = ScanOptions::new().with_batch_size(1);
    options.filter = filter;
    let mut scan = Scan::open(fetcher, table, RowSet::from_keys([key]), options)?;
    scan.next_row()
}

/// Drain a scan into memory.
pub fn read_rows<F: Fetch + ?Sized>(
    fetcher: &F,
    table: TableRef,
    row_set: RowSet,
    options: ScanOptions,
) -> Result<Vec<Row>, Error> {
    Scan::open(fetcher, table, row_set, options)?.collect()
}
