//! Purpose: Define the fetch collaborator boundary used by scans.
//! Exports: `Fetch`, `FetchRequest`, `TableRef`, `CancelToken`.
//! Role: The only seam between scan logic and a concrete store transport.
//! Invariants: Implementors return chunk-events in store order; the scan never re-sorts.
//! Invariants: Implementors hold their own connection/credential context (no globals).
#![allow(clippy::result_large_err)]

use crate::api::filter::RowFilter;
use crate::core::chunk::ChunkEvent;
use crate::core::error::{Error, ErrorKind};
use crate::core::range::RowSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Validated table locator.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TableRef(String);

impl TableRef {
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("table name must not be empty"));
        }
        if name.contains('/') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table names must not contain path separators")
                .with_table(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cooperative abort flag shared between a scan and whoever wants to stop it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(Error::new(ErrorKind::Cancelled).with_message("fetch cancelled"));
        }
        Ok(())
    }
}

/// One bounded read.
#[derive(Clone, Copy, Debug)]
pub struct FetchRequest<'a> {
    pub table: &'a TableRef,
    pub row_set: &'a RowSet,
    pub filter: Option<&'a RowFilter>,
    pub rows_limit: usize,
    pub cancel: &'a CancelToken,
}

pub trait Fetch {
    /// Return the chunk-events for at most `rows_limit` rows selected by the request.
    fn fetch_batch(&self, request: &FetchRequest<'_>) -> Result<Vec<ChunkEvent>, Error>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch_batch(&self, request: &FetchRequest<'_>) -> Result<Vec<ChunkEvent>, Error> {
        (**self).fetch_batch(request)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch_batch(&self, request: &FetchRequest<'_>) -> Result<Vec<ChunkEvent>, Error> {
        (**self).fetch_batch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, TableRef};
    use crate::core::error::ErrorKind;

    #[test]
    fn table_ref_rejects_empty_and_separators() {
        assert_eq!(TableRef::new("").expect_err("empty").kind(), ErrorKind::Usage);
        let err = TableRef::new("a/b").expect_err("slash");
        assert_eq!(err.table(), Some("a/b"));
        assert_eq!(TableRef::new("users").expect("ok").as_str(), "users");
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check().expect_err("cancelled").kind(), ErrorKind::Cancelled);
    }
}
