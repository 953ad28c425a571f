//! Purpose: Define the public Rust API boundary for widerow.
//! Exports: Value types, codecs, fetch collaborators and scans needed by the CLI and callers.
//! Role: Public surface; re-exports core types so callers need only `widerow::api`.
//! Invariants: Every store access goes through a `Fetch` implementor passed in explicitly.

mod fetch;
mod filter;
mod memory;
mod remote;
mod scan;
pub mod wire;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::chunk::{AssemblerState, ChunkAssembler, ChunkEvent, RowStatus, assemble};
pub use crate::core::codec::{Value, ValueKind, decode, decode_or_panic, encode};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::range::{RowRange, RowSet, prefix_successor};
pub use crate::core::row::{Cell, Column, Family, Row};
pub use crate::core::term::Term;
pub use fetch::{CancelToken, Fetch, FetchRequest, TableRef};
pub use filter::{RowFilter, chain, condition, interleave};
pub use memory::{MemoryStore, row_chunks};
pub use remote::{JSONL_CONTENT_TYPE, RemoteClient, parse_table_uri};
pub use scan::{Scan, ScanOptions, read_row, read_rows};
