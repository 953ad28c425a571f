//! Purpose: Shared library crate used by the `widerow` CLI and tests.
//! Exports: `core` (ranges, rows, chunk assembly, codecs, errors) and `api` (fetchers, scans).
//! Role: Client-side adapter logic for sorted wide-column stores, independent of transport.
//! Invariants: Core modules perform no I/O; all store access goes through `api::Fetch`.
pub mod api;
pub mod core;
