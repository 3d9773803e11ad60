//! Storage abstraction for the external row-oriented stores
//!
//! The ledger and the batch history live in an external spreadsheet-like
//! store shared across operator sessions. The store exposes only
//! positional primitives - read all rows, append a row, update targeted
//! cells - and has no secondary index, so the core scans the id column
//! itself. Implement [`RowStore`] to plug in a real backend; the
//! in-memory implementation under `utils` serves tests and development.

use async_trait::async_trait;

use crate::types::PayablesResult;

/// A single targeted cell write, keyed by absolute row position
///
/// Row 0 is the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// Per-cell result of a batch update.
///
/// The store offers no cross-row atomicity; updates that miss (row
/// deleted under us, column out of range) are reported here instead of
/// failing the whole call, so callers can treat partial application as
/// a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellOutcome {
    pub row: usize,
    pub col: usize,
    pub applied: bool,
}

/// Row-oriented external store, shared across operator sessions.
///
/// Mutations from other processes can land between any two calls;
/// callers that mutate must re-read immediately beforehand and verify
/// state (optimistic concurrency). A transport failure surfaces as
/// `Connectivity`; retries are the caller's decision.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read every row, header first. Cells are raw strings.
    async fn read_all(&self) -> PayablesResult<Vec<Vec<String>>>;

    /// Append one row after the last existing row.
    async fn append_row(&mut self, row: Vec<String>) -> PayablesResult<()>;

    /// Apply a batch of targeted cell writes as one logical unit.
    ///
    /// Returns one outcome per requested cell, in request order. The
    /// call itself only errs on transport/storage failure; individual
    /// misses come back as `applied: false`.
    async fn update_cells(&mut self, updates: &[CellUpdate]) -> PayablesResult<Vec<CellOutcome>>;
}
