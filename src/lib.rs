//! # Payables Core
//!
//! Reconciles supplier invoices recorded in an ERP export against
//! invoices independently extracted from incoming email attachments,
//! producing a unified ledger that flags overdue and soon-due invoices
//! and value mismatches, and drives a payment-batching workflow.
//!
//! ## Features
//!
//! - **Field normalization**: locale-aware monetary strings and
//!   multi-format dates canonicalized into typed values, failing closed
//! - **Source extractors**: positional delimited ERP exports and
//!   label-driven e-invoice XML bundles mapped to one canonical record
//! - **Reconciliation**: full outer join on invoice number with
//!   due-status classification and amount-mismatch flags
//! - **Payment suggestion**: strategy-ordered greedy selection of
//!   pending invoices under a budget
//! - **Batch lifecycle**: auditable payment batches with optimistic
//!   concurrency over a shared row-oriented external store
//! - **Storage abstraction**: backend-agnostic design with a trait-based
//!   row store
//!
//! ## Quick Start
//!
//! ```rust
//! use payables_core::{reconcile, suggest, Strategy};
//! use chrono::NaiveDate;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let rows = reconcile(&[], &[], today);
//! assert!(rows.is_empty());
//! ```

pub mod batch;
pub mod classify;
pub mod extract;
pub mod ledger;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod suggest;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use batch::{BatchManager, BatchSheet, ConfirmOutcome};
pub use classify::{amounts_mismatch, classify_due, compute_discount, days_to_due};
pub use extract::*;
pub use ledger::{LedgerSheet, SyncReport};
pub use normalize::{mismatch_tolerance, normalize_amount, normalize_date};
pub use reconcile::reconcile;
pub use report::{write_ledger_report, write_reconciliation_report};
pub use suggest::{suggest, Strategy};
pub use traits::*;
pub use types::*;
