//! Payment batch lifecycle: creation, treasury confirmation, listing
//!
//! State machine per batch:
//!
//! ```text
//! (none) --create_batch--> PENDING_TREASURY[_URGENT] --confirm_payment--> PAID
//! ```
//!
//! The ledger and the batch history are separate external stores with no
//! cross-store transaction. `create_batch` is all-or-nothing from the
//! caller's view thanks to a read-verify-write guard on every member;
//! `confirm_payment` is at-least-once: the batch is marked paid first
//! and member updates that fail afterwards are surfaced in the outcome
//! for manual reconciliation rather than rolled back.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::str::FromStr;
use uuid::Uuid;

use crate::ledger::{warn_on_misses, LedgerSheet, COL_BATCH_ID, COL_PAYMENT_STATE};
use crate::traits::{CellUpdate, RowStore};
use crate::types::{
    BatchState, PayablesError, PayablesResult, PaymentBatch, PaymentState,
};

const COL_BATCH_ID_COL: usize = 0;
const COL_CREATED_AT: usize = 1;
const COL_MEMBERS: usize = 2;
const COL_TOTAL_ORIGINAL: usize = 3;
const COL_TOTAL_DISCOUNTED: usize = 4;
const COL_TOTAL_SAVINGS: usize = 5;
const COL_BATCH_STATE: usize = 6;

const HEADER: [&str; 7] = [
    "batch_id",
    "created_at",
    "member_invoice_ids",
    "total_original",
    "total_discounted",
    "total_savings",
    "batch_state",
];

const MEMBER_SEPARATOR: char = ';';
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Result of confirming a batch as paid.
///
/// `missing` lists member invoices that could not be updated (vanished
/// from the ledger or rejected by the store); the batch itself is paid
/// regardless and those members need manual reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub batch_id: String,
    pub updated: Vec<String>,
    pub missing: Vec<String>,
}

impl ConfirmOutcome {
    pub fn fully_applied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Typed view over the batch history sheet of a [`RowStore`]
pub struct BatchSheet<S: RowStore> {
    store: S,
}

impl<S: RowStore> BatchSheet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn ensure_header(&mut self) -> PayablesResult<()> {
        if self.store.read_all().await?.is_empty() {
            self.store
                .append_row(HEADER.iter().map(|s| s.to_string()).collect())
                .await?;
        }
        Ok(())
    }

    pub async fn load_entries(&self) -> PayablesResult<Vec<(usize, PaymentBatch)>> {
        let rows = self.store.read_all().await?;
        let Some(header) = rows.first() else {
            return Ok(Vec::new());
        };
        verify_header(header)?;

        let mut entries = Vec::with_capacity(rows.len().saturating_sub(1));
        for (idx, row) in rows.iter().enumerate().skip(1) {
            match decode_row(row) {
                Some(batch) => entries.push((idx, batch)),
                None => tracing::warn!(row = idx, "skipping malformed batch row"),
            }
        }
        Ok(entries)
    }

    pub async fn find(&self, batch_id: &str) -> PayablesResult<Option<(usize, PaymentBatch)>> {
        Ok(self
            .load_entries()
            .await?
            .into_iter()
            .find(|(_, batch)| batch.batch_id == batch_id))
    }

    async fn append(&mut self, batch: &PaymentBatch) -> PayablesResult<()> {
        self.ensure_header().await?;
        self.store.append_row(encode_row(batch)).await
    }

    async fn mark_paid(&mut self, row_idx: usize, batch_id: &str) -> PayablesResult<()> {
        let outcomes = self
            .store
            .update_cells(&[CellUpdate {
                row: row_idx,
                col: COL_BATCH_STATE,
                value: BatchState::Paid.as_str().to_string(),
            }])
            .await?;
        if outcomes.iter().any(|o| !o.applied) {
            return Err(PayablesError::Storage(format!(
                "batch {batch_id} state update did not apply"
            )));
        }
        Ok(())
    }
}

/// Batch lifecycle manager coordinating the ledger and batch history
pub struct BatchManager<L: RowStore, B: RowStore> {
    ledger: LedgerSheet<L>,
    history: BatchSheet<B>,
}

impl<L: RowStore, B: RowStore> BatchManager<L, B> {
    pub fn new(ledger: LedgerSheet<L>, history: BatchSheet<B>) -> Self {
        Self { ledger, history }
    }

    /// Create a payment batch from the selected invoices.
    ///
    /// Re-reads the ledger immediately before mutating and rejects the
    /// whole operation if any selected invoice is missing or no longer
    /// `Pending` - two operators cannot silently double-book an invoice.
    /// Totals are computed and frozen here; the batch is created urgent
    /// when any member is overdue at creation time.
    pub async fn create_batch(&mut self, selected_ids: &[String]) -> PayablesResult<PaymentBatch> {
        if selected_ids.is_empty() {
            return Err(PayablesError::Validation(
                "cannot create a batch with no invoices".to_string(),
            ));
        }

        let mut member_ids: Vec<String> = Vec::with_capacity(selected_ids.len());
        for id in selected_ids {
            if !member_ids.contains(id) {
                member_ids.push(id.clone());
            }
        }

        // Optimistic-concurrency guard: fresh read, verify every member.
        let entries = self.ledger.load_entries().await?;
        let mut members = Vec::with_capacity(member_ids.len());
        for id in &member_ids {
            let (row_idx, invoice) = entries
                .iter()
                .find(|(_, inv)| &inv.invoice_id == id)
                .ok_or_else(|| PayablesError::InvoiceNotFound(id.clone()))?;
            if invoice.payment_state != PaymentState::Pending {
                tracing::warn!(
                    invoice_id = %id,
                    found = invoice.payment_state.as_str(),
                    "refusing to batch an invoice that is no longer pending"
                );
                return Err(PayablesError::Conflict {
                    invoice_id: id.clone(),
                    expected: PaymentState::Pending.as_str().to_string(),
                    found: invoice.payment_state.as_str().to_string(),
                });
            }
            members.push((*row_idx, invoice.clone()));
        }

        let total_original: BigDecimal =
            members.iter().map(|(_, inv)| inv.total_amount.clone()).sum();
        let total_discounted: BigDecimal = members
            .iter()
            .map(|(_, inv)| inv.discounted_amount.clone())
            .sum();
        let total_savings = &total_original - &total_discounted;

        let urgent = members
            .iter()
            .any(|(_, inv)| inv.days_to_due.is_some_and(|d| d < 0));
        let batch = PaymentBatch {
            batch_id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            member_invoice_ids: member_ids,
            total_original,
            total_discounted,
            total_savings,
            batch_state: if urgent {
                BatchState::PendingTreasuryUrgent
            } else {
                BatchState::PendingTreasury
            },
        };

        self.history.append(&batch).await?;

        let mut updates = Vec::with_capacity(members.len() * 2);
        for (row_idx, _) in &members {
            updates.push(CellUpdate {
                row: *row_idx,
                col: COL_PAYMENT_STATE,
                value: PaymentState::InBatch.as_str().to_string(),
            });
            updates.push(CellUpdate {
                row: *row_idx,
                col: COL_BATCH_ID,
                value: batch.batch_id.clone(),
            });
        }
        let outcomes = self.ledger.apply_updates(&updates).await?;
        if outcomes.iter().any(|o| !o.applied) {
            warn_on_misses(&outcomes, "create_batch member update");
            return Err(PayablesError::Storage(format!(
                "batch {} created but some member updates did not apply",
                batch.batch_id
            )));
        }

        tracing::info!(
            batch_id = %batch.batch_id,
            members = batch.member_invoice_ids.len(),
            state = batch.batch_state.as_str(),
            "payment batch created"
        );
        Ok(batch)
    }

    /// Confirm a pending batch as paid.
    ///
    /// The batch record is marked paid first; member invoices are then
    /// updated to `Paid`. Members that vanished from the ledger or whose
    /// update was rejected come back in `ConfirmOutcome::missing` - the
    /// batch stays paid and the discrepancy is the operator's to
    /// reconcile.
    pub async fn confirm_payment(&mut self, batch_id: &str) -> PayablesResult<ConfirmOutcome> {
        let (batch_row, batch) = self
            .history
            .find(batch_id)
            .await?
            .ok_or_else(|| PayablesError::BatchNotFound(batch_id.to_string()))?;

        self.history.mark_paid(batch_row, batch_id).await?;

        // Fresh read of the ledger; some members may have vanished.
        let entries = self.ledger.load_entries().await?;
        let mut updates = Vec::new();
        let mut update_ids = Vec::new();
        let mut missing = Vec::new();
        for id in &batch.member_invoice_ids {
            match entries.iter().find(|(_, inv)| &inv.invoice_id == id) {
                Some((row_idx, _)) => {
                    updates.push(CellUpdate {
                        row: *row_idx,
                        col: COL_PAYMENT_STATE,
                        value: PaymentState::Paid.as_str().to_string(),
                    });
                    update_ids.push(id.clone());
                }
                None => missing.push(id.clone()),
            }
        }

        let mut updated = Vec::with_capacity(update_ids.len());
        if !updates.is_empty() {
            let outcomes = self.ledger.apply_updates(&updates).await?;
            for (outcome, id) in outcomes.iter().zip(update_ids) {
                if outcome.applied {
                    updated.push(id);
                } else {
                    missing.push(id);
                }
            }
        }

        if missing.is_empty() {
            tracing::info!(batch_id, members = updated.len(), "batch confirmed paid");
        } else {
            tracing::warn!(
                batch_id,
                updated = updated.len(),
                missing = ?missing,
                "batch confirmed paid with members needing manual reconciliation"
            );
        }

        Ok(ConfirmOutcome {
            batch_id: batch_id.to_string(),
            updated,
            missing,
        })
    }

    /// List batches still awaiting treasury, urgent first, newest first
    pub async fn pending_batches(&self) -> PayablesResult<Vec<PaymentBatch>> {
        let mut pending: Vec<PaymentBatch> = self
            .history
            .load_entries()
            .await?
            .into_iter()
            .map(|(_, batch)| batch)
            .filter(|batch| batch.batch_state.is_pending())
            .collect();
        pending.sort_by(|a, b| {
            urgency_rank(a.batch_state)
                .cmp(&urgency_rank(b.batch_state))
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(pending)
    }
}

fn urgency_rank(state: BatchState) -> u8 {
    match state {
        BatchState::PendingTreasuryUrgent => 0,
        _ => 1,
    }
}

fn verify_header(header: &[String]) -> PayablesResult<()> {
    for (idx, expected) in HEADER.iter().enumerate() {
        if header.get(idx).map(String::as_str) != Some(*expected) {
            return Err(PayablesError::Schema(format!(
                "batch column '{expected}' (position {idx})"
            )));
        }
    }
    Ok(())
}

fn encode_row(batch: &PaymentBatch) -> Vec<String> {
    vec![
        batch.batch_id.clone(),
        batch.created_at.format(TIMESTAMP_FORMAT).to_string(),
        batch
            .member_invoice_ids
            .join(&MEMBER_SEPARATOR.to_string()),
        batch.total_original.to_string(),
        batch.total_discounted.to_string(),
        batch.total_savings.to_string(),
        batch.batch_state.as_str().to_string(),
    ]
}

fn decode_row(row: &[String]) -> Option<PaymentBatch> {
    if row.len() < HEADER.len() {
        return None;
    }
    let batch_id = row[COL_BATCH_ID_COL].trim();
    if batch_id.is_empty() {
        return None;
    }
    let created_at =
        NaiveDateTime::parse_from_str(row[COL_CREATED_AT].trim(), TIMESTAMP_FORMAT).ok()?;
    let batch_state = BatchState::parse(row[COL_BATCH_STATE].trim())?;

    Some(PaymentBatch {
        batch_id: batch_id.to_string(),
        created_at,
        member_invoice_ids: row[COL_MEMBERS]
            .split(MEMBER_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        total_original: BigDecimal::from_str(row[COL_TOTAL_ORIGINAL].trim()).ok()?,
        total_discounted: BigDecimal::from_str(row[COL_TOTAL_DISCOUNTED].trim()).ok()?,
        total_savings: BigDecimal::from_str(row[COL_TOTAL_SAVINGS].trim()).ok()?,
        batch_state,
    })
}
