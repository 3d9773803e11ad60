//! Persisted invoice ledger over a row-oriented external store
//!
//! The ledger sheet is the authoritative record the payment workflow
//! operates on. Sync runs upsert reconciled rows into it: an invoice id
//! seen for the first time is appended, a known id has its amounts,
//! dates and status refreshed. The workflow-owned fields
//! (`payment_state`, `batch_id`) and the operator-entered discount offer
//! are never touched by sync; only the batch manager and
//! [`LedgerSheet::set_discount`] mutate those.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::str::FromStr;

use crate::classify::compute_discount;
use crate::traits::{CellOutcome, CellUpdate, RowStore};
use crate::types::{
    DueStatus, LedgerInvoice, PayablesError, PayablesResult, PaymentState, ReconciledInvoice,
};

pub(crate) const COL_INVOICE_ID: usize = 0;
pub(crate) const COL_INVOICE_NUMBER: usize = 1;
pub(crate) const COL_SUPPLIER_NAME: usize = 2;
pub(crate) const COL_ISSUE_DATE: usize = 3;
pub(crate) const COL_DUE_DATE: usize = 4;
pub(crate) const COL_TOTAL_AMOUNT: usize = 5;
pub(crate) const COL_DAYS_TO_DUE: usize = 6;
pub(crate) const COL_STATUS: usize = 7;
pub(crate) const COL_PAYMENT_STATE: usize = 8;
pub(crate) const COL_DISCOUNT_PCT: usize = 9;
pub(crate) const COL_DISCOUNT_DEADLINE: usize = 10;
pub(crate) const COL_DISCOUNTED_AMOUNT: usize = 11;
pub(crate) const COL_BATCH_ID: usize = 12;

const HEADER: [&str; 13] = [
    "invoice_id",
    "invoice_number",
    "supplier_name",
    "issue_date",
    "due_date",
    "total_amount",
    "days_to_due",
    "status",
    "payment_state",
    "discount_pct",
    "discount_deadline",
    "discounted_amount",
    "batch_id",
];

/// Counts from one sync run against the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Invoice ids appended for the first time
    pub created: usize,
    /// Known invoice ids whose source-owned fields were refreshed
    pub refreshed: usize,
    /// Reconciled rows collapsing onto an id already handled this run
    pub duplicates_skipped: usize,
}

/// Typed view over the ledger sheet of a [`RowStore`]
pub struct LedgerSheet<S: RowStore> {
    store: S,
}

impl<S: RowStore> LedgerSheet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append the header row if the sheet is empty
    pub async fn ensure_header(&mut self) -> PayablesResult<()> {
        if self.store.read_all().await?.is_empty() {
            self.store
                .append_row(HEADER.iter().map(|s| s.to_string()).collect())
                .await?;
        }
        Ok(())
    }

    /// Load every ledger invoice together with its store row position.
    ///
    /// Malformed data rows are skipped with a warning; a header that
    /// does not carry the expected columns is a schema error naming the
    /// first missing column.
    pub async fn load_entries(&self) -> PayablesResult<Vec<(usize, LedgerInvoice)>> {
        let rows = self.store.read_all().await?;
        let Some(header) = rows.first() else {
            return Ok(Vec::new());
        };
        verify_header(header)?;

        let mut entries = Vec::with_capacity(rows.len().saturating_sub(1));
        for (idx, row) in rows.iter().enumerate().skip(1) {
            match decode_row(row) {
                Some(invoice) => entries.push((idx, invoice)),
                None => {
                    tracing::warn!(row = idx, "skipping malformed ledger row");
                }
            }
        }
        Ok(entries)
    }

    /// Load every ledger invoice
    pub async fn load(&self) -> PayablesResult<Vec<LedgerInvoice>> {
        Ok(self
            .load_entries()
            .await?
            .into_iter()
            .map(|(_, invoice)| invoice)
            .collect())
    }

    /// Locate an invoice by id, scanning the id column.
    ///
    /// The store has no secondary index, so this is the only lookup.
    pub async fn find(&self, invoice_id: &str) -> PayablesResult<Option<(usize, LedgerInvoice)>> {
        Ok(self
            .load_entries()
            .await?
            .into_iter()
            .find(|(_, invoice)| invoice.invoice_id == invoice_id))
    }

    /// Upsert reconciled rows into the ledger.
    ///
    /// Rows reconciled to an id already present are refreshed in place;
    /// new ids are appended as `Pending`. Because the outer join can
    /// emit n*m combinations for a duplicated invoice number, only the
    /// first row per id in a run is applied and the rest are counted as
    /// duplicates.
    pub async fn sync_reconciled(
        &mut self,
        reconciled: &[ReconciledInvoice],
        today: NaiveDate,
    ) -> PayablesResult<SyncReport> {
        self.ensure_header().await?;
        let existing: HashMap<String, (usize, LedgerInvoice)> = self
            .load_entries()
            .await?
            .into_iter()
            .map(|(idx, invoice)| (invoice.invoice_id.clone(), (idx, invoice)))
            .collect();

        let mut report = SyncReport::default();
        let mut seen: Vec<String> = Vec::new();
        let mut updates: Vec<CellUpdate> = Vec::new();

        for row in reconciled {
            if row.invoice_number.trim().is_empty() {
                continue;
            }
            let supplier = row.supplier_name().to_string();
            let amount = row.ledger_amount();
            let issue_date = row.ledger_issue_date();
            let invoice_id =
                LedgerInvoice::derive_id(&supplier, &row.invoice_number, &amount, issue_date);

            if seen.contains(&invoice_id) {
                report.duplicates_skipped += 1;
                continue;
            }
            seen.push(invoice_id.clone());

            match existing.get(&invoice_id) {
                Some((row_idx, current)) => {
                    let (discounted, _) = compute_discount(
                        &amount,
                        current.discount_pct.as_ref(),
                        current.discount_deadline,
                        today,
                    );
                    updates.extend(refresh_updates(*row_idx, row, &supplier, &amount, &discounted));
                    report.refreshed += 1;
                }
                None => {
                    let invoice = LedgerInvoice {
                        invoice_id,
                        invoice_number: row.invoice_number.clone(),
                        supplier_name: supplier,
                        issue_date,
                        due_date: row.effective_due_date,
                        total_amount: amount.clone(),
                        days_to_due: row.days_to_due,
                        status: row.status,
                        payment_state: PaymentState::Pending,
                        discount_pct: None,
                        discount_deadline: None,
                        discounted_amount: amount,
                        batch_id: None,
                    };
                    self.store.append_row(encode_row(&invoice)).await?;
                    report.created += 1;
                }
            }
        }

        if !updates.is_empty() {
            let outcomes = self.store.update_cells(&updates).await?;
            warn_on_misses(&outcomes, "ledger sync refresh");
        }

        tracing::info!(
            created = report.created,
            refreshed = report.refreshed,
            duplicates_skipped = report.duplicates_skipped,
            "ledger sync complete"
        );
        Ok(report)
    }

    /// Record or clear an early-payment discount offer on an invoice.
    ///
    /// Recomputes the payable amount under the offer as of `today`.
    pub async fn set_discount(
        &mut self,
        invoice_id: &str,
        discount_pct: Option<BigDecimal>,
        deadline: Option<NaiveDate>,
        today: NaiveDate,
    ) -> PayablesResult<LedgerInvoice> {
        let (row_idx, mut invoice) = self
            .find(invoice_id)
            .await?
            .ok_or_else(|| PayablesError::InvoiceNotFound(invoice_id.to_string()))?;

        let (discounted, _) =
            compute_discount(&invoice.total_amount, discount_pct.as_ref(), deadline, today);
        invoice.discount_pct = discount_pct;
        invoice.discount_deadline = deadline;
        invoice.discounted_amount = discounted;

        let updates = [
            CellUpdate {
                row: row_idx,
                col: COL_DISCOUNT_PCT,
                value: invoice
                    .discount_pct
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            },
            CellUpdate {
                row: row_idx,
                col: COL_DISCOUNT_DEADLINE,
                value: fmt_date(invoice.discount_deadline),
            },
            CellUpdate {
                row: row_idx,
                col: COL_DISCOUNTED_AMOUNT,
                value: invoice.discounted_amount.to_string(),
            },
        ];
        let outcomes = self.store.update_cells(&updates).await?;
        if outcomes.iter().any(|o| !o.applied) {
            return Err(PayablesError::Storage(format!(
                "discount update for invoice {invoice_id} did not apply"
            )));
        }
        Ok(invoice)
    }

    pub(crate) async fn apply_updates(
        &mut self,
        updates: &[CellUpdate],
    ) -> PayablesResult<Vec<CellOutcome>> {
        self.store.update_cells(updates).await
    }
}

fn verify_header(header: &[String]) -> PayablesResult<()> {
    for (idx, expected) in HEADER.iter().enumerate() {
        if header.get(idx).map(String::as_str) != Some(*expected) {
            return Err(PayablesError::Schema(format!(
                "ledger column '{expected}' (position {idx})"
            )));
        }
    }
    Ok(())
}

fn refresh_updates(
    row_idx: usize,
    row: &ReconciledInvoice,
    supplier: &str,
    amount: &BigDecimal,
    discounted: &BigDecimal,
) -> Vec<CellUpdate> {
    vec![
        CellUpdate {
            row: row_idx,
            col: COL_SUPPLIER_NAME,
            value: supplier.to_string(),
        },
        CellUpdate {
            row: row_idx,
            col: COL_ISSUE_DATE,
            value: fmt_date(row.ledger_issue_date()),
        },
        CellUpdate {
            row: row_idx,
            col: COL_DUE_DATE,
            value: fmt_date(row.effective_due_date),
        },
        CellUpdate {
            row: row_idx,
            col: COL_TOTAL_AMOUNT,
            value: amount.to_string(),
        },
        CellUpdate {
            row: row_idx,
            col: COL_DAYS_TO_DUE,
            value: row.days_to_due.map(|d| d.to_string()).unwrap_or_default(),
        },
        CellUpdate {
            row: row_idx,
            col: COL_STATUS,
            value: row.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
        },
        CellUpdate {
            row: row_idx,
            col: COL_DISCOUNTED_AMOUNT,
            value: discounted.to_string(),
        },
    ]
}

pub(crate) fn encode_row(invoice: &LedgerInvoice) -> Vec<String> {
    vec![
        invoice.invoice_id.clone(),
        invoice.invoice_number.clone(),
        invoice.supplier_name.clone(),
        fmt_date(invoice.issue_date),
        fmt_date(invoice.due_date),
        invoice.total_amount.to_string(),
        invoice.days_to_due.map(|d| d.to_string()).unwrap_or_default(),
        invoice
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        invoice.payment_state.as_str().to_string(),
        invoice
            .discount_pct
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default(),
        fmt_date(invoice.discount_deadline),
        invoice.discounted_amount.to_string(),
        invoice.batch_id.clone().unwrap_or_default(),
    ]
}

fn decode_row(row: &[String]) -> Option<LedgerInvoice> {
    if row.len() < HEADER.len() {
        return None;
    }
    let invoice_id = row[COL_INVOICE_ID].trim();
    if invoice_id.is_empty() {
        return None;
    }
    let payment_state = PaymentState::parse(row[COL_PAYMENT_STATE].trim())?;

    Some(LedgerInvoice {
        invoice_id: invoice_id.to_string(),
        invoice_number: row[COL_INVOICE_NUMBER].clone(),
        supplier_name: row[COL_SUPPLIER_NAME].clone(),
        issue_date: parse_date(&row[COL_ISSUE_DATE]),
        due_date: parse_date(&row[COL_DUE_DATE]),
        total_amount: parse_amount(&row[COL_TOTAL_AMOUNT]),
        days_to_due: row[COL_DAYS_TO_DUE].trim().parse().ok(),
        status: DueStatus::parse(row[COL_STATUS].trim()),
        payment_state,
        discount_pct: {
            let cell = row[COL_DISCOUNT_PCT].trim();
            if cell.is_empty() {
                None
            } else {
                BigDecimal::from_str(cell).ok()
            }
        },
        discount_deadline: parse_date(&row[COL_DISCOUNT_DEADLINE]),
        discounted_amount: parse_amount(&row[COL_DISCOUNTED_AMOUNT]),
        batch_id: {
            let cell = row[COL_BATCH_ID].trim();
            if cell.is_empty() {
                None
            } else {
                Some(cell.to_string())
            }
        },
    })
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell.trim(), "%Y-%m-%d").ok()
}

fn parse_amount(cell: &str) -> BigDecimal {
    BigDecimal::from_str(cell.trim()).unwrap_or_else(|_| BigDecimal::from(0))
}

pub(crate) fn warn_on_misses(outcomes: &[CellOutcome], context: &str) {
    for outcome in outcomes.iter().filter(|o| !o.applied) {
        tracing::warn!(
            row = outcome.row,
            col = outcome.col,
            context,
            "cell update did not apply"
        );
    }
}
