//! Core types and data structures for the payables system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which system an invoice record was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    /// The ERP export - the system of record for posted supplier invoices
    Erp,
    /// Invoices independently extracted from incoming email attachments
    Email,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Erp => "ERP",
            Source::Email => "EMAIL",
        }
    }
}

/// Canonical invoice record, post-normalization
///
/// Produced per sync run by the source extractors and never persisted
/// directly. A `total_amount` of zero means the amount failed to parse;
/// callers that need to distinguish "unknown" from "verified zero" must
/// track provenance separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Trimmed join key - not guaranteed unique across sources
    pub invoice_number: String,
    /// May differ in spelling between sources for the same logical supplier
    pub supplier_name: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Currency-agnostic amount; zero means "failed to parse"
    pub total_amount: BigDecimal,
    pub source: Source,
}

/// Which sides of the reconciliation join produced a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    Matched,
    ErpOnly,
    EmailOnly,
}

impl MatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::Matched => "MATCHED",
            MatchState::ErpOnly => "ERP_ONLY",
            MatchState::EmailOnly => "EMAIL_ONLY",
        }
    }
}

/// Due-date status tier relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DueStatus {
    /// Past due: days_to_due < 0
    Overdue,
    /// Due within the next week: 0 <= days_to_due <= 7
    DueSoon,
    /// Everything else
    Current,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::Overdue => "OVERDUE",
            DueStatus::DueSoon => "DUE_SOON",
            DueStatus::Current => "CURRENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OVERDUE" => Some(DueStatus::Overdue),
            "DUE_SOON" => Some(DueStatus::DueSoon),
            "CURRENT" => Some(DueStatus::Current),
            _ => None,
        }
    }
}

/// Per-source fields carried into a reconciled row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideFields {
    pub supplier_name: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total_amount: BigDecimal,
}

impl From<&InvoiceRecord> for SideFields {
    fn from(record: &InvoiceRecord) -> Self {
        Self {
            supplier_name: record.supplier_name.clone(),
            issue_date: record.issue_date,
            due_date: record.due_date,
            total_amount: record.total_amount.clone(),
        }
    }
}

/// Outer-join result of one ERP-side and/or one EMAIL-side invoice
///
/// An ephemeral merge view; it is used to populate and refresh the
/// persisted ledger but is never stored itself. Rows lacking a due date
/// on both sides carry no status and are excluded from status analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledInvoice {
    pub invoice_number: String,
    pub erp: Option<SideFields>,
    pub email: Option<SideFields>,
    /// ERP due date when present, otherwise the EMAIL due date
    pub effective_due_date: Option<NaiveDate>,
    /// May be negative; `None` when no due date is known
    pub days_to_due: Option<i64>,
    pub status: Option<DueStatus>,
    /// Both amounts present and differing by more than the fixed tolerance
    pub amount_mismatch: bool,
    pub match_state: MatchState,
}

impl ReconciledInvoice {
    /// Supplier name for display, preferring the system of record
    pub fn supplier_name(&self) -> &str {
        self.erp
            .as_ref()
            .or(self.email.as_ref())
            .map(|side| side.supplier_name.as_str())
            .unwrap_or_default()
    }

    /// Amount used when populating the ledger, preferring the ERP side
    pub fn ledger_amount(&self) -> BigDecimal {
        self.erp
            .as_ref()
            .or(self.email.as_ref())
            .map(|side| side.total_amount.clone())
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Issue date used when populating the ledger, preferring the ERP side
    pub fn ledger_issue_date(&self) -> Option<NaiveDate> {
        self.erp
            .as_ref()
            .and_then(|side| side.issue_date)
            .or_else(|| self.email.as_ref().and_then(|side| side.issue_date))
    }
}

/// Payment workflow lifecycle of a ledger invoice
///
/// Monotonic except for operator correction. Only the batch lifecycle
/// manager may move an invoice out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    InBatch,
    Paid,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::InBatch => "IN_BATCH",
            PaymentState::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentState::Pending),
            "IN_BATCH" => Some(PaymentState::InBatch),
            "PAID" => Some(PaymentState::Paid),
            _ => None,
        }
    }
}

/// Persisted invoice enriched with payment workflow fields
///
/// The unit the payment suggestion engine and the batch lifecycle
/// manager operate on. Created once on first sighting of an
/// `invoice_id` and refreshed on every subsequent sync, except for
/// `payment_state` and `batch_id` which the batch manager owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerInvoice {
    /// Stable identity derived from supplier, number, amount and issue
    /// date, so re-synchronization does not duplicate records
    pub invoice_id: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total_amount: BigDecimal,
    pub days_to_due: Option<i64>,
    pub status: Option<DueStatus>,
    pub payment_state: PaymentState,
    /// Early-payment discount fraction (e.g. 0.02), when an offer applies
    pub discount_pct: Option<BigDecimal>,
    pub discount_deadline: Option<NaiveDate>,
    /// Amount actually payable: discounted within the deadline, else full
    pub discounted_amount: BigDecimal,
    /// Set when entering a batch; null while `Pending`
    pub batch_id: Option<String>,
}

impl LedgerInvoice {
    /// Derive the stable ledger identity for an invoice.
    ///
    /// UUIDv5 over the identifying fields, so the same invoice seen on
    /// any number of sync runs maps to the same id.
    pub fn derive_id(
        supplier_name: &str,
        invoice_number: &str,
        total_amount: &BigDecimal,
        issue_date: Option<NaiveDate>,
    ) -> String {
        let issued = issue_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let key = format!(
            "{}|{}|{}|{}",
            supplier_name.trim(),
            invoice_number.trim(),
            total_amount.normalized(),
            issued
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }

    /// Savings realized by paying the discounted amount
    pub fn savings(&self) -> BigDecimal {
        &self.total_amount - &self.discounted_amount
    }
}

/// Treasury-facing state of a payment batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    PendingTreasury,
    PendingTreasuryUrgent,
    Paid,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::PendingTreasury => "PENDING_TREASURY",
            BatchState::PendingTreasuryUrgent => "PENDING_TREASURY_URGENT",
            BatchState::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_TREASURY" => Some(BatchState::PendingTreasury),
            "PENDING_TREASURY_URGENT" => Some(BatchState::PendingTreasuryUrgent),
            "PAID" => Some(BatchState::Paid),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            BatchState::PendingTreasury | BatchState::PendingTreasuryUrgent
        )
    }
}

/// A named, frozen group of invoices intended for a single payment run
///
/// Totals are computed over the members at creation time and never
/// recomputed afterward; the batch is a frozen financial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBatch {
    pub batch_id: String,
    pub created_at: NaiveDateTime,
    /// Immutable once the batch enters `Paid`
    pub member_invoice_ids: Vec<String>,
    pub total_original: BigDecimal,
    pub total_discounted: BigDecimal,
    pub total_savings: BigDecimal,
    pub batch_state: BatchState,
}

/// Errors that can occur in the payables system
#[derive(Debug, thiserror::Error)]
pub enum PayablesError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Missing expected column or field: {0}")]
    Schema(String),
    #[error("Invoice not found in ledger: {0}")]
    InvoiceNotFound(String),
    #[error("Batch not found: {0}")]
    BatchNotFound(String),
    #[error("State conflict on invoice {invoice_id}: expected {expected}, found {found}")]
    Conflict {
        invoice_id: String,
        expected: String,
        found: String,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Export error: {0}")]
    Export(String),
}

/// Result type for payables operations
pub type PayablesResult<T> = Result<T, PayablesError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn derive_id_is_deterministic_across_runs() {
        let amount = BigDecimal::from_str("1234.56").unwrap();
        let issued = NaiveDate::from_ymd_opt(2024, 5, 1);
        let first = LedgerInvoice::derive_id("ACME S.A.", "F-100", &amount, issued);
        let second = LedgerInvoice::derive_id("ACME S.A.", "F-100", &amount, issued);
        assert_eq!(first, second);
    }

    #[test]
    fn derive_id_ignores_trailing_zeros_and_whitespace() {
        let plain = BigDecimal::from_str("100").unwrap();
        let scaled = BigDecimal::from_str("100.00").unwrap();
        let a = LedgerInvoice::derive_id("ACME", "F-1", &plain, None);
        let b = LedgerInvoice::derive_id(" ACME ", " F-1 ", &scaled, None);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_id_distinguishes_suppliers() {
        let amount = BigDecimal::from(500);
        let a = LedgerInvoice::derive_id("ACME", "F-1", &amount, None);
        let b = LedgerInvoice::derive_id("Globex", "F-1", &amount, None);
        assert_ne!(a, b);
    }

    #[test]
    fn states_serialize_as_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentState::InBatch).unwrap(),
            "\"IN_BATCH\""
        );
        assert_eq!(
            serde_json::to_string(&BatchState::PendingTreasuryUrgent).unwrap(),
            "\"PENDING_TREASURY_URGENT\""
        );
        assert_eq!(
            serde_json::from_str::<DueStatus>("\"DUE_SOON\"").unwrap(),
            DueStatus::DueSoon
        );
    }

    #[test]
    fn state_round_trips() {
        for state in [
            PaymentState::Pending,
            PaymentState::InBatch,
            PaymentState::Paid,
        ] {
            assert_eq!(PaymentState::parse(state.as_str()), Some(state));
        }
        for state in [
            BatchState::PendingTreasury,
            BatchState::PendingTreasuryUrgent,
            BatchState::Paid,
        ] {
            assert_eq!(BatchState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PaymentState::parse("DONE"), None);
    }
}
