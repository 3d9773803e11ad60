//! Reconciliation engine: outer join of the two canonical invoice sets
//!
//! The join key is the bare trimmed invoice number, matched exactly.
//! This is a known precision limit: two different suppliers issuing the
//! same invoice number will be cross-matched. A compound
//! supplier+number key would close that hole at the cost of losing
//! matches across supplier-name spelling drift between sources.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::classify::{amounts_mismatch, classify_due, days_to_due};
use crate::types::{InvoiceRecord, MatchState, ReconciledInvoice, SideFields, Source};

/// Full outer join of the ERP and EMAIL invoice sets on invoice number.
///
/// For invoice numbers appearing multiple times in either source, all
/// n*m combinations are produced (standard outer-join semantics);
/// callers must deduplicate by a more specific key if needed. Output is
/// deterministic for identical inputs: keys are visited in sorted order
/// and rows pair up in input order within a key.
pub fn reconcile(
    erp: &[InvoiceRecord],
    email: &[InvoiceRecord],
    today: NaiveDate,
) -> Vec<ReconciledInvoice> {
    let erp_by_key = group_by_number(erp, Source::Erp);
    let email_by_key = group_by_number(email, Source::Email);

    let mut keys: Vec<&str> = erp_by_key.keys().map(String::as_str).collect();
    for key in email_by_key.keys() {
        if !erp_by_key.contains_key(key) {
            keys.push(key);
        }
    }
    keys.sort_unstable();

    let mut rows = Vec::new();
    for key in keys {
        match (erp_by_key.get(key), email_by_key.get(key)) {
            (Some(erp_rows), Some(email_rows)) => {
                for e in erp_rows {
                    for m in email_rows {
                        rows.push(merge(key, Some(e), Some(m), today));
                    }
                }
            }
            (Some(erp_rows), None) => {
                for e in erp_rows {
                    rows.push(merge(key, Some(e), None, today));
                }
            }
            (None, Some(email_rows)) => {
                for m in email_rows {
                    rows.push(merge(key, None, Some(m), today));
                }
            }
            (None, None) => unreachable!("key came from one of the two maps"),
        }
    }

    tracing::debug!(
        erp_records = erp.len(),
        email_records = email.len(),
        reconciled_rows = rows.len(),
        "reconciliation complete"
    );
    rows
}

fn group_by_number<'a>(
    records: &'a [InvoiceRecord],
    expected: Source,
) -> BTreeMap<String, Vec<&'a InvoiceRecord>> {
    let mut grouped: BTreeMap<String, Vec<&InvoiceRecord>> = BTreeMap::new();
    for record in records {
        if record.source != expected {
            tracing::warn!(
                invoice_number = %record.invoice_number,
                got = record.source.as_str(),
                expected = expected.as_str(),
                "record routed to the wrong side of the join, skipping"
            );
            continue;
        }
        let key = record.invoice_number.trim().to_string();
        if key.is_empty() {
            continue;
        }
        grouped.entry(key).or_default().push(record);
    }
    grouped
}

fn merge(
    key: &str,
    erp: Option<&InvoiceRecord>,
    email: Option<&InvoiceRecord>,
    today: NaiveDate,
) -> ReconciledInvoice {
    let erp_side = erp.map(SideFields::from);
    let email_side = email.map(SideFields::from);

    let effective_due_date = erp_side
        .as_ref()
        .and_then(|s| s.due_date)
        .or_else(|| email_side.as_ref().and_then(|s| s.due_date));

    let days = effective_due_date.map(|due| days_to_due(due, today));
    let status = days.map(classify_due);

    let amount_mismatch = match (&erp_side, &email_side) {
        (Some(a), Some(b)) => amounts_mismatch(&a.total_amount, &b.total_amount),
        _ => false,
    };

    let match_state = match (&erp_side, &email_side) {
        (Some(_), Some(_)) => MatchState::Matched,
        (Some(_), None) => MatchState::ErpOnly,
        (None, Some(_)) => MatchState::EmailOnly,
        (None, None) => unreachable!("merge is only called with at least one side"),
    };

    ReconciledInvoice {
        invoice_number: key.to_string(),
        erp: erp_side,
        email: email_side,
        effective_due_date,
        days_to_due: days,
        status,
        amount_mismatch,
        match_state,
    }
}
