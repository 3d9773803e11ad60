//! Flat tabular export of reconciliation and ledger data
//!
//! One row per invoice, header row matching the canonical field names,
//! suitable for spreadsheet import.

use std::io::Write;

use crate::types::{LedgerInvoice, PayablesError, PayablesResult, ReconciledInvoice};

/// Write the reconciliation view as CSV.
pub fn write_reconciliation_report<W: Write>(
    rows: &[ReconciledInvoice],
    writer: W,
) -> PayablesResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "invoice_number",
        "match_state",
        "erp_supplier_name",
        "erp_issue_date",
        "erp_due_date",
        "erp_total_amount",
        "email_supplier_name",
        "email_issue_date",
        "email_due_date",
        "email_total_amount",
        "effective_due_date",
        "days_to_due",
        "status",
        "amount_mismatch",
    ])
    .map_err(export_err)?;

    for row in rows {
        let side = |s: &Option<crate::types::SideFields>| match s {
            Some(side) => (
                side.supplier_name.clone(),
                fmt_date(side.issue_date),
                fmt_date(side.due_date),
                side.total_amount.to_string(),
            ),
            None => Default::default(),
        };
        let (erp_supplier, erp_issued, erp_due, erp_amount) = side(&row.erp);
        let (email_supplier, email_issued, email_due, email_amount) = side(&row.email);

        out.write_record([
            row.invoice_number.clone(),
            row.match_state.as_str().to_string(),
            erp_supplier,
            erp_issued,
            erp_due,
            erp_amount,
            email_supplier,
            email_issued,
            email_due,
            email_amount,
            fmt_date(row.effective_due_date),
            row.days_to_due.map(|d| d.to_string()).unwrap_or_default(),
            row.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
            row.amount_mismatch.to_string(),
        ])
        .map_err(export_err)?;
    }
    out.flush().map_err(|e| export_err(csv::Error::from(e)))
}

/// Write the persisted ledger as CSV, payment workflow fields included.
pub fn write_ledger_report<W: Write>(invoices: &[LedgerInvoice], writer: W) -> PayablesResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
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
    ])
    .map_err(export_err)?;

    for invoice in invoices {
        out.write_record(crate::ledger::encode_row(invoice))
            .map_err(export_err)?;
    }
    out.flush().map_err(|e| export_err(csv::Error::from(e)))
}

fn fmt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn export_err(err: csv::Error) -> PayablesError {
    PayablesError::Export(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::types::{InvoiceRecord, Source};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[test]
    fn reconciliation_report_has_header_and_one_row_per_invoice() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let erp = vec![InvoiceRecord {
            invoice_number: "F-1".to_string(),
            supplier_name: "ACME".to_string(),
            issue_date: None,
            due_date: NaiveDate::from_ymd_opt(2024, 6, 10),
            total_amount: BigDecimal::from_str("100.50").unwrap(),
            source: Source::Erp,
        }];
        let rows = reconcile(&erp, &[], today);

        let mut buffer = Vec::new();
        write_reconciliation_report(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("invoice_number,match_state"));
        assert!(lines[1].contains("ERP_ONLY"));
        assert!(lines[1].contains("100.50"));
    }
}
