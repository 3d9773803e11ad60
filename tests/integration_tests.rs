//! Integration tests for payables-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use payables_core::{
    reconcile, suggest, BatchManager, BatchSheet, BatchState, EmailExtractor, ErpExtractor,
    ExtractionWindow, LedgerSheet, MatchState, PaymentState, Strategy,
};
use payables_core::utils::MemoryRowStore;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_complete_payables_workflow() {
    init_tracing();
    // Raw sources: a semicolon-delimited ERP export with locale amounts
    // and an e-invoice XML attachment with different tag spellings.
    let erp_bytes: &[u8] = b"numero;proveedor;emision;vencimiento;total\n\
        F-100;ACME S.A.;2024-05-01 00:00:00;2024-06-10;$1.234,56\n\
        F-200;Globex;2024-04-15;2024-05-20;$5.000,00\n\
        garbage-line\n\
        F-300;Initech;2024-05-10;2024-06-03;$2.500,00\n";
    let email_doc = b"<invoice>\
        <Folio>F-100</Folio>\
        <Proveedor>ACME SA</Proveedor>\
        <FechaEmision>01/05/2024</FechaEmision>\
        <Vencimiento>10/06/2024</Vencimiento>\
        <Total>1234.56</Total>\
        </invoice>"
        .to_vec();

    let erp = ErpExtractor::default().extract(erp_bytes).unwrap();
    assert_eq!(erp.len(), 3);
    let email = EmailExtractor::new(ExtractionWindow::calendar_year(2024)).extract_all(&[email_doc]);
    assert_eq!(email.len(), 1);

    // Reconcile: F-100 matches across sources with no amount mismatch
    // and a single effective due date.
    let rows = reconcile(&erp, &email, today());
    assert_eq!(rows.len(), 3);
    let f100 = rows
        .iter()
        .find(|r| r.invoice_number == "F-100")
        .unwrap();
    assert_eq!(f100.match_state, MatchState::Matched);
    assert!(!f100.amount_mismatch);
    assert_eq!(f100.effective_due_date, NaiveDate::from_ymd_opt(2024, 6, 10));

    // Populate the persisted ledger.
    let ledger_store = MemoryRowStore::new();
    let mut sheet = LedgerSheet::new(ledger_store.clone());
    let report = sheet.sync_reconciled(&rows, today()).await.unwrap();
    assert_eq!(report.created, 3);

    // Record a discount offer on the overdue Globex invoice.
    let invoices = sheet.load().await.unwrap();
    let globex = invoices
        .iter()
        .find(|inv| inv.supplier_name == "Globex")
        .unwrap()
        .clone();
    sheet
        .set_discount(
            &globex.invoice_id,
            Some(BigDecimal::from_str("0.10").unwrap()),
            NaiveDate::from_ymd_opt(2024, 6, 30),
            today(),
        )
        .await
        .unwrap();

    // Suggest a payment run that cannot cover everything.
    let candidates = sheet.load().await.unwrap();
    let budget = BigDecimal::from_str("5000").unwrap();
    let selected = suggest(&candidates, &budget, Strategy::AvoidOverdue);
    assert_eq!(selected[0], globex.invoice_id);
    let spent: BigDecimal = candidates
        .iter()
        .filter(|inv| selected.contains(&inv.invoice_id))
        .map(|inv| inv.discounted_amount.clone())
        .sum();
    assert!(spent <= budget);

    // Batch the selection and walk it through to paid.
    let mut manager = BatchManager::new(
        LedgerSheet::new(ledger_store.clone()),
        BatchSheet::new(MemoryRowStore::new()),
    );
    let batch = manager.create_batch(&selected).await.unwrap();
    // Globex is overdue (due 2024-05-20), so the batch is urgent.
    assert_eq!(batch.batch_state, BatchState::PendingTreasuryUrgent);
    assert_eq!(
        batch.total_savings,
        &batch.total_original - &batch.total_discounted
    );

    let pending = manager.pending_batches().await.unwrap();
    assert_eq!(pending.len(), 1);

    let outcome = manager.confirm_payment(&batch.batch_id).await.unwrap();
    assert!(outcome.fully_applied());

    let after = sheet.load().await.unwrap();
    for id in &selected {
        let invoice = after.iter().find(|inv| &inv.invoice_id == id).unwrap();
        assert_eq!(invoice.payment_state, PaymentState::Paid);
        assert_eq!(invoice.batch_id.as_deref(), Some(batch.batch_id.as_str()));
    }
    assert!(manager.pending_batches().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resync_is_idempotent_on_ledger_identity() {
    let erp_bytes: &[u8] = b"numero;proveedor;emision;vencimiento;total\n\
        F-100;ACME;2024-05-01;2024-06-10;100,00\n";

    let ledger_store = MemoryRowStore::new();
    let mut sheet = LedgerSheet::new(ledger_store);

    for _ in 0..3 {
        let erp = ErpExtractor::default().extract(erp_bytes).unwrap();
        let rows = reconcile(&erp, &[], today());
        sheet.sync_reconciled(&rows, today()).await.unwrap();
    }

    let invoices = sheet.load().await.unwrap();
    assert_eq!(invoices.len(), 1);
}

#[tokio::test]
async fn test_budget_selection_maximizing_savings() {
    // budget 1,000,000; candidates ordered by savings descending are
    // A (600k payable, 100k saved), B (500k, 50k), C (300k, 10k):
    // take A, skip B over budget, take C.
    let header = vec![
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
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();
    let row = |id: &str, total: &str, discounted: &str| -> Vec<String> {
        vec![
            id.to_string(),
            id.to_string(),
            "ACME".to_string(),
            String::new(),
            String::new(),
            total.to_string(),
            String::new(),
            String::new(),
            "PENDING".to_string(),
            String::new(),
            String::new(),
            discounted.to_string(),
            String::new(),
        ]
    };
    let store = MemoryRowStore::with_rows(vec![
        header,
        row("A", "700000", "600000"),
        row("B", "550000", "500000"),
        row("C", "310000", "300000"),
    ]);
    let sheet = LedgerSheet::new(store);

    let candidates = sheet.load().await.unwrap();
    let selected = suggest(
        &candidates,
        &BigDecimal::from_str("1000000").unwrap(),
        Strategy::MaximizeSavings,
    );
    assert_eq!(selected, vec!["A".to_string(), "C".to_string()]);
}

#[tokio::test]
async fn test_two_operators_cannot_double_book_an_invoice() {
    let erp_bytes: &[u8] = b"numero;proveedor;emision;vencimiento;total\n\
        F-1;ACME;2024-05-01;2024-06-10;100,00\n";
    let erp = ErpExtractor::default().extract(erp_bytes).unwrap();
    let rows = reconcile(&erp, &[], today());

    let ledger_store = MemoryRowStore::new();
    let mut sheet = LedgerSheet::new(ledger_store.clone());
    sheet.sync_reconciled(&rows, today()).await.unwrap();
    let ids: Vec<String> = sheet
        .load()
        .await
        .unwrap()
        .into_iter()
        .map(|inv| inv.invoice_id)
        .collect();

    // Two operator sessions over the same shared ledger store.
    let history = MemoryRowStore::new();
    let mut first = BatchManager::new(
        LedgerSheet::new(ledger_store.clone()),
        BatchSheet::new(history.clone()),
    );
    let mut second = BatchManager::new(
        LedgerSheet::new(ledger_store),
        BatchSheet::new(history),
    );

    first.create_batch(&ids).await.unwrap();
    let err = second.create_batch(&ids).await.unwrap_err();
    assert!(matches!(
        err,
        payables_core::PayablesError::Conflict { .. }
    ));
}
