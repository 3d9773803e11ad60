//! Email attachment adapter: label-driven extraction from e-invoice XML
//!
//! Each incoming attachment is a byte bundle, possibly gzip-compressed,
//! holding one semi-structured XML document. Issuers disagree on tag
//! names, so fields are located by fuzzy label match against a schema of
//! canonical field name -> accepted label variants, independent of the
//! document's exact shape. A document missing an expected field yields
//! the `"N/A"` sentinel for that field; partial extraction is always
//! preferred over failing the batch.

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;

use crate::normalize::{normalize_amount, normalize_date};
use crate::types::{InvoiceRecord, Source};

/// Sentinel for a labeled field the document does not carry
pub const MISSING_FIELD: &str = "N/A";

/// Accepted label variants for one canonical field
#[derive(Debug, Clone, Copy)]
pub struct LabelSpec {
    pub field: &'static str,
    pub labels: &'static [&'static str],
}

/// Default extraction schema for supplier e-invoice documents.
///
/// Labels are matched case-, whitespace- and separator-insensitively,
/// so `"Invoice Number"`, `"invoice_number"` and `"INVOICENO"` all hit.
pub const INVOICE_LABEL_SPECS: &[LabelSpec] = &[
    LabelSpec {
        field: "invoice_number",
        labels: &["invoicenumber", "invoiceno", "number", "folio", "numerofactura"],
    },
    LabelSpec {
        field: "supplier_name",
        labels: &["suppliername", "supplier", "vendor", "emitter", "proveedor", "razonsocial"],
    },
    LabelSpec {
        field: "issue_date",
        labels: &["issuedate", "invoicedate", "date", "fecha", "fechaemision"],
    },
    LabelSpec {
        field: "due_date",
        labels: &["duedate", "paymentdue", "vencimiento", "fechavencimiento"],
    },
    LabelSpec {
        field: "total_amount",
        labels: &["totalamount", "total", "amount", "importe", "montototal"],
    },
];

/// Date range that bounds how far back extraction reaches
#[derive(Debug, Clone, Copy)]
pub struct ExtractionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExtractionWindow {
    /// Window covering one calendar year
    pub fn calendar_year(year: i32) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1st exists"),
            end: NaiveDate::from_ymd_opt(year, 12, 31).expect("December 31st exists"),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Adapter turning e-invoice document bundles into canonical records
pub struct EmailExtractor {
    schema: &'static [LabelSpec],
    window: ExtractionWindow,
}

impl EmailExtractor {
    pub fn new(window: ExtractionWindow) -> Self {
        Self {
            schema: INVOICE_LABEL_SPECS,
            window,
        }
    }

    pub fn with_schema(schema: &'static [LabelSpec], window: ExtractionWindow) -> Self {
        Self { schema, window }
    }

    /// Extract canonical records from a batch of document bundles.
    ///
    /// A corrupt bundle or unreadable document costs only that document;
    /// the rest of the batch extracts normally. Documents whose issue
    /// date is known and falls outside the window are dropped; documents
    /// without a readable issue date are kept.
    pub fn extract_all(&self, bundles: &[Vec<u8>]) -> Vec<InvoiceRecord> {
        let mut records = Vec::new();
        for (idx, bundle) in bundles.iter().enumerate() {
            let Some(record) = self.extract_one(bundle) else {
                tracing::warn!(document = idx, "skipping unreadable e-invoice document");
                continue;
            };
            if let Some(issued) = record.issue_date {
                if !self.window.contains(issued) {
                    tracing::debug!(
                        invoice_number = %record.invoice_number,
                        issued = %issued,
                        "dropping e-invoice outside the extraction window"
                    );
                    continue;
                }
            }
            records.push(record);
        }
        records
    }

    fn extract_one(&self, bundle: &[u8]) -> Option<InvoiceRecord> {
        let content = inflate_if_gzip(bundle)?;
        let pairs = flatten_document(&content);
        if pairs.is_empty() {
            return None;
        }

        let field = |name: &str| -> String {
            self.schema
                .iter()
                .find(|spec| spec.field == name)
                .and_then(|spec| {
                    pairs.iter().find(|(label, _)| {
                        let canon = canonical_label(label);
                        spec.labels.iter().any(|accepted| canon == *accepted)
                    })
                })
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| MISSING_FIELD.to_string())
        };

        Some(InvoiceRecord {
            invoice_number: field("invoice_number").trim().to_string(),
            supplier_name: field("supplier_name"),
            issue_date: normalize_date(&field("issue_date")),
            due_date: normalize_date(&field("due_date")),
            total_amount: normalize_amount(&field("total_amount")),
            source: Source::Email,
        })
    }
}

/// Inflate a gzip bundle (magic `1f 8b`), pass anything else through
fn inflate_if_gzip(bundle: &[u8]) -> Option<Vec<u8>> {
    if bundle.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(bundle);
        let mut inflated = Vec::new();
        match decoder.read_to_end(&mut inflated) {
            Ok(_) => Some(inflated),
            Err(err) => {
                tracing::warn!(error = %err, "gzip bundle failed to inflate");
                None
            }
        }
    } else {
        Some(bundle.to_vec())
    }
}

/// Flatten an XML document into (element label, text) pairs in document
/// order, tolerating structural noise. Traversal mechanics stay here so
/// field lookup above remains purely label-driven.
fn flatten_document(content: &[u8]) -> Vec<(String, String)> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut pairs = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(t)) => {
                if let Some(label) = stack.last() {
                    let text = t
                        .unescape()
                        .map(|cow| cow.into_owned())
                        .unwrap_or_default();
                    if !text.is_empty() {
                        pairs.push((label.clone(), text));
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                // Keep whatever was readable up to the damage.
                tracing::warn!(error = %err, "malformed XML, keeping fields read so far");
                break;
            }
            Ok(_) => {}
        }
        buf.clear();
    }
    pairs
}

/// Case-, whitespace- and separator-insensitive label form
fn canonical_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::str::FromStr;

    fn window() -> ExtractionWindow {
        ExtractionWindow::calendar_year(2024)
    }

    fn gzip(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    const PLAIN_DOC: &[u8] = b"<invoice>\
        <InvoiceNumber> F-100 </InvoiceNumber>\
        <Supplier_Name>ACME S.A.</Supplier_Name>\
        <Issue_Date>2024-05-01</Issue_Date>\
        <DUE_DATE>10/06/2024</DUE_DATE>\
        <Total>1234.56</Total>\
        </invoice>";

    #[test]
    fn extracts_fields_by_fuzzy_label() {
        let records = EmailExtractor::new(window()).extract_all(&[PLAIN_DOC.to_vec()]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.invoice_number, "F-100");
        assert_eq!(record.supplier_name, "ACME S.A.");
        assert_eq!(record.issue_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(
            record.total_amount,
            BigDecimal::from_str("1234.56").unwrap()
        );
        assert_eq!(record.source, Source::Email);
    }

    #[test]
    fn gzip_bundles_are_inflated() {
        let records = EmailExtractor::new(window()).extract_all(&[gzip(PLAIN_DOC)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_number, "F-100");
    }

    #[test]
    fn missing_fields_yield_sentinel_not_failure() {
        let doc = b"<invoice><Folio>F-7</Folio><Importe>99,50</Importe></invoice>".to_vec();
        let records = EmailExtractor::new(window()).extract_all(&[doc]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.invoice_number, "F-7");
        assert_eq!(record.supplier_name, MISSING_FIELD);
        assert_eq!(record.issue_date, None);
        assert_eq!(record.due_date, None);
        assert_eq!(record.total_amount, BigDecimal::from_str("99.50").unwrap());
    }

    #[test]
    fn corrupt_document_costs_only_itself() {
        let bundles = vec![
            vec![0x1f, 0x8b, 0x00, 0x01, 0x02],
            PLAIN_DOC.to_vec(),
        ];
        let records = EmailExtractor::new(window()).extract_all(&bundles);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_number, "F-100");
    }

    #[test]
    fn documents_outside_the_window_are_dropped() {
        let old = b"<invoice>\
            <InvoiceNumber>F-old</InvoiceNumber>\
            <IssueDate>2022-01-15</IssueDate>\
            <Total>10</Total>\
            </invoice>"
            .to_vec();
        let records = EmailExtractor::new(window()).extract_all(&[old, PLAIN_DOC.to_vec()]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_number, "F-100");
    }

    #[test]
    fn undated_documents_are_kept() {
        let undated =
            b"<invoice><InvoiceNumber>F-8</InvoiceNumber><Total>10</Total></invoice>".to_vec();
        let records = EmailExtractor::new(window()).extract_all(&[undated]);
        assert_eq!(records.len(), 1);
    }
}
