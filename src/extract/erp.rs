//! ERP export adapter: positionally-addressed delimited text
//!
//! The ERP export is a delimited file with a fixed but informally
//! documented column order and a non-standard field delimiter. Columns
//! are addressed by position and renamed semantically here; there is no
//! schema negotiation. Malformed lines are skipped, not fatal.

use crate::normalize::{normalize_amount, normalize_date};
use crate::types::{InvoiceRecord, PayablesError, PayablesResult, Source};

/// Positional column layout of the ERP export
#[derive(Debug, Clone)]
pub struct ErpLayout {
    /// Field delimiter byte; the export does not use a comma
    pub delimiter: u8,
    /// Whether the first line is a header to skip
    pub has_header: bool,
    pub invoice_number: usize,
    pub supplier_name: usize,
    pub issue_date: usize,
    pub due_date: usize,
    pub total_amount: usize,
}

impl Default for ErpLayout {
    fn default() -> Self {
        Self {
            delimiter: b';',
            has_header: true,
            invoice_number: 0,
            supplier_name: 1,
            issue_date: 2,
            due_date: 3,
            total_amount: 4,
        }
    }
}

impl ErpLayout {
    fn width(&self) -> usize {
        1 + self
            .invoice_number
            .max(self.supplier_name)
            .max(self.issue_date)
            .max(self.due_date)
            .max(self.total_amount)
    }
}

/// Adapter turning raw ERP export bytes into canonical invoice records
pub struct ErpExtractor {
    layout: ErpLayout,
}

impl Default for ErpExtractor {
    fn default() -> Self {
        Self::new(ErpLayout::default())
    }
}

impl ErpExtractor {
    pub fn new(layout: ErpLayout) -> Self {
        Self { layout }
    }

    /// Extract canonical records from the export's byte content.
    ///
    /// The content must decode as 8-bit text; non-UTF-8 bytes are
    /// replaced rather than rejected. A header row narrower than the
    /// widest addressed column is a schema error (the file cannot carry
    /// the expected layout); individual malformed data lines are skipped
    /// with a warning.
    pub fn extract(&self, content: &[u8]) -> PayablesResult<Vec<InvoiceRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.layout.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content);

        let width = self.layout.width();
        let mut records = Vec::new();
        for (line, result) in reader.byte_records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(line, error = %err, "skipping malformed ERP line");
                    continue;
                }
            };

            if self.layout.has_header && line == 0 {
                if record.len() < width {
                    return Err(PayablesError::Schema(format!(
                        "ERP export carries {} columns, amount column expected at position {}",
                        record.len(),
                        self.layout.total_amount
                    )));
                }
                continue;
            }

            if record.len() < width {
                tracing::warn!(line, cells = record.len(), "skipping short ERP line");
                continue;
            }

            let cell = |idx: usize| -> String {
                String::from_utf8_lossy(record.get(idx).unwrap_or_default())
                    .trim()
                    .to_string()
            };

            let invoice_number = cell(self.layout.invoice_number);
            if invoice_number.is_empty() {
                tracing::warn!(line, "skipping ERP line without an invoice number");
                continue;
            }

            records.push(InvoiceRecord {
                invoice_number,
                supplier_name: cell(self.layout.supplier_name),
                issue_date: normalize_date(&cell(self.layout.issue_date)),
                due_date: normalize_date(&cell(self.layout.due_date)),
                total_amount: normalize_amount(&cell(self.layout.total_amount)),
                source: Source::Erp,
            });
        }
        Ok(records)
    }
}
