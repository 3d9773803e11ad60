//! In-memory row store implementation for testing and development

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::traits::{CellOutcome, CellUpdate, RowStore};
use crate::types::PayablesResult;

/// In-memory [`RowStore`] backed by a shared grid of strings.
///
/// Clones share the same underlying rows, mirroring how several managers
/// hold handles onto one external sheet.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowStore {
    rows: Arc<RwLock<Vec<Vec<String>>>>,
}

impl MemoryRowStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with rows (header included)
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Drop all rows (useful for testing)
    pub fn clear(&self) {
        self.rows.write().unwrap().clear();
    }

    /// Number of rows currently held, header included
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().unwrap().is_empty()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn read_all(&self) -> PayablesResult<Vec<Vec<String>>> {
        Ok(self.rows.read().unwrap().clone())
    }

    async fn append_row(&mut self, row: Vec<String>) -> PayablesResult<()> {
        self.rows.write().unwrap().push(row);
        Ok(())
    }

    async fn update_cells(&mut self, updates: &[CellUpdate]) -> PayablesResult<Vec<CellOutcome>> {
        let mut rows = self.rows.write().unwrap();
        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            let applied = match rows.get_mut(update.row) {
                Some(row) if update.col < row.len() => {
                    row[update.col] = update.value.clone();
                    true
                }
                _ => false,
            };
            outcomes.push(CellOutcome {
                row: update.row,
                col: update.col,
                applied,
            });
        }
        Ok(outcomes)
    }
}
