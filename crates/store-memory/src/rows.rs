//! In-memory row-to-transaction lineage index
//!
//! Kept as a per-reference stack of transaction ids: block addition
//! pushes the new chain head, block removal pops it. Removal must
//! unwind in LIFO order relative to addition, which the manager's
//! reverse-order handler guarantees.

use std::collections::HashMap;

use parking_lot::RwLock;
use sqlchain_common::{Block, TxId};
use sqlchain_store::{Result, RowIndex};

#[derive(Default)]
pub struct MemoryRowIndex {
    state: RwLock<HashMap<String, Vec<TxId>>>,
}

impl MemoryRowIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowIndex for MemoryRowIndex {
    fn tx_for_ref_id(&self, reference_id: &str) -> Result<Option<TxId>> {
        Ok(self
            .state
            .read()
            .get(reference_id)
            .and_then(|stack| stack.last().copied()))
    }

    fn update_on_block_add(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in &block.transactions {
            if let Some(sql) = &tx.sql {
                state
                    .entry(sql.reference_id.clone())
                    .or_default()
                    .push(tx.id);
            }
        }
        Ok(())
    }

    fn update_on_block_remove(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in block.transactions.iter().rev() {
            let Some(sql) = &tx.sql else {
                continue;
            };
            if let Some(stack) = state.get_mut(&sql.reference_id) {
                if stack.last() == Some(&tx.id) {
                    stack.pop();
                }
                if stack.is_empty() {
                    state.remove(&sql.reference_id);
                }
            }
        }
        Ok(())
    }
}
