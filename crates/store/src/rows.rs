//! Row-to-transaction lineage index contract
//!
//! Each row is the head of a linked list of mutations; this index maps
//! a reference id to the latest *confirmed* transaction that mutated
//! it. The pool overlay for unconfirmed mutations lives in the pool
//! itself.

use sqlchain_common::{Block, TxId};

use crate::error::Result;

pub trait RowIndex: Send + Sync {
    /// Latest confirmed transaction that mutated the reference id
    fn tx_for_ref_id(&self, reference_id: &str) -> Result<Option<TxId>>;

    /// Point every reference id touched by the block at its new head
    fn update_on_block_add(&self, block: &Block) -> Result<()>;

    /// Rewind every reference id the block touched to the update's
    /// `prev_tx_id` link
    fn update_on_block_remove(&self, block: &Block) -> Result<()>;
}
