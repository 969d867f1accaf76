//! Unapproved-transaction pool contract
//!
//! Arrival order is preserved and observable: it is the tie-break for
//! lineage resolution and for conflict pruning.

use std::collections::HashMap;
use std::ops::ControlFlow;

use sqlchain_common::{Block, CurrencyInput, PubKeyHash, Transaction, TxId};

use crate::error::Result;
use crate::types::PendingOutput;

/// Currency state a key holds inside the pool
#[derive(Debug, Clone, Default)]
pub struct PreparedBy {
    /// Every pool input spent by the key (excluded from fresh input
    /// selection)
    pub pending_inputs: Vec<CurrencyInput>,
    /// Pool outputs to the key not consumed by another pool transaction
    pub pending_outputs: Vec<PendingOutput>,
    /// Pool inputs of the key whose source is a confirmed output (they
    /// reduce the pending balance)
    pub approved_inputs: Vec<CurrencyInput>,
}

/// The mempool of transactions awaiting inclusion
pub trait UnapprovedPool: Send + Sync {
    fn add(&self, tx: &Transaction) -> Result<()>;

    /// Remove by id, reporting whether it was present
    fn delete(&self, txid: &TxId) -> Result<bool>;

    fn get_if_exists(&self, txid: &TxId) -> Result<Option<Transaction>>;

    /// Remove every transaction of a mined block, without rollback
    fn delete_from_block(&self, block: &Block) -> Result<()>;

    /// Re-admit the transactions of a removed block, preserving their
    /// relative order ahead of newer arrivals
    fn add_from_canceled(&self, block: &Block) -> Result<()>;

    fn count(&self) -> Result<usize>;

    /// Up to `limit` transactions in arrival order (0 = all)
    fn transactions(&self, limit: usize) -> Result<Vec<Transaction>>;

    /// Resolve inputs the unspent set did not know against pool
    /// transactions, filling `input_txs`; errors if an input is not
    /// prepared or its output is already spent inside the pool
    fn check_inputs_are_prepared(
        &self,
        not_found: &HashMap<usize, CurrencyInput>,
        input_txs: &mut HashMap<usize, Transaction>,
    ) -> Result<()>;

    /// Resolve inputs against an explicit predecessor window (used when
    /// assembling a block whose transactions depend on each other)
    fn check_inputs_were_before(
        &self,
        not_found: &HashMap<usize, CurrencyInput>,
        prev_txs: &[Transaction],
        input_txs: &mut HashMap<usize, Transaction>,
    ) -> Result<()>;

    /// The pool-held currency state of a key
    fn currency_txs_prepared_by(&self, pub_key_hash: &PubKeyHash) -> Result<PreparedBy>;

    /// Partition candidates into survivors and conflicting transactions.
    /// Two candidates conflict when they share a currency input; the
    /// earliest by arrival order survives.
    fn detect_conflicts(
        &self,
        txs: Vec<Transaction>,
    ) -> Result<(Vec<Transaction>, Vec<Transaction>)>;

    /// Latest pool transaction touching the given reference id
    fn find_sql_reference_transaction(&self, reference_id: &str) -> Result<Option<TxId>>;

    /// Walk the pool in arrival order; `Break` aborts early. Returns
    /// the number of transactions visited.
    fn for_each_transaction(
        &self,
        visit: &mut dyn FnMut(&Transaction) -> ControlFlow<()>,
    ) -> Result<usize>;

    /// Drop everything
    fn clean(&self) -> Result<()>;
}
