//! Block index contract

use sqlchain_common::{Block, BlockHash, Transaction, TxId};

use crate::error::Result;
use crate::types::OutputSpend;

/// Index over stored blocks and the transactions inside them.
///
/// A `tip` of `None` means the current primary-chain top.
pub trait BlockIndex: Send + Sync {
    /// Hashes of every block containing the transaction (a transaction
    /// can live on several branches)
    fn transaction_blocks(&self, txid: &TxId) -> Result<Vec<BlockHash>>;

    /// Pick the hash that lies on the branch under the given tip
    fn choose_hash_under_tip(
        &self,
        hashes: &[BlockHash],
        tip: Option<BlockHash>,
    ) -> Result<Option<BlockHash>>;

    fn transaction_from_block(
        &self,
        txid: &TxId,
        block: &BlockHash,
    ) -> Result<Option<Transaction>>;

    /// Spendings of the transaction's outputs on the branch under `tip`
    fn transaction_outputs_spent(
        &self,
        txid: &TxId,
        tip: Option<BlockHash>,
    ) -> Result<Vec<OutputSpend>>;

    /// Full transaction lookup on the branch under `tip`
    fn currency_transaction_all_info(
        &self,
        txid: &TxId,
        tip: Option<BlockHash>,
    ) -> Result<Option<Transaction>>;

    fn block_added(&self, block: &Block) -> Result<()>;

    fn block_removed(&self, block: &Block) -> Result<()>;
}
