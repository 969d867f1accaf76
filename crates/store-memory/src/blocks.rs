//! In-memory block index
//!
//! Tracks every stored block (across branches) and which blocks carry
//! which transactions. The primary-chain top is supplied by the chain
//! layer via [`MemoryBlockIndex::set_top`]; chain selection itself is
//! out of scope here.

use std::collections::HashMap;

use parking_lot::RwLock;
use sqlchain_common::{Block, BlockHash, Transaction, TxId};
use sqlchain_store::{BlockIndex, OutputSpend, Result};

#[derive(Default)]
struct IndexState {
    blocks: HashMap<BlockHash, Block>,
    tx_blocks: HashMap<TxId, Vec<BlockHash>>,
    top: Option<BlockHash>,
}

#[derive(Default)]
pub struct MemoryBlockIndex {
    state: RwLock<IndexState>,
}

impl MemoryBlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current primary-chain top; a `tip` of `None` in the
    /// contract methods resolves to it
    pub fn set_top(&self, top: Option<BlockHash>) {
        self.state.write().top = top;
    }

    /// Walk the branch from `tip` back to genesis, calling `visit` for
    /// each block on it
    fn walk_branch(
        state: &IndexState,
        tip: Option<BlockHash>,
        mut visit: impl FnMut(&Block) -> bool,
    ) {
        let mut cursor = tip.or(state.top);
        while let Some(hash) = cursor {
            let Some(block) = state.blocks.get(&hash) else {
                break;
            };
            if !visit(block) {
                break;
            }
            cursor = (!block.prev_hash.is_zero()).then_some(block.prev_hash);
        }
    }
}

impl BlockIndex for MemoryBlockIndex {
    fn transaction_blocks(&self, txid: &TxId) -> Result<Vec<BlockHash>> {
        Ok(self
            .state
            .read()
            .tx_blocks
            .get(txid)
            .cloned()
            .unwrap_or_default())
    }

    fn choose_hash_under_tip(
        &self,
        hashes: &[BlockHash],
        tip: Option<BlockHash>,
    ) -> Result<Option<BlockHash>> {
        let state = self.state.read();
        let mut chosen = None;
        Self::walk_branch(&state, tip, |block| {
            if hashes.contains(&block.hash) {
                chosen = Some(block.hash);
                return false;
            }
            true
        });
        Ok(chosen)
    }

    fn transaction_from_block(
        &self,
        txid: &TxId,
        block: &BlockHash,
    ) -> Result<Option<Transaction>> {
        let state = self.state.read();
        Ok(state.blocks.get(block).and_then(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.id == *txid)
                .cloned()
        }))
    }

    fn transaction_outputs_spent(
        &self,
        txid: &TxId,
        tip: Option<BlockHash>,
    ) -> Result<Vec<OutputSpend>> {
        let state = self.state.read();
        let mut spends = Vec::new();
        Self::walk_branch(&state, tip, |block| {
            for tx in &block.transactions {
                for vin in &tx.vin {
                    if vin.txid == *txid {
                        spends.push(OutputSpend {
                            vout: vin.vout,
                            spent_by: tx.id,
                        });
                    }
                }
            }
            true
        });
        Ok(spends)
    }

    fn currency_transaction_all_info(
        &self,
        txid: &TxId,
        tip: Option<BlockHash>,
    ) -> Result<Option<Transaction>> {
        let state = self.state.read();
        let mut found = None;
        Self::walk_branch(&state, tip, |block| {
            match block.transactions.iter().find(|tx| tx.id == *txid) {
                Some(tx) => {
                    found = Some(tx.clone());
                    false
                }
                None => true,
            }
        });
        Ok(found)
    }

    fn block_added(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in &block.transactions {
            let hashes = state.tx_blocks.entry(tx.id).or_default();
            if !hashes.contains(&block.hash) {
                hashes.push(block.hash);
            }
        }
        state.blocks.insert(block.hash, block.clone());
        Ok(())
    }

    fn block_removed(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in &block.transactions {
            if let Some(hashes) = state.tx_blocks.get_mut(&tx.id) {
                hashes.retain(|hash| hash != &block.hash);
                if hashes.is_empty() {
                    state.tx_blocks.remove(&tx.id);
                }
            }
        }
        state.blocks.remove(&block.hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlchain_common::{Amount, CurrencyOutput, PubKeyHash};
    use std::str::FromStr;

    fn pkh() -> PubKeyHash {
        sqlchain_common::keys::hash_pub_key(&[1; 32])
    }

    fn tx(data: &str) -> Transaction {
        Transaction::coinbase(pkh(), Amount::from_str("1").unwrap(), data).unwrap()
    }

    fn chain_block(name: &str, prev: BlockHash, height: u64, txs: Vec<Transaction>) -> Block {
        Block::new(BlockHash::from_data(name.as_bytes()), prev, height, txs)
    }

    #[test]
    fn test_choose_hash_respects_branch() {
        let index = MemoryBlockIndex::new();
        let shared = tx("shared");

        // Two branches off genesis, both carrying the transaction
        let a1 = chain_block("a1", BlockHash::ZERO, 0, vec![shared.clone()]);
        let b1 = chain_block("b1", BlockHash::ZERO, 0, vec![shared.clone()]);
        let b2 = chain_block("b2", b1.hash, 1, vec![tx("tip")]);
        for block in [&a1, &b1, &b2] {
            index.block_added(block).unwrap();
        }

        let hashes = index.transaction_blocks(&shared.id).unwrap();
        assert_eq!(hashes.len(), 2);

        let under_a = index
            .choose_hash_under_tip(&hashes, Some(a1.hash))
            .unwrap();
        assert_eq!(under_a, Some(a1.hash));

        let under_b = index
            .choose_hash_under_tip(&hashes, Some(b2.hash))
            .unwrap();
        assert_eq!(under_b, Some(b1.hash));

        // Default tip resolves to the recorded top
        index.set_top(Some(b2.hash));
        assert_eq!(index.choose_hash_under_tip(&hashes, None).unwrap(), Some(b1.hash));
    }

    #[test]
    fn test_outputs_spent_only_under_tip() {
        let index = MemoryBlockIndex::new();
        let mint = tx("mint");
        let genesis = chain_block("g", BlockHash::ZERO, 0, vec![mint.clone()]);

        let mut spend = Transaction::new_currency(
            vec![sqlchain_common::CurrencyInput {
                txid: mint.id,
                vout: 0,
                signature: Vec::new(),
                pub_key: vec![1; 32],
            }],
            vec![CurrencyOutput::new(Amount::from_str("1").unwrap(), pkh())],
        );
        spend.id = spend.hash().unwrap();
        let second = chain_block("s", genesis.hash, 1, vec![spend.clone()]);

        index.block_added(&genesis).unwrap();
        index.block_added(&second).unwrap();

        let spends = index
            .transaction_outputs_spent(&mint.id, Some(second.hash))
            .unwrap();
        assert_eq!(spends.len(), 1);
        assert_eq!(spends[0].spent_by, spend.id);

        // Under the genesis tip the spending block is not on the branch
        let spends = index
            .transaction_outputs_spent(&mint.id, Some(genesis.hash))
            .unwrap();
        assert!(spends.is_empty());
    }

    #[test]
    fn test_block_removed_unindexes() {
        let index = MemoryBlockIndex::new();
        let mint = tx("mint");
        let genesis = chain_block("g", BlockHash::ZERO, 0, vec![mint.clone()]);
        index.block_added(&genesis).unwrap();
        index.block_removed(&genesis).unwrap();
        assert!(index.transaction_blocks(&mint.id).unwrap().is_empty());
        assert_eq!(
            index.transaction_from_block(&mint.id, &genesis.hash).unwrap(),
            None
        );
    }
}
