//! In-memory unapproved-transaction pool

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use parking_lot::RwLock;
use sqlchain_common::{keys, Block, CurrencyInput, PubKeyHash, Transaction, TxId};
use sqlchain_store::{
    Error, OutputRef, PendingOutput, PreparedBy, Result, UnapprovedPool,
};

#[derive(Default)]
struct PoolState {
    /// Arrival order of transaction ids
    order: Vec<TxId>,
    txs: HashMap<TxId, Transaction>,
}

impl PoolState {
    fn insert(&mut self, tx: &Transaction) {
        if !self.txs.contains_key(&tx.id) {
            self.order.push(tx.id);
            self.txs.insert(tx.id, tx.clone());
        }
    }

    fn remove(&mut self, txid: &TxId) -> bool {
        if self.txs.remove(txid).is_some() {
            self.order.retain(|id| id != txid);
            true
        } else {
            false
        }
    }
}

/// Lock-guarded pool preserving arrival order
#[derive(Default)]
pub struct MemoryPool {
    state: RwLock<PoolState>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnapprovedPool for MemoryPool {
    fn add(&self, tx: &Transaction) -> Result<()> {
        self.state.write().insert(tx);
        Ok(())
    }

    fn delete(&self, txid: &TxId) -> Result<bool> {
        Ok(self.state.write().remove(txid))
    }

    fn get_if_exists(&self, txid: &TxId) -> Result<Option<Transaction>> {
        Ok(self.state.read().txs.get(txid).cloned())
    }

    fn delete_from_block(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in &block.transactions {
            state.remove(&tx.id);
        }
        Ok(())
    }

    fn add_from_canceled(&self, block: &Block) -> Result<()> {
        // Re-admitted transactions predate everything currently in the
        // pool; they go to the front in block order.
        let mut state = self.state.write();
        let mut order = Vec::with_capacity(state.order.len() + block.transactions.len());
        for tx in &block.transactions {
            if tx.is_coinbase() {
                continue;
            }
            if !state.txs.contains_key(&tx.id) {
                order.push(tx.id);
                state.txs.insert(tx.id, tx.clone());
            }
        }
        order.extend(state.order.iter().copied());
        state.order = order;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.state.read().order.len())
    }

    fn transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        let state = self.state.read();
        let take = if limit == 0 { state.order.len() } else { limit };
        Ok(state
            .order
            .iter()
            .take(take)
            .filter_map(|id| state.txs.get(id).cloned())
            .collect())
    }

    fn check_inputs_are_prepared(
        &self,
        not_found: &HashMap<usize, CurrencyInput>,
        input_txs: &mut HashMap<usize, Transaction>,
    ) -> Result<()> {
        let state = self.state.read();
        for (ind, input) in not_found {
            let tx = state
                .txs
                .get(&input.txid)
                .ok_or(Error::InputNotPrepared {
                    txid: input.txid,
                    vout: input.vout,
                })?;
            if tx.vout.get(input.vout as usize).is_none() {
                return Err(Error::InputNotPrepared {
                    txid: input.txid,
                    vout: input.vout,
                });
            }
            // The output must still be unspent within the pool chain
            let spent_in_pool = state.txs.values().any(|other| {
                other
                    .vin
                    .iter()
                    .any(|vin| vin.txid == input.txid && vin.vout == input.vout)
            });
            if spent_in_pool {
                return Err(Error::InputAlreadySpent);
            }
            input_txs.insert(*ind, tx.clone());
        }
        Ok(())
    }

    fn check_inputs_were_before(
        &self,
        not_found: &HashMap<usize, CurrencyInput>,
        prev_txs: &[Transaction],
        input_txs: &mut HashMap<usize, Transaction>,
    ) -> Result<()> {
        for (ind, input) in not_found {
            let tx = prev_txs
                .iter()
                .find(|tx| tx.id == input.txid)
                .ok_or(Error::InputNotPrepared {
                    txid: input.txid,
                    vout: input.vout,
                })?;
            if tx.vout.get(input.vout as usize).is_none() {
                return Err(Error::InputNotPrepared {
                    txid: input.txid,
                    vout: input.vout,
                });
            }
            input_txs.insert(*ind, tx.clone());
        }
        Ok(())
    }

    fn currency_txs_prepared_by(&self, pub_key_hash: &PubKeyHash) -> Result<PreparedBy> {
        let state = self.state.read();
        let spent_in_pool: HashSet<(TxId, u32)> = state
            .txs
            .values()
            .flat_map(|tx| tx.vin.iter().map(|vin| (vin.txid, vin.vout)))
            .collect();

        let mut prepared = PreparedBy::default();
        for txid in &state.order {
            let Some(tx) = state.txs.get(txid) else {
                continue;
            };
            for vin in &tx.vin {
                if keys::hash_pub_key(&vin.pub_key) != *pub_key_hash {
                    continue;
                }
                prepared.pending_inputs.push(vin.clone());
                if !state.txs.contains_key(&vin.txid) {
                    // Source lives outside the pool: a confirmed output
                    prepared.approved_inputs.push(vin.clone());
                }
            }
            for (ind, out) in tx.vout.iter().enumerate() {
                let vout = ind as u32;
                if out.is_locked_with(pub_key_hash) && !spent_in_pool.contains(&(tx.id, vout)) {
                    prepared.pending_outputs.push(PendingOutput {
                        output: OutputRef {
                            txid: tx.id,
                            vout,
                            value: out.value,
                        },
                        source: tx.clone(),
                    });
                }
            }
        }
        Ok(prepared)
    }

    fn detect_conflicts(
        &self,
        txs: Vec<Transaction>,
    ) -> Result<(Vec<Transaction>, Vec<Transaction>)> {
        let mut used: HashSet<(TxId, u32)> = HashSet::new();
        let mut good = Vec::new();
        let mut bad = Vec::new();
        for tx in txs {
            let conflicts = tx
                .vin
                .iter()
                .any(|vin| used.contains(&(vin.txid, vin.vout)));
            if conflicts {
                bad.push(tx);
            } else {
                used.extend(tx.vin.iter().map(|vin| (vin.txid, vin.vout)));
                good.push(tx);
            }
        }
        Ok((good, bad))
    }

    fn find_sql_reference_transaction(&self, reference_id: &str) -> Result<Option<TxId>> {
        let state = self.state.read();
        // Later arrivals win: the last match is the per-row chain tip
        let mut found = None;
        for txid in &state.order {
            if let Some(tx) = state.txs.get(txid) {
                if tx
                    .sql
                    .as_ref()
                    .is_some_and(|sql| sql.reference_id == reference_id)
                {
                    found = Some(*txid);
                }
            }
        }
        Ok(found)
    }

    fn for_each_transaction(
        &self,
        visit: &mut dyn FnMut(&Transaction) -> ControlFlow<()>,
    ) -> Result<usize> {
        let state = self.state.read();
        let mut visited = 0;
        for txid in &state.order {
            let Some(tx) = state.txs.get(txid) else {
                continue;
            };
            visited += 1;
            if visit(tx).is_break() {
                break;
            }
        }
        Ok(visited)
    }

    fn clean(&self) -> Result<()> {
        let mut state = self.state.write();
        state.order.clear();
        state.txs.clear();
        Ok(())
    }
}
