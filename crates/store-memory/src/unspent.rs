//! In-memory unspent-output store

use std::collections::HashMap;
use std::ops::ControlFlow;

use parking_lot::RwLock;
use sqlchain_common::{keys, Amount, Block, CurrencyInput, PubKeyHash, Transaction, TxId};
use sqlchain_store::{
    Error, InputSelection, OutputRef, PendingOutput, Result, UnspentOutputStore,
};

#[derive(Debug, Clone)]
struct UtxoEntry {
    value: Amount,
    pub_key_hash: PubKeyHash,
    source: Transaction,
}

#[derive(Default)]
struct UnspentState {
    live: HashMap<(TxId, u32), UtxoEntry>,
    /// Consumed entries, kept so block cancellation can restore them
    spent: HashMap<(TxId, u32), UtxoEntry>,
}

/// Lock-guarded UTXO set with a spent-output graveyard
#[derive(Default)]
pub struct MemoryUnspentStore {
    state: RwLock<UnspentState>,
}

impl MemoryUnspentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_outputs_of(
        state: &UnspentState,
        pub_key_hash: &PubKeyHash,
    ) -> Vec<((TxId, u32), UtxoEntry)> {
        let mut outputs: Vec<_> = state
            .live
            .iter()
            .filter(|(_, entry)| entry.pub_key_hash == *pub_key_hash)
            .map(|(key, entry)| (*key, entry.clone()))
            .collect();
        outputs.sort_by_key(|(key, _)| *key);
        outputs
    }
}

impl UnspentOutputStore for MemoryUnspentStore {
    fn address_balance(&self, pub_key_hash: &PubKeyHash) -> Result<Amount> {
        let state = self.state.read();
        Ok(state
            .live
            .values()
            .filter(|entry| entry.pub_key_hash == *pub_key_hash)
            .map(|entry| entry.value)
            .sum())
    }

    fn new_transaction_inputs(
        &self,
        pub_key: &[u8],
        amount: Amount,
        pending_inputs: &[CurrencyInput],
    ) -> Result<InputSelection> {
        let pub_key_hash = keys::hash_pub_key(pub_key);
        let consumed: Vec<(TxId, u32)> =
            pending_inputs.iter().map(|i| (i.txid, i.vout)).collect();
        let state = self.state.read();

        let mut selection = InputSelection::default();
        for ((txid, vout), entry) in Self::sorted_outputs_of(&state, &pub_key_hash) {
            if selection.total >= amount {
                break;
            }
            if consumed.contains(&(txid, vout)) {
                continue;
            }
            selection.inputs.push(CurrencyInput {
                txid,
                vout,
                signature: Vec::new(),
                pub_key: pub_key.to_vec(),
            });
            selection.prev_txs.insert(txid, entry.source.clone());
            selection.total += entry.value;
        }
        Ok(selection)
    }

    fn extend_transaction_inputs(
        &self,
        pub_key: &[u8],
        amount: Amount,
        mut selection: InputSelection,
        pending_outputs: &[PendingOutput],
    ) -> Result<InputSelection> {
        for pending in pending_outputs {
            if selection.total >= amount {
                break;
            }
            selection.inputs.push(CurrencyInput {
                txid: pending.output.txid,
                vout: pending.output.vout,
                signature: Vec::new(),
                pub_key: pub_key.to_vec(),
            });
            selection
                .prev_txs
                .insert(pending.output.txid, pending.source.clone());
            selection.total += pending.output.value;
        }
        Ok(selection)
    }

    fn input_value(&self, input: &CurrencyInput) -> Result<Amount> {
        let state = self.state.read();
        state
            .live
            .get(&(input.txid, input.vout))
            .map(|entry| entry.value)
            .ok_or_else(|| Error::NotFound(format!("output {}:{}", input.txid, input.vout)))
    }

    fn verify_outputs_are_not_spent(
        &self,
        vin: &[CurrencyInput],
    ) -> Result<(HashMap<usize, Transaction>, HashMap<usize, CurrencyInput>)> {
        let state = self.state.read();
        let mut found = HashMap::new();
        let mut not_found = HashMap::new();
        for (ind, input) in vin.iter().enumerate() {
            match state.live.get(&(input.txid, input.vout)) {
                Some(entry) => {
                    found.insert(ind, entry.source.clone());
                }
                None => {
                    not_found.insert(ind, input.clone());
                }
            }
        }
        Ok((found, not_found))
    }

    fn update_on_block_add(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in &block.transactions {
            for vin in &tx.vin {
                let key = (vin.txid, vin.vout);
                if let Some(entry) = state.live.remove(&key) {
                    state.spent.insert(key, entry);
                }
            }
            for (ind, out) in tx.vout.iter().enumerate() {
                state.live.insert(
                    (tx.id, ind as u32),
                    UtxoEntry {
                        value: out.value,
                        pub_key_hash: out.pub_key_hash,
                        source: tx.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    fn update_on_block_cancel(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write();
        for tx in block.transactions.iter().rev() {
            for ind in 0..tx.vout.len() {
                state.live.remove(&(tx.id, ind as u32));
            }
            for vin in &tx.vin {
                let key = (vin.txid, vin.vout);
                if let Some(entry) = state.spent.remove(&key) {
                    state.live.insert(key, entry);
                }
            }
        }
        Ok(())
    }

    fn reindex(&self) -> Result<usize> {
        // The in-memory set is maintained incrementally and is always
        // consistent; reindexing is a recount.
        Ok(self.state.read().live.len())
    }

    fn count_unspent_outputs(&self) -> Result<usize> {
        Ok(self.state.read().live.len())
    }

    fn for_each_unspent_output(
        &self,
        pub_key_hash: &PubKeyHash,
        visit: &mut dyn FnMut(&OutputRef) -> ControlFlow<()>,
    ) -> Result<()> {
        let state = self.state.read();
        for ((txid, vout), entry) in Self::sorted_outputs_of(&state, pub_key_hash) {
            let output = OutputRef {
                txid,
                vout,
                value: entry.value,
            };
            if visit(&output).is_break() {
                break;
            }
        }
        Ok(())
    }
}
