//! Currency verification at two strengths
//!
//! Quick verification resolves inputs against the unspent set with a
//! fallback to pool-prepared outputs; it gates mempool admission. Deep
//! verification walks the canonical chain under a tip and gates block
//! construction, resolving inter-dependent candidates through the
//! caller-supplied predecessor window.

use std::collections::HashMap;

use sqlchain_common::{BlockHash, CurrencyInput, Transaction};
use sqlchain_store::{BlockIndex, UnapprovedPool, UnspentOutputStore};

use crate::error::{Error, Result};

pub struct TransactionVerifier<'a, U, P, B>
where
    U: UnspentOutputStore,
    P: UnapprovedPool,
    B: BlockIndex,
{
    unspent: &'a U,
    pool: &'a P,
    blocks: &'a B,
}

impl<'a, U, P, B> TransactionVerifier<'a, U, P, B>
where
    U: UnspentOutputStore,
    P: UnapprovedPool,
    B: BlockIndex,
{
    pub fn new(unspent: &'a U, pool: &'a P, blocks: &'a B) -> Self {
        Self {
            unspent,
            pool,
            blocks,
        }
    }

    /// Admission-strength check against the unspent set, falling back
    /// to pool-local inputs
    pub fn verify_quick(&self, tx: &Transaction) -> Result<()> {
        let (mut input_txs, not_found) = self.unspent.verify_outputs_are_not_spent(&tx.vin)?;
        if !not_found.is_empty() {
            self.pool
                .check_inputs_are_prepared(&not_found, &mut input_txs)?;
        }
        tx.verify(&input_txs)
            .map_err(|e| Error::VerificationFailed(e.to_string()))
    }

    /// Chain-walking check under `tip`. Inputs unresolved on the branch
    /// must be satisfied by the `prev_txs` window of the block being
    /// assembled.
    pub fn verify_deep(
        &self,
        tx: &Transaction,
        prev_txs: &[Transaction],
        tip: Option<BlockHash>,
    ) -> Result<()> {
        let (mut input_txs, not_found) = self.input_transactions_state(tx, tip)?;
        if !not_found.is_empty() {
            self.pool
                .check_inputs_were_before(&not_found, prev_txs, &mut input_txs)?;
        }
        tx.verify(&input_txs)
            .map_err(|e| Error::VerificationFailed(e.to_string()))
    }

    /// Resolve each input's source transaction on the branch under
    /// `tip`, separating inputs the branch does not know
    #[allow(clippy::type_complexity)]
    fn input_transactions_state(
        &self,
        tx: &Transaction,
        tip: Option<BlockHash>,
    ) -> Result<(HashMap<usize, Transaction>, HashMap<usize, CurrencyInput>)> {
        let mut resolved = HashMap::new();
        let mut unresolved = HashMap::new();
        if tx.is_coinbase() {
            return Ok((resolved, unresolved));
        }
        for (ind, vin) in tx.vin.iter().enumerate() {
            let hashes = self.blocks.transaction_blocks(&vin.txid)?;
            let chosen = self.blocks.choose_hash_under_tip(&hashes, tip)?;
            let prev_tx = match chosen {
                Some(hash) => self.blocks.transaction_from_block(&vin.txid, &hash)?,
                None => None,
            };
            let Some(prev_tx) = prev_tx else {
                tracing::debug!("tx {} is not in blocks under the tip", vin.txid);
                unresolved.insert(ind, vin.clone());
                continue;
            };
            let spends = self.blocks.transaction_outputs_spent(&vin.txid, tip)?;
            if spends.iter().any(|spend| spend.vout == vin.vout) {
                return Err(Error::InputAlreadySpent);
            }
            resolved.insert(ind, prev_tx);
        }
        Ok((resolved, unresolved))
    }
}
