//! Transaction manager: the single orchestrator of the hybrid ledger
//!
//! Owns the SQL engine and the four stores. Mutating operations take
//! `&mut self`: reception, cancellation, block-event handling, and
//! mining selection are mutually exclusive by construction, while
//! read-only queries (balance, lookups, iteration) run on `&self`.

use std::collections::HashMap;
use std::ops::ControlFlow;

use sqlchain_common::{
    Amount, Block, BlockHash, PubKeyHash, Transaction, TxId,
};
use sqlchain_sql::{QueryEngine, QueryProcessor};
use sqlchain_store::{
    BlockIndex, OutputRef, RowIndex, UnapprovedPool, UnspentOutputStore, WalletBalance,
};

use crate::builder;
use crate::error::{Error, Result};
use crate::verifier::TransactionVerifier;

pub struct TransactionManager<E, U, P, B, R>
where
    E: QueryEngine,
    U: UnspentOutputStore,
    P: UnapprovedPool,
    B: BlockIndex,
    R: RowIndex,
{
    engine: E,
    unspent: U,
    pool: P,
    blocks: B,
    rows: R,
}

impl<E, U, P, B, R> TransactionManager<E, U, P, B, R>
where
    E: QueryEngine,
    U: UnspentOutputStore,
    P: UnapprovedPool,
    B: BlockIndex,
    R: RowIndex,
{
    pub fn new(engine: E, unspent: U, pool: P, blocks: B, rows: R) -> Self {
        Self {
            engine,
            unspent,
            pool,
            blocks,
            rows,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn unspent(&self) -> &U {
        &self.unspent
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn blocks(&self) -> &B {
        &self.blocks
    }

    pub fn rows(&self) -> &R {
        &self.rows
    }

    fn processor(&self) -> QueryProcessor<'_, E> {
        QueryProcessor::new(&self.engine)
    }

    fn verifier(&self) -> TransactionVerifier<'_, U, P, B> {
        TransactionVerifier::new(&self.unspent, &self.pool, &self.blocks)
    }

    // === Reception ===

    /// Verify a transaction, optionally run its SQL, and admit it to
    /// the pool. On verification or execution failure nothing is
    /// admitted and no rollback is needed.
    pub fn received_new_transaction(&mut self, tx: &Transaction, execute_sql: bool) -> Result<()> {
        if tx.id.is_zero() {
            return Err(Error::VerificationFailed("transaction is not completed".into()));
        }
        self.verifier().verify_quick(tx)?;
        if let Some(sql) = &tx.sql {
            if execute_sql {
                tracing::debug!("execute: {}, refID is {}", sql.query, sql.reference_id);
                self.processor().execute_query(&sql.query)?;
            }
        }
        self.pool.add(tx)?;
        Ok(())
    }

    /// Reassemble a transaction from the signing protocol's bytes and
    /// the client's signature, then receive it
    pub fn received_currency_transaction_data(
        &mut self,
        tx_bytes: &[u8],
        signature: &[u8],
    ) -> Result<Transaction> {
        let mut tx = Transaction::deserialize(tx_bytes)?;
        tx.complete(signature.to_vec())?;
        self.received_new_transaction(&tx, true)?;
        Ok(tx)
    }

    /// Build, sign, and receive a transfer in one step. The caller
    /// supplies the signing primitive; key material never enters the
    /// core.
    pub fn create_currency_transaction(
        &mut self,
        pub_key: &[u8],
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
        to: PubKeyHash,
        amount: Amount,
    ) -> Result<Transaction> {
        let prepared = self.prepare_currency_transaction(pub_key, to, amount)?;
        let signature = sign(&prepared.data_to_sign);
        self.received_currency_transaction_data(&prepared.tx_bytes, &signature)
    }

    /// Entry point of the signed-submission protocol for SQL writes.
    ///
    /// With embedded tx-bytes and signature the transaction is completed
    /// and received. With a bare public key the transaction is built and
    /// `SignatureRequired` carries the exact bytes to sign. Without
    /// credentials `PubKeyRequired` is returned. Both signals are
    /// control flow, not failures.
    pub fn new_sql_transaction(
        &mut self,
        raw_sql: &str,
        amount: Amount,
        to: Option<PubKeyHash>,
    ) -> Result<Transaction> {
        let parsed = self.processor().parse_query(raw_sql)?;
        if let (Some(tx_bytes), Some(signature)) = (&parsed.tx_bytes, &parsed.signature) {
            let mut tx = Transaction::deserialize(tx_bytes)?;
            tx.complete(signature.clone())?;
            self.received_new_transaction(&tx, true)?;
            return Ok(tx);
        }
        let Some(pub_key) = parsed.pub_key.clone() else {
            return Err(Error::PubKeyRequired);
        };
        let update = self.processor().make_sql_update(&parsed)?;
        let prepared = builder::prepare_sql_transaction(
            &self.unspent,
            &self.pool,
            &self.rows,
            &pub_key,
            update,
            amount,
            to,
        )?;
        Err(Error::SignatureRequired {
            tx_bytes: prepared.tx_bytes,
            data_to_sign: prepared.data_to_sign,
        })
    }

    // === Building ===

    /// Build a currency transfer; the caller signs the returned data
    pub fn prepare_currency_transaction(
        &self,
        pub_key: &[u8],
        to: PubKeyHash,
        amount: Amount,
    ) -> Result<builder::PreparedTransaction> {
        builder::prepare_currency_transaction(&self.unspent, &self.pool, pub_key, to, amount)
    }

    /// Build a SQL transaction with an optional currency part
    pub fn prepare_sql_transaction(
        &self,
        pub_key: &[u8],
        sql_update: sqlchain_common::SqlUpdate,
        amount: Amount,
        to: Option<PubKeyHash>,
    ) -> Result<builder::PreparedTransaction> {
        builder::prepare_sql_transaction(
            &self.unspent,
            &self.pool,
            &self.rows,
            pub_key,
            sql_update,
            amount,
            to,
        )
    }

    // === Cancellation ===

    /// Roll back and drop a pool transaction. Refuses while other pool
    /// transactions depend on it; cancel those first, leaves inward.
    pub fn cancel_transaction(&mut self, txid: &TxId) -> Result<()> {
        tracing::debug!("cancel TX: {}", txid);
        let tx = self.pool.get_if_exists(txid)?.ok_or(Error::NotInPool)?;
        self.ensure_no_dependents(&tx)?;
        if let Some(sql) = &tx.sql {
            tracing::debug!("cancel of SQL TX, rollback: {}", sql.rollback_query);
            self.processor().execute_rollback_from_tx(sql)?;
        }
        if !self.pool.delete(txid)? {
            return Err(Error::NotInPool);
        }
        Ok(())
    }

    fn ensure_no_dependents(&self, tx: &Transaction) -> Result<()> {
        let mut dependent = false;
        self.pool.for_each_transaction(&mut |other| {
            if other.id == tx.id {
                return ControlFlow::Continue(());
            }
            let spends_output = other.vin.iter().any(|vin| vin.txid == tx.id);
            let chains_sql = other
                .sql
                .as_ref()
                .is_some_and(|sql| sql.prev_tx_id == Some(tx.id));
            if spends_output || chains_sql {
                dependent = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        if dependent {
            return Err(Error::HasDependents { txid: tx.id });
        }
        Ok(())
    }

    // === Mining selection ===

    /// Pull up to `number` pool transactions, deep-verify each against
    /// the current tip with the in-progress batch as the predecessor
    /// window, cancel failures, and prune input conflicts among the
    /// survivors
    pub fn transactions_for_new_block(&mut self, number: usize) -> Result<Vec<Transaction>> {
        let candidates = self.pool.transactions(number)?;
        tracing::debug!("found {} transactions to mine", candidates.len());

        let mut verified: Vec<Transaction> = Vec::new();
        for tx in candidates {
            let result = self.verifier().verify_deep(&tx, &verified, None);
            match result {
                Ok(()) => verified.push(tx),
                Err(err) => {
                    tracing::debug!("ignore transaction {}, verify failed: {}", tx.id, err);
                    if let Err(err) = self.cancel_transaction(&tx.id) {
                        tracing::warn!("cancel of failed candidate {}: {}", tx.id, err);
                    }
                }
            }
        }
        tracing::debug!("after verification {} transactions are left", verified.len());
        if verified.is_empty() {
            return Err(Error::EmptyBlockCandidate);
        }

        let (good, bad) = self.pool.detect_conflicts(verified)?;
        tracing::debug!(
            "after conflict detection {} fine, {} conflicts",
            good.len(),
            bad.len()
        );
        for tx in &bad {
            tracing::debug!("delete conflicting transaction: {}", tx.id);
            if let Err(err) = self.cancel_transaction(&tx.id) {
                tracing::warn!("cancel of conflicting candidate {}: {}", tx.id, err);
            }
        }
        Ok(good)
    }

    /// Deep verification entry point for chain logic
    pub fn verify_transaction(
        &self,
        tx: &Transaction,
        prev_txs: &[Transaction],
        tip: Option<BlockHash>,
    ) -> Result<()> {
        self.verifier().verify_deep(tx, prev_txs, tip)
    }

    // === Block events ===

    /// A block was stored. Only when it lands on top of the chain does
    /// it mutate state: its SQL runs (unless already executed through
    /// the pool), its transactions leave the pool without rollback, and
    /// the UTXO and lineage indexes advance.
    pub fn block_added(&mut self, block: &Block, on_top: bool) -> Result<()> {
        tracing::debug!("block added {}", block.hash);
        self.blocks.block_added(block)?;
        if on_top {
            self.execute_block_sql(block)?;
            self.pool.delete_from_block(block)?;
            self.unspent.update_on_block_add(block)?;
            self.rows.update_on_block_add(block)?;
        }
        Ok(())
    }

    /// A block left the top of the chain. Its transactions stay
    /// logically valid and return to the pool without SQL rollback.
    pub fn block_removed(&mut self, block: &Block) -> Result<()> {
        tracing::debug!("block removed {}", block.hash);
        self.pool.add_from_canceled(block)?;
        self.unspent.update_on_block_cancel(block)?;
        self.blocks.block_removed(block)?;
        Ok(())
    }

    /// Branch switch: a stored block joined the primary chain
    pub fn block_added_to_primary_chain(&mut self, block: &Block) -> Result<()> {
        tracing::debug!("block added to primary {}", block.hash);
        self.execute_block_sql(block)?;
        self.pool.delete_from_block(block)?;
        self.unspent.update_on_block_add(block)?;
        self.rows.update_on_block_add(block)?;
        Ok(())
    }

    /// Branch switch: a block left the primary chain. This is the only
    /// path that runs SQL rollback for chain transactions, strictly in
    /// reverse slice order: each rollback was computed against the
    /// immediate pre-image and is only valid applied LIFO.
    pub fn block_removed_from_primary_chain(&mut self, block: &Block) -> Result<()> {
        tracing::debug!("block removed from primary {}", block.hash);
        for tx in block.transactions.iter().rev() {
            if tx.is_coinbase() {
                continue;
            }
            let Some(sql) = &tx.sql else {
                continue;
            };
            tracing::debug!("execute on block remove: {}", sql.rollback_query);
            self.processor().execute_rollback_from_tx(sql)?;
        }
        self.unspent.update_on_block_cancel(block)?;
        self.rows.update_on_block_remove(block)?;
        Ok(())
    }

    /// Return the transactions of cancelled blocks to the pool,
    /// re-executing their SQL. Individually failing transactions are
    /// dropped, not fatal.
    pub fn transactions_from_canceled_blocks(&mut self, txs: &[Transaction]) -> Result<()> {
        for tx in txs {
            if let Err(err) = self.received_new_transaction(tx, true) {
                tracing::warn!("re-receive of {} failed: {}", tx.id, err);
            }
        }
        Ok(())
    }

    /// Run the SQL of block transactions that did not pass through the
    /// pool (their effects are not live yet)
    fn execute_block_sql(&mut self, block: &Block) -> Result<()> {
        for tx in &block.transactions {
            let Some(sql) = &tx.sql else {
                continue;
            };
            if self.pool.get_if_exists(&tx.id)?.is_some() {
                tracing::debug!("exists in pool, skip SQL: {}", tx.id);
                continue;
            }
            tracing::debug!("execute on block add: {}", sql.query);
            self.processor().execute_query_from_tx(sql)?;
        }
        Ok(())
    }

    // === Balance ===

    /// Balance over confirmed and pending state. Pending may be
    /// negative while spendings await confirmation.
    pub fn address_balance(&self, pub_key_hash: &PubKeyHash) -> Result<WalletBalance> {
        tracing::debug!("get balance {}", pub_key_hash);
        let approved = self.unspent.address_balance(pub_key_hash)?;
        let pending = self.pending_balance(pub_key_hash)?;
        Ok(WalletBalance {
            approved,
            pending,
            total: approved + pending,
        })
    }

    fn pending_balance(&self, pub_key_hash: &PubKeyHash) -> Result<Amount> {
        let prepared = self.pool.currency_txs_prepared_by(pub_key_hash)?;
        let mut pending = Amount::ZERO;
        for output in &prepared.pending_outputs {
            pending += output.output.value;
        }
        for input in &prepared.approved_inputs {
            pending -= self.unspent.input_value(input)?;
        }
        Ok(pending)
    }

    // === Lookups and maintenance ===

    /// Look a transaction up in the pool first, then on the primary
    /// branch
    pub fn get_if_exists(&self, txid: &TxId) -> Result<Option<Transaction>> {
        if let Some(tx) = self.pool.get_if_exists(txid)? {
            return Ok(Some(tx));
        }
        Ok(self.blocks.currency_transaction_all_info(txid, None)?)
    }

    pub fn get_if_unapproved_exists(&self, txid: &TxId) -> Result<Option<Transaction>> {
        Ok(self.pool.get_if_exists(txid)?)
    }

    /// Rebuild derived store state, returning per-store counters
    pub fn reindex_data(&mut self) -> Result<HashMap<String, usize>> {
        let unspent = self.unspent.reindex()?;
        Ok(HashMap::from([("unspentoutputs".to_string(), unspent)]))
    }

    pub fn unapproved_count(&self) -> Result<usize> {
        Ok(self.pool.count()?)
    }

    pub fn unspent_count(&self) -> Result<usize> {
        Ok(self.unspent.count_unspent_outputs()?)
    }

    pub fn for_each_unapproved_transaction(
        &self,
        visit: &mut dyn FnMut(&Transaction) -> ControlFlow<()>,
    ) -> Result<usize> {
        Ok(self.pool.for_each_transaction(visit)?)
    }

    pub fn for_each_unspent_output(
        &self,
        pub_key_hash: &PubKeyHash,
        visit: &mut dyn FnMut(&OutputRef) -> ControlFlow<()>,
    ) -> Result<()> {
        Ok(self.unspent.for_each_unspent_output(pub_key_hash, visit)?)
    }

    pub fn clean_unapproved_cache(&mut self) -> Result<()> {
        Ok(self.pool.clean()?)
    }
}
