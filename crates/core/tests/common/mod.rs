//! Common test utilities for transaction core integration tests
#![allow(dead_code)]

use std::str::FromStr;

use ed25519_dalek::SigningKey;
use sqlchain_common::{keys, Amount, Block, BlockHash, PubKeyHash, Transaction};
use sqlchain_core::TransactionManager;
use sqlchain_sql::{QueryEngine, QueryProcessor, Row, SqliteEngine};
use sqlchain_store::{UnspentOutputStore, WalletBalance};
use sqlchain_store_memory::{MemoryBlockIndex, MemoryPool, MemoryRowIndex, MemoryUnspentStore};

pub type Manager = TransactionManager<
    SqliteEngine,
    MemoryUnspentStore,
    MemoryPool,
    MemoryBlockIndex,
    MemoryRowIndex,
>;

/// Test context wiring a manager over an in-memory SQLite engine and
/// in-memory stores, with a tracked chain tip
pub struct TestContext {
    pub manager: Manager,
    height: u64,
    tip: Option<BlockHash>,
}

impl TestContext {
    pub fn new() -> Self {
        let engine = SqliteEngine::in_memory().unwrap();
        let manager = TransactionManager::new(
            engine,
            MemoryUnspentStore::new(),
            MemoryPool::new(),
            MemoryBlockIndex::new(),
            MemoryRowIndex::new(),
        );
        Self {
            manager,
            height: 0,
            tip: None,
        }
    }

    pub fn signer(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn pub_key(seed: u8) -> Vec<u8> {
        Self::signer(seed).verifying_key().as_bytes().to_vec()
    }

    pub fn pkh(seed: u8) -> PubKeyHash {
        keys::hash_pub_key(&Self::pub_key(seed))
    }

    pub fn amount(value: &str) -> Amount {
        Amount::from_str(value).unwrap()
    }

    /// Mine a block paying `value` to `seed`, establishing funds
    pub fn fund(&mut self, seed: u8, value: &str) -> Transaction {
        let coinbase = Transaction::coinbase(
            Self::pkh(seed),
            Self::amount(value),
            &format!("emission-{}", self.height + 1),
        )
        .unwrap();
        let block = self.next_block(vec![coinbase.clone()]);
        self.add_block(&block);
        coinbase
    }

    /// Assemble the next block on the current tip
    pub fn next_block(&mut self, txs: Vec<Transaction>) -> Block {
        self.height += 1;
        let hash = BlockHash::from_data(format!("block-{}", self.height).as_bytes());
        Block::new(hash, self.tip.unwrap_or(BlockHash::ZERO), self.height, txs)
    }

    /// Add a block on top of the chain and advance the recorded tip
    pub fn add_block(&mut self, block: &Block) {
        self.manager.block_added(block, true).unwrap();
        self.tip = Some(block.hash);
        self.manager.blocks().set_top(self.tip);
    }

    /// Drop the top block off the chain; its transactions return to the
    /// pool without rollback
    pub fn remove_block(&mut self, block: &Block) {
        self.manager.block_removed(block).unwrap();
        self.tip = (!block.prev_hash.is_zero()).then_some(block.prev_hash);
        self.manager.blocks().set_top(self.tip);
        self.height -= 1;
    }

    /// Branch switch: unwind the top block with SQL rollback
    pub fn switch_away(&mut self, block: &Block) {
        self.manager.block_removed_from_primary_chain(block).unwrap();
        self.tip = (!block.prev_hash.is_zero()).then_some(block.prev_hash);
        self.manager.blocks().set_top(self.tip);
        self.height -= 1;
    }

    /// Mine everything the pool offers into a new block
    pub fn mine_pending(&mut self) -> Block {
        let mut txs = vec![Transaction::coinbase(
            Self::pkh(99),
            Self::amount("10"),
            &format!("emission-{}", self.height + 1),
        )
        .unwrap()];
        txs.extend(self.manager.transactions_for_new_block(0).unwrap());
        let block = self.next_block(txs);
        self.add_block(&block);
        block
    }

    /// Build, sign, and receive a currency transfer
    pub fn transfer(&mut self, from: u8, to: u8, value: &str) -> Transaction {
        let key = Self::signer(from);
        self.manager
            .create_currency_transaction(
                &Self::pub_key(from),
                |data| keys::sign(&key, data),
                Self::pkh(to),
                Self::amount(value),
            )
            .unwrap()
    }

    /// Build, sign, and receive a SQL-only transaction
    pub fn submit_sql(&mut self, seed: u8, raw: &str) -> Transaction {
        self.try_submit_sql(seed, raw).unwrap()
    }

    pub fn try_submit_sql(&mut self, seed: u8, raw: &str) -> sqlchain_core::Result<Transaction> {
        let parsed = QueryProcessor::new(self.manager.engine()).parse_query(raw)?;
        let update = QueryProcessor::new(self.manager.engine()).make_sql_update(&parsed)?;
        let key = Self::signer(seed);
        let prepared = self.manager.prepare_sql_transaction(
            &Self::pub_key(seed),
            update,
            Amount::ZERO,
            None,
        )?;
        let mut tx = Transaction::deserialize(&prepared.tx_bytes)?;
        tx.complete(keys::sign(&key, &prepared.data_to_sign))?;
        self.manager.received_new_transaction(&tx, true)?;
        Ok(tx)
    }

    pub fn row(&self, table: &str, key: &str) -> Option<Row> {
        self.manager
            .engine()
            .select_row(&format!("SELECT * FROM {} WHERE id='{}'", table, key))
            .unwrap()
    }

    pub fn approved(&self, seed: u8) -> Amount {
        self.manager
            .unspent()
            .address_balance(&Self::pkh(seed))
            .unwrap()
    }

    pub fn balance(&self, seed: u8) -> WalletBalance {
        self.manager.address_balance(&Self::pkh(seed)).unwrap()
    }
}
