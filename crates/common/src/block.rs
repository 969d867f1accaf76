//! Minimal block shape consumed by the transaction core
//!
//! Block storage, headers, and proof-of-work live outside the core; the
//! handlers only need the hash links and the transaction slice. Slice
//! order is authoritative for same-block SQL execution and rollback.

use serde::{Deserialize, Serialize};

use crate::hashes::BlockHash;
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    pub height: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        hash: BlockHash,
        prev_hash: BlockHash,
        height: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            hash,
            prev_hash,
            height,
            transactions,
        }
    }
}
