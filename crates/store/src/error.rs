//! Error types for the store contracts

use sqlchain_common::TxId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Input {txid}:{vout} is not prepared by any pool transaction")]
    InputNotPrepared { txid: TxId, vout: u32 },

    #[error("Transaction input was already spent before")]
    InputAlreadySpent,

    #[error("Storage error: {0}")]
    Storage(String),
}
