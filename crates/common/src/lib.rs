//! Shared value types for the sqlchain transaction core
//!
//! Everything that crosses a crate boundary lives here: hash newtypes,
//! amount normalization, the transaction and block structures, and the
//! signing helpers the verifier delegates to.

mod amount;
mod block;
mod error;
mod hashes;
pub mod keys;
mod transaction;
mod tx_id;

pub use amount::{normalize_amount, smallest_unit, Amount};
pub use block::Block;
pub use error::{Error, Result};
pub use hashes::{BlockHash, PubKeyHash};
pub use transaction::{CurrencyInput, CurrencyOutput, SqlUpdate, SqlUpdateKind, Transaction};
pub use tx_id::TxId;
