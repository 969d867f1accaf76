//! Store contracts consumed by the transaction core
//!
//! Each store exposes its own transactional guarantees; the core issues
//! one logical mutation per public operation and assumes every store is
//! internally consistent. Iteration uses abortable visitors: returning
//! `ControlFlow::Break(())` stops the walk early.

mod blocks;
mod error;
mod pool;
mod rows;
mod types;
mod unspent;

pub use blocks::BlockIndex;
pub use error::{Error, Result};
pub use pool::{PreparedBy, UnapprovedPool};
pub use rows::RowIndex;
pub use types::{InputSelection, OutputRef, OutputSpend, PendingOutput, WalletBalance};
pub use unspent::UnspentOutputStore;
