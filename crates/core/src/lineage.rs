//! Lineage resolution: locating the base transaction of a SQL update
//!
//! The base is the prior mutation of the same reference id. The pool is
//! consulted first (later arrivals win, so the per-row chain tip is
//! found); the chain-side index second. INSERT and DROP may fall back
//! to the table-level reference id, covering an INSERT right after the
//! table-creating transaction, and finally to no base at all: a row
//! created in a table that predates the chain starts a fresh chain.

use sqlchain_common::{SqlUpdate, SqlUpdateKind, TxId};
use sqlchain_store::{RowIndex, UnapprovedPool};

use crate::error::{Error, Result};

/// Find the transaction id the update's `prev_tx_id` must link to,
/// `None` for a fresh chain
pub fn find_base_transaction<P, R>(
    pool: &P,
    rows: &R,
    update: &SqlUpdate,
) -> Result<Option<TxId>>
where
    P: UnapprovedPool + ?Sized,
    R: RowIndex + ?Sized,
{
    if let Some(txid) = pool.find_sql_reference_transaction(&update.reference_id)? {
        return Ok(Some(txid));
    }
    match update.kind() {
        SqlUpdateKind::CreateTable | SqlUpdateKind::Other => Ok(None),
        SqlUpdateKind::Update | SqlUpdateKind::Delete => {
            match rows.tx_for_ref_id(&update.reference_id)? {
                Some(txid) => Ok(Some(txid)),
                None => Err(Error::BaseTransactionNotFound(update.query.clone())),
            }
        }
        SqlUpdateKind::Insert | SqlUpdateKind::DropTable => {
            if let Some(txid) = rows.tx_for_ref_id(&update.reference_id)? {
                return Ok(Some(txid));
            }
            match update.alternative_ref_id() {
                Some(alternative) => Ok(rows.tx_for_ref_id(&alternative)?),
                None => Ok(None),
            }
        }
    }
}
