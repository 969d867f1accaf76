//! Transaction assembly: input selection, outputs, and sign-data
//!
//! Inputs are gathered from confirmed outputs first, skipping anything
//! already consumed by the caller's pending transactions, and extended
//! with pool outputs when the confirmed funds fall short. Amounts are
//! normalized to 8 decimal places before entering the hash pre-image.

use std::collections::HashMap;

use sqlchain_common::{
    keys, normalize_amount, smallest_unit, Amount, CurrencyOutput, PubKeyHash, SqlUpdate,
    Transaction,
};
use sqlchain_store::{InputSelection, RowIndex, UnapprovedPool, UnspentOutputStore};

use crate::error::{Error, Result};
use crate::lineage;

/// A built transaction awaiting the client's signature
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    /// Serialized transaction, returned to the client and resubmitted
    /// with the signature
    pub tx_bytes: Vec<u8>,
    /// Digest the client must sign
    pub data_to_sign: Vec<u8>,
    /// Source transactions by input index, for later verification
    pub input_txs: HashMap<usize, Transaction>,
}

/// Build a pure currency transfer and its sign-data
pub fn prepare_currency_transaction<U, P>(
    unspent: &U,
    pool: &P,
    pub_key: &[u8],
    to: PubKeyHash,
    amount: Amount,
) -> Result<PreparedTransaction>
where
    U: UnspentOutputStore,
    P: UnapprovedPool,
{
    if amount <= Amount::ZERO {
        return Err(Error::NonPositiveAmount);
    }
    let amount = normalize_amount(amount);
    let selection = gather_inputs(unspent, pool, pub_key, amount)?;
    let outputs = build_outputs(pub_key, to, amount, selection.total);
    let input_txs = input_txs_by_index(&selection)?;

    let mut tx = Transaction::new_currency(selection.inputs, outputs);
    let data_to_sign = tx.prepare_sign_data(pub_key, &input_txs)?;
    let tx_bytes = tx.serialize()?;
    Ok(PreparedTransaction {
        tx_bytes,
        data_to_sign,
        input_txs,
    })
}

/// Build a SQL transaction, with a currency part when `amount` is
/// positive, and resolve its base transaction
pub fn prepare_sql_transaction<U, P, R>(
    unspent: &U,
    pool: &P,
    rows: &R,
    pub_key: &[u8],
    mut sql_update: SqlUpdate,
    amount: Amount,
    to: Option<PubKeyHash>,
) -> Result<PreparedTransaction>
where
    U: UnspentOutputStore,
    P: UnapprovedPool,
    R: RowIndex,
{
    let base = lineage::find_base_transaction(pool, rows, &sql_update)?;
    tracing::debug!(
        "base transaction {:?} for {}",
        base,
        sql_update.query
    );
    sql_update.prev_tx_id = base;

    let mut tx;
    let input_txs;
    if amount > Amount::ZERO {
        let to = to.ok_or(Error::RecipientRequired)?;
        let amount = normalize_amount(amount);
        let selection = gather_inputs(unspent, pool, pub_key, amount)?;
        let outputs = build_outputs(pub_key, to, amount, selection.total);
        input_txs = input_txs_by_index(&selection)?;
        tx = Transaction::new_sql(sql_update, selection.inputs, outputs);
    } else {
        input_txs = HashMap::new();
        tx = Transaction::new_sql(sql_update, Vec::new(), Vec::new());
    }

    let data_to_sign = tx.prepare_sign_data(pub_key, &input_txs)?;
    let tx_bytes = tx.serialize()?;
    Ok(PreparedTransaction {
        tx_bytes,
        data_to_sign,
        input_txs,
    })
}

/// Select inputs covering `amount`: confirmed outputs first, pool
/// outputs as the fallback
fn gather_inputs<U, P>(
    unspent: &U,
    pool: &P,
    pub_key: &[u8],
    amount: Amount,
) -> Result<InputSelection>
where
    U: UnspentOutputStore,
    P: UnapprovedPool,
{
    let pub_key_hash = keys::hash_pub_key(pub_key);
    let prepared = pool.currency_txs_prepared_by(&pub_key_hash)?;
    tracing::debug!(
        "pending state: {} inputs, {} unspent outputs",
        prepared.pending_inputs.len(),
        prepared.pending_outputs.len()
    );

    let mut selection =
        unspent.new_transaction_inputs(pub_key, amount, &prepared.pending_inputs)?;
    tracing::debug!("first step prepared {} of {}", selection.total, amount);

    if selection.total < amount {
        if prepared.pending_outputs.is_empty() {
            return Err(Error::InsufficientFunds);
        }
        selection = unspent.extend_transaction_inputs(
            pub_key,
            amount,
            selection,
            &prepared.pending_outputs,
        )?;
        tracing::debug!("second step prepared {} of {}", selection.total, amount);
    }
    if selection.total < amount {
        return Err(Error::InsufficientFunds);
    }
    Ok(selection)
}

/// Recipient output plus change, the change suppressed when the
/// remainder does not exceed the smallest unit
fn build_outputs(
    pub_key: &[u8],
    to: PubKeyHash,
    amount: Amount,
    total: Amount,
) -> Vec<CurrencyOutput> {
    let mut outputs = vec![CurrencyOutput::new(amount, to)];
    let change = total - amount;
    if change > smallest_unit() {
        outputs.push(CurrencyOutput::new(change, keys::hash_pub_key(pub_key)));
    }
    outputs
}

/// Re-key the selection's source transactions by input index, the shape
/// sign-data preparation needs
fn input_txs_by_index(selection: &InputSelection) -> Result<HashMap<usize, Transaction>> {
    let mut by_index = HashMap::with_capacity(selection.inputs.len());
    for (ind, input) in selection.inputs.iter().enumerate() {
        let source = selection
            .prev_txs
            .get(&input.txid)
            .cloned()
            .ok_or(sqlchain_common::Error::MissingPreviousTransaction(ind))?;
        by_index.insert(ind, source);
    }
    Ok(by_index)
}
