//! Types shared across the store contracts

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlchain_common::{Amount, Transaction, TxId};

/// Reference to a concrete output with its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRef {
    pub txid: TxId,
    pub vout: u32,
    pub value: Amount,
}

/// A pool output available for spending before confirmation.
///
/// The source transaction rides along because the builder needs it in
/// the sign-data pre-image map.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOutput {
    pub output: OutputRef,
    pub source: Transaction,
}

/// Record of an output being consumed on some chain branch
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpend {
    pub vout: u32,
    pub spent_by: TxId,
}

/// Input selection in progress: chosen inputs, their source
/// transactions, and the accumulated value
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    pub inputs: Vec<sqlchain_common::CurrencyInput>,
    pub prev_txs: HashMap<TxId, Transaction>,
    pub total: Amount,
}

/// Balance of an address over confirmed and pending state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub approved: Amount,
    pub pending: Amount,
    pub total: Amount,
}
