//! Unspent-output store contract

use std::collections::HashMap;
use std::ops::ControlFlow;

use sqlchain_common::{Amount, Block, CurrencyInput, PubKeyHash, Transaction};

use crate::error::Result;
use crate::types::{InputSelection, OutputRef, PendingOutput};

/// The confirmed UTXO set of the primary chain branch
pub trait UnspentOutputStore: Send + Sync {
    /// Sum of unspent outputs locked to the given key hash
    fn address_balance(&self, pub_key_hash: &PubKeyHash) -> Result<Amount>;

    /// Select confirmed inputs covering `amount` for the given key,
    /// skipping outputs already consumed by pending inputs. May return
    /// less than `amount`; the caller decides whether to extend.
    fn new_transaction_inputs(
        &self,
        pub_key: &[u8],
        amount: Amount,
        pending_inputs: &[CurrencyInput],
    ) -> Result<InputSelection>;

    /// Extend an insufficient selection with outputs of pool
    /// transactions
    fn extend_transaction_inputs(
        &self,
        pub_key: &[u8],
        amount: Amount,
        selection: InputSelection,
        pending_outputs: &[PendingOutput],
    ) -> Result<InputSelection>;

    /// Value of the output an input consumes; errors if it is not in
    /// the unspent set
    fn input_value(&self, input: &CurrencyInput) -> Result<Amount>;

    /// Split inputs into those resolved against the unspent set (with
    /// their source transactions, keyed by input index) and those not
    /// found
    #[allow(clippy::type_complexity)]
    fn verify_outputs_are_not_spent(
        &self,
        vin: &[CurrencyInput],
    ) -> Result<(HashMap<usize, Transaction>, HashMap<usize, CurrencyInput>)>;

    /// Consume the block's inputs and add its outputs
    fn update_on_block_add(&self, block: &Block) -> Result<()>;

    /// Reverse of `update_on_block_add`, restoring consumed outputs
    fn update_on_block_cancel(&self, block: &Block) -> Result<()>;

    /// Rebuild derived state, returning the unspent-output count
    fn reindex(&self) -> Result<usize>;

    fn count_unspent_outputs(&self) -> Result<usize>;

    /// Walk the unspent outputs of an address; `Break` aborts early
    fn for_each_unspent_output(
        &self,
        pub_key_hash: &PubKeyHash,
        visit: &mut dyn FnMut(&OutputRef) -> ControlFlow<()>,
    ) -> Result<()>;
}
