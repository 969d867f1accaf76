//! Error types for the transaction core

use sqlchain_common::TxId;
use sqlchain_sql::{
    format_special_error_message, SIGNAL_PUB_KEY_REQUIRED, SIGNAL_SIGNATURE_REQUIRED,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Transaction verification failed: {0}")]
    VerificationFailed(String),

    #[error("Transaction ID not found in the list of unapproved transactions")]
    NotInPool,

    #[error("Not enough funds to make new transaction")]
    InsufficientFunds,

    #[error("Transaction input was already spent before")]
    InputAlreadySpent,

    #[error("Base transaction can not be found for {0}")]
    BaseTransactionNotFound(String),

    #[error("Transaction {txid} has dependent pool transactions")]
    HasDependents { txid: TxId },

    #[error("All transactions are invalid, waiting for new ones")]
    EmptyBlockCandidate,

    #[error("Amount must be a positive value")]
    NonPositiveAmount,

    #[error("Recipient address is not provided")]
    RecipientRequired,

    /// Control signal of the signed-submission protocol, not a failure
    #[error("Public Key required")]
    PubKeyRequired,

    /// Control signal carrying the exact bytes the client must sign
    #[error("Signature required")]
    SignatureRequired {
        tx_bytes: Vec<u8>,
        data_to_sign: Vec<u8>,
    },

    #[error(transparent)]
    Common(#[from] sqlchain_common::Error),

    #[error(transparent)]
    Sql(#[from] sqlchain_sql::Error),

    #[error(transparent)]
    Store(#[from] sqlchain_store::Error),
}

impl Error {
    /// Wire string and code of the signal variants, `None` for real
    /// failures
    pub fn signal(&self) -> Option<(String, u16)> {
        match self {
            Error::PubKeyRequired => {
                format_special_error_message(SIGNAL_PUB_KEY_REQUIRED, &[], &[]).ok()
            }
            Error::SignatureRequired {
                tx_bytes,
                data_to_sign,
            } => format_special_error_message(SIGNAL_SIGNATURE_REQUIRED, tx_bytes, data_to_sign)
                .ok(),
            _ => None,
        }
    }
}
