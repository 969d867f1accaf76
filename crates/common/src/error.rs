//! Error types for the shared structures

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid hash length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Signature verification failed")]
    SignatureMismatch,

    #[error("Input {0} refers to a previous transaction that was not provided")]
    MissingPreviousTransaction(usize),

    #[error("Input {input} refers to output {vout} which does not exist")]
    MissingPreviousOutput { input: usize, vout: u32 },

    #[error("Input {0} public key does not match the referenced output")]
    InputKeyMismatch(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
