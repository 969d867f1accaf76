//! Out-of-band responses of the signed-submission protocol
//!
//! When a write path lacks credentials, the node answers with one of two
//! machine-readable strings. The client parses them, signs the carried
//! bytes, and resubmits. The strings are part of the wire contract and
//! must match bit-for-bit.

use crate::error::{Error, Result};

/// The request must carry the author's public key
pub const SIGNAL_PUB_KEY_REQUIRED: u16 = 2;

/// The request must carry a signature over the returned sign-data
pub const SIGNAL_SIGNATURE_REQUIRED: u16 = 3;

/// Format the signal string for the given kind, returning it together
/// with the numeric code
pub fn format_special_error_message(
    error_kind: u16,
    tx_bytes: &[u8],
    data_to_sign: &[u8],
) -> Result<(String, u16)> {
    match error_kind {
        SIGNAL_PUB_KEY_REQUIRED => Ok((
            "Error(2): Public Key required".to_string(),
            SIGNAL_PUB_KEY_REQUIRED,
        )),
        SIGNAL_SIGNATURE_REQUIRED => Ok((
            format!(
                "Error(3): Signature required:{}::{}",
                hex::encode(tx_bytes),
                hex::encode(data_to_sign)
            ),
            SIGNAL_SIGNATURE_REQUIRED,
        )),
        other => Err(Error::UnknownSignalKind(other)),
    }
}
