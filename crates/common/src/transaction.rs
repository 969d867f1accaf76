//! Transaction structure
//!
//! A transaction carries a currency part (inputs and outputs), a SQL
//! part, or both. The serialized JSON form is the canonical byte
//! representation: it is what gets hashed into the id, what the signing
//! protocol ships to the client, and what the sign-data digest is
//! computed over.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::amount::{normalize_amount, Amount};
use crate::error::{Error, Result};
use crate::hashes::PubKeyHash;
use crate::keys;
use crate::tx_id::TxId;

/// Reference to a previous output being spent, with the spender's proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInput {
    /// Transaction the consumed output belongs to
    pub txid: TxId,
    /// Index of the consumed output in that transaction
    pub vout: u32,
    /// Signature over the spending transaction's sign-data
    pub signature: Vec<u8>,
    /// Raw public key whose hash must match the consumed output
    pub pub_key: Vec<u8>,
}

/// Value locked to a recipient's public-key hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyOutput {
    pub value: Amount,
    pub pub_key_hash: PubKeyHash,
}

impl CurrencyOutput {
    pub fn new(value: Amount, to: PubKeyHash) -> Self {
        Self {
            value: normalize_amount(value),
            pub_key_hash: to,
        }
    }

    pub fn is_locked_with(&self, pub_key_hash: &PubKeyHash) -> bool {
        self.pub_key_hash == *pub_key_hash
    }
}

/// Statement kind sniffed from a canonical query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlUpdateKind {
    Insert,
    Update,
    Delete,
    CreateTable,
    DropTable,
    Other,
}

/// The SQL part of a transaction: the chain-persisted mutation record
///
/// `prev_tx_id` links to the last transaction that mutated the same
/// `reference_id`; `None` is the row-creation sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUpdate {
    /// Canonical query text, the executed and signed form
    pub query: String,
    /// `<table>.<primary_key_value>` for DML, `<table>` for DDL
    pub reference_id: String,
    /// Statement restoring the pre-image when applied to the post-image
    pub rollback_query: String,
    /// Base transaction of the per-row mutation chain
    pub prev_tx_id: Option<TxId>,
}

impl SqlUpdate {
    pub fn new(query: String, reference_id: String, rollback_query: String) -> Self {
        Self {
            query,
            reference_id,
            rollback_query,
            prev_tx_id: None,
        }
    }

    /// Classify by the canonical query's leading keyword
    pub fn kind(&self) -> SqlUpdateKind {
        let first = self
            .query
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        match first.as_str() {
            "INSERT" => SqlUpdateKind::Insert,
            "UPDATE" => SqlUpdateKind::Update,
            "DELETE" => SqlUpdateKind::Delete,
            "CREATE" => SqlUpdateKind::CreateTable,
            "DROP" => SqlUpdateKind::DropTable,
            _ => SqlUpdateKind::Other,
        }
    }

    /// Table component of the reference id
    pub fn table(&self) -> &str {
        match self.reference_id.split_once('.') {
            Some((table, _)) => table,
            None => &self.reference_id,
        }
    }

    /// Whether lineage resolution must find a base transaction
    ///
    /// UPDATE and DELETE mutate an existing row, so its history must be
    /// locatable. INSERT and DDL may start a fresh chain.
    pub fn requires_base_transaction(&self) -> bool {
        matches!(self.kind(), SqlUpdateKind::Update | SqlUpdateKind::Delete)
    }

    /// Table-level reference id used when a row has no history of its
    /// own (INSERT right after CREATE TABLE, DROP of a chain-created
    /// table)
    pub fn alternative_ref_id(&self) -> Option<String> {
        match self.kind() {
            SqlUpdateKind::Insert | SqlUpdateKind::DropTable => Some(self.table().to_string()),
            _ => None,
        }
    }
}

/// A transaction in the hybrid ledger
///
/// Immutable once completed: `complete` attaches the signature and
/// freezes the id as the hash of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub vin: Vec<CurrencyInput>,
    pub vout: Vec<CurrencyOutput>,
    pub sql: Option<SqlUpdate>,
    /// Author's public key; for a coinbase this holds the uniqueness data
    pub by_pub_key: Vec<u8>,
    /// Author's signature, authenticating SQL-only transactions
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn new_currency(vin: Vec<CurrencyInput>, vout: Vec<CurrencyOutput>) -> Self {
        Self {
            id: TxId::ZERO,
            vin,
            vout,
            sql: None,
            by_pub_key: Vec::new(),
            signature: Vec::new(),
        }
    }

    pub fn new_sql(sql: SqlUpdate, vin: Vec<CurrencyInput>, vout: Vec<CurrencyOutput>) -> Self {
        Self {
            id: TxId::ZERO,
            vin,
            vout,
            sql: Some(sql),
            by_pub_key: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Build a coinbase emission. `data` makes the hash unique per block.
    pub fn coinbase(to: PubKeyHash, value: Amount, data: &str) -> Result<Self> {
        let mut tx = Self {
            id: TxId::ZERO,
            vin: Vec::new(),
            vout: vec![CurrencyOutput::new(value, to)],
            sql: None,
            by_pub_key: data.as_bytes().to_vec(),
            signature: Vec::new(),
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.is_empty() && self.sql.is_none()
    }

    pub fn is_sql(&self) -> bool {
        self.sql.is_some()
    }

    pub fn sql_query(&self) -> Option<&str> {
        self.sql.as_ref().map(|s| s.query.as_str())
    }

    pub fn set_sql_part(&mut self, sql: SqlUpdate) {
        self.sql = Some(sql);
    }

    pub fn set_sql_previous_tx(&mut self, prev: Option<TxId>) {
        if let Some(sql) = self.sql.as_mut() {
            sql.prev_tx_id = prev;
        }
    }

    /// Canonical byte form, the tx-bytes of the signing protocol
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Hash of the serialized form with the id zeroed
    pub fn hash(&self) -> Result<TxId> {
        let mut copy = self.clone();
        copy.id = TxId::ZERO;
        Ok(TxId::from_data(&copy.serialize()?))
    }

    /// Record the author and produce the digest the client must sign
    ///
    /// `prev_txs` maps each input index to the transaction holding the
    /// consumed output; the pre-image replaces input public keys with
    /// the consumed output's pub-key hash so the signature commits to
    /// what is being spent.
    pub fn prepare_sign_data(
        &mut self,
        pub_key: &[u8],
        prev_txs: &HashMap<usize, Transaction>,
    ) -> Result<Vec<u8>> {
        self.by_pub_key = pub_key.to_vec();
        self.sign_data(prev_txs)
    }

    fn sign_data(&self, prev_txs: &HashMap<usize, Transaction>) -> Result<Vec<u8>> {
        let mut copy = self.clone();
        copy.id = TxId::ZERO;
        copy.signature = Vec::new();
        for (ind, vin) in copy.vin.iter_mut().enumerate() {
            let prev = prev_txs
                .get(&ind)
                .ok_or(Error::MissingPreviousTransaction(ind))?;
            let out = prev
                .vout
                .get(vin.vout as usize)
                .ok_or(Error::MissingPreviousOutput {
                    input: ind,
                    vout: vin.vout,
                })?;
            vin.signature = Vec::new();
            vin.pub_key = out.pub_key_hash.as_bytes().to_vec();
        }
        let bytes = copy.serialize()?;
        Ok(TxId::from_data(&bytes).as_bytes().to_vec())
    }

    /// Attach the signature to every input and freeze the id
    pub fn complete(&mut self, signature: Vec<u8>) -> Result<()> {
        for vin in &mut self.vin {
            vin.signature = signature.clone();
        }
        self.signature = signature;
        self.id = self.hash()?;
        Ok(())
    }

    /// Check every signature against the consumed outputs
    ///
    /// Inputs carry their own signatures; a SQL-only transaction is
    /// authenticated by the transaction-level signature of its author.
    /// Coinbase verifies vacuously.
    pub fn verify(&self, prev_txs: &HashMap<usize, Transaction>) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        let sign_data = self.sign_data(prev_txs)?;
        if self.vin.is_empty() {
            return keys::verify(&self.by_pub_key, &sign_data, &self.signature);
        }
        for (ind, vin) in self.vin.iter().enumerate() {
            let prev = prev_txs
                .get(&ind)
                .ok_or(Error::MissingPreviousTransaction(ind))?;
            let out = prev
                .vout
                .get(vin.vout as usize)
                .ok_or(Error::MissingPreviousOutput {
                    input: ind,
                    vout: vin.vout,
                })?;
            if keys::hash_pub_key(&vin.pub_key) != out.pub_key_hash {
                return Err(Error::InputKeyMismatch(ind));
            }
            keys::verify(&vin.pub_key, &sign_data, &vin.signature)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use std::str::FromStr;

    fn signer(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn pkh(seed: u8) -> PubKeyHash {
        keys::hash_pub_key(signer(seed).verifying_key().as_bytes())
    }

    #[test]
    fn test_serialize_roundtrip_preserves_id() {
        let coinbase = Transaction::coinbase(pkh(1), Amount::from_str("10").unwrap(), "b0").unwrap();
        let bytes = coinbase.serialize().unwrap();
        let back = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(coinbase, back);
        assert_eq!(coinbase.id, back.hash().unwrap());
    }

    #[test]
    fn test_currency_sign_and_verify() {
        let key = signer(1);
        let pub_key = key.verifying_key().as_bytes().to_vec();
        let coinbase = Transaction::coinbase(pkh(1), Amount::from_str("10").unwrap(), "b0").unwrap();

        let mut tx = Transaction::new_currency(
            vec![CurrencyInput {
                txid: coinbase.id,
                vout: 0,
                signature: Vec::new(),
                pub_key: pub_key.clone(),
            }],
            vec![CurrencyOutput::new(Amount::from_str("10").unwrap(), pkh(2))],
        );
        let prev_txs = HashMap::from([(0usize, coinbase)]);
        let sign_data = tx.prepare_sign_data(&pub_key, &prev_txs).unwrap();
        tx.complete(keys::sign(&key, &sign_data)).unwrap();

        tx.verify(&prev_txs).unwrap();
        assert!(!tx.id.is_zero());
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let key = signer(1);
        let wrong = signer(2);
        let pub_key = key.verifying_key().as_bytes().to_vec();
        let coinbase = Transaction::coinbase(pkh(1), Amount::from_str("5").unwrap(), "b0").unwrap();

        let mut tx = Transaction::new_currency(
            vec![CurrencyInput {
                txid: coinbase.id,
                vout: 0,
                signature: Vec::new(),
                pub_key: pub_key.clone(),
            }],
            vec![CurrencyOutput::new(Amount::from_str("5").unwrap(), pkh(2))],
        );
        let prev_txs = HashMap::from([(0usize, coinbase)]);
        let sign_data = tx.prepare_sign_data(&pub_key, &prev_txs).unwrap();
        tx.complete(keys::sign(&wrong, &sign_data)).unwrap();

        assert!(tx.verify(&prev_txs).is_err());
    }

    #[test]
    fn test_sql_only_transaction_verifies_author() {
        let key = signer(3);
        let pub_key = key.verifying_key().as_bytes().to_vec();
        let update = SqlUpdate::new(
            "INSERT INTO t (id,v) VALUES ('1','x')".into(),
            "t.1".into(),
            "DELETE FROM t WHERE id='1'".into(),
        );
        let mut tx = Transaction::new_sql(update, Vec::new(), Vec::new());
        let prev_txs = HashMap::new();
        let sign_data = tx.prepare_sign_data(&pub_key, &prev_txs).unwrap();
        tx.complete(keys::sign(&key, &sign_data)).unwrap();

        tx.verify(&prev_txs).unwrap();
        assert!(tx.is_sql());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_sql_update_kind_and_refs() {
        let update = SqlUpdate::new(
            "UPDATE t SET v='y' WHERE id='1'".into(),
            "t.1".into(),
            "UPDATE t SET v='x' WHERE id='1'".into(),
        );
        assert_eq!(update.kind(), SqlUpdateKind::Update);
        assert_eq!(update.table(), "t");
        assert!(update.requires_base_transaction());
        assert_eq!(update.alternative_ref_id(), None);

        let insert = SqlUpdate::new(
            "INSERT INTO t (id,v) VALUES ('1','x')".into(),
            "t.1".into(),
            "DELETE FROM t WHERE id='1'".into(),
        );
        assert!(!insert.requires_base_transaction());
        assert_eq!(insert.alternative_ref_id(), Some("t".into()));
    }

    #[test]
    fn test_unrecognized_wire_update_kind_is_other() {
        // A peer can put any text on the wire; classification must not
        // mistake it for a known mutation
        let foreign = SqlUpdate::new("EXPLAIN SELECT 1".into(), String::new(), String::new());
        assert_eq!(foreign.kind(), SqlUpdateKind::Other);
        assert!(!foreign.requires_base_transaction());
        assert_eq!(foreign.alternative_ref_id(), None);
    }
}
