//! The signed-submission protocol: Error(2)/Error(3) signals and the
//! resubmission round-trip

mod common;

use common::TestContext;
use sqlchain_common::keys;
use sqlchain_core::Error;
use sqlchain_sql::QueryEngine;

fn setup_table(ctx: &TestContext) {
    ctx.manager
        .engine()
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
        .unwrap();
}

#[test]
fn test_submission_without_pub_key_signals_error_2() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);

    let err = ctx
        .manager
        .new_sql_transaction("INSERT INTO t (v) VALUES ('x')", TestContext::amount("0"), None)
        .unwrap_err();
    assert_eq!(err, Error::PubKeyRequired);

    let (message, code) = err.signal().unwrap();
    assert_eq!(message, "Error(2): Public Key required");
    assert_eq!(code, 2);

    // A signal is not an execution: the database is untouched
    assert_eq!(ctx.row("t", "1"), None);
}

#[test]
fn test_submission_round_trip_with_signature() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);
    let key = TestContext::signer(1);
    let pub_key_hex = hex::encode(TestContext::pub_key(1));

    // First pass: public key only; the node builds the transaction and
    // asks for a signature over the exact returned bytes
    let raw = format!("/*PUBKEY:{};*/ INSERT INTO t (v) VALUES ('x')", pub_key_hex);
    let err = ctx
        .manager
        .new_sql_transaction(&raw, TestContext::amount("0"), None)
        .unwrap_err();
    let Error::SignatureRequired {
        tx_bytes,
        data_to_sign,
    } = &err
    else {
        panic!("expected SignatureRequired, got {err:?}");
    };

    let (message, code) = err.signal().unwrap();
    assert_eq!(
        message,
        format!(
            "Error(3): Signature required:{}::{}",
            hex::encode(tx_bytes),
            hex::encode(data_to_sign)
        )
    );
    assert_eq!(code, 3);
    assert_eq!(ctx.row("t", "1"), None);

    // Second pass: the client signs and resubmits everything in the
    // comment block
    let signature = keys::sign(&key, data_to_sign);
    let raw = format!(
        "/*PUBKEY:{};*/ /*SIGNATURE:{};*/ /*TXDATA:{};*/ INSERT INTO t (v) VALUES ('x')",
        pub_key_hex,
        hex::encode(&signature),
        hex::encode(tx_bytes)
    );
    let tx = ctx
        .manager
        .new_sql_transaction(&raw, TestContext::amount("0"), None)
        .unwrap();

    assert_eq!(ctx.row("t", "1").unwrap()["v"], "x");
    assert_eq!(ctx.manager.unapproved_count().unwrap(), 1);
    assert_eq!(
        tx.sql.as_ref().unwrap().query,
        "INSERT INTO t (id,v) VALUES ('1','x')"
    );
}

#[test]
fn test_real_failures_carry_no_signal() {
    assert_eq!(Error::NotInPool.signal(), None);
    assert_eq!(Error::InsufficientFunds.signal(), None);
}
