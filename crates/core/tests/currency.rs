//! Currency transfers: input selection, change emission, balances

mod common;

use common::TestContext;
use sqlchain_core::{Error, TransactionVerifier};

#[test]
fn test_transfer_emits_change_output() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "10");

    let tx = ctx.transfer(1, 2, "3");

    assert_eq!(tx.vout.len(), 2);
    assert_eq!(tx.vout[0].value, TestContext::amount("3"));
    assert_eq!(tx.vout[0].pub_key_hash, TestContext::pkh(2));
    assert_eq!(tx.vout[1].value, TestContext::amount("7"));
    assert_eq!(tx.vout[1].pub_key_hash, TestContext::pkh(1));
}

#[test]
fn test_transfer_suppresses_dust_change() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "3");

    // The whole output is spent; no change output appears
    let tx = ctx.transfer(1, 2, "3");
    assert_eq!(tx.vout.len(), 1);
    assert_eq!(tx.vout[0].pub_key_hash, TestContext::pkh(2));
}

#[test]
fn test_insufficient_funds() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "2");

    let err = ctx
        .manager
        .prepare_currency_transaction(
            &TestContext::pub_key(1),
            TestContext::pkh(2),
            TestContext::amount("5"),
        )
        .unwrap_err();
    assert_eq!(err, Error::InsufficientFunds);
}

#[test]
fn test_pending_balance_identity() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "10");
    ctx.transfer(1, 2, "3");

    // Sender: confirmed 10, pending change +7 and spent input -10
    let sender = ctx.balance(1);
    assert_eq!(sender.approved, TestContext::amount("10"));
    assert_eq!(sender.pending, TestContext::amount("-3"));
    assert_eq!(sender.total, sender.approved + sender.pending);

    // Recipient: nothing confirmed yet, 3 pending
    let recipient = ctx.balance(2);
    assert_eq!(recipient.approved, TestContext::amount("0"));
    assert_eq!(recipient.pending, TestContext::amount("3"));
    assert_eq!(recipient.total, TestContext::amount("3"));
}

#[test]
fn test_spending_pending_outputs_chains_in_pool() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "5");

    // First transfer consumes the only confirmed output
    let first = ctx.transfer(1, 2, "2");
    // The second can only be funded from the first one's change
    let second = ctx.transfer(1, 3, "3");
    assert_eq!(second.vin.len(), 1);
    assert_eq!(second.vin[0].txid, first.id);

    // Both survive deep verification: the second resolves its input
    // through the in-progress batch
    let mined = ctx.manager.transactions_for_new_block(0).unwrap();
    assert_eq!(mined.len(), 2);

    // The sender's whole balance is committed
    assert_eq!(ctx.balance(1).total, TestContext::amount("0"));
    assert_eq!(ctx.balance(3).total, TestContext::amount("3"));
}

#[test]
fn test_pool_admission_implies_quick_verify() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "10");
    let tx = ctx.transfer(1, 2, "4");

    let verifier = TransactionVerifier::new(
        ctx.manager.unspent(),
        ctx.manager.pool(),
        ctx.manager.blocks(),
    );
    verifier.verify_quick(&tx).unwrap();
}

#[test]
fn test_amounts_are_normalized() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "10");

    let tx = ctx.transfer(1, 2, "3.123456789123");
    assert_eq!(tx.vout[0].value, TestContext::amount("3.12345679"));
}
