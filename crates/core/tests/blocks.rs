//! Block-event handling: promotion, cancellation, branch switches,
//! mining selection

mod common;

use common::TestContext;
use sqlchain_common::{CurrencyOutput, Transaction};
use sqlchain_sql::QueryEngine;
use sqlchain_store::{BlockIndex, RowIndex};

fn setup_table(ctx: &TestContext) {
    ctx.manager
        .engine()
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
        .unwrap();
}

#[test]
fn test_block_add_then_remove_restores_utxo_state() {
    let mut ctx = TestContext::new();
    ctx.fund(1, "10");

    let tx = ctx.transfer(1, 2, "3");
    let mined = ctx.manager.transactions_for_new_block(0).unwrap();
    let block = ctx.next_block(mined);
    ctx.add_block(&block);

    assert_eq!(ctx.approved(1), TestContext::amount("7"));
    assert_eq!(ctx.approved(2), TestContext::amount("3"));
    assert_eq!(ctx.manager.unapproved_count().unwrap(), 0);

    ctx.remove_block(&block);

    // Confirmed state is back to the pre-block values and the
    // transaction is in the pool again, still valid
    assert_eq!(ctx.approved(1), TestContext::amount("10"));
    assert_eq!(ctx.approved(2), TestContext::amount("0"));
    assert_eq!(
        ctx.manager.get_if_unapproved_exists(&tx.id).unwrap().map(|tx| tx.id),
        Some(tx.id)
    );
}

#[test]
fn test_block_added_off_top_only_indexes() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);

    // A foreign block with a SQL transaction, stored off the top
    let mut foreign = Transaction::new_sql(
        sqlchain_common::SqlUpdate::new(
            "INSERT INTO t (id,v) VALUES ('5','q')".into(),
            "t.5".into(),
            "DELETE FROM t WHERE id='5'".into(),
        ),
        Vec::new(),
        Vec::new(),
    );
    foreign.by_pub_key = TestContext::pub_key(7);
    foreign.id = foreign.hash().unwrap();
    let block = ctx.next_block(vec![foreign.clone()]);

    ctx.manager.block_added(&block, false).unwrap();

    // Indexed, but no SQL ran and no state moved
    assert_eq!(ctx.row("t", "5"), None);
    assert_eq!(
        ctx.manager
            .blocks()
            .transaction_blocks(&foreign.id)
            .unwrap(),
        vec![block.hash]
    );
    assert_eq!(ctx.manager.rows().tx_for_ref_id("t.5").unwrap(), None);
}

#[test]
fn test_block_add_executes_sql_not_seen_in_pool() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);

    // A block arrives from a peer carrying SQL this node never pooled
    let insert = ctx.submit_sql(1, "INSERT INTO t (v) VALUES ('x')");
    ctx.manager.cancel_transaction(&insert.id).unwrap();
    assert_eq!(ctx.row("t", "1"), None);

    let block = ctx.next_block(vec![insert.clone()]);
    ctx.add_block(&block);

    // The canonical SQL ran during block promotion
    assert_eq!(ctx.row("t", "1").unwrap()["v"], "x");
    assert_eq!(
        ctx.manager.rows().tx_for_ref_id("t.1").unwrap(),
        Some(insert.id)
    );
}

#[test]
fn test_branch_switch_rolls_back_sql_and_lineage() {
    let mut ctx = TestContext::new();

    let create = ctx.submit_sql(
        1,
        "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)",
    );
    let first = ctx.mine_pending();

    let insert = ctx.submit_sql(1, "INSERT INTO t (v) VALUES ('x')");
    let second = ctx.mine_pending();
    assert_eq!(ctx.row("t", "1").unwrap()["v"], "x");
    assert_eq!(
        ctx.manager.rows().tx_for_ref_id("t.1").unwrap(),
        Some(insert.id)
    );

    // The branch carrying the insert loses; its rollback runs and the
    // lineage head disappears
    ctx.switch_away(&second);
    assert_eq!(ctx.row("t", "1"), None);
    assert_eq!(ctx.manager.rows().tx_for_ref_id("t.1").unwrap(), None);
    assert_eq!(
        ctx.manager.rows().tx_for_ref_id("t").unwrap(),
        Some(create.id)
    );

    // Unwinding further drops the table itself
    ctx.switch_away(&first);
    assert!(ctx
        .manager
        .engine()
        .explain("INSERT INTO t (id,v) VALUES ('1','x')")
        .is_err());
    assert_eq!(ctx.manager.rows().tx_for_ref_id("t").unwrap(), None);
}

#[test]
fn test_branch_switch_round_trip_restores_state() {
    let mut ctx = TestContext::new();

    ctx.submit_sql(
        1,
        "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)",
    );
    ctx.mine_pending();
    let insert = ctx.submit_sql(1, "INSERT INTO t (v) VALUES ('x')");
    let second = ctx.mine_pending();

    // Switch away and back again
    ctx.switch_away(&second);
    assert_eq!(ctx.row("t", "1"), None);

    ctx.manager.block_added_to_primary_chain(&second).unwrap();
    ctx.manager.blocks().set_top(Some(second.hash));

    assert_eq!(ctx.row("t", "1").unwrap()["v"], "x");
    assert_eq!(
        ctx.manager.rows().tx_for_ref_id("t.1").unwrap(),
        Some(insert.id)
    );
    assert_eq!(ctx.approved(99), TestContext::amount("20"));
}

#[test]
fn test_branch_switch_rollback_is_lifo() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);

    // Two mutations of the same row inside one block: execution order
    // is slice order, rollback must run in exact reverse
    let insert = ctx.submit_sql(1, "INSERT INTO t (v) VALUES ('x')");
    let update = ctx.submit_sql(1, "UPDATE t SET v='y' WHERE id='1'");
    let block = ctx.next_block(vec![insert.clone(), update.clone()]);
    ctx.add_block(&block);
    assert_eq!(ctx.row("t", "1").unwrap()["v"], "y");

    ctx.switch_away(&block);
    assert_eq!(ctx.row("t", "1"), None);
}

#[test]
fn test_mining_selection_prunes_double_spends() {
    let mut ctx = TestContext::new();
    let coinbase = ctx.fund(1, "10");

    let honest = ctx.transfer(1, 2, "3");

    // A conflicting spend of the same output, signed correctly, slips
    // into the pool while the output is still unspent on the chain
    let mut double_spend = Transaction::new_currency(
        vec![sqlchain_common::CurrencyInput {
            txid: coinbase.id,
            vout: 0,
            signature: Vec::new(),
            pub_key: TestContext::pub_key(1),
        }],
        vec![CurrencyOutput::new(
            TestContext::amount("10"),
            TestContext::pkh(3),
        )],
    );
    let prev_txs = std::collections::HashMap::from([(0usize, coinbase)]);
    let data = double_spend
        .prepare_sign_data(&TestContext::pub_key(1), &prev_txs)
        .unwrap();
    double_spend
        .complete(sqlchain_common::keys::sign(&TestContext::signer(1), &data))
        .unwrap();
    ctx.manager
        .received_new_transaction(&double_spend, true)
        .unwrap();
    assert_eq!(ctx.manager.unapproved_count().unwrap(), 2);

    // Selection keeps the earlier arrival and cancels the conflict
    let mined = ctx.manager.transactions_for_new_block(0).unwrap();
    assert_eq!(mined.len(), 1);
    assert_eq!(mined[0].id, honest.id);
    assert_eq!(
        ctx.manager
            .get_if_unapproved_exists(&double_spend.id)
            .unwrap(),
        None
    );
}

#[test]
fn test_deep_verify_rejects_spent_input() {
    let mut ctx = TestContext::new();
    let coinbase = ctx.fund(1, "10");

    // Confirm a spend of the coinbase output
    ctx.transfer(1, 2, "3");
    let mined = ctx.manager.transactions_for_new_block(0).unwrap();
    let block = ctx.next_block(mined);
    ctx.add_block(&block);

    // A second spend of the same output now fails deep verification
    let mut late = Transaction::new_currency(
        vec![sqlchain_common::CurrencyInput {
            txid: coinbase.id,
            vout: 0,
            signature: Vec::new(),
            pub_key: TestContext::pub_key(1),
        }],
        vec![CurrencyOutput::new(
            TestContext::amount("10"),
            TestContext::pkh(3),
        )],
    );
    let prev_txs = std::collections::HashMap::from([(0usize, coinbase)]);
    let data = late
        .prepare_sign_data(&TestContext::pub_key(1), &prev_txs)
        .unwrap();
    late.complete(sqlchain_common::keys::sign(&TestContext::signer(1), &data))
        .unwrap();

    let err = ctx.manager.verify_transaction(&late, &[], None).unwrap_err();
    assert_eq!(err, sqlchain_core::Error::InputAlreadySpent);
}

#[test]
fn test_transactions_from_canceled_blocks_reexecute() {
    let mut ctx = TestContext::new();
    setup_table(&ctx);

    let insert = ctx.submit_sql(1, "INSERT INTO t (v) VALUES ('x')");
    let block = ctx.next_block(vec![insert.clone()]);
    ctx.add_block(&block);

    // The losing branch rolled the SQL back; re-receiving the
    // transactions replays it and re-admits them
    ctx.switch_away(&block);
    assert_eq!(ctx.row("t", "1"), None);

    ctx.manager
        .transactions_from_canceled_blocks(&[insert.clone()])
        .unwrap();
    assert_eq!(ctx.row("t", "1").unwrap()["v"], "x");
    assert_eq!(
        ctx.manager.get_if_unapproved_exists(&insert.id).unwrap().map(|tx| tx.id),
        Some(insert.id)
    );
}
