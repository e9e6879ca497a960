mod common;

use cryptovest_backend::error::LedgerError;
use cryptovest_backend::models::actor::Actor;
use cryptovest_backend::models::asset::Asset;
use cryptovest_backend::models::balance::{AdjustBalanceRequest, AdjustmentDirection};
use cryptovest_backend::models::transaction::{
    NewTransaction, SubmitTransactionRequest, TransactionKind, TransactionStatus,
};
use cryptovest_backend::services::adjustment::ADJUSTMENT_PROOF_REF;
use cryptovest_backend::services::{ledger, notifier};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::ConnectionTrait;

use crate::common::{ETH_PRICE, TestContext, create_app_state_with_inbox, create_test_context};

fn admin() -> Actor {
    Actor::admin("admin-1")
}

fn deposit_request(asset: &str, usd: Decimal) -> SubmitTransactionRequest {
    SubmitTransactionRequest {
        kind: TransactionKind::Deposit,
        asset: asset.to_string(),
        usd_amount: usd,
        crypto_amount: None,
        price: None,
        payment_proof_ref: Some("proofs/receipt.png".to_string()),
        wallet_address: None,
    }
}

fn withdrawal(user_id: &str, asset: Asset, amount: Decimal, usd: Decimal) -> NewTransaction {
    NewTransaction {
        user_id: user_id.to_string(),
        kind: TransactionKind::Withdrawal,
        asset,
        crypto_amount: amount,
        usd_value: usd,
        payment_proof_ref: Some("0x1111111111111111111111111111111111111111".to_string()),
    }
}

/// Record and approve a deposit bought at `price`, independent of today's oracle price
async fn approved_deposit(ctx: &TestContext, user_id: &str, asset: Asset, usd: Decimal, price: Decimal) {
    let tx = ctx
        .state
        .transactions
        .create(NewTransaction {
            user_id: user_id.to_string(),
            kind: TransactionKind::Deposit,
            asset,
            crypto_amount: usd / price,
            usd_value: usd,
            payment_proof_ref: Some("proofs/receipt.png".to_string()),
        })
        .await
        .unwrap();
    ctx.state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deposit_approval_creates_balance() {
    let ctx = create_test_context().await;

    let tx = ctx
        .state
        .transactions
        .submit("user-1", deposit_request("BTC", dec!(1000)))
        .await
        .unwrap();
    assert_eq!(tx.crypto_amount, dec!(0.02));
    assert!(ledger::get(&ctx.db, "user-1", Asset::Btc).await.unwrap().is_none());

    let approved = ctx
        .state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap();
    assert_eq!(approved.status, TransactionStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("admin-1"));
    assert!(approved.approved_at.is_some());

    let balance = ledger::get(&ctx.db, "user-1", Asset::Btc).await.unwrap().unwrap();
    assert_eq!(balance.amount, dec!(0.02));
    assert_eq!(balance.average_buy_price, dec!(50000));

    let stored = ctx.state.transactions.find(&tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Approved);

    let sent = ctx.notifications.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, "user-1");
    assert!(sent[0].message.contains("BTC"));
    assert!(sent[0].message.contains("approved"));
}

#[tokio::test]
async fn test_deposits_blend_average_price() {
    let ctx = create_test_context().await;

    // 2 ETH at $100, then 3 ETH at $150
    approved_deposit(&ctx, "user-1", Asset::Eth, dec!(200), dec!(100)).await;
    approved_deposit(&ctx, "user-1", Asset::Eth, dec!(450), dec!(150)).await;

    let balance = ledger::get(&ctx.db, "user-1", Asset::Eth).await.unwrap().unwrap();
    assert_eq!(balance.amount, dec!(5));
    assert_eq!(balance.average_buy_price, dec!(130));
}

#[tokio::test]
async fn test_withdrawal_approval_keeps_cost_basis() {
    let ctx = create_test_context().await;
    approved_deposit(&ctx, "user-1", Asset::Eth, dec!(3000), dec!(3000)).await;

    let tx = ctx
        .state
        .transactions
        .create(withdrawal("user-1", Asset::Eth, dec!(0.25), dec!(750)))
        .await
        .unwrap();
    ctx.state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap();

    let balance = ledger::get(&ctx.db, "user-1", Asset::Eth).await.unwrap().unwrap();
    assert_eq!(balance.amount, dec!(0.75));
    assert_eq!(balance.average_buy_price, dec!(3000));
}

#[tokio::test]
async fn test_insufficient_withdrawal_stays_pending() {
    let ctx = create_test_context().await;
    approved_deposit(&ctx, "user-1", Asset::Eth, dec!(3000), dec!(3000)).await;

    // Both pass the submission pre-check against 1 ETH
    let first = ctx
        .state
        .transactions
        .create(withdrawal("user-1", Asset::Eth, dec!(0.8), dec!(2400)))
        .await
        .unwrap();
    let second = ctx
        .state
        .transactions
        .create(withdrawal("user-1", Asset::Eth, dec!(0.8), dec!(2400)))
        .await
        .unwrap();

    ctx.state
        .transactions
        .transition(&admin(), &first.id, TransactionStatus::Approved, None)
        .await
        .unwrap();

    let err = ctx
        .state
        .transactions
        .transition(&admin(), &second.id, TransactionStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientBalance { asset: Asset::Eth, .. }
    ));

    let stored = ctx.state.transactions.find(&second.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert!(stored.approved_by.is_none());

    let balance = ledger::get(&ctx.db, "user-1", Asset::Eth).await.unwrap().unwrap();
    assert_eq!(balance.amount, dec!(0.2));

    // deposit approval + first withdrawal only
    assert_eq!(ctx.notifications.sent().await.len(), 2);
}

#[tokio::test]
async fn test_withdrawal_after_balance_drained_fails() {
    let ctx = create_test_context().await;
    ledger_seed(&ctx, "user-1", dec!(1)).await;

    let tx = ctx
        .state
        .transactions
        .create(withdrawal("user-1", Asset::Eth, dec!(1), dec!(3000)))
        .await
        .unwrap();

    // Drain the balance behind the pending request
    let drain = ctx
        .state
        .transactions
        .create(withdrawal("user-1", Asset::Eth, dec!(1), dec!(3000)))
        .await
        .unwrap();
    ctx.state
        .transactions
        .transition(&admin(), &drain.id, TransactionStatus::Approved, None)
        .await
        .unwrap();

    let err = ctx
        .state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    let balance = ledger::get(&ctx.db, "user-1", Asset::Eth).await.unwrap().unwrap();
    assert!(balance.amount.is_zero());
}

/// Credit `amount` ETH through an admin adjustment at the test oracle price
async fn ledger_seed(ctx: &TestContext, user_id: &str, amount: Decimal) {
    let response = ctx
        .state
        .adjustments
        .adjust(
            &admin(),
            AdjustBalanceRequest {
                user_id: user_id.to_string(),
                asset: "ETH".to_string(),
                direction: AdjustmentDirection::Add,
                usd_amount: amount * ETH_PRICE,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(response.balance.amount, amount);
}

#[tokio::test]
async fn test_rejection_records_notes_without_ledger_change() {
    let ctx = create_test_context().await;

    let tx = ctx
        .state
        .transactions
        .submit("user-1", deposit_request("BTC", dec!(1000)))
        .await
        .unwrap();

    let rejected = ctx
        .state
        .transactions
        .transition(
            &admin(),
            &tx.id,
            TransactionStatus::Rejected,
            Some("invalid proof".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, TransactionStatus::Rejected);

    let stored = ctx.state.transactions.find(&tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Rejected);
    assert_eq!(stored.admin_notes.as_deref(), Some("invalid proof"));

    assert!(ledger::get(&ctx.db, "user-1", Asset::Btc).await.unwrap().is_none());

    let sent = ctx.notifications.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].message.contains("rejected"));
    assert!(sent[0].message.contains("invalid proof"));
}

#[tokio::test]
async fn test_terminal_status_is_final() {
    let ctx = create_test_context().await;

    let tx = ctx
        .state
        .transactions
        .submit("user-1", deposit_request("BTC", dec!(1000)))
        .await
        .unwrap();
    ctx.state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap();

    for target in [TransactionStatus::Approved, TransactionStatus::Rejected] {
        let err = ctx
            .state
            .transactions
            .transition(&admin(), &tx.id, target, Some("again".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyTerminal {
                status: TransactionStatus::Approved,
                ..
            }
        ));
    }

    let balance = ledger::get(&ctx.db, "user-1", Asset::Btc).await.unwrap().unwrap();
    assert_eq!(balance.amount, dec!(0.02));
    let stored = ctx.state.transactions.find(&tx.id).await.unwrap();
    assert!(stored.admin_notes.is_none());
    assert_eq!(ctx.notifications.sent().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let ctx = create_test_context().await;
    let err = ctx
        .state
        .transactions
        .transition(&admin(), "missing", TransactionStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_ledger_write_leaves_transaction_pending() {
    let ctx = create_test_context().await;

    let tx = ctx
        .state
        .transactions
        .submit("user-1", deposit_request("BTC", dec!(1000)))
        .await
        .unwrap();

    ctx.db
        .execute_unprepared("DROP TABLE balances")
        .await
        .unwrap();

    let err = ctx
        .state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ApprovalFailed(_)));
    assert!(err.is_retryable());

    let stored = ctx.state.transactions.find(&tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert!(stored.approved_by.is_none());
    assert!(stored.approved_at.is_none());
    assert!(ctx.notifications.sent().await.is_empty());
}

#[tokio::test]
async fn test_admin_adjustment_records_audit_transaction() {
    let ctx = create_test_context().await;

    let response = ctx
        .state
        .adjustments
        .adjust(
            &admin(),
            AdjustBalanceRequest {
                user_id: "user-1".to_string(),
                asset: "btc".to_string(),
                direction: AdjustmentDirection::Add,
                usd_amount: dec!(1000),
                notes: Some("welcome bonus".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.price, dec!(50000));
    assert_eq!(response.balance.amount, dec!(0.02));
    assert_eq!(response.balance.average_buy_price, dec!(50000));
    assert_eq!(response.transaction.status, TransactionStatus::Approved);
    assert_eq!(response.transaction.kind, TransactionKind::Deposit);
    assert_eq!(response.transaction.payment_proof_ref, ADJUSTMENT_PROOF_REF);
    assert_eq!(response.transaction.approved_by.as_deref(), Some("admin-1"));

    let history = ctx.state.transactions.list_for_user("user-1").await.unwrap();
    assert_eq!(history.len(), 1);

    let sent = ctx.notifications.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].message.contains("welcome bonus"));
}

#[tokio::test]
async fn test_adjustment_subtract_respects_floor() {
    let ctx = create_test_context().await;
    approved_deposit(&ctx, "user-1", Asset::Eth, dec!(3000), dec!(3000)).await;

    let request = |usd: Decimal| AdjustBalanceRequest {
        user_id: "user-1".to_string(),
        asset: "ETH".to_string(),
        direction: AdjustmentDirection::Subtract,
        usd_amount: usd,
        notes: None,
    };

    let err = ctx
        .state
        .adjustments
        .adjust(&admin(), request(dec!(4500)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(ctx.state.transactions.list_for_user("user-1").await.unwrap().len(), 1);

    let response = ctx
        .state
        .adjustments
        .adjust(&admin(), request(dec!(1500)))
        .await
        .unwrap();
    assert_eq!(response.balance.amount, dec!(0.5));
    assert_eq!(response.balance.average_buy_price, dec!(3000));
    assert_eq!(response.transaction.kind, TransactionKind::Withdrawal);
}

#[tokio::test]
async fn test_adjustment_requires_admin() {
    let ctx = create_test_context().await;
    let err = ctx
        .state
        .adjustments
        .adjust(
            &Actor::user("user-1"),
            AdjustBalanceRequest {
                user_id: "user-1".to_string(),
                asset: "BTC".to_string(),
                direction: AdjustmentDirection::Add,
                usd_amount: dec!(1000000),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    assert!(ledger::get(&ctx.db, "user-1", Asset::Btc).await.unwrap().is_none());
}

#[tokio::test]
async fn test_adjustment_refuses_fallback_price() {
    let ctx = create_test_context().await;

    // The test feed has no SOL price, so only the static fallback is available
    let err = ctx
        .state
        .adjustments
        .adjust(
            &admin(),
            AdjustBalanceRequest {
                user_id: "user-1".to_string(),
                asset: "SOL".to_string(),
                direction: AdjustmentDirection::Add,
                usd_amount: dec!(1500),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ValidationFailed(ref msg) if msg.contains("Live SOL price")));

    assert!(ledger::get(&ctx.db, "user-1", Asset::Sol).await.unwrap().is_none());
    assert!(ctx.state.transactions.list_for_user("user-1").await.unwrap().is_empty());
    assert!(ctx.notifications.sent().await.is_empty());
}

#[tokio::test]
async fn test_approval_lands_in_inbox() {
    let state = create_app_state_with_inbox().await;

    let tx = state
        .transactions
        .submit("user-1", deposit_request("BTC", dec!(1000)))
        .await
        .unwrap();
    state
        .transactions
        .transition(&admin(), &tx.id, TransactionStatus::Approved, None)
        .await
        .unwrap();

    let inbox = notifier::list_for_user(&state.db, "user-1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(!inbox[0].is_read);
    assert_eq!(inbox[0].title, "Deposit Approved");

    assert!(!notifier::mark_read(&state.db, "user-2", inbox[0].id).await.unwrap());
    assert!(notifier::mark_read(&state.db, "user-1", inbox[0].id).await.unwrap());

    let inbox = notifier::list_for_user(&state.db, "user-1").await.unwrap();
    assert!(inbox[0].is_read);
}
