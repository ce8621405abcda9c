//! Integration Tests - End-to-end Escrow Component Testing
//!
//! Tests the interaction between usecases, ports, and the in-memory
//! store adapter. Uses mockall for trait mocking and tokio::test for
//! async tests.

use std::sync::Arc;

use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use gift_escrow_bot::config::{
    AdminConfig, AppConfig, DealConfig, FlowConfig, HealthConfig, PersistenceConfig,
    ServiceConfig,
};
use gift_escrow_bot::adapters::persistence::MemoryStore;
use gift_escrow_bot::domain::deal::{DealEventKind, DealStatus, UserId};
use gift_escrow_bot::domain::error::EscrowError;
use gift_escrow_bot::domain::ledger::TransactionKind;
use gift_escrow_bot::ports::store::LedgerStore;
use gift_escrow_bot::usecases::{AdminService, BalanceEngine, DealService};

// ---- Mock Definitions ----

mock! {
    pub Notify {}

    #[async_trait::async_trait]
    impl gift_escrow_bot::ports::notifier::Notifier for Notify {
        async fn notify(&self, recipient: i64, text: &str) -> anyhow::Result<()>;
    }
}

mock! {
    pub Repo {}

    #[async_trait::async_trait]
    impl gift_escrow_bot::ports::repository::Repository for Repo {
        async fn append_ledger_record(
            &self,
            record: &gift_escrow_bot::ports::repository::LedgerRecord,
        ) -> anyhow::Result<()>;

        async fn load_ledger_records(
            &self,
        ) -> anyhow::Result<Vec<gift_escrow_bot::ports::repository::LedgerRecord>>;

        async fn save_snapshot(
            &self,
            snapshot: &gift_escrow_bot::ports::repository::EscrowSnapshot,
        ) -> anyhow::Result<()>;

        async fn load_latest_snapshot(
            &self,
        ) -> anyhow::Result<Option<gift_escrow_bot::ports::repository::EscrowSnapshot>>;

        async fn is_healthy(&self) -> bool;
    }
}

// ---- Test Fixtures ----

const SELLER: UserId = 10;
const BUYER: UserId = 20;
const STRANGER: UserId = 30;
const ADMIN: UserId = 1001;

fn test_config() -> AppConfig {
    AppConfig {
        service: ServiceConfig {
            name: "escrow-test".to_string(),
            log_level: "info".to_string(),
        },
        admin: AdminConfig {
            user_ids: vec![ADMIN],
            notify_user_id: None,
        },
        deals: DealConfig::default(),
        flows: FlowConfig::default(),
        persistence: PersistenceConfig::default(),
        health: HealthConfig::default(),
    }
}

struct Stack {
    store: Arc<MemoryStore>,
    balance: Arc<BalanceEngine<MemoryStore, MockRepo, MockNotify>>,
    deals: Arc<DealService<MemoryStore, MemoryStore, MockRepo, MockNotify>>,
    admin: Arc<AdminService<MemoryStore, MockRepo, MockNotify>>,
}

/// Wire the full service stack over one in-memory store, with a
/// quiet notifier and an accepting journal.
fn stack() -> Stack {
    let mut notify = MockNotify::new();
    notify.expect_notify().returning(|_, _| Ok(()));
    stack_with_notifier(notify)
}

fn stack_with_notifier(notify: MockNotify) -> Stack {
    let mut repo = MockRepo::new();
    repo.expect_append_ledger_record().returning(|_| Ok(()));

    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(notify);
    let balance = Arc::new(BalanceEngine::new(
        Arc::clone(&store),
        Arc::new(repo),
        Arc::clone(&notifier),
        config.admin.notify_recipient(),
    ));
    let deals = Arc::new(DealService::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&balance),
        Arc::clone(&notifier),
        &config,
    ));
    let admin = Arc::new(AdminService::new(
        Arc::clone(&balance),
        Arc::clone(&store),
        Arc::clone(&notifier),
        &config,
    ));

    Stack {
        store,
        balance,
        deals,
        admin,
    }
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_end_to_end_deal_lifecycle() {
    let s = stack();

    // Seller lists a gift.
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500.00))
        .await
        .unwrap();
    assert_eq!(deal.status, DealStatus::WaitingBuyer);
    assert!(deal.buyer_id.is_none());

    // Buyer claims it.
    let deal = s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
    assert_eq!(deal.status, DealStatus::WaitingPayment);
    assert_eq!(deal.buyer_id, Some(BUYER));

    // Buyer pays into escrow.
    let deal = s.deals.mark_paid(deal.id, BUYER).await.unwrap();
    assert_eq!(deal.status, DealStatus::WaitingGift);

    // Buyer confirms receipt; seller is settled.
    let deal = s.deals.confirm_received(deal.id, BUYER).await.unwrap();
    assert_eq!(deal.status, DealStatus::Completed);

    let seller = s.store.account(SELLER).await.unwrap();
    assert_eq!(seller.balance, dec!(500.00));
    assert_eq!(seller.completed_deals, 1);
    assert_eq!(seller.rating, 5.0);

    let txs = s.store.transactions(SELLER, 10).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, TransactionKind::Income);
    assert_eq!(txs[0].amount, dec!(500.00));
    assert!(txs[0].description.contains(&format!("#{}", deal.id)));
}

#[tokio::test]
async fn test_concurrent_claims_have_exactly_one_winner() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for buyer in 100..110 {
        let deals = Arc::clone(&s.deals);
        let id = deal.id;
        handles.push(tokio::spawn(async move {
            deals.claim(id, buyer, &format!("buyer{buyer}")).await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(deal) => winners.push(deal),
            Err(EscrowError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 9);

    // Exactly one buyer is recorded, and it is the winner.
    let stored = s.deals.deal(deal.id).await.unwrap();
    assert_eq!(stored.buyer_id, winners[0].buyer_id);
    assert_eq!(stored.status, DealStatus::WaitingPayment);
}

#[tokio::test]
async fn test_seller_cannot_claim_own_listing() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();

    let err = s.deals.claim(deal.id, SELLER, "alice").await.unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));
    assert_eq!(
        s.deals.deal(deal.id).await.unwrap().status,
        DealStatus::WaitingBuyer
    );
}

#[tokio::test]
async fn test_mark_paid_requires_buyer() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    s.deals.claim(deal.id, BUYER, "bob").await.unwrap();

    for actor in [SELLER, STRANGER] {
        let err = s.deals.mark_paid(deal.id, actor).await.unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized(_)));
    }

    // State unchanged by the rejected attempts.
    assert_eq!(
        s.deals.deal(deal.id).await.unwrap().status,
        DealStatus::WaitingPayment
    );
}

#[tokio::test]
async fn test_confirm_received_requires_buyer() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
    s.deals.mark_paid(deal.id, BUYER).await.unwrap();

    let err = s.deals.confirm_received(deal.id, SELLER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));

    // No settlement happened.
    let seller = s.store.account(SELLER).await.unwrap();
    assert_eq!(seller.balance, Decimal::ZERO);
    assert_eq!(seller.completed_deals, 0);
}

#[tokio::test]
async fn test_cancel_and_dispute_require_participant() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    s.deals.claim(deal.id, BUYER, "bob").await.unwrap();

    let err = s.deals.cancel(deal.id, STRANGER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));
    let err = s.deals.open_dispute(deal.id, STRANGER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));

    // State unchanged on failure.
    assert_eq!(
        s.deals.deal(deal.id).await.unwrap().status,
        DealStatus::WaitingPayment
    );

    // Either participant may dispute.
    let deal = s.deals.open_dispute(deal.id, SELLER).await.unwrap();
    assert_eq!(deal.status, DealStatus::Dispute);
}

#[tokio::test]
async fn test_terminal_states_reject_further_transitions() {
    let s = stack();
    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    s.deals.cancel(deal.id, SELLER).await.unwrap();

    let err = s.deals.cancel(deal.id, SELLER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Conflict { .. }));
    let err = s.deals.open_dispute(deal.id, SELLER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Conflict { .. }));
    let err = s.deals.claim(deal.id, BUYER, "bob").await.unwrap_err();
    assert!(matches!(err, EscrowError::Conflict { .. }));
}

#[tokio::test]
async fn test_withdraw_insufficient_funds_changes_nothing() {
    let s = stack();
    s.balance.deposit(BUYER, "bob", dec!(100)).await.unwrap();

    let err = s.balance.withdraw(BUYER, "bob", dec!(150)).await.unwrap_err();
    assert_eq!(
        err,
        EscrowError::InsufficientFunds {
            requested: dec!(150),
            available: dec!(100),
        }
    );

    let account = s.store.account(BUYER).await.unwrap();
    assert_eq!(account.balance, dec!(100));
    assert_eq!(s.store.transactions(BUYER, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_notification_failure_never_blocks_transitions() {
    let mut notify = MockNotify::new();
    notify
        .expect_notify()
        .returning(|_, _| Err(anyhow::anyhow!("recipient unreachable")));
    let s = stack_with_notifier(notify);

    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    let deal = s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
    let deal = s.deals.mark_paid(deal.id, BUYER).await.unwrap();
    let deal = s.deals.confirm_received(deal.id, BUYER).await.unwrap();

    // Every transition committed despite the dead notifier, and the
    // seller still got paid.
    assert_eq!(deal.status, DealStatus::Completed);
    assert_eq!(s.store.account(SELLER).await.unwrap().balance, dec!(500));
}

#[tokio::test]
async fn test_frozen_account_is_locked_out() {
    let s = stack();
    s.balance.deposit(BUYER, "bob", dec!(100)).await.unwrap();
    s.admin.toggle_freeze(ADMIN, BUYER).await.unwrap();

    let err = s.balance.deposit(BUYER, "bob", dec!(10)).await.unwrap_err();
    assert_eq!(err, EscrowError::AccountFrozen(BUYER));
    let err = s.balance.withdraw(BUYER, "bob", dec!(10)).await.unwrap_err();
    assert_eq!(err, EscrowError::AccountFrozen(BUYER));
    let err = s
        .deals
        .create_deal(BUYER, "bob", "VintageBadge", dec!(10))
        .await
        .unwrap_err();
    assert_eq!(err, EscrowError::AccountFrozen(BUYER));

    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    let err = s.deals.claim(deal.id, BUYER, "bob").await.unwrap_err();
    assert_eq!(err, EscrowError::AccountFrozen(BUYER));

    // Unfreeze restores everything.
    s.admin.toggle_freeze(ADMIN, BUYER).await.unwrap();
    assert!(s.deals.claim(deal.id, BUYER, "bob").await.is_ok());
}

#[tokio::test]
async fn test_admin_operations_require_privilege() {
    let s = stack();
    s.balance.deposit(BUYER, "bob", dec!(100)).await.unwrap();

    let err = s
        .admin
        .adjust_balance(STRANGER, BUYER, dec!(50))
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));
    let err = s.admin.toggle_freeze(STRANGER, BUYER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));
    let err = s.admin.list_accounts(STRANGER).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));

    // Rejected operations changed nothing.
    assert_eq!(s.store.account(BUYER).await.unwrap().balance, dec!(100));

    // The real admin succeeds, with a signed adjustment.
    let (account, tx) = s.admin.adjust_balance(ADMIN, BUYER, dec!(-25)).await.unwrap();
    assert_eq!(account.balance, dec!(75));
    assert_eq!(tx.kind, TransactionKind::AdminAdjustment);

    let accounts = s.admin.list_accounts(ADMIN).await.unwrap();
    assert_eq!(accounts.len(), 1);
}

#[tokio::test]
async fn test_admin_adjust_unknown_account_not_found() {
    let s = stack();
    let err = s.admin.adjust_balance(ADMIN, 9999, dec!(50)).await.unwrap_err();
    assert_eq!(err, EscrowError::AccountNotFound(9999));
}

#[tokio::test]
async fn test_rating_accumulates_across_completed_deals() {
    let s = stack();

    for _ in 0..2 {
        let deal = s
            .deals
            .create_deal(SELLER, "alice", "VintageBadge", dec!(100))
            .await
            .unwrap();
        s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
        s.deals.mark_paid(deal.id, BUYER).await.unwrap();
        s.deals.confirm_received(deal.id, BUYER).await.unwrap();
    }

    let seller = s.store.account(SELLER).await.unwrap();
    assert_eq!(seller.completed_deals, 2);
    assert_eq!(seller.rating, 5.0);
    assert_eq!(seller.balance, dec!(200));
}

#[tokio::test]
async fn test_ledger_stays_consistent_across_mixed_operations() {
    let s = stack();

    s.balance.deposit(SELLER, "alice", dec!(300)).await.unwrap();
    s.balance.withdraw(SELLER, "alice", dec!(120.50)).await.unwrap();
    s.admin.adjust_balance(ADMIN, SELLER, dec!(-30)).await.unwrap();

    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(75.25))
        .await
        .unwrap();
    s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
    s.deals.mark_paid(deal.id, BUYER).await.unwrap();
    s.deals.confirm_received(deal.id, BUYER).await.unwrap();

    let account = s.store.account(SELLER).await.unwrap();
    let sum: Decimal = s
        .store
        .transactions(SELLER, usize::MAX)
        .await
        .unwrap()
        .iter()
        .map(|tx| tx.amount)
        .sum();
    assert_eq!(account.balance, sum);
    assert_eq!(account.balance, dec!(224.75));
}

#[tokio::test]
async fn test_deal_queries_cover_both_roles() {
    let s = stack();
    let listed = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    let other = s
        .deals
        .create_deal(STRANGER, "carol", "RareSticker", dec!(50))
        .await
        .unwrap();
    s.deals.claim(other.id, SELLER, "alice").await.unwrap();

    let open = s.deals.deals_by_status(DealStatus::WaitingBuyer).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, listed.id);

    // Seller sees their listing and the deal they bought into.
    let mine = s.deals.deals_for(SELLER).await.unwrap();
    assert_eq!(mine.len(), 2);

    let err = s.deals.deal(9999).await.unwrap_err();
    assert_eq!(err, EscrowError::DealNotFound(9999));
}

#[tokio::test]
async fn test_state_change_events_are_broadcast() {
    let s = stack();
    let mut events = s.deals.subscribe();

    let deal = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(500))
        .await
        .unwrap();
    s.deals.claim(deal.id, BUYER, "bob").await.unwrap();
    s.deals.mark_paid(deal.id, BUYER).await.unwrap();
    s.deals.confirm_received(deal.id, BUYER).await.unwrap();

    let kinds: Vec<DealEventKind> = [
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
    ]
    .iter()
    .map(|e| e.kind)
    .collect();

    assert_eq!(
        kinds,
        vec![
            DealEventKind::Created,
            DealEventKind::Claimed,
            DealEventKind::Paid,
            DealEventKind::Completed,
        ]
    );
}

#[tokio::test]
async fn test_create_deal_validation() {
    let s = stack();

    let err = s
        .deals
        .create_deal(SELLER, "alice", "", dec!(500))
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));

    let err = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", dec!(-5))
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));

    let err = s
        .deals
        .create_deal(SELLER, "alice", "VintageBadge", Decimal::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));

    // Nothing was listed.
    assert!(s
        .deals
        .deals_by_status(DealStatus::WaitingBuyer)
        .await
        .unwrap()
        .is_empty());
}
