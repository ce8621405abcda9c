//! In-Memory Store - Reference DealStore/LedgerStore Adapter
//!
//! Entity maps behind `tokio::sync::RwLock`. A map-wide write lock
//! stands in for row-level locking: every read-check-write runs inside
//! one lock hold, which gives the compare-and-set claim and the
//! balance-plus-transaction unit their atomicity. Any backend with
//! real row locks can replace this adapter without touching services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::deal::{Deal, DealId, DealStatus, UserId};
use crate::domain::error::{EscrowError, EscrowResult};
use crate::domain::ledger::{Account, Transaction, TransactionKind};
use crate::domain::rating::RatingEngine;
use crate::ports::repository::{AccountRow, EscrowSnapshot};
use crate::ports::store::{DealStore, LedgerStore};

/// Snapshot format version written by `export_snapshot`.
const SNAPSHOT_VERSION: &str = "1";

/// An account together with its append-only transaction log.
///
/// Both live under one map entry so a balance mutation and its
/// transaction append are a single critical section.
#[derive(Debug, Clone)]
struct AccountEntry {
    account: Account,
    transactions: Vec<Transaction>,
}

/// In-memory deal and ledger store.
pub struct MemoryStore {
    deals: RwLock<HashMap<DealId, Deal>>,
    accounts: RwLock<HashMap<UserId, AccountEntry>>,
    next_deal_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            deals: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            next_deal_id: AtomicI64::new(1),
        }
    }

    /// Rebuild a store from a crash-recovery snapshot.
    pub fn from_snapshot(snapshot: EscrowSnapshot) -> Self {
        let deals: HashMap<DealId, Deal> =
            snapshot.deals.into_iter().map(|d| (d.id, d)).collect();
        let accounts: HashMap<UserId, AccountEntry> = snapshot
            .accounts
            .into_iter()
            .map(|row| {
                (
                    row.user_id,
                    AccountEntry {
                        account: Account {
                            user_id: row.user_id,
                            display_name: row.display_name,
                            balance: row.balance,
                            rating: row.rating,
                            completed_deals: row.completed_deals,
                            is_frozen: row.is_frozen,
                        },
                        transactions: row.transactions,
                    },
                )
            })
            .collect();

        Self {
            deals: RwLock::new(deals),
            accounts: RwLock::new(accounts),
            next_deal_id: AtomicI64::new(snapshot.next_deal_id),
        }
    }

    /// Export the full state for a crash-recovery snapshot.
    pub async fn export_snapshot(&self) -> EscrowSnapshot {
        let deals = self.deals.read().await;
        let accounts = self.accounts.read().await;

        let mut deal_rows: Vec<Deal> = deals.values().cloned().collect();
        deal_rows.sort_by_key(|d| d.id);

        let mut account_rows: Vec<AccountRow> = accounts
            .values()
            .map(|entry| AccountRow {
                user_id: entry.account.user_id,
                display_name: entry.account.display_name.clone(),
                balance: entry.account.balance,
                rating: entry.account.rating,
                completed_deals: entry.account.completed_deals,
                is_frozen: entry.account.is_frozen,
                transactions: entry.transactions.clone(),
            })
            .collect();
        account_rows.sort_by_key(|a| a.user_id);

        EscrowSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
            deals: deal_rows,
            accounts: account_rows,
            next_deal_id: self.next_deal_id.load(Ordering::SeqCst),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn insert_deal(&self, mut deal: Deal) -> EscrowResult<Deal> {
        let id = self.next_deal_id.fetch_add(1, Ordering::SeqCst);
        deal.id = id;

        let mut deals = self.deals.write().await;
        deals.insert(id, deal.clone());
        Ok(deal)
    }

    async fn deal(&self, id: DealId) -> EscrowResult<Deal> {
        let deals = self.deals.read().await;
        deals.get(&id).cloned().ok_or(EscrowError::DealNotFound(id))
    }

    async fn claim_deal(
        &self,
        id: DealId,
        buyer_id: UserId,
        buyer_display_name: String,
    ) -> EscrowResult<Deal> {
        let mut deals = self.deals.write().await;
        let deal = deals.get_mut(&id).ok_or(EscrowError::DealNotFound(id))?;

        // Compare-and-set: only an open listing can be claimed, and the
        // check and the write share this lock hold.
        if deal.status != DealStatus::WaitingBuyer {
            return Err(EscrowError::Conflict {
                deal_id: id,
                actual: deal.status,
                attempted: "claim",
            });
        }

        deal.status = DealStatus::WaitingPayment;
        deal.buyer_id = Some(buyer_id);
        deal.buyer_display_name = Some(buyer_display_name);
        Ok(deal.clone())
    }

    async fn transition_deal(
        &self,
        id: DealId,
        allowed: &[DealStatus],
        to: DealStatus,
        attempted: &'static str,
    ) -> EscrowResult<Deal> {
        let mut deals = self.deals.write().await;
        let deal = deals.get_mut(&id).ok_or(EscrowError::DealNotFound(id))?;

        if !allowed.contains(&deal.status) {
            return Err(EscrowError::Conflict {
                deal_id: id,
                actual: deal.status,
                attempted,
            });
        }

        deal.status = to;
        Ok(deal.clone())
    }

    async fn deals_by_status(&self, status: DealStatus) -> EscrowResult<Vec<Deal>> {
        let deals = self.deals.read().await;
        let mut found: Vec<Deal> = deals
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|d| d.id);
        Ok(found)
    }

    async fn deals_for(&self, user_id: UserId) -> EscrowResult<Vec<Deal>> {
        let deals = self.deals.read().await;
        let mut found: Vec<Deal> = deals
            .values()
            .filter(|d| d.seller_id == user_id || d.buyer_id == Some(user_id))
            .cloned()
            .collect();
        found.sort_by_key(|d| d.id);
        Ok(found)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_or_create_account(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> EscrowResult<Account> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts.entry(user_id).or_insert_with(|| AccountEntry {
            account: Account::new(user_id, display_name.to_string()),
            transactions: Vec::new(),
        });
        if !display_name.is_empty() {
            entry.account.display_name = display_name.to_string();
        }
        Ok(entry.account.clone())
    }

    async fn account(&self, user_id: UserId) -> EscrowResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&user_id)
            .map(|entry| entry.account.clone())
            .ok_or(EscrowError::AccountNotFound(user_id))
    }

    async fn apply_transaction(
        &self,
        user_id: UserId,
        amount: Decimal,
        kind: TransactionKind,
        description: String,
        enforce_funds: bool,
    ) -> EscrowResult<(Account, Transaction)> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .get_mut(&user_id)
            .ok_or(EscrowError::AccountNotFound(user_id))?;

        let next_balance = entry.account.balance + amount;
        if enforce_funds && next_balance < Decimal::ZERO {
            return Err(EscrowError::InsufficientFunds {
                requested: -amount,
                available: entry.account.balance,
            });
        }

        // Balance mutation and transaction append are one unit: both
        // happen here, or the error above happened and neither did.
        entry.account.balance = next_balance;
        let tx = Transaction::new(user_id, amount, kind, description);
        entry.transactions.push(tx.clone());

        Ok((entry.account.clone(), tx))
    }

    async fn apply_rating(&self, user_id: UserId, new_rating: f64) -> EscrowResult<Account> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .get_mut(&user_id)
            .ok_or(EscrowError::AccountNotFound(user_id))?;

        let (rating, count) = RatingEngine::update(
            entry.account.rating,
            entry.account.completed_deals,
            new_rating,
        )?;
        entry.account.rating = rating;
        entry.account.completed_deals = count;
        Ok(entry.account.clone())
    }

    async fn toggle_frozen(&self, user_id: UserId) -> EscrowResult<Account> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .get_mut(&user_id)
            .ok_or(EscrowError::AccountNotFound(user_id))?;

        entry.account.is_frozen = !entry.account.is_frozen;
        Ok(entry.account.clone())
    }

    async fn transactions(&self, user_id: UserId, limit: usize) -> EscrowResult<Vec<Transaction>> {
        let accounts = self.accounts.read().await;
        let entry = accounts
            .get(&user_id)
            .ok_or(EscrowError::AccountNotFound(user_id))?;

        Ok(entry
            .transactions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_accounts(&self) -> EscrowResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut rows: Vec<Account> = accounts
            .values()
            .map(|entry| entry.account.clone())
            .collect();
        rows.sort_by_key(|a| a.user_id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn listing(seller: UserId) -> Deal {
        Deal::new_listing(seller, "alice".to_string(), "VintageBadge".to_string(), dec!(500))
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store.insert_deal(listing(1)).await.unwrap();
        let second = store.insert_deal(listing(1)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_claim_is_compare_and_set() {
        let store = MemoryStore::new();
        let deal = store.insert_deal(listing(1)).await.unwrap();

        let won = store.claim_deal(deal.id, 2, "bob".to_string()).await.unwrap();
        assert_eq!(won.status, DealStatus::WaitingPayment);
        assert_eq!(won.buyer_id, Some(2));

        let lost = store.claim_deal(deal.id, 3, "carol".to_string()).await;
        assert!(matches!(lost, Err(EscrowError::Conflict { .. })));

        // The winner's buyer stands.
        let stored = store.deal(deal.id).await.unwrap();
        assert_eq!(stored.buyer_id, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let deal = store.insert_deal(listing(1)).await.unwrap();

        let mut handles = Vec::new();
        for buyer in 2..12 {
            let store = Arc::clone(&store);
            let id = deal.id;
            handles.push(tokio::spawn(async move {
                store.claim_deal(id, buyer, format!("buyer{buyer}")).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_ledger_untouched() {
        let store = MemoryStore::new();
        store.get_or_create_account(1, "alice").await.unwrap();
        store
            .apply_transaction(1, dec!(100), TransactionKind::Deposit, "top-up".into(), false)
            .await
            .unwrap();

        let err = store
            .apply_transaction(
                1,
                dec!(-150),
                TransactionKind::Withdrawal,
                "payout".into(),
                true,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EscrowError::InsufficientFunds {
                requested: dec!(150),
                available: dec!(100),
            }
        );

        let account = store.account(1).await.unwrap();
        assert_eq!(account.balance, dec!(100));
        assert_eq!(store.transactions(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_equals_transaction_sum() {
        let store = MemoryStore::new();
        store.get_or_create_account(1, "alice").await.unwrap();
        for amount in [dec!(100), dec!(-30), dec!(500.25), dec!(-0.25)] {
            store
                .apply_transaction(1, amount, TransactionKind::AdminAdjustment, "adj".into(), false)
                .await
                .unwrap();
        }

        let account = store.account(1).await.unwrap();
        let sum: Decimal = store
            .transactions(1, usize::MAX)
            .await
            .unwrap()
            .iter()
            .map(|tx| tx.amount)
            .sum();
        assert_eq!(account.balance, sum);
        assert_eq!(account.balance, dec!(570.00));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = MemoryStore::new();
        let deal = store.insert_deal(listing(1)).await.unwrap();
        store.get_or_create_account(1, "alice").await.unwrap();
        store
            .apply_transaction(1, dec!(42), TransactionKind::Deposit, "top-up".into(), false)
            .await
            .unwrap();

        let snapshot = store.export_snapshot().await;
        let restored = MemoryStore::from_snapshot(snapshot);

        assert_eq!(restored.deal(deal.id).await.unwrap().gift_name, "VintageBadge");
        assert_eq!(restored.account(1).await.unwrap().balance, dec!(42));
        // Ids keep counting from where the snapshot left off.
        let next = restored.insert_deal(listing(1)).await.unwrap();
        assert_eq!(next.id, deal.id + 1);
    }

    #[tokio::test]
    async fn test_transactions_newest_first_with_limit() {
        let store = MemoryStore::new();
        store.get_or_create_account(1, "alice").await.unwrap();
        for i in 1..=5 {
            store
                .apply_transaction(
                    1,
                    Decimal::from(i),
                    TransactionKind::Deposit,
                    format!("top-up {i}"),
                    false,
                )
                .await
                .unwrap();
        }

        let recent = store.transactions(1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].amount, dec!(5));
        assert_eq!(recent[1].amount, dec!(4));
    }
}
