//! Store Ports - Atomic Entity Persistence Interfaces
//!
//! Any storage backend may implement these traits as long as every
//! method is atomic with respect to the entity key it touches: the
//! claim is a compare-and-set on (deal_id, expected status), and a
//! balance mutation commits together with its transaction record or
//! not at all. The crate ships an in-memory adapter; a row-locking
//! SQL backend would satisfy the same contracts.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::deal::{Deal, DealId, DealStatus, UserId};
use crate::domain::error::EscrowResult;
use crate::domain::ledger::{Account, Transaction, TransactionKind};

/// Deal persistence with compare-and-set transitions.
#[async_trait]
pub trait DealStore: Send + Sync + 'static {
  /// Insert a new listing, assigning its id. Returns the stored deal.
  async fn insert_deal(&self, deal: Deal) -> EscrowResult<Deal>;

  /// Fetch one deal. `DealNotFound` if the id is unknown.
  async fn deal(&self, id: DealId) -> EscrowResult<Deal>;

  /// Bind a buyer to an open listing.
  ///
  /// Compare-and-set on `WaitingBuyer`: of any number of concurrent
  /// claims exactly one succeeds; losers get `Conflict` and the final
  /// state records exactly one buyer.
  async fn claim_deal(
    &self,
    id: DealId,
    buyer_id: UserId,
    buyer_display_name: String,
  ) -> EscrowResult<Deal>;

  /// Move a deal to `to` iff its current status is in `allowed`.
  ///
  /// `attempted` names the operation for the `Conflict` error the
  /// loser observes.
  async fn transition_deal(
    &self,
    id: DealId,
    allowed: &[DealStatus],
    to: DealStatus,
    attempted: &'static str,
  ) -> EscrowResult<Deal>;

  /// All deals currently in `status`, oldest first.
  async fn deals_by_status(&self, status: DealStatus) -> EscrowResult<Vec<Deal>>;

  /// All deals where the user is seller or buyer, oldest first.
  async fn deals_for(&self, user_id: UserId) -> EscrowResult<Vec<Deal>>;
}

/// Account/transaction persistence upholding ledger consistency.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
  /// Fetch the account, creating it with a zero balance on first
  /// contact. Refreshes the stored display name.
  async fn get_or_create_account(
    &self,
    user_id: UserId,
    display_name: &str,
  ) -> EscrowResult<Account>;

  /// Fetch one account. `AccountNotFound` if never seen.
  async fn account(&self, user_id: UserId) -> EscrowResult<Account>;

  /// Apply a signed delta and append the matching transaction record
  /// as one atomic unit.
  ///
  /// With `enforce_funds`, a delta that would take the balance below
  /// zero is rejected with `InsufficientFunds` and nothing persists.
  async fn apply_transaction(
    &self,
    user_id: UserId,
    amount: Decimal,
    kind: TransactionKind,
    description: String,
    enforce_funds: bool,
  ) -> EscrowResult<(Account, Transaction)>;

  /// Fold a new rating into the seller's running average and bump the
  /// completed-deal counter, atomically.
  async fn apply_rating(&self, user_id: UserId, new_rating: f64) -> EscrowResult<Account>;

  /// Flip the frozen flag. Returns the updated account.
  async fn toggle_frozen(&self, user_id: UserId) -> EscrowResult<Account>;

  /// Most recent transactions first, at most `limit`.
  async fn transactions(&self, user_id: UserId, limit: usize) -> EscrowResult<Vec<Transaction>>;

  /// Every known account (admin surface).
  async fn list_accounts(&self) -> EscrowResult<Vec<Account>>;
}
