//! Balance Engine - Atomic Balance Mutation + Transaction Log
//!
//! The only writer to the ledger. Every balance movement commits
//! together with exactly one transaction record inside the store's
//! critical section, keeping `balance == Σ transaction.amount` true
//! under concurrency. Committed movements are mirrored to the JSONL
//! journal best-effort; the journal is an audit trail, not the
//! invariant holder.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::deal::{DealId, UserId};
use crate::domain::error::{EscrowError, EscrowResult};
use crate::domain::ledger::{Account, Transaction, TransactionKind};
use crate::ports::notifier::Notifier;
use crate::ports::repository::{LedgerRecord, Repository};
use crate::ports::store::LedgerStore;

/// Orchestrates deposits, withdrawals, admin corrections, and deal
/// settlement credits against the ledger store.
pub struct BalanceEngine<L: LedgerStore, R: Repository, N: Notifier> {
  ledger: Arc<L>,
  repo: Arc<R>,
  notifier: Arc<N>,
  /// Recipient of withdrawal-request notices (manual fulfillment).
  admin_recipient: Option<UserId>,
}

impl<L: LedgerStore, R: Repository, N: Notifier> BalanceEngine<L, R, N> {
  /// Create a new balance engine.
  pub fn new(
    ledger: Arc<L>,
    repo: Arc<R>,
    notifier: Arc<N>,
    admin_recipient: Option<UserId>,
  ) -> Self {
    Self {
      ledger,
      repo,
      notifier,
      admin_recipient,
    }
  }

  /// Credit a user-initiated top-up.
  pub async fn deposit(
    &self,
    user_id: UserId,
    display_name: &str,
    amount: Decimal,
  ) -> EscrowResult<(Account, Transaction)> {
    ensure_positive(amount)?;
    let account = self.ledger.get_or_create_account(user_id, display_name).await?;
    if account.is_frozen {
      return Err(EscrowError::AccountFrozen(user_id));
    }

    let (account, tx) = self
      .ledger
      .apply_transaction(
        user_id,
        amount,
        TransactionKind::Deposit,
        "Balance top-up".to_string(),
        false,
      )
      .await?;

    info!(user_id, amount = %amount, balance = %account.balance, "Deposit credited");
    self.journal(&tx, account.balance).await;
    Ok((account, tx))
  }

  /// Debit a payout request.
  ///
  /// The funds check happens inside the same critical section as the
  /// debit, so two racing withdrawals cannot both pass it. Fulfillment
  /// is manual: the admin recipient is signalled best-effort.
  pub async fn withdraw(
    &self,
    user_id: UserId,
    display_name: &str,
    amount: Decimal,
  ) -> EscrowResult<(Account, Transaction)> {
    ensure_positive(amount)?;
    let account = self.ledger.get_or_create_account(user_id, display_name).await?;
    if account.is_frozen {
      return Err(EscrowError::AccountFrozen(user_id));
    }

    let (account, tx) = self
      .ledger
      .apply_transaction(
        user_id,
        -amount,
        TransactionKind::Withdrawal,
        "Withdrawal request".to_string(),
        true,
      )
      .await?;

    info!(user_id, amount = %amount, balance = %account.balance, "Withdrawal debited");
    self.journal(&tx, account.balance).await;

    if let Some(admin) = self.admin_recipient {
      self
        .notify_best_effort(
          admin,
          format!(
            "Withdrawal request\nUser: {user_id}\nAmount: {amount:.2}\nBalance after: {:.2}",
            account.balance
          ),
        )
        .await;
    }

    Ok((account, tx))
  }

  /// Apply a signed admin correction. Privilege is checked by the
  /// caller (AdminService); frozen accounts are deliberately not
  /// exempt from corrections.
  pub async fn admin_adjust(
    &self,
    user_id: UserId,
    amount: Decimal,
  ) -> EscrowResult<(Account, Transaction)> {
    if amount.is_zero() {
      return Err(EscrowError::Validation("adjustment must not be zero".into()));
    }
    // Surfaces AccountNotFound for ids the ledger has never seen.
    self.ledger.account(user_id).await?;

    let (account, tx) = self
      .ledger
      .apply_transaction(
        user_id,
        amount,
        TransactionKind::AdminAdjustment,
        "Adjustment by administrator".to_string(),
        false,
      )
      .await?;

    info!(user_id, amount = %amount, balance = %account.balance, "Admin adjustment applied");
    self.journal(&tx, account.balance).await;
    Ok((account, tx))
  }

  /// Credit the seller's settlement for a completed deal.
  pub async fn credit_income(
    &self,
    seller_id: UserId,
    amount: Decimal,
    deal_id: DealId,
  ) -> EscrowResult<(Account, Transaction)> {
    let (account, tx) = self
      .ledger
      .apply_transaction(
        seller_id,
        amount,
        TransactionKind::Income,
        format!("Payment for deal #{deal_id}"),
        false,
      )
      .await?;

    info!(
      seller_id,
      deal_id,
      amount = %amount,
      balance = %account.balance,
      "Settlement credited"
    );
    self.journal(&tx, account.balance).await;
    Ok((account, tx))
  }

  /// The account snapshot for a user, created lazily on first contact.
  pub async fn account_for(
    &self,
    user_id: UserId,
    display_name: &str,
  ) -> EscrowResult<Account> {
    self.ledger.get_or_create_account(user_id, display_name).await
  }

  /// Most recent transactions first, at most `limit`.
  pub async fn transactions(
    &self,
    user_id: UserId,
    limit: usize,
  ) -> EscrowResult<Vec<Transaction>> {
    self.ledger.transactions(user_id, limit).await
  }

  /// Mirror a committed movement to the durable journal. Failures are
  /// logged and swallowed; the store already holds the truth.
  async fn journal(&self, tx: &Transaction, balance_after: Decimal) {
    let record = LedgerRecord::from_committed(tx, balance_after);
    if let Err(e) = self.repo.append_ledger_record(&record).await {
      warn!(tx_id = %tx.id, error = %e, "Failed to journal ledger record");
    }
  }

  async fn notify_best_effort(&self, recipient: UserId, text: String) {
    if let Err(e) = self.notifier.notify(recipient, &text).await {
      warn!(recipient, error = %e, "Failed to deliver notification");
    }
  }
}

fn ensure_positive(amount: Decimal) -> EscrowResult<()> {
  if amount <= Decimal::ZERO {
    return Err(EscrowError::Validation(format!(
      "amount must be positive, got {amount}"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn test_ensure_positive() {
    assert!(ensure_positive(dec!(0.01)).is_ok());
    assert!(ensure_positive(Decimal::ZERO).is_err());
    assert!(ensure_positive(dec!(-5)).is_err());
  }
}
