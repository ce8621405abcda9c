//! Admin Service - Privileged Ledger Operations
//!
//! Balance corrections, freeze toggling, and the all-accounts view.
//! Privilege is enforced here against the configured admin set, not
//! only at the transport boundary, so the check holds regardless of
//! the caller.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::deal::UserId;
use crate::domain::error::{EscrowError, EscrowResult};
use crate::domain::ledger::{Account, Transaction};
use crate::ports::notifier::Notifier;
use crate::ports::repository::Repository;
use crate::ports::store::LedgerStore;
use crate::usecases::balance_engine::BalanceEngine;

/// Privileged operations on accounts.
pub struct AdminService<L: LedgerStore, R: Repository, N: Notifier> {
  balance: Arc<BalanceEngine<L, R, N>>,
  ledger: Arc<L>,
  notifier: Arc<N>,
  admin_ids: HashSet<UserId>,
}

impl<L: LedgerStore, R: Repository, N: Notifier> AdminService<L, R, N> {
  /// Create a new admin service from the configured admin set.
  pub fn new(
    balance: Arc<BalanceEngine<L, R, N>>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    config: &AppConfig,
  ) -> Self {
    Self {
      balance,
      ledger,
      notifier,
      admin_ids: config.admin.user_ids.iter().copied().collect(),
    }
  }

  /// Apply a signed correction to a user's balance.
  pub async fn adjust_balance(
    &self,
    actor_id: UserId,
    target: UserId,
    amount: Decimal,
  ) -> EscrowResult<(Account, Transaction)> {
    self.ensure_admin(actor_id)?;

    let (account, tx) = self.balance.admin_adjust(target, amount).await?;

    info!(actor_id, target, amount = %amount, "Admin balance adjustment");
    self
      .notify_best_effort(
        target,
        format!(
          "Your balance was changed by the administrator\nChange: {amount:+.2}\n\
           New balance: {:.2}",
          account.balance
        ),
      )
      .await;
    Ok((account, tx))
  }

  /// Flip a user's frozen flag. Frozen accounts are rejected from
  /// deposits, withdrawals, new listings, and claims.
  pub async fn toggle_freeze(&self, actor_id: UserId, target: UserId) -> EscrowResult<Account> {
    self.ensure_admin(actor_id)?;

    let account = self.ledger.toggle_frozen(target).await?;

    info!(actor_id, target, is_frozen = account.is_frozen, "Freeze toggled");
    let verb = if account.is_frozen { "frozen" } else { "unfrozen" };
    self
      .notify_best_effort(
        target,
        format!("Your account was {verb} by the administrator"),
      )
      .await;
    Ok(account)
  }

  /// Every known account. Admin-only read surface.
  pub async fn list_accounts(&self, actor_id: UserId) -> EscrowResult<Vec<Account>> {
    self.ensure_admin(actor_id)?;
    self.ledger.list_accounts().await
  }

  fn ensure_admin(&self, actor_id: UserId) -> EscrowResult<()> {
    if !self.admin_ids.contains(&actor_id) {
      return Err(EscrowError::Unauthorized(format!(
        "user {actor_id} is not an administrator"
      )));
    }
    Ok(())
  }

  async fn notify_best_effort(&self, recipient: UserId, text: String) {
    if let Err(e) = self.notifier.notify(recipient, &text).await {
      warn!(recipient, error = %e, "Failed to deliver notification");
    }
  }
}
