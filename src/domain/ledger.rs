//! Ledger entities: accounts and their append-only transaction log.
//!
//! An account's balance and its transaction history are one unit: every
//! balance mutation appends exactly one transaction recording the same
//! signed delta, inside the same store critical section. The invariant
//! `balance == Σ transaction.amount` holds at all times.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::deal::UserId;

/// Rating assigned on every completed deal. There is no path for a
/// counterparty-submitted score; completion always records top marks.
pub const COMPLETION_RATING: f64 = 5.0;

/// What kind of balance movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// User-initiated top-up.
    Deposit,
    /// User-initiated payout request (fulfilled manually by the admin).
    Withdrawal,
    /// Privileged correction by the admin.
    AdminAdjustment,
    /// Settlement credit from a completed deal.
    Income,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::AdminAdjustment => "admin_adjustment",
            Self::Income => "income",
        };
        write!(f, "{s}")
    }
}

/// One append-only audit record of a balance movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id.
    pub id: Uuid,
    /// Account this transaction belongs to.
    pub user_id: UserId,
    /// Signed delta applied to the balance.
    pub amount: Decimal,
    /// Movement category.
    pub kind: TransactionKind,
    /// Human-readable context (e.g. which deal settled).
    pub description: String,
    /// When the movement committed.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new transaction record with a fresh id.
    pub fn new(
        user_id: UserId,
        amount: Decimal,
        kind: TransactionKind,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind,
            description,
            created_at: Utc::now(),
        }
    }
}

/// A user's escrow account. Created lazily on first interaction,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Transport-supplied numeric identity.
    pub user_id: UserId,
    /// Display name last seen from the transport.
    pub display_name: String,
    /// Current balance; always equals the sum of the transaction log.
    pub balance: Decimal,
    /// Running-average rating in 0.0–5.0.
    pub rating: f64,
    /// Number of deals settled as seller.
    pub completed_deals: u32,
    /// Frozen accounts are rejected from deposits, withdrawals, new
    /// listings, and claims. In-flight deals may still advance.
    pub is_frozen: bool,
}

impl Account {
    /// Fresh account with a zero balance and a default top rating.
    pub fn new(user_id: UserId, display_name: String) -> Self {
        Self {
            user_id,
            display_name,
            balance: Decimal::ZERO,
            rating: COMPLETION_RATING,
            completed_deals: 0,
            is_frozen: false,
        }
    }
}
