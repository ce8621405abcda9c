//! Repository Port - Durability Interface
//!
//! Defines traits for persisting escrow state using JSONL files.
//! No database dependency - lightweight append-only log format
//! optimized for audit trails and crash recovery.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::deal::{Deal, DealId, UserId};
use crate::domain::ledger::{Transaction, TransactionKind};

/// A single ledger movement for persistence and auditing.
///
/// Mirrors the in-store `Transaction` plus the balance that resulted,
/// so the journal can be audited without replaying from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
  /// Transaction id.
  pub id: String,
  /// Account the movement belongs to.
  pub user_id: UserId,
  /// Signed delta applied.
  pub amount: Decimal,
  /// Movement category.
  pub kind: TransactionKind,
  /// Human-readable context.
  pub description: String,
  /// Balance after the movement committed.
  pub balance_after: Decimal,
  /// Commit timestamp (Unix ms).
  pub timestamp_ms: i64,
}

impl LedgerRecord {
  /// Build a journal record from a committed transaction.
  pub fn from_committed(tx: &Transaction, balance_after: Decimal) -> Self {
    Self {
      id: tx.id.to_string(),
      user_id: tx.user_id,
      amount: tx.amount,
      kind: tx.kind,
      description: tx.description.clone(),
      balance_after,
      timestamp_ms: tx.created_at.timestamp_millis(),
    }
  }
}

/// Account row as persisted in snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRow {
  pub user_id: UserId,
  pub display_name: String,
  pub balance: Decimal,
  pub rating: f64,
  pub completed_deals: u32,
  pub is_frozen: bool,
  /// Full transaction history, oldest first.
  pub transactions: Vec<Transaction>,
}

/// Escrow state snapshot for crash recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowSnapshot {
  /// Version of the snapshot format.
  pub version: String,
  /// Timestamp of snapshot (Unix ms).
  pub timestamp_ms: i64,
  /// Every known deal.
  pub deals: Vec<Deal>,
  /// Every account with its transaction log.
  pub accounts: Vec<AccountRow>,
  /// Next deal id to assign after restore.
  pub next_deal_id: DealId,
}

/// Trait for durability providers.
///
/// Uses JSONL (JSON Lines) for the append-only ledger journal and a
/// single atomic JSON document for recovery snapshots. Each journal
/// line is a self-contained record, making it easy to parse, stream,
/// and recover from partial writes.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
  /// Append a committed ledger movement to the journal.
  async fn append_ledger_record(&self, record: &LedgerRecord) -> anyhow::Result<()>;

  /// Load the full journal (for audits and reconciliation).
  async fn load_ledger_records(&self) -> anyhow::Result<Vec<LedgerRecord>>;

  /// Save a state snapshot (for crash recovery).
  async fn save_snapshot(&self, snapshot: &EscrowSnapshot) -> anyhow::Result<()>;

  /// Load the most recent state snapshot.
  async fn load_latest_snapshot(&self) -> anyhow::Result<Option<EscrowSnapshot>>;

  /// Check if the repository is healthy (disk space, permissions).
  async fn is_healthy(&self) -> bool;
}
