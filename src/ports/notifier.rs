//! Notifier Port - Best-Effort Outbound Messages
//!
//! The escrow core informs counterparties and the admin through this
//! capability. Delivery is fire-and-forget: the services catch and log
//! failures, and a committed state transition is never rolled back
//! because a recipient was unreachable.

use async_trait::async_trait;

use crate::domain::deal::UserId;

/// Outbound message capability provided by the chat transport.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  /// Deliver `text` to the recipient. Errors are advisory only — the
  /// caller logs and moves on.
  async fn notify(&self, recipient: UserId, text: &str) -> anyhow::Result<()>;
}
