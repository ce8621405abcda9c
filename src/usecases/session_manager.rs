//! Session Manager - Pending Multi-Step Flow State
//!
//! Holds one pending flow per actor in a dedicated store instead of
//! rebinding next-input callbacks per request. Starting a new flow
//! replaces the previous one, an advance against the wrong flow kind
//! is rejected rather than merged, and idle flows expire.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::deal::UserId;
use crate::domain::error::{EscrowError, EscrowResult};
use crate::domain::flow::{FlowKind, FlowProgress, FlowPrompt, PendingFlow};

/// Per-actor pending-flow store with expiry.
pub struct SessionManager {
  flows: RwLock<HashMap<UserId, PendingFlow>>,
  ttl_seconds: i64,
}

impl SessionManager {
  /// Create a session manager with the configured flow time-to-live.
  pub fn new(ttl_seconds: i64) -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
      ttl_seconds,
    }
  }

  /// Start a flow for an actor, returning the first prompt.
  ///
  /// Any flow already pending for the actor is dropped: an explicit
  /// new command is the one way to abandon an unfinished flow, and
  /// its collected fields must never leak into the new one.
  pub async fn begin(&self, actor_id: UserId, kind: FlowKind) -> FlowPrompt {
    let flow = PendingFlow::begin(actor_id, kind, self.ttl_seconds);
    let prompt = flow.current_prompt();

    let mut flows = self.flows.write().await;
    if let Some(previous) = flows.insert(actor_id, flow) {
      debug!(
        actor_id,
        previous = previous.kind.name(),
        started = kind.name(),
        "Replaced pending flow"
      );
    }
    prompt
  }

  /// Validate and advance the actor's pending flow by one message.
  ///
  /// The caller names the flow kind it believes is active; a mismatch
  /// with the stored flow is an error, never a silent merge. Expired
  /// flows are removed and reported.
  pub async fn advance(
    &self,
    actor_id: UserId,
    kind: FlowKind,
    input: &str,
  ) -> EscrowResult<FlowProgress> {
    let mut flows = self.flows.write().await;

    let flow = flows
      .get_mut(&actor_id)
      .ok_or(EscrowError::FlowMissing(kind.name()))?;

    if flow.is_expired() {
      flows.remove(&actor_id);
      return Err(EscrowError::FlowExpired);
    }
    if flow.kind != kind {
      return Err(EscrowError::FlowMissing(kind.name()));
    }

    let progress = flow.advance(input)?;
    if matches!(progress, FlowProgress::Complete(_)) {
      flows.remove(&actor_id);
    }
    Ok(progress)
  }

  /// Abandon the actor's pending flow, if any. Returns whether one
  /// existed.
  pub async fn cancel(&self, actor_id: UserId) -> bool {
    self.flows.write().await.remove(&actor_id).is_some()
  }

  /// The kind of the actor's pending flow, if one is live.
  pub async fn pending_kind(&self, actor_id: UserId) -> Option<FlowKind> {
    let flows = self.flows.read().await;
    flows
      .get(&actor_id)
      .filter(|f| !f.is_expired())
      .map(|f| f.kind)
  }

  /// Sweep expired flows. Returns how many were dropped.
  pub async fn purge_expired(&self) -> usize {
    let mut flows = self.flows.write().await;
    let before = flows.len();
    flows.retain(|_, flow| !flow.is_expired());
    let dropped = before - flows.len();
    if dropped > 0 {
      info!(dropped, "Purged expired flows");
    }
    dropped
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::flow::FlowCommand;
  use rust_decimal_macros::dec;

  #[tokio::test]
  async fn test_begin_and_complete_deposit() {
    let sessions = SessionManager::new(600);
    let prompt = sessions.begin(10, FlowKind::Deposit).await;
    assert_eq!(prompt, FlowPrompt::Amount);

    let progress = sessions.advance(10, FlowKind::Deposit, "250").await.unwrap();
    assert_eq!(
      progress,
      FlowProgress::Complete(FlowCommand::Deposit { amount: dec!(250) })
    );

    // Completed flows are gone.
    assert!(sessions.pending_kind(10).await.is_none());
  }

  #[tokio::test]
  async fn test_new_flow_replaces_old_without_leaking_fields() {
    let sessions = SessionManager::new(600);
    sessions.begin(10, FlowKind::CreateDeal).await;
    sessions
      .advance(10, FlowKind::CreateDeal, "VintageBadge")
      .await
      .unwrap();

    // Actor abandons the listing mid-way and starts a deposit.
    sessions.begin(10, FlowKind::Deposit).await;
    let progress = sessions.advance(10, FlowKind::Deposit, "90").await.unwrap();
    assert_eq!(
      progress,
      FlowProgress::Complete(FlowCommand::Deposit { amount: dec!(90) })
    );
  }

  #[tokio::test]
  async fn test_kind_mismatch_is_rejected_not_merged() {
    let sessions = SessionManager::new(600);
    sessions.begin(10, FlowKind::CreateDeal).await;

    let err = sessions
      .advance(10, FlowKind::Withdraw, "100")
      .await
      .unwrap_err();
    assert_eq!(err, EscrowError::FlowMissing("withdraw"));

    // The original flow is still live and untouched.
    assert_eq!(sessions.pending_kind(10).await, Some(FlowKind::CreateDeal));
  }

  #[tokio::test]
  async fn test_advance_without_flow() {
    let sessions = SessionManager::new(600);
    let err = sessions
      .advance(10, FlowKind::Deposit, "100")
      .await
      .unwrap_err();
    assert_eq!(err, EscrowError::FlowMissing("deposit"));
  }

  #[tokio::test]
  async fn test_expired_flow_is_dropped() {
    let sessions = SessionManager::new(0);
    sessions.begin(10, FlowKind::Deposit).await;

    let err = sessions
      .advance(10, FlowKind::Deposit, "100")
      .await
      .unwrap_err();
    assert_eq!(err, EscrowError::FlowExpired);
    assert!(sessions.pending_kind(10).await.is_none());
  }

  #[tokio::test]
  async fn test_purge_expired() {
    let sessions = SessionManager::new(0);
    sessions.begin(1, FlowKind::Deposit).await;
    sessions.begin(2, FlowKind::Withdraw).await;
    assert_eq!(sessions.purge_expired().await, 2);
  }

  #[tokio::test]
  async fn test_flows_are_isolated_per_actor() {
    let sessions = SessionManager::new(600);
    sessions.begin(1, FlowKind::Deposit).await;
    sessions.begin(2, FlowKind::Withdraw).await;

    sessions.advance(1, FlowKind::Deposit, "10").await.unwrap();
    let progress = sessions.advance(2, FlowKind::Withdraw, "20").await.unwrap();
    assert_eq!(
      progress,
      FlowProgress::Complete(FlowCommand::Withdraw { amount: dec!(20) })
    );
  }
}
