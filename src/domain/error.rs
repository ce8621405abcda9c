//! Typed error taxonomy for escrow operations.
//!
//! Every service operation returns either an updated entity snapshot or
//! one of these variants. Validation and authorization failures reject
//! before any mutation; conflict losers observe the winner's committed
//! transition. Notification-delivery failures are deliberately NOT part
//! of this taxonomy — they are logged and swallowed.

use rust_decimal::Decimal;
use thiserror::Error;

use super::deal::{DealId, DealStatus, UserId};

/// Result alias used across services and stores.
pub type EscrowResult<T> = Result<T, EscrowError>;

/// Failure modes of the escrow core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Malformed or out-of-range input; rejected before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown deal id.
    #[error("deal #{0} not found")]
    DealNotFound(DealId),

    /// Unknown account id.
    #[error("account {0} not found")]
    AccountNotFound(UserId),

    /// A status precondition did not hold — e.g. the losing side of a
    /// double-claim, or a transition from a terminal state.
    #[error("deal #{deal_id} is {actual}, cannot {attempted}")]
    Conflict {
        deal_id: DealId,
        actual: DealStatus,
        attempted: &'static str,
    },

    /// The actor is not allowed to perform this operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Withdrawal larger than the available balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    /// The account is frozen and may not move funds or enter deals.
    #[error("account {0} is frozen")]
    AccountFrozen(UserId),

    /// No pending multi-step flow matches the inbound message.
    #[error("no active {0} flow for this user")]
    FlowMissing(&'static str),

    /// The pending flow sat idle past its expiry.
    #[error("the pending flow expired, start over")]
    FlowExpired,
}
