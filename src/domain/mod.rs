//! Domain layer - Core escrow business logic and models.
//!
//! Pure domain logic for the gift escrow service. No external
//! dependencies allowed here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod deal;
pub mod error;
pub mod flow;
pub mod ledger;
pub mod rating;

// Re-export core types for convenience
pub use deal::{Deal, DealEvent, DealEventKind, DealId, DealStatus, UserId};
pub use error::{EscrowError, EscrowResult};
pub use flow::{FlowCommand, FlowKind, FlowProgress, FlowPrompt, PendingFlow};
pub use ledger::{Account, Transaction, TransactionKind, COMPLETION_RATING};
pub use rating::RatingEngine;
