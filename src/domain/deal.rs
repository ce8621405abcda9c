//! Core escrow deal types.
//!
//! Defines the deal entity, its status enum, and the legal transition
//! graph. These types are the foundation of the hexagonal architecture's
//! inner ring: no I/O, no locking, just rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable numeric actor identity supplied by the chat transport.
pub type UserId = i64;

/// Sequential deal identifier assigned by the deal store.
pub type DealId = i64;

/// Lifecycle status of an escrow deal.
///
/// The graph is linear with two escape hatches:
/// `WaitingBuyer → WaitingPayment → WaitingGift → Completed`, with
/// `Cancelled` and `Dispute` reachable from any non-terminal state.
/// `Dispute` is terminal here; resolution happens out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Listed by the seller, open for any buyer to claim.
    WaitingBuyer,
    /// Claimed; escrow is waiting for the buyer's payment.
    WaitingPayment,
    /// Payment recorded; waiting for the seller to hand over the gift.
    WaitingGift,
    /// Buyer confirmed receipt; seller has been settled.
    Completed,
    /// Abandoned by a participant.
    Cancelled,
    /// A participant opened a dispute; frozen for manual handling.
    Dispute,
}

impl DealStatus {
    /// Whether no further transition may leave this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Dispute)
    }

    /// The statuses from which `cancel` is legal.
    pub const CANCELLABLE: [Self; 3] =
        [Self::WaitingBuyer, Self::WaitingPayment, Self::WaitingGift];

    /// The statuses from which `open_dispute` is legal.
    pub const DISPUTABLE: [Self; 3] =
        [Self::WaitingBuyer, Self::WaitingPayment, Self::WaitingGift];
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WaitingBuyer => "waiting_buyer",
            Self::WaitingPayment => "waiting_payment",
            Self::WaitingGift => "waiting_gift",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Dispute => "dispute",
        };
        write!(f, "{s}")
    }
}

/// An escrow deal between a seller and (once claimed) a buyer.
///
/// Invariants upheld by the deal service and store:
/// - `buyer_id.is_some()` exactly when `status != WaitingBuyer`
/// - `seller_id != buyer_id` once claimed
/// - `price` is a structured positive amount captured at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    /// Store-assigned identifier.
    pub id: DealId,
    /// Listing seller.
    pub seller_id: UserId,
    /// Seller display name as seen by the transport.
    pub seller_display_name: String,
    /// Buyer, set on claim.
    pub buyer_id: Option<UserId>,
    /// Buyer display name, set on claim.
    pub buyer_display_name: Option<String>,
    /// What is being sold.
    pub gift_name: String,
    /// Settlement amount credited to the seller on completion.
    pub price: Decimal,
    /// Current lifecycle status.
    pub status: DealStatus,
    /// When the listing was created.
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Create a fresh listing awaiting a buyer. The id is assigned by
    /// the store on insert.
    pub fn new_listing(
        seller_id: UserId,
        seller_display_name: String,
        gift_name: String,
        price: Decimal,
    ) -> Self {
        Self {
            id: 0,
            seller_id,
            seller_display_name,
            buyer_id: None,
            buyer_display_name: None,
            gift_name,
            price,
            status: DealStatus::WaitingBuyer,
            created_at: Utc::now(),
        }
    }

    /// Whether the given actor is a participant (seller or claimed buyer).
    pub fn is_participant(&self, actor: UserId) -> bool {
        self.seller_id == actor || self.buyer_id == Some(actor)
    }

    /// The participant on the other side of `actor`, if any.
    pub fn counterparty(&self, actor: UserId) -> Option<UserId> {
        if actor == self.seller_id {
            self.buyer_id
        } else {
            Some(self.seller_id)
        }
    }
}

/// What happened to a deal — broadcast to subscribers after each
/// committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealEventKind {
    Created,
    Claimed,
    Paid,
    Completed,
    Cancelled,
    Disputed,
}

/// State-changed event carrying the post-transition deal snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealEvent {
    /// Transition that just committed.
    pub kind: DealEventKind,
    /// Actor whose action caused the transition.
    pub actor_id: UserId,
    /// Deal snapshot after the transition.
    pub deal: Deal,
}
