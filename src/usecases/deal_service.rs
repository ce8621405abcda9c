//! Deal Service - The Escrow State Machine
//!
//! Owns transition legality, actor authorization, and the orchestration
//! of ledger and rating side effects:
//! - claim is a compare-and-set: of concurrent claims exactly one wins
//! - completion settles the seller (income credit + rating update)
//! - counterparty/admin notifications are fire-and-forget and never
//!   roll back a committed transition
//!
//! Transitions: WaitingBuyer → WaitingPayment → WaitingGift → Completed,
//! with Cancelled and Dispute reachable from any non-terminal state.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::deal::{Deal, DealEvent, DealEventKind, DealId, DealStatus, UserId};
use crate::domain::error::{EscrowError, EscrowResult};
use crate::domain::flow::MAX_GIFT_NAME_LEN;
use crate::domain::ledger::COMPLETION_RATING;
use crate::ports::notifier::Notifier;
use crate::ports::repository::Repository;
use crate::ports::store::{DealStore, LedgerStore};
use crate::usecases::balance_engine::BalanceEngine;

/// Capacity of the state-changed event channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// The escrow deal state machine and its side-effect orchestration.
pub struct DealService<S, L, R, N>
where
  S: DealStore,
  L: LedgerStore,
  R: Repository,
  N: Notifier,
{
  deals: Arc<S>,
  ledger: Arc<L>,
  balance: Arc<BalanceEngine<L, R, N>>,
  notifier: Arc<N>,
  events: broadcast::Sender<DealEvent>,
  /// Recipient of operational notices (paid deals, disputes).
  admin_recipient: Option<UserId>,
  min_price: Decimal,
  max_price: Decimal,
}

impl<S, L, R, N> DealService<S, L, R, N>
where
  S: DealStore,
  L: LedgerStore,
  R: Repository,
  N: Notifier,
{
  /// Create a new deal service.
  pub fn new(
    deals: Arc<S>,
    ledger: Arc<L>,
    balance: Arc<BalanceEngine<L, R, N>>,
    notifier: Arc<N>,
    config: &AppConfig,
  ) -> Self {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    Self {
      deals,
      ledger,
      balance,
      notifier,
      events,
      admin_recipient: config.admin.notify_recipient(),
      min_price: Decimal::from_f64_retain(config.deals.min_price)
        .unwrap_or(Decimal::ONE),
      max_price: Decimal::from_f64_retain(config.deals.max_price)
        .unwrap_or(Decimal::MAX),
    }
  }

  /// Subscribe to state-changed events.
  pub fn subscribe(&self) -> broadcast::Receiver<DealEvent> {
    self.events.subscribe()
  }

  /// List a gift for sale. The price is a structured amount captured
  /// here once — settlement never parses text.
  pub async fn create_deal(
    &self,
    seller_id: UserId,
    seller_display_name: &str,
    gift_name: &str,
    price: Decimal,
  ) -> EscrowResult<Deal> {
    let gift_name = gift_name.trim();
    if gift_name.is_empty() {
      return Err(EscrowError::Validation("gift name must not be empty".into()));
    }
    if gift_name.len() > MAX_GIFT_NAME_LEN {
      return Err(EscrowError::Validation(format!(
        "gift name longer than {MAX_GIFT_NAME_LEN} characters"
      )));
    }
    if price < self.min_price || price > self.max_price {
      return Err(EscrowError::Validation(format!(
        "price must be between {} and {}, got {price}",
        self.min_price, self.max_price
      )));
    }

    let seller = self
      .ledger
      .get_or_create_account(seller_id, seller_display_name)
      .await?;
    if seller.is_frozen {
      return Err(EscrowError::AccountFrozen(seller_id));
    }

    let deal = Deal::new_listing(
      seller_id,
      seller_display_name.to_string(),
      gift_name.to_string(),
      price,
    );
    let deal = self.deals.insert_deal(deal).await?;

    info!(deal_id = deal.id, seller_id, price = %price, "Deal listed");
    self.emit(DealEventKind::Created, seller_id, &deal);
    Ok(deal)
  }

  /// Bind a buyer to an open listing.
  ///
  /// Concurrent claims on the same deal yield exactly one winner; the
  /// losers observe `Conflict` against the committed claim.
  pub async fn claim(
    &self,
    deal_id: DealId,
    buyer_id: UserId,
    buyer_display_name: &str,
  ) -> EscrowResult<Deal> {
    let deal = self.deals.deal(deal_id).await?;
    if deal.seller_id == buyer_id {
      return Err(EscrowError::Validation(
        "sellers cannot claim their own listing".into(),
      ));
    }

    let buyer = self
      .ledger
      .get_or_create_account(buyer_id, buyer_display_name)
      .await?;
    if buyer.is_frozen {
      return Err(EscrowError::AccountFrozen(buyer_id));
    }

    let deal = self
      .deals
      .claim_deal(deal_id, buyer_id, buyer_display_name.to_string())
      .await?;

    info!(deal_id, buyer_id, "Deal claimed");
    self
      .notify_best_effort(
        deal.seller_id,
        format!(
          "Your gift has a buyer!\nGift: {}\nPrice: {:.2}\nBuyer: {buyer_display_name}\n\
           Awaiting the buyer's payment.",
          deal.gift_name, deal.price
        ),
      )
      .await;
    self.emit(DealEventKind::Claimed, buyer_id, &deal);
    Ok(deal)
  }

  /// Record the buyer's payment into escrow.
  ///
  /// Only the claiming buyer may mark a deal paid.
  pub async fn mark_paid(&self, deal_id: DealId, actor_id: UserId) -> EscrowResult<Deal> {
    let deal = self.deals.deal(deal_id).await?;
    self.ensure_buyer(&deal, actor_id, "mark_paid")?;

    let deal = self
      .deals
      .transition_deal(
        deal_id,
        &[DealStatus::WaitingPayment],
        DealStatus::WaitingGift,
        "mark_paid",
      )
      .await?;

    info!(deal_id, actor_id, "Deal marked paid");
    self
      .notify_best_effort(
        deal.seller_id,
        format!(
          "The buyer paid for your gift!\nGift: {}\nSend the gift, then ask the buyer \
           to confirm receipt.",
          deal.gift_name
        ),
      )
      .await;
    if let Some(admin) = self.admin_recipient {
      self
        .notify_best_effort(
          admin,
          format!("Deal #{deal_id} paid. Verify the incoming funds."),
        )
        .await;
    }
    self.emit(DealEventKind::Paid, actor_id, &deal);
    Ok(deal)
  }

  /// Buyer confirms receipt: complete the deal and settle the seller.
  ///
  /// Settlement credits the deal's structured price, appends an income
  /// transaction referencing the deal id, and folds a top rating into
  /// the seller's running average.
  pub async fn confirm_received(
    &self,
    deal_id: DealId,
    actor_id: UserId,
  ) -> EscrowResult<Deal> {
    let deal = self.deals.deal(deal_id).await?;
    self.ensure_buyer(&deal, actor_id, "confirm_received")?;

    let deal = self
      .deals
      .transition_deal(
        deal_id,
        &[DealStatus::WaitingGift],
        DealStatus::Completed,
        "confirm_received",
      )
      .await?;

    self
      .balance
      .credit_income(deal.seller_id, deal.price, deal.id)
      .await?;
    let seller = self
      .ledger
      .apply_rating(deal.seller_id, COMPLETION_RATING)
      .await?;

    info!(
      deal_id,
      seller_id = deal.seller_id,
      price = %deal.price,
      rating = seller.rating,
      "Deal completed and settled"
    );

    self
      .notify_best_effort(
        deal.seller_id,
        format!(
          "Deal complete!\nGift: {}\nPrice: {:.2}\nThe buyer confirmed receipt. \
           Funds are credited to your balance and your rating improved.",
          deal.gift_name, deal.price
        ),
      )
      .await;
    if let Some(admin) = self.admin_recipient {
      self
        .notify_best_effort(admin, format!("Deal #{deal_id} completed."))
        .await;
    }
    self.emit(DealEventKind::Completed, actor_id, &deal);
    Ok(deal)
  }

  /// Abandon a deal. Either participant may cancel while the deal is
  /// not yet completed, cancelled, or disputed.
  pub async fn cancel(&self, deal_id: DealId, actor_id: UserId) -> EscrowResult<Deal> {
    let deal = self.deals.deal(deal_id).await?;
    self.ensure_participant(&deal, actor_id)?;

    let deal = self
      .deals
      .transition_deal(
        deal_id,
        &DealStatus::CANCELLABLE,
        DealStatus::Cancelled,
        "cancel",
      )
      .await?;

    info!(deal_id, actor_id, "Deal cancelled");
    if let Some(counterparty) = deal.counterparty(actor_id) {
      let role = if actor_id == deal.seller_id {
        "seller"
      } else {
        "buyer"
      };
      self
        .notify_best_effort(
          counterparty,
          format!(
            "Deal cancelled\nGift: {}\nThe {role} cancelled the deal.",
            deal.gift_name
          ),
        )
        .await;
    }
    self.emit(DealEventKind::Cancelled, actor_id, &deal);
    Ok(deal)
  }

  /// Open a dispute. The deal freezes for manual, out-of-band
  /// resolution by the admin; no resolution transition exists here.
  pub async fn open_dispute(&self, deal_id: DealId, actor_id: UserId) -> EscrowResult<Deal> {
    let deal = self.deals.deal(deal_id).await?;
    self.ensure_participant(&deal, actor_id)?;

    let deal = self
      .deals
      .transition_deal(
        deal_id,
        &DealStatus::DISPUTABLE,
        DealStatus::Dispute,
        "open_dispute",
      )
      .await?;

    info!(deal_id, actor_id, "Dispute opened");
    if let Some(counterparty) = deal.counterparty(actor_id) {
      let role = if actor_id == deal.seller_id {
        "seller"
      } else {
        "buyer"
      };
      self
        .notify_best_effort(
          counterparty,
          format!(
            "A dispute was opened\nGift: {}\nThe {role} opened a dispute. \
             The administrator will contact you.",
            deal.gift_name
          ),
        )
        .await;
    }
    if let Some(admin) = self.admin_recipient {
      self
        .notify_best_effort(
          admin,
          format!(
            "Dispute on deal #{deal_id}\nGift: {}\nPrice: {:.2}\nSeller: {}\nBuyer: {:?}\n\
             Opened by: {actor_id}",
            deal.gift_name, deal.price, deal.seller_id, deal.buyer_id
          ),
        )
        .await;
    }
    self.emit(DealEventKind::Disputed, actor_id, &deal);
    Ok(deal)
  }

  /// Fetch one deal.
  pub async fn deal(&self, deal_id: DealId) -> EscrowResult<Deal> {
    self.deals.deal(deal_id).await
  }

  /// All deals currently in `status`, oldest first.
  pub async fn deals_by_status(&self, status: DealStatus) -> EscrowResult<Vec<Deal>> {
    self.deals.deals_by_status(status).await
  }

  /// All deals where the user participates, as seller or buyer.
  pub async fn deals_for(&self, user_id: UserId) -> EscrowResult<Vec<Deal>> {
    self.deals.deals_for(user_id).await
  }

  fn ensure_participant(&self, deal: &Deal, actor_id: UserId) -> EscrowResult<()> {
    if !deal.is_participant(actor_id) {
      return Err(EscrowError::Unauthorized(format!(
        "user {actor_id} is not a participant of deal #{}",
        deal.id
      )));
    }
    Ok(())
  }

  fn ensure_buyer(
    &self,
    deal: &Deal,
    actor_id: UserId,
    attempted: &'static str,
  ) -> EscrowResult<()> {
    let Some(buyer_id) = deal.buyer_id else {
      // Unclaimed deals have no buyer yet; the status is the problem.
      return Err(EscrowError::Conflict {
        deal_id: deal.id,
        actual: deal.status,
        attempted,
      });
    };
    if actor_id != buyer_id {
      return Err(EscrowError::Unauthorized(format!(
        "only the buyer may {attempted} deal #{}",
        deal.id
      )));
    }
    Ok(())
  }

  fn emit(&self, kind: DealEventKind, actor_id: UserId, deal: &Deal) {
    // Send only fails when nobody subscribes, which is fine.
    let _ = self.events.send(DealEvent {
      kind,
      actor_id,
      deal: deal.clone(),
    });
  }

  async fn notify_best_effort(&self, recipient: UserId, text: String) {
    if let Err(e) = self.notifier.notify(recipient, &text).await {
      warn!(recipient, error = %e, "Failed to deliver notification");
    }
  }
}
