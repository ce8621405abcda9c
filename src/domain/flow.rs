//! Multi-step conversation flows.
//!
//! A flow is the explicit pending-state record behind interactions that
//! span several chat messages ("name the gift, then the price"). Each
//! inbound message validates and advances the record; nothing is held in
//! captured closures, so interleaved flows cannot bleed into each other.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::deal::UserId;
use super::error::{EscrowError, EscrowResult};

/// Longest accepted gift name.
pub const MAX_GIFT_NAME_LEN: usize = 100;

/// Which multi-step interaction a pending flow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Seller listing a gift: name, then price.
    CreateDeal,
    /// Top-up: amount.
    Deposit,
    /// Payout request: amount.
    Withdraw,
    /// Admin balance correction: target user, then signed amount.
    AdminAdjustBalance,
    /// Admin freeze toggle: target user.
    AdminToggleFreeze,
}

impl FlowKind {
    /// Short name used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateDeal => "create_deal",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::AdminAdjustBalance => "admin_adjust_balance",
            Self::AdminToggleFreeze => "admin_toggle_freeze",
        }
    }

    /// How many inputs the flow collects before completing.
    fn step_count(self) -> usize {
        match self {
            Self::CreateDeal | Self::AdminAdjustBalance => 2,
            Self::Deposit | Self::Withdraw | Self::AdminToggleFreeze => 1,
        }
    }
}

/// What the transport should ask the actor for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPrompt {
    GiftName,
    Price,
    Amount,
    TargetUser,
}

/// A fully collected flow, ready to be dispatched to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowCommand {
    CreateDeal { gift_name: String, price: Decimal },
    Deposit { amount: Decimal },
    Withdraw { amount: Decimal },
    AdminAdjustBalance { target: UserId, amount: Decimal },
    AdminToggleFreeze { target: UserId },
}

/// Outcome of advancing a pending flow by one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowProgress {
    /// More input needed; the transport should prompt for this field.
    NeedInput(FlowPrompt),
    /// All fields collected; dispatch the command.
    Complete(FlowCommand),
}

/// Per-conversation pending state: `{actor_id, kind, collected, expires_at}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingFlow {
    /// Actor this flow belongs to.
    pub actor_id: UserId,
    /// Which interaction is in progress.
    pub kind: FlowKind,
    /// Raw inputs collected so far, one per completed step.
    pub collected: Vec<String>,
    /// When this flow stops accepting input.
    pub expires_at: DateTime<Utc>,
}

impl PendingFlow {
    /// Start a flow for an actor with the given time-to-live.
    pub fn begin(actor_id: UserId, kind: FlowKind, ttl_secs: i64) -> Self {
        Self {
            actor_id,
            kind,
            collected: Vec::new(),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    /// Whether the flow sat idle past its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// The field the flow is currently waiting for.
    pub fn current_prompt(&self) -> FlowPrompt {
        match (self.kind, self.collected.len()) {
            (FlowKind::CreateDeal, 0) => FlowPrompt::GiftName,
            (FlowKind::CreateDeal, _) => FlowPrompt::Price,
            (FlowKind::Deposit | FlowKind::Withdraw, _) => FlowPrompt::Amount,
            (FlowKind::AdminAdjustBalance, 0) | (FlowKind::AdminToggleFreeze, _) => {
                FlowPrompt::TargetUser
            }
            (FlowKind::AdminAdjustBalance, _) => FlowPrompt::Amount,
        }
    }

    /// Validate one inbound message and advance the flow.
    ///
    /// Invalid input leaves the flow (and everything else) unchanged so
    /// the actor can simply re-send the field.
    pub fn advance(&mut self, input: &str) -> EscrowResult<FlowProgress> {
        self.validate_step(input)?;
        self.collected.push(input.trim().to_string());

        if self.collected.len() < self.kind.step_count() {
            return Ok(FlowProgress::NeedInput(self.current_prompt()));
        }
        Ok(FlowProgress::Complete(self.build_command()?))
    }

    fn validate_step(&self, input: &str) -> EscrowResult<()> {
        match self.current_prompt() {
            FlowPrompt::GiftName => {
                let name = input.trim();
                if name.is_empty() {
                    return Err(EscrowError::Validation("gift name must not be empty".into()));
                }
                if name.len() > MAX_GIFT_NAME_LEN {
                    return Err(EscrowError::Validation(format!(
                        "gift name longer than {MAX_GIFT_NAME_LEN} characters"
                    )));
                }
                Ok(())
            }
            FlowPrompt::Price => parse_positive_amount(input).map(|_| ()),
            FlowPrompt::Amount => {
                // Admin adjustments are the only signed amounts.
                if self.kind == FlowKind::AdminAdjustBalance {
                    parse_signed_amount(input).map(|_| ())
                } else {
                    parse_positive_amount(input).map(|_| ())
                }
            }
            FlowPrompt::TargetUser => parse_user_id(input).map(|_| ()),
        }
    }

    fn build_command(&self) -> EscrowResult<FlowCommand> {
        match self.kind {
            FlowKind::CreateDeal => Ok(FlowCommand::CreateDeal {
                gift_name: self.collected[0].clone(),
                price: parse_positive_amount(&self.collected[1])?,
            }),
            FlowKind::Deposit => Ok(FlowCommand::Deposit {
                amount: parse_positive_amount(&self.collected[0])?,
            }),
            FlowKind::Withdraw => Ok(FlowCommand::Withdraw {
                amount: parse_positive_amount(&self.collected[0])?,
            }),
            FlowKind::AdminAdjustBalance => Ok(FlowCommand::AdminAdjustBalance {
                target: parse_user_id(&self.collected[0])?,
                amount: parse_signed_amount(&self.collected[1])?,
            }),
            FlowKind::AdminToggleFreeze => Ok(FlowCommand::AdminToggleFreeze {
                target: parse_user_id(&self.collected[0])?,
            }),
        }
    }
}

/// Parse a strictly positive decimal amount from user text.
///
/// The settlement amount is structured from the moment it enters the
/// system — there is no digit-extraction fallback at settlement time.
pub fn parse_positive_amount(input: &str) -> EscrowResult<Decimal> {
    let amount = parse_signed_amount(input)?;
    if amount <= Decimal::ZERO {
        return Err(EscrowError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(amount)
}

/// Parse a non-zero signed decimal amount from user text.
pub fn parse_signed_amount(input: &str) -> EscrowResult<Decimal> {
    let amount: Decimal = input
        .trim()
        .parse()
        .map_err(|_| EscrowError::Validation(format!("not a valid amount: {input:?}")))?;
    if amount.is_zero() {
        return Err(EscrowError::Validation("amount must not be zero".into()));
    }
    Ok(amount)
}

/// Parse a numeric user id from user text.
pub fn parse_user_id(input: &str) -> EscrowResult<UserId> {
    input
        .trim()
        .parse()
        .map_err(|_| EscrowError::Validation(format!("not a valid user id: {input:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_deal_flow_two_steps() {
        let mut flow = PendingFlow::begin(10, FlowKind::CreateDeal, 600);
        assert_eq!(flow.current_prompt(), FlowPrompt::GiftName);

        let progress = flow.advance("VintageBadge").unwrap();
        assert_eq!(progress, FlowProgress::NeedInput(FlowPrompt::Price));

        let progress = flow.advance("500.00").unwrap();
        assert_eq!(
            progress,
            FlowProgress::Complete(FlowCommand::CreateDeal {
                gift_name: "VintageBadge".to_string(),
                price: dec!(500.00),
            })
        );
    }

    #[test]
    fn test_bad_price_leaves_flow_intact() {
        let mut flow = PendingFlow::begin(10, FlowKind::CreateDeal, 600);
        flow.advance("VintageBadge").unwrap();

        assert!(flow.advance("five hundred").is_err());
        assert!(flow.advance("-3").is_err());
        assert_eq!(flow.collected.len(), 1);

        // A corrected re-send still completes.
        assert!(matches!(
            flow.advance("500").unwrap(),
            FlowProgress::Complete(_)
        ));
    }

    #[test]
    fn test_withdraw_flow_single_step() {
        let mut flow = PendingFlow::begin(10, FlowKind::Withdraw, 600);
        assert_eq!(flow.current_prompt(), FlowPrompt::Amount);
        let progress = flow.advance(" 120.50 ").unwrap();
        assert_eq!(
            progress,
            FlowProgress::Complete(FlowCommand::Withdraw {
                amount: dec!(120.50)
            })
        );
    }

    #[test]
    fn test_admin_adjust_allows_negative_amount() {
        let mut flow = PendingFlow::begin(1, FlowKind::AdminAdjustBalance, 600);
        flow.advance("42").unwrap();
        let progress = flow.advance("-75").unwrap();
        assert_eq!(
            progress,
            FlowProgress::Complete(FlowCommand::AdminAdjustBalance {
                target: 42,
                amount: dec!(-75),
            })
        );
    }

    #[test]
    fn test_zero_amount_rejected_everywhere() {
        assert!(parse_positive_amount("0").is_err());
        assert!(parse_signed_amount("0.00").is_err());
    }

    #[test]
    fn test_expiry() {
        let mut flow = PendingFlow::begin(10, FlowKind::Deposit, 600);
        assert!(!flow.is_expired());
        flow.expires_at = Utc::now() - Duration::seconds(1);
        assert!(flow.is_expired());
    }
}
