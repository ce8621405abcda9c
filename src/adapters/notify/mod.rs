//! Notifier Adapters - Outbound Message Delivery
//!
//! Implementations of the `Notifier` port. The real chat transport
//! plugs in its own; the crate ships a tracing-backed notifier for
//! headless operation and a channel-backed one that bridges messages
//! to whatever task drains the receiver (also handy in tests).

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::deal::UserId;
use crate::ports::notifier::Notifier;

/// Notifier that logs every message instead of delivering it.
///
/// Used when the service runs without a chat transport attached.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient: UserId, text: &str) -> anyhow::Result<()> {
        info!(recipient, text, "Outbound notification");
        Ok(())
    }
}

/// A message handed to the transport bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: UserId,
    pub text: String,
}

/// Notifier that forwards messages over an mpsc channel.
///
/// The transport (or a test) drains the receiver. A full or closed
/// channel is a delivery failure, which callers treat as best-effort.
pub struct ChannelNotifier {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the bridge should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, recipient: UserId, text: &str) -> anyhow::Result<()> {
        self.tx
            .send(OutboundMessage {
                recipient,
                text: text.to_string(),
            })
            .await
            .map_err(|_| anyhow::anyhow!("notification channel closed"))
    }
}
