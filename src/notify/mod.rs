pub mod telegram;

use async_trait::async_trait;

use crate::error::DeliveryError;

pub use telegram::TelegramNotifier;

/// Outbound transport for rendered digest messages.
///
/// `Ok(())` means the destination confirmed delivery; only then may the
/// message's items be committed as sent.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;

    /// Human-readable destination (channel id), used in the digest footer.
    fn destination(&self) -> &str;
}
