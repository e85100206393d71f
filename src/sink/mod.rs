//! Delivery of a single file to a single recipient.
//!
//! The engine only knows the [`DeliverySink`] trait; [`TelegramSink`] is the
//! transport the binary wires in.  Implementations must report ordinary
//! transport problems as [`DeliveryError`] rather than panicking, because
//! the engine keeps going with the next recipient.

mod telegram;

pub use telegram::TelegramSink;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::DeliveryError;
use crate::feed::RecipientId;

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Transmit `payload` as a document called `filename`, optionally with a
    /// caption.
    async fn send_document(
        &self,
        recipient: RecipientId,
        payload: Bytes,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;
}
