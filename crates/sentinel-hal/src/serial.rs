//! The TTC serial transport.
//!
//! The watchdog never talks to the UART directly; it sends frames through a
//! [`SerialTransport`] and learns about uplink traffic from the transport's
//! receive stream.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sentinel_types::SentinelError;

/// Time a driver waits between tearing the transport down and bringing it
/// back up during [`SerialTransport::reinit`].
pub const REINIT_SETTLE: Duration = Duration::from_millis(100);

/// Notification that bytes arrived on the uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxEvent {
    pub bytes: Vec<u8>,
}

/// Every TTC transport must implement this trait.
///
/// # Contract
///
/// * `send` – transmit one frame; completes when the frame has been handed
///   to the hardware or the transmit timeout expires.
/// * `reinit` – de-initialise, wait [`REINIT_SETTLE`], re-initialise and
///   restart reception.
/// * `rx_stream` – a live stream of inbound receive notifications.  Each
///   call returns an independent stream that survives `reinit`.
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Transmit `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Transport`] if the frame could not be sent.
    async fn send(&self, frame: &[u8]) -> Result<(), SentinelError>;

    /// Restart the link.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Transport`] if the peripheral did not come
    /// back up.
    async fn reinit(&self) -> Result<(), SentinelError>;

    /// Subscribe to inbound traffic.
    fn rx_stream(&self) -> BoxStream<'static, RxEvent>;
}
