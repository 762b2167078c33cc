//! Status indication: discrete indicator lines and the addressable RGB
//! indicator.  Write-only from the watchdog's point of view.

use sentinel_types::{IndicatorId, Rgb};

/// Receiver of indicator state changes.
pub trait IndicatorSink: Send + Sync {
    /// Turn indicator `id` steadily on or off.
    fn set_indicator(&self, id: IndicatorId, on: bool);

    /// Blink indicator `id` with the given half-period; `0` stops blinking.
    fn set_indicator_blink(&self, id: IndicatorId, interval_ms: u32);

    /// Set every pixel of the RGB indicator to `color`.
    fn set_color(&self, color: Rgb);
}
