//! Indicator refresh: the lowest-priority task.  Follows the mode bus and
//! keeps the RGB status light on the current mode's colour.

use std::sync::Arc;

use sentinel_hal::IndicatorSink;
use sentinel_middleware::ModeSubscriber;
use sentinel_types::SystemMode;
use tracing::debug;

pub struct IndicatorRefresh {
    modes: ModeSubscriber,
    indicators: Arc<dyn IndicatorSink>,
}

impl IndicatorRefresh {
    pub fn new(modes: ModeSubscriber, indicators: Arc<dyn IndicatorSink>) -> Self {
        Self { modes, indicators }
    }

    fn show(&self, mode: SystemMode) {
        let color = mode.color();
        debug!(mode = %mode, r = color.r, g = color.g, b = color.b, "status colour");
        self.indicators.set_color(color);
    }

    pub async fn run(mut self) {
        while let Some(change) = self.modes.recv().await {
            self.show(change.to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_hal::sim::SimIndicators;
    use sentinel_kernel::ModeCell;
    use sentinel_middleware::ModeBus;
    use sentinel_types::Rgb;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn colour_follows_mode() {
        let bus = ModeBus::default();
        let panel = SimIndicators::new();
        let task = tokio::spawn(IndicatorRefresh::new(bus.subscribe(), panel.clone()).run());
        let cell = ModeCell::new(bus);

        cell.transition(SystemMode::Normal, 0);
        cell.transition(SystemMode::TtcFault, 10);
        cell.transition(SystemMode::ResetPending, 20);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            panel.color_history(),
            vec![Rgb::GREEN, Rgb::PURPLE, Rgb::ORANGE]
        );
        task.abort();
    }
}
