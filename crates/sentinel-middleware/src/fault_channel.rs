//! Bounded fault-event channel.
//!
//! Many producers (heartbeat monitor, classifier driver, TTC link monitor)
//! push [`FaultReport`]s; exactly one consumer (the fault dispatcher) drains
//! them in FIFO order.
//!
//! Producers never block: when the channel already holds
//! [`FAULT_CHANNEL_CAPACITY`] reports the *newest* report is dropped and the
//! drop is counted.  The consumer blocks until a report is available.
//!
//! Built on [`tokio::sync::mpsc`], whose bounded `try_send` gives exactly the
//! drop-newest semantics required here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sentinel_types::FaultReport;
use tokio::sync::mpsc;
use tracing::warn;

/// Number of reports buffered before producers start dropping.
pub const FAULT_CHANNEL_CAPACITY: usize = 10;

/// Outcome of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The report was queued.
    Queued,
    /// The channel was full; the report was discarded.
    DroppedFull,
    /// The consumer is gone; the report was discarded.
    Closed,
}

#[derive(Debug, Default)]
struct ChannelStats {
    queued: AtomicU64,
    dropped: AtomicU64,
}

/// Create a fault channel with the standard capacity.
pub fn fault_channel() -> (FaultSender, FaultReceiver) {
    fault_channel_with_capacity(FAULT_CHANNEL_CAPACITY)
}

/// Create a fault channel with an explicit capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero (as [`mpsc::channel`] does).
pub fn fault_channel_with_capacity(capacity: usize) -> (FaultSender, FaultReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(ChannelStats::default());
    (
        FaultSender {
            tx,
            stats: Arc::clone(&stats),
        },
        FaultReceiver { rx, stats },
    )
}

/// Producer handle.  Clone it once per producing task.
#[derive(Debug, Clone)]
pub struct FaultSender {
    tx: mpsc::Sender<FaultReport>,
    stats: Arc<ChannelStats>,
}

impl FaultSender {
    /// Push `report` without waiting.
    pub fn try_push(&self, report: FaultReport) -> PushOutcome {
        match self.tx.try_send(report) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = %dropped.kind(),
                    tick_ms = dropped.timestamp_ms(),
                    "fault channel full; report dropped"
                );
                PushOutcome::DroppedFull
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind = %dropped.kind(), "fault channel closed; report dropped");
                PushOutcome::Closed
            }
        }
    }

    /// Total reports accepted into the channel so far.
    pub fn queued_count(&self) -> u64 {
        self.stats.queued.load(Ordering::Relaxed)
    }

    /// Total reports discarded so far (full or closed).
    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

/// The single consumer handle.  Not cloneable.
#[derive(Debug)]
pub struct FaultReceiver {
    rx: mpsc::Receiver<FaultReport>,
    stats: Arc<ChannelStats>,
}

impl FaultReceiver {
    /// Wait for the next report.
    ///
    /// Returns `None` only once every [`FaultSender`] has been dropped and the
    /// buffer is empty.
    pub async fn recv(&mut self) -> Option<FaultReport> {
        self.rx.recv().await
    }

    /// Take a report if one is already buffered.
    pub fn try_recv(&mut self) -> Option<FaultReport> {
        self.rx.try_recv().ok()
    }

    /// Number of reports currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Total reports discarded by producers so far.
    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_types::FaultKind;

    fn report(tick: u64) -> FaultReport {
        FaultReport::new(FaultKind::TtcTimeout, 0.9, tick)
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (tx, mut rx) = fault_channel();
        for tick in 0..3 {
            assert_eq!(tx.try_push(report(tick)), PushOutcome::Queued);
        }
        for tick in 0..3 {
            assert_eq!(rx.recv().await.map(|r| r.timestamp_ms()), Some(tick));
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn full_channel_drops_newest() {
        let (tx, mut rx) = fault_channel();
        for tick in 0..FAULT_CHANNEL_CAPACITY as u64 {
            assert_eq!(tx.try_push(report(tick)), PushOutcome::Queued);
        }
        assert_eq!(tx.try_push(report(99)), PushOutcome::DroppedFull);
        assert_eq!(tx.dropped_count(), 1);
        assert_eq!(rx.len(), FAULT_CHANNEL_CAPACITY);

        // The oldest report is still at the head; 99 never made it in.
        let drained: Vec<u64> = std::iter::from_fn(|| rx.try_recv())
            .map(|r| r.timestamp_ms())
            .collect();
        assert_eq!(drained, (0..FAULT_CHANNEL_CAPACITY as u64).collect::<Vec<_>>());
    }

    #[test]
    fn push_after_consumer_drop_reports_closed() {
        let (tx, rx) = fault_channel();
        drop(rx);
        assert_eq!(tx.try_push(report(1)), PushOutcome::Closed);
    }

    #[tokio::test]
    async fn recv_returns_none_when_all_senders_gone() {
        let (tx, mut rx) = fault_channel();
        let tx2 = tx.clone();
        tx2.try_push(report(5));
        drop(tx);
        drop(tx2);
        assert_eq!(rx.recv().await.map(|r| r.timestamp_ms()), Some(5));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_blocks_until_report_arrives() {
        let (tx, mut rx) = fault_channel();
        let consumer = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert!(!consumer.is_finished());
        tx.try_push(report(30_000));
        let got = consumer.await.unwrap();
        assert_eq!(got.map(|r| r.timestamp_ms()), Some(30_000));
    }
}
