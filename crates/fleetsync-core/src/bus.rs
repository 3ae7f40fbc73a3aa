// ── Fleet event bus ──
//
// In-process broadcast of printer telegrams and fleet notices. Each
// consumer (event cache, file cache, floor store) runs in its own bridge
// task with its own receiver, so a slow consumer only lags itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{PrinterTelegram, PrintersDeleted};

/// One message on the bus.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    Telegram(Arc<PrinterTelegram>),
    PrintersDeleted(Arc<PrintersDeleted>),
    /// Barrier: every bridge acknowledges once all earlier events are handled.
    Flush(mpsc::Sender<&'static str>),
}

/// Shapes accepted by [`EventBus::publish_raw`].
#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Deleted(PrintersDeleted),
    Telegram(PrinterTelegram),
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FleetEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Returns how many receivers got the telegram.
    pub fn publish_telegram(&self, telegram: PrinterTelegram) -> usize {
        self.send(FleetEvent::Telegram(Arc::new(telegram)))
    }

    pub fn publish_printers_deleted(&self, notice: PrintersDeleted) -> usize {
        self.send(FleetEvent::PrintersDeleted(Arc::new(notice)))
    }

    /// Parse one JSON message and publish it.
    ///
    /// Accepts either a telegram (`{printerId, event, payload}`) or a
    /// deletion notice (`{printerIds}`). Anything else is logged and
    /// skipped; returns whether something was published.
    pub fn publish_raw(&self, text: &str) -> bool {
        let message: WireMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "failed to parse bus message");
                return false;
            }
        };

        match message {
            WireMessage::Deleted(notice) => self.publish_printers_deleted(notice),
            WireMessage::Telegram(telegram) => self.publish_telegram(telegram),
        };
        true
    }

    pub(crate) fn send_flush(&self, ack: mpsc::Sender<&'static str>) -> usize {
        self.send(FleetEvent::Flush(ack))
    }

    fn send(&self, event: FleetEvent) -> usize {
        // No receivers just means nothing is bridged yet.
        self.tx.send(event).unwrap_or(0)
    }
}

// ── Bridges ──────────────────────────────────────────────────────────

/// A bus consumer driven by [`spawn_bridge`].
#[async_trait]
pub trait BusSubscriber: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn on_telegram(&self, _telegram: &PrinterTelegram) {}

    async fn on_printers_deleted(&self, _notice: &PrintersDeleted) {}

    /// Called after the receiver fell behind and `skipped` events were
    /// dropped. Deletion notices may be among them.
    async fn on_lagged(&self, _skipped: u64) {}
}

/// Pump bus events into `subscriber` until cancelled or the bus closes.
///
/// The receiver is passed in rather than created here so callers can
/// subscribe before anything is published.
pub fn spawn_bridge<S: BusSubscriber>(
    subscriber: Arc<S>,
    mut rx: broadcast::Receiver<FleetEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = subscriber.name();
        info!(bridge = name, "bus bridge started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = rx.recv() => {
                    match result {
                        Ok(FleetEvent::Telegram(telegram)) => {
                            subscriber.on_telegram(&telegram).await;
                        }
                        Ok(FleetEvent::PrintersDeleted(notice)) => {
                            subscriber.on_printers_deleted(&notice).await;
                        }
                        Ok(FleetEvent::Flush(ack)) => {
                            let _ = ack.send(name).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(bridge = name, skipped = n, "bus bridge lagged");
                            subscriber.on_lagged(n).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        info!(bridge = name, "bus bridge stopped");
    })
}
