//! Broadcast event bus
//!
//! Single fan-out channel for lifecycle events. Publishers never block and
//! never observe subscriber failures; each subscriber owns a receiver and
//! processes the stream at its own pace. A subscriber that falls behind the
//! channel capacity loses the oldest events and logs the lag.

use shared::LifecycleEvent;
use tokio::sync::broadcast;

pub struct EventBus {
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Subscribe to the lifecycle event stream
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    /// Publish an event; fire-and-forget.
    ///
    /// A send error only means no subscriber is currently listening, which
    /// is normal during startup and shutdown.
    pub fn publish(&self, event: LifecycleEvent) {
        let name = event.name();
        match self.event_tx.send(event) {
            Ok(receivers) => {
                tracing::debug!("event published: {} -> {} receiver(s)", name, receivers);
            }
            Err(_) => {
                tracing::debug!("event dropped (no subscribers): {}", name);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
