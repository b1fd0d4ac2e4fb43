//! Tokio broadcast event bus for store notifications.

use crate::models::{EntityType, StoreEvent};
use tokio::sync::broadcast;

const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Central event bus for broadcasting [`StoreEvent`]s.
///
/// Publishing never blocks; events published with no subscriber are dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers (best effort).
    pub fn publish(&self, event: StoreEvent) {
        metrics::counter!("event_bus_publish_total", "type" => event.event_type()).increment(1);
        tracing::trace!(event_type = event.event_type(), entity = %event.entity(), "publish");
        if self.sender.send(event).is_err() {
            metrics::counter!("event_bus_publish_unobserved_total").increment(1);
        }
    }

    /// Subscribes to the event bus.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }
}

/// Drains every event currently queued on `receiver`.
///
/// Lagged notifications are skipped; the remaining events are returned in order.
#[must_use]
pub fn drain(receiver: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                metrics::counter!("event_bus_lagged_total").increment(skipped);
            },
            Err(_) => return events,
        }
    }
}

/// Counts `ReloadDataset` events for `entity` in `events`.
#[must_use]
pub fn reload_count(events: &[StoreEvent], entity: EntityType) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, StoreEvent::ReloadDataset { entity: en, .. } if *en == entity))
        .count()
}
