//! In-process event bus backed by a tokio broadcast channel.
//!
//! The orchestrator publishes what it does here so that a status surface,
//! a log shipper or a test can follow along without touching its state.

use std::time::Duration;

use tokio::sync::broadcast;

use signage_domain::id::{PairingCode, VersionToken};
use signage_domain::queue::StableKey;
use signage_domain::settings::Region;

use crate::automation_engine::AutomationChange;
use crate::orchestrator::Mode;

/// How the terminal currently hears about configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Live channel open.
    Live,
    /// Live channel lost, reconnect scheduled.
    Retrying { attempt: u32, delay: Duration },
    /// Live channel given up, polling instead.
    Polling,
    /// The last fetch failed.
    Offline,
}

/// Something the orchestrator did.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    Connectivity(Connectivity),
    Committed { version: VersionToken },
    AutomationChanged(AutomationChange),
    SlideShown { region: Region, key: StableKey },
    ModeChanged(Mode),
    PairingCode(PairingCode),
}

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Clones publish to the same channel.
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: OrchestratorEvent) {
        // fails only without receivers
        let _ = self.sender.send(event);
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(version: &str) -> OrchestratorEvent {
        OrchestratorEvent::Committed {
            version: VersionToken::new(version),
        }
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(committed("v1"));

        assert_eq!(rx.recv().await.unwrap(), committed("v1"));
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers_through_clones() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.clone()
            .publish(OrchestratorEvent::Connectivity(Connectivity::Polling));

        let expected = OrchestratorEvent::Connectivity(Connectivity::Polling);
        assert_eq!(rx1.recv().await.unwrap(), expected);
        assert_eq!(rx2.recv().await.unwrap(), expected);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::default();
        bus.publish(committed("v1"));
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(committed("v1"));

        let mut rx = bus.subscribe();
        bus.publish(committed("v2"));

        assert_eq!(rx.recv().await.unwrap(), committed("v2"));
    }
}
