//! Signals — everything that happens to the orchestrator arrives here.
//!
//! Timers and I/O tasks never touch orchestrator state. They report back
//! through the [`Inbox`], and the orchestrator applies signals one at a
//! time.

use tokio::sync::mpsc;

use signage_domain::push::{ConfigSnapshot, DeviceSnapshot};

use crate::live_channel::ChannelEvent;
use crate::pairing_flow::PairingEvent;
use crate::playback::SlideSignal;
use crate::reconciler::FetchTicket;

/// A unit of work for the orchestrator.
#[derive(Debug)]
pub enum Signal {
    /// Something happened on the live channel opened under `generation`.
    Channel { generation: u64, event: ChannelEvent },
    /// A global configuration fetch completed.
    Fetched {
        ticket: FetchTicket,
        snapshot: ConfigSnapshot,
    },
    /// A device resolution completed.
    DeviceResolved {
        ticket: FetchTicket,
        snapshot: DeviceSnapshot,
    },
    /// The server no longer knows this device.
    DeviceUnbound,
    /// A fetch failed with a transient error.
    FetchFailed,
    /// Progress of the pairing attempt started under `generation`.
    Pairing { generation: u64, event: PairingEvent },
    /// A region's slide or its timers asked for something.
    Slide(SlideSignal),
    /// The automation minute tick.
    AutomationTick,
}

/// Sending half of the orchestrator inbox.
#[derive(Debug, Clone)]
pub struct Inbox(mpsc::UnboundedSender<Signal>);

impl Inbox {
    /// Create an inbox and its receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self(sender), receiver)
    }

    /// Deliver a signal. Signals sent after the orchestrator stopped are dropped.
    pub fn send(&self, signal: Signal) {
        if self.0.send(signal).is_err() {
            tracing::trace!("orchestrator stopped, dropping signal");
        }
    }
}
