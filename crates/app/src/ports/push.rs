//! Push transport port — the server-sent live channel.

use std::fmt;
use std::future::Future;

use tokio_stream::Stream;

use signage_domain::error::SignageError;
use signage_domain::id::{DeviceId, PairingCode};

/// What a live channel subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiveTarget {
    /// Global configuration (`mode=global`).
    Global,
    /// Configuration resolved for one device (`mode=device`).
    Device(DeviceId),
    /// Status of a pairing code (`mode=pair`).
    Pairing(PairingCode),
}

impl LiveTarget {
    /// Pairing targets get a single retry before falling back.
    #[must_use]
    pub fn is_pairing(&self) -> bool {
        matches!(self, Self::Pairing(_))
    }
}

impl fmt::Display for LiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Device(id) => write!(f, "device:{id}"),
            Self::Pairing(code) => write!(f, "pair:{code}"),
        }
    }
}

/// One named message received on the live channel, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub event: String,
    pub data: String,
}

impl PushMessage {
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Opens push subscriptions.
pub trait PushTransport: Send + Sync {
    /// Messages of an open subscription. The stream ends or yields an error
    /// when the connection drops.
    type Stream: Stream<Item = Result<PushMessage, SignageError>> + Send + Unpin + 'static;

    /// Lightweight capability check. `Ok(false)` means the server or the
    /// platform does not support push for this target.
    fn probe(&self, target: &LiveTarget)
    -> impl Future<Output = Result<bool, SignageError>> + Send;

    /// Open a subscription.
    fn open(
        &self,
        target: &LiveTarget,
    ) -> impl Future<Output = Result<Self::Stream, SignageError>> + Send;
}
