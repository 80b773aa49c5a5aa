//! Local state port — the little the terminal remembers across restarts.

use std::future::Future;

use signage_domain::error::SignageError;
use signage_domain::id::DeviceId;
use signage_domain::pairing::PairingState;

/// Persisted device identity and pending pairing code.
pub trait LocalStateStore: Send + Sync {
    /// Load the bound device identity.
    fn load_device_id(&self)
    -> impl Future<Output = Result<Option<DeviceId>, SignageError>> + Send;

    /// Store (`Some`) or clear (`None`) the bound device identity.
    fn save_device_id(
        &self,
        device_id: Option<&DeviceId>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send;

    /// Load the pending pairing code and its creation time.
    fn load_pairing(&self)
    -> impl Future<Output = Result<Option<PairingState>, SignageError>> + Send;

    /// Store (`Some`) or clear (`None`) the pending pairing code.
    fn save_pairing(
        &self,
        pairing: Option<&PairingState>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send;
}

impl<T: LocalStateStore> LocalStateStore for std::sync::Arc<T> {
    fn load_device_id(
        &self,
    ) -> impl Future<Output = Result<Option<DeviceId>, SignageError>> + Send {
        (**self).load_device_id()
    }

    fn save_device_id(
        &self,
        device_id: Option<&DeviceId>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        (**self).save_device_id(device_id)
    }

    fn load_pairing(
        &self,
    ) -> impl Future<Output = Result<Option<PairingState>, SignageError>> + Send {
        (**self).load_pairing()
    }

    fn save_pairing(
        &self,
        pairing: Option<&PairingState>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        (**self).save_pairing(pairing)
    }
}
