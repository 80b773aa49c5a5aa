//! Remote ports — request/response calls to the configuration server.

use std::future::Future;

use signage_domain::error::SignageError;
use signage_domain::id::{DeviceId, PairingCode};
use signage_domain::pairing::PairStatus;
use signage_domain::push::{ConfigSnapshot, DeviceSnapshot};

/// Source of configuration snapshots.
pub trait ConfigSource: Send + Sync {
    /// Fetch the global schedule and settings.
    ///
    /// Implementations revalidate with the server and reuse their cached
    /// body when it reports no change; they never synthesize empty data.
    fn fetch_global(&self) -> impl Future<Output = Result<ConfigSnapshot, SignageError>> + Send;

    /// Resolve the configuration bound to a device.
    ///
    /// Fails with [`SignageError::DeviceUnbound`] when the server no longer
    /// knows the device.
    fn resolve_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<DeviceSnapshot, SignageError>> + Send;
}

/// Pairing and liveness endpoints.
pub trait PairingApi: Send + Sync {
    /// Request a fresh pairing code.
    fn begin_pairing(&self) -> impl Future<Output = Result<PairingCode, SignageError>> + Send;

    /// Ask whether a code has been bound to a device.
    fn poll_pairing(
        &self,
        code: &PairingCode,
    ) -> impl Future<Output = Result<PairStatus, SignageError>> + Send;

    /// Report that the device is alive.
    fn heartbeat(&self, device_id: &DeviceId)
    -> impl Future<Output = Result<(), SignageError>> + Send;
}
