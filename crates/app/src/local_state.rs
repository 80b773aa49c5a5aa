//! Local state implementations that need no IO.
//!
//! [`ResilientStore`] wraps a persistent store and keeps the terminal
//! running on memory alone once that store starts failing.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use signage_domain::error::SignageError;
use signage_domain::id::DeviceId;
use signage_domain::pairing::PairingState;

use crate::ports::LocalStateStore;

/// Volatile local state; forgotten on restart.
#[derive(Debug, Default)]
pub struct InMemoryLocalState {
    device_id: Mutex<Option<DeviceId>>,
    pairing: Mutex<Option<PairingState>>,
}

impl InMemoryLocalState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn device_id(&self) -> Option<DeviceId> {
        self.device_id
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_device_id(&self, device_id: Option<&DeviceId>) {
        *self
            .device_id
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = device_id.cloned();
    }

    fn pairing(&self) -> Option<PairingState> {
        self.pairing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_pairing(&self, pairing: Option<&PairingState>) {
        *self
            .pairing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = pairing.cloned();
    }
}

impl LocalStateStore for InMemoryLocalState {
    fn load_device_id(
        &self,
    ) -> impl Future<Output = Result<Option<DeviceId>, SignageError>> + Send {
        std::future::ready(Ok(self.device_id()))
    }

    fn save_device_id(
        &self,
        device_id: Option<&DeviceId>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        self.set_device_id(device_id);
        std::future::ready(Ok(()))
    }

    fn load_pairing(
        &self,
    ) -> impl Future<Output = Result<Option<PairingState>, SignageError>> + Send {
        std::future::ready(Ok(self.pairing()))
    }

    fn save_pairing(
        &self,
        pairing: Option<&PairingState>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        self.set_pairing(pairing);
        std::future::ready(Ok(()))
    }
}

/// A store that never fails.
///
/// Every write is mirrored in memory. On the first error of the wrapped
/// store it logs a single warning and serves everything from memory for
/// the rest of the process lifetime.
#[derive(Debug)]
pub struct ResilientStore<S> {
    inner: Option<S>,
    memory: InMemoryLocalState,
    degraded: AtomicBool,
}

impl<S: LocalStateStore> ResilientStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner: Some(inner),
            memory: InMemoryLocalState::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// A store that was unavailable from the start.
    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            inner: None,
            memory: InMemoryLocalState::new(),
            degraded: AtomicBool::new(true),
        }
    }

    /// Whether the wrapped store has been given up.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn healthy(&self) -> Option<&S> {
        self.inner.as_ref().filter(|_| !self.is_degraded())
    }

    fn degrade(&self, err: &SignageError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "local storage unavailable, keeping state in memory");
        }
    }
}

impl<S: LocalStateStore> LocalStateStore for ResilientStore<S> {
    fn load_device_id(
        &self,
    ) -> impl Future<Output = Result<Option<DeviceId>, SignageError>> + Send {
        async move {
            if let Some(inner) = self.healthy() {
                match inner.load_device_id().await {
                    Ok(device_id) => {
                        self.memory.set_device_id(device_id.as_ref());
                        return Ok(device_id);
                    }
                    Err(err) => self.degrade(&err),
                }
            }
            Ok(self.memory.device_id())
        }
    }

    fn save_device_id(
        &self,
        device_id: Option<&DeviceId>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        self.memory.set_device_id(device_id);
        let device_id = device_id.cloned();
        async move {
            if let Some(inner) = self.healthy() {
                if let Err(err) = inner.save_device_id(device_id.as_ref()).await {
                    self.degrade(&err);
                }
            }
            Ok(())
        }
    }

    fn load_pairing(
        &self,
    ) -> impl Future<Output = Result<Option<PairingState>, SignageError>> + Send {
        async move {
            if let Some(inner) = self.healthy() {
                match inner.load_pairing().await {
                    Ok(pairing) => {
                        self.memory.set_pairing(pairing.as_ref());
                        return Ok(pairing);
                    }
                    Err(err) => self.degrade(&err),
                }
            }
            Ok(self.memory.pairing())
        }
    }

    fn save_pairing(
        &self,
        pairing: Option<&PairingState>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        self.memory.set_pairing(pairing);
        let pairing = pairing.cloned();
        async move {
            if let Some(inner) = self.healthy() {
                if let Err(err) = inner.save_pairing(pairing.as_ref()).await {
                    self.degrade(&err);
                }
            }
            Ok(())
        }
    }
}
