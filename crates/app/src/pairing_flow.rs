//! Pairing flow — obtain a code, wait for an administrator to bind it.
//!
//! The flow only decides; the orchestrator persists codes, points the live
//! channel (or the status poller) at the code and switches to device mode
//! once [`PairingStep::Paired`] comes out.

use std::sync::Arc;
use std::time::Duration;

use signage_domain::error::SignageError;
use signage_domain::id::{DeviceId, PairingCode};
use signage_domain::pairing::{PairStatus, PairingOutcome, PairingState};
use signage_domain::time::Timestamp;

use crate::live_channel::reconnect_delay;
use crate::ports::PairingApi;
use crate::scheduled_task::ScheduledTask;
use crate::signal::{Inbox, Signal};

/// Progress reported to the flow.
#[derive(Debug)]
pub enum PairingEvent {
    /// The code request completed.
    CodeIssued(Result<PairingCode, SignageError>),
    /// Status of the current code, pushed or polled.
    Status(PairStatus),
    /// The current code reached its expiry.
    Expired,
}

/// What the orchestrator should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStep {
    /// Nothing changed.
    Idle,
    /// A code is being requested.
    Requesting,
    /// Show and persist this code, and listen for its status.
    Waiting(PairingState),
    /// The terminal is bound to this device.
    Paired(DeviceId),
}

/// First-run pairing state machine.
pub struct PairingFlow<A> {
    api: Arc<A>,
    inbox: Inbox,
    generation: u64,
    current: Option<PairingState>,
    request_failures: u32,
    request: ScheduledTask,
    expiry: ScheduledTask,
}

impl<A: PairingApi + 'static> PairingFlow<A> {
    #[must_use]
    pub fn new(api: Arc<A>, inbox: Inbox) -> Self {
        Self {
            api,
            inbox,
            generation: 0,
            current: None,
            request_failures: 0,
            request: ScheduledTask::idle(),
            expiry: ScheduledTask::idle(),
        }
    }

    /// The code currently shown, if any.
    #[must_use]
    pub fn current(&self) -> Option<&PairingState> {
        self.current.as_ref()
    }

    /// Tag for signals concerning the current code.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start pairing, reusing `stored` when it has not expired yet.
    #[tracing::instrument(skip_all)]
    pub fn begin(&mut self, stored: Option<PairingState>, now: Timestamp) -> PairingStep {
        self.stop();
        match stored {
            Some(state) if !state.is_expired(now) => {
                tracing::info!(code = %state.code, "reusing pairing code");
                self.wait(state, now)
            }
            Some(state) => {
                tracing::info!(code = %state.code, "stored pairing code expired");
                self.request_code(Duration::ZERO)
            }
            None => self.request_code(Duration::ZERO),
        }
    }

    /// Apply a progress report.
    pub fn handle(&mut self, generation: u64, event: PairingEvent, now: Timestamp) -> PairingStep {
        if generation != self.generation {
            tracing::debug!(generation, "dropping stale pairing report");
            return PairingStep::Idle;
        }
        match event {
            PairingEvent::CodeIssued(Ok(code)) => {
                tracing::info!(%code, "pairing code issued");
                self.request_failures = 0;
                self.wait(PairingState::new(code, now), now)
            }
            PairingEvent::CodeIssued(Err(err)) => {
                self.request_failures += 1;
                let delay = reconnect_delay(self.request_failures);
                tracing::warn!(error = %err, retry_in = ?delay, "pairing code request failed");
                self.request_code(delay)
            }
            PairingEvent::Status(status) => {
                let Some(state) = &self.current else {
                    return PairingStep::Idle;
                };
                match state.outcome(&status, now) {
                    PairingOutcome::Paired(device_id) => {
                        tracing::info!(%device_id, "terminal paired");
                        self.stop();
                        PairingStep::Paired(device_id)
                    }
                    PairingOutcome::Expired => self.renew(),
                    PairingOutcome::Pending => PairingStep::Idle,
                }
            }
            PairingEvent::Expired => self.renew(),
        }
    }

    /// Abandon the attempt. Idempotent.
    pub fn stop(&mut self) {
        self.request.cancel();
        self.expiry.cancel();
        self.generation += 1;
        self.current = None;
    }

    fn renew(&mut self) -> PairingStep {
        tracing::info!("pairing code expired, requesting a new one");
        self.stop();
        self.request_code(Duration::ZERO)
    }

    fn wait(&mut self, state: PairingState, now: Timestamp) -> PairingStep {
        let inbox = self.inbox.clone();
        let generation = self.generation;
        self.expiry = ScheduledTask::after(state.remaining(now), async move {
            inbox.send(Signal::Pairing {
                generation,
                event: PairingEvent::Expired,
            });
        });
        self.current = Some(state.clone());
        PairingStep::Waiting(state)
    }

    fn request_code(&mut self, delay: Duration) -> PairingStep {
        let api = Arc::clone(&self.api);
        let inbox = self.inbox.clone();
        let generation = self.generation;
        self.request = ScheduledTask::after(delay, async move {
            let result = api.begin_pairing().await;
            inbox.send(Signal::Pairing {
                generation,
                event: PairingEvent::CodeIssued(result),
            });
        });
        PairingStep::Requesting
    }
}
