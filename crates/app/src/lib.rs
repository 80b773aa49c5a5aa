//! # signage-app
//!
//! Application layer — playback orchestration use-cases and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ConfigSource` — fetch global configuration, resolve device configuration
//!   - `PairingApi` — request and poll pairing codes, send heartbeats
//!   - `PushTransport` — probe and open the live push channel
//!   - `LocalStateStore` — persist device identity and pending pairing code
//!   - `Renderer`, `Preloader`, `AudioSink` — the presentation surface
//! - Provide the components the orchestrator is made of:
//!   - `Poller`, `LiveChannel`, `PairingFlow` — staying in sync with the server
//!   - `Reconciler`, `AutomationEngine` — baseline and its time-based overlay
//!   - `queue_builder`, `region_scheduler` — pure queue construction
//!   - `PlaybackController`, `BackgroundAudio` — what is on screen and audible
//! - Provide **in-process infrastructure** (event bus, signals, scheduled
//!   tasks, in-memory local state) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `signage-domain` only (plus `tokio` for tasks, timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod audio;
pub mod automation_engine;
pub mod event_bus;
pub mod live_channel;
pub mod local_state;
pub mod orchestrator;
pub mod pairing_flow;
pub mod playback;
pub mod poller;
pub mod ports;
pub mod queue_builder;
pub mod reconciler;
pub mod region_scheduler;
pub mod scheduled_task;
pub mod signal;
