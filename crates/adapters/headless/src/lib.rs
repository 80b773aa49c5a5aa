//! # signage-adapter-headless
//!
//! Presentation adapter for terminals without a display surface, and for
//! running the orchestrator on a development machine.
//!
//! ## Provided ports
//!
//! | Port | Type | Behaviour |
//! |------|------|-----------|
//! | `Renderer` | [`HeadlessRenderer`] | Logs every slide, remembers what each region shows, simulates the end of self-timed media |
//! | `AudioSink` | [`HeadlessAudio`] | Logs play / pause and remembers the current track |
//!
//! ## Dependency rule
//!
//! Depends on `signage-app` (port traits) and `signage-domain` only.

mod audio;
mod renderer;

pub use audio::HeadlessAudio;
pub use renderer::{HeadlessRenderer, Screen};
