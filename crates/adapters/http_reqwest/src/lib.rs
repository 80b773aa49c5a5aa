//! # signage-adapter-http-reqwest
//!
//! HTTP adapter using [reqwest](https://docs.rs/reqwest).
//!
//! ## Responsibilities
//! - Implement the remote ports defined in `signage-app::ports`:
//!   `ConfigSource`, `PairingApi` and `PushTransport`
//! - Revalidate configuration with `If-None-Match` and reuse cached bodies
//!   on `304 Not Modified`
//! - Decode the server-sent events of the live channel
//! - Warm up media URLs with bounded concurrency (`Preloader`)
//!
//! ## Dependency rule
//! Depends on `signage-app` (for port traits) and `signage-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod client;
pub mod error;
pub mod preloader;
pub mod sse;

pub use client::{Config, HttpClient};
pub use error::HttpError;
pub use preloader::HttpPreloader;
pub use sse::{MAX_FRAME_BYTES, SseDecoder};
