//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod local_state;
pub mod presentation;
pub mod push;
pub mod remote;

pub use local_state::LocalStateStore;
pub use presentation::{AudioSink, Preloader, Renderer, SlideContext, SlideHandle};
pub use push::{LiveTarget, PushMessage, PushTransport};
pub use remote::{ConfigSource, PairingApi};
