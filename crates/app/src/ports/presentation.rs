//! Presentation ports — the visual layer, media warm-up and the audio output.
//!
//! Rendering is external. The orchestrator tells a [`Renderer`] what to
//! show and hands it a [`SlideContext`] through which the slide can steer
//! its own end (advance now, advance later, or defer until ready).

use std::fmt;
use std::time::Duration;

use signage_domain::error::SignageError;
use signage_domain::pairing::PairingState;
use signage_domain::queue::QueueItem;
use signage_domain::settings::{AudioTrack, Region, Settings};

use crate::playback::{SlideCommand, SlideSignal};
use crate::signal::{Inbox, Signal};

/// Draws slides.
pub trait Renderer: Send + Sync {
    /// Show `item` in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`SignageError::MediaPlayback`] when the slide cannot be
    /// shown; the region skips to the next item.
    fn render(
        &self,
        region: Region,
        item: &QueueItem,
        ctx: SlideContext,
    ) -> Result<SlideHandle, SignageError>;

    /// Show the idle placeholder of an empty or disabled region.
    fn show_placeholder(&self, region: Region);

    /// Refresh theme, fonts and slide style without touching the slides.
    fn apply_theme(&self, settings: &Settings);

    /// Show (`Some`) or hide (`None`) the pairing screen.
    fn show_pairing(&self, pairing: Option<&PairingState>);
}

/// Warms up remote assets ahead of time.
///
/// Implementations are idempotent, bound their concurrency and never block
/// the caller.
pub trait Preloader: Send + Sync {
    fn preload(&self, url: &str);

    fn preload_many(&self, urls: &[&str]) {
        for url in urls {
            self.preload(url);
        }
    }
}

/// Background-audio output.
pub trait AudioSink: Send + Sync {
    fn play(&self, track: &AudioTrack);
    fn pause(&self);
}

/// Capabilities handed to a slide while it is on screen.
///
/// Every call is tagged with the slide it was issued for; calls made after
/// the slide was replaced are ignored.
#[derive(Clone)]
pub struct SlideContext {
    region: Region,
    slide: u64,
    inbox: Inbox,
}

impl SlideContext {
    /// A context for slide number `slide` of `region`, reporting to `inbox`.
    #[must_use]
    pub fn new(region: Region, slide: u64, inbox: Inbox) -> Self {
        Self {
            region,
            slide,
            inbox,
        }
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Leave the slide now.
    pub fn advance(&self) {
        self.send(SlideCommand::Advance);
    }

    /// Leave the slide after `delay`, replacing any pending timer.
    pub fn schedule_advance(&self, delay: Duration) {
        self.send(SlideCommand::ScheduleAdvance(delay));
    }

    /// Drop the pending timer; the slide stays until told otherwise.
    pub fn clear_scheduled_advance(&self) {
        self.send(SlideCommand::ClearScheduledAdvance);
    }

    /// The slide decides when it is done and will call [`Self::ready`].
    pub fn defer_advance(&self) {
        self.send(SlideCommand::DeferAdvance);
    }

    /// A deferred slide reached its end.
    pub fn ready(&self) {
        self.send(SlideCommand::Ready);
    }

    /// The slide failed while playing.
    pub fn fail(&self, reason: impl Into<String>) {
        self.send(SlideCommand::Failed(reason.into()));
    }

    fn send(&self, command: SlideCommand) {
        self.inbox.send(Signal::Slide(SlideSignal {
            region: self.region,
            slide: self.slide,
            command,
        }));
    }
}

impl fmt::Debug for SlideContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideContext")
            .field("region", &self.region)
            .field("slide", &self.slide)
            .finish_non_exhaustive()
    }
}

/// Returned by the renderer for a slide on screen. Releasing it runs the
/// slide's cleanup hook.
#[derive(Default)]
pub struct SlideHandle {
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl SlideHandle {
    /// A handle with no cleanup.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    /// A handle running `f` when released.
    #[must_use]
    pub fn on_release(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_release: Some(Box::new(f)),
        }
    }

    /// Run the cleanup hook.
    pub fn release(mut self) {
        if let Some(f) = self.on_release.take() {
            f();
        }
    }
}

impl fmt::Debug for SlideHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideHandle")
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn should_run_release_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = SlideHandle::on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.release();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_tag_context_commands_with_region_and_slide() {
        let (inbox, mut rx) = Inbox::channel();
        let ctx = SlideContext::new(Region::Right, 7, inbox);
        ctx.schedule_advance(Duration::from_secs(3));
        ctx.ready();

        let Some(Signal::Slide(first)) = rx.try_recv().ok() else {
            panic!("expected a slide signal");
        };
        assert_eq!(first.region, Region::Right);
        assert_eq!(first.slide, 7);
        assert_eq!(
            first.command,
            SlideCommand::ScheduleAdvance(Duration::from_secs(3))
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(Signal::Slide(SlideSignal {
                command: SlideCommand::Ready,
                ..
            }))
        ));
    }
}
