//! Playback controller — rotates one region's queue on screen.
//!
//! The controller never waits on anything itself. Dwell timers, exit
//! transitions and slide callbacks all come back as [`SlideSignal`]s tagged
//! with the slide they were issued for, and signals for a slide that is no
//! longer on screen are dropped.

use std::sync::Arc;
use std::time::Duration;

use signage_domain::id::SuspensionToken;
use signage_domain::queue::{ContentType, QueueItem, StableKey};
use signage_domain::settings::Region;

use crate::audio::BackgroundAudio;
use crate::event_bus::{InProcessEventBus, OrchestratorEvent};
use crate::ports::{AudioSink, Preloader, Renderer, SlideContext, SlideHandle};
use crate::scheduled_task::ScheduledTask;
use crate::signal::{Inbox, Signal};

/// Time the outgoing slide gets to animate out.
pub const EXIT_TRANSITION: Duration = Duration::from_millis(600);

/// Longest a slide may defer its end before it is advanced anyway.
pub const MAX_DEFERRED_DWELL: Duration = Duration::from_secs(600);

/// Pause before retrying a queue in which every slide failed to render.
pub const FAILED_LAP_PAUSE: Duration = Duration::from_secs(30);

/// Dwell of a slide whose settings give none.
#[must_use]
pub fn default_dwell(kind: ContentType) -> Duration {
    Duration::from_secs(match kind {
        ContentType::HeroTimeline | ContentType::Story => 15,
        ContentType::Video => 30,
        ContentType::Url => 20,
        ContentType::WellnessTip => 8,
        ContentType::Overview | ContentType::Sauna | ContentType::Image => 10,
    })
}

/// What a slide, or one of its timers, asks of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideCommand {
    Advance,
    ScheduleAdvance(Duration),
    ClearScheduledAdvance,
    DeferAdvance,
    Ready,
    Failed(String),
    /// The exit transition finished.
    TransitionDone,
}

/// A [`SlideCommand`] addressed to the slide `slide` of `region`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSignal {
    pub region: Region,
    pub slide: u64,
    pub command: SlideCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Showing,
    TransitioningOut,
}

/// Where a replaced queue starts playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAt {
    /// The first item.
    #[default]
    Beginning,
    /// The current position, wrapped into the new queue.
    Current,
}

/// Plays one region.
#[derive(Debug)]
pub struct PlaybackController<R, P> {
    region: Region,
    renderer: Arc<R>,
    preloader: Arc<P>,
    inbox: Inbox,
    events: InProcessEventBus,
    queue: Vec<QueueItem>,
    index: usize,
    fixed_dwell: Option<Duration>,
    state: PlaybackState,
    last_shown: Option<StableKey>,
    slide: u64,
    handle: Option<SlideHandle>,
    timer: ScheduledTask,
    deferred: bool,
    suspension: Option<SuspensionToken>,
}

impl<R: Renderer, P: Preloader> PlaybackController<R, P> {
    #[must_use]
    pub fn new(
        region: Region,
        renderer: Arc<R>,
        preloader: Arc<P>,
        inbox: Inbox,
        events: InProcessEventBus,
    ) -> Self {
        Self {
            region,
            renderer,
            preloader,
            inbox,
            events,
            queue: Vec::new(),
            index: 0,
            fixed_dwell: None,
            state: PlaybackState::Stopped,
            last_shown: None,
            slide: 0,
            handle: None,
            timer: ScheduledTask::idle(),
            deferred: false,
            suspension: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn queue(&self) -> &[QueueItem] {
        &self.queue
    }

    /// The item at the current position, if any.
    #[must_use]
    pub fn current(&self) -> Option<&QueueItem> {
        self.queue.get(self.index)
    }

    /// Swap in a new queue and start playing it.
    ///
    /// Pending timers are cancelled and the outgoing slide released before
    /// anything else happens.
    #[tracing::instrument(skip(self, queue, audio), fields(region = %self.region, len = queue.len()))]
    pub fn replace_queue<S: AudioSink>(
        &mut self,
        queue: Vec<QueueItem>,
        fixed_dwell: Option<Duration>,
        start: StartAt,
        audio: &mut BackgroundAudio<S>,
    ) {
        self.leave(audio);
        self.index = match start {
            StartAt::Current if !queue.is_empty() => self.index % queue.len(),
            _ => 0,
        };
        self.queue = queue;
        self.fixed_dwell = fixed_dwell;
        self.play(audio);
    }

    /// Show the current item, or the placeholder when there is nothing to show.
    ///
    /// The item that was on screen last is not repeated right away when the
    /// queue has anything else to offer.
    pub fn play<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        if self.queue.is_empty() {
            self.idle();
            return;
        }
        if self.index >= self.queue.len() {
            self.index = 0;
        }
        if self.queue.len() > 1 && self.last_shown.as_ref() == Some(&self.queue[self.index].key()) {
            self.index = (self.index + 1) % self.queue.len();
        }
        self.show(audio);
    }

    /// Release everything and go blank.
    pub fn stop<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        self.leave(audio);
        self.queue.clear();
        self.index = 0;
        self.last_shown = None;
        self.state = PlaybackState::Stopped;
    }

    /// Apply a signal addressed to this region.
    pub fn handle<S: AudioSink>(&mut self, signal: SlideSignal, audio: &mut BackgroundAudio<S>) {
        if signal.slide != self.slide {
            tracing::trace!(region = %self.region, slide = signal.slide, "dropping signal of a past slide");
            return;
        }
        match signal.command {
            SlideCommand::Advance => self.advance(audio),
            SlideCommand::ScheduleAdvance(delay) if self.state == PlaybackState::Showing => {
                self.deferred = false;
                self.arm(delay, SlideCommand::Advance);
            }
            SlideCommand::ClearScheduledAdvance if self.state == PlaybackState::Showing => {
                self.timer.cancel();
            }
            SlideCommand::DeferAdvance if self.state == PlaybackState::Showing => {
                if self.fixed_dwell.is_none() {
                    self.defer();
                }
            }
            SlideCommand::Ready if self.deferred => {
                self.deferred = false;
                self.advance(audio);
            }
            SlideCommand::Failed(reason) if self.state == PlaybackState::Showing => {
                tracing::warn!(region = %self.region, %reason, "slide failed while playing");
                self.next(audio);
            }
            SlideCommand::TransitionDone if self.state == PlaybackState::TransitioningOut => {
                self.next(audio);
            }
            command => {
                tracing::debug!(region = %self.region, ?command, state = ?self.state, "ignoring slide command");
            }
        }
    }

    fn advance<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        match self.state {
            PlaybackState::Showing => {
                self.deferred = false;
                self.state = PlaybackState::TransitioningOut;
                self.arm(EXIT_TRANSITION, SlideCommand::TransitionDone);
            }
            // retry after a failed lap
            PlaybackState::Stopped if !self.queue.is_empty() => self.show(audio),
            _ => {}
        }
    }

    fn next<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        self.leave(audio);
        self.index = (self.index + 1) % self.queue.len().max(1);
        self.play(audio);
    }

    /// Show the current item, skipping over items that fail to render.
    fn show<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        let len = self.queue.len();
        for _ in 0..len {
            if self.try_show(audio) {
                return;
            }
            self.index = (self.index + 1) % len;
        }
        tracing::warn!(region = %self.region, "no slide of the queue could be rendered");
        self.idle();
        self.arm(FAILED_LAP_PAUSE, SlideCommand::Advance);
    }

    fn try_show<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) -> bool {
        self.slide += 1;
        let item = self.queue[self.index].clone();
        let key = item.key();
        if item.is_audible() {
            self.suspension = Some(audio.suspend());
        }

        let ctx = SlideContext::new(self.region, self.slide, self.inbox.clone());
        match self.renderer.render(self.region, &item, ctx) {
            Ok(handle) => {
                tracing::debug!(region = %self.region, %key, index = self.index, "showing slide");
                self.handle = Some(handle);
                self.state = PlaybackState::Showing;
                self.schedule_dwell(&item);
                self.preload_next();
                self.events.publish(OrchestratorEvent::SlideShown {
                    region: self.region,
                    key: key.clone(),
                });
                self.last_shown = Some(key);
                true
            }
            Err(err) => {
                tracing::warn!(region = %self.region, %key, error = %err, "skipping slide");
                if let Some(token) = self.suspension.take() {
                    audio.release(token);
                }
                false
            }
        }
    }

    fn schedule_dwell(&mut self, item: &QueueItem) {
        if let Some(fixed) = self.fixed_dwell {
            self.arm(fixed, SlideCommand::Advance);
        } else if item.defers_end() {
            self.defer();
        } else {
            let dwell = item
                .configured_dwell()
                .unwrap_or_else(|| default_dwell(item.content_type()));
            self.arm(dwell, SlideCommand::Advance);
        }
    }

    fn defer(&mut self) {
        self.deferred = true;
        self.arm(MAX_DEFERRED_DWELL, SlideCommand::Advance);
    }

    fn preload_next(&self) {
        let next = &self.queue[(self.index + 1) % self.queue.len()];
        if let Some(url) = next.preload_url() {
            self.preloader.preload(url);
        }
    }

    fn arm(&mut self, delay: Duration, command: SlideCommand) {
        let inbox = self.inbox.clone();
        let signal = SlideSignal {
            region: self.region,
            slide: self.slide,
            command,
        };
        self.timer = ScheduledTask::after(delay, async move {
            inbox.send(Signal::Slide(signal));
        });
    }

    fn idle(&mut self) {
        self.state = PlaybackState::Stopped;
        self.renderer.show_placeholder(self.region);
    }

    /// Take the current slide off: timers, release hook and audio suspension.
    fn leave<S: AudioSink>(&mut self, audio: &mut BackgroundAudio<S>) {
        self.timer.cancel();
        self.deferred = false;
        self.slide += 1;
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
        if let Some(token) = self.suspension.take() {
            audio.release(token);
        }
    }
}
