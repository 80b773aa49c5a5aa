//! Automation engine — applies time-based rules on top of the committed baseline.
//!
//! The engine keeps a snapshot of the baseline (the *base*) and derives a
//! working copy from it on every tick. Style overrides are always merged
//! onto the base, never onto an already-overlaid copy, so they cannot
//! accumulate. An event plan swaps the schedule and remembers the one it
//! replaced so that reverting restores it.

use std::sync::Arc;
use std::time::Duration;

use signage_domain::automation::{Selection, SelectionSource};
use signage_domain::schedule::Schedule;
use signage_domain::settings::Settings;
use signage_domain::time::LocalTime;

use crate::reconciler::Baseline;
use crate::scheduled_task::ScheduledTask;
use crate::signal::{Inbox, Signal};

/// Tick period.
pub const TICK: Duration = Duration::from_secs(60);

/// Which slices a tick changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationChange {
    pub style: bool,
    pub audio: bool,
    pub schedule: bool,
}

impl AutomationChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.style || self.audio || self.schedule)
    }

    /// Only theme or audio changed; in-flight playback can continue.
    #[must_use]
    pub fn is_cosmetic(&self) -> bool {
        !self.schedule && !self.is_empty()
    }
}

/// Rule-driven overlay over the baseline.
#[derive(Debug, Default)]
pub struct AutomationEngine {
    base: Option<Arc<Baseline>>,
    settings: Settings,
    schedule: Schedule,
    applied: Option<Selection>,
    prior_schedule: Option<Schedule>,
    tick: ScheduledTask,
}

impl AutomationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a freshly committed baseline and drop every overlay.
    ///
    /// Runs synchronously as part of the commit, so the next tick always
    /// reads the just-committed baseline.
    pub fn rebase(&mut self, baseline: Arc<Baseline>) {
        self.settings = baseline.settings.clone();
        self.schedule = baseline.schedule.clone();
        self.applied = None;
        self.prior_schedule = None;
        self.base = Some(baseline);
    }

    /// The working settings: base plus the active overlay.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The working schedule: base or the active event plan.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The selection in effect.
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.applied.as_ref()
    }

    /// Re-evaluate the rules at `now` and update the working copy.
    ///
    /// The first tick after [`Self::rebase`] reports every slice the
    /// selection touches.
    #[tracing::instrument(skip(self))]
    pub fn tick(&mut self, now: LocalTime) -> AutomationChange {
        let Some(base) = self.base.clone() else {
            return AutomationChange::default();
        };
        let selection = base.settings.automation.select(&now);
        let previous = self.applied.take();
        let fresh = previous.is_none();
        let previous = previous.unwrap_or_else(|| Selection {
            style_set: None,
            audio_track: None,
            event_plan: None,
            source: SelectionSource::Fallback,
        });

        let change = AutomationChange {
            style: selection.style_set != previous.style_set
                || (fresh && selection.style_set.is_some()),
            audio: selection.audio_track != previous.audio_track
                || (fresh && selection.audio_track.is_some()),
            schedule: selection.event_plan != previous.event_plan,
        };

        if change.style || change.audio {
            self.settings = overlay(&base.settings, &selection);
        }
        if change.schedule {
            self.swap_schedule(&base, selection.event_plan.as_deref());
        }
        if !change.is_empty() {
            tracing::info!(
                style_set = ?selection.style_set,
                audio_track = ?selection.audio_track,
                event_plan = ?selection.event_plan,
                source = ?selection.source,
                "automation selection changed"
            );
        }
        self.applied = Some(selection);
        change
    }

    fn swap_schedule(&mut self, base: &Baseline, plan: Option<&str>) {
        match plan.and_then(|id| base.settings.automation.plan(id)) {
            Some(plan) => {
                let replaced = std::mem::replace(&mut self.schedule, plan.schedule.clone());
                self.prior_schedule.get_or_insert(replaced);
            }
            None => {
                self.schedule = self
                    .prior_schedule
                    .take()
                    .unwrap_or_else(|| base.schedule.clone());
            }
        }
    }

    /// (Re)start the minute tick, reporting through `inbox`.
    pub fn restart_tick(&mut self, inbox: &Inbox) {
        let inbox = inbox.clone();
        self.tick = ScheduledTask::every(TICK, move || {
            let inbox = inbox.clone();
            async move { inbox.send(Signal::AutomationTick) }
        });
    }

    /// Stop the minute tick.
    pub fn stop(&mut self) {
        self.tick.cancel();
    }
}

/// Base settings with the selected style merged and the track pointer set.
fn overlay(base: &Settings, selection: &Selection) -> Settings {
    let mut settings = match selection
        .style_set
        .as_deref()
        .and_then(|id| base.automation.style(id))
    {
        Some(style) => base.with_style(style),
        None => base.clone(),
    };
    if let Some(track) = &selection.audio_track {
        if settings.audio.track(track).is_some() {
            settings.audio.active_track = Some(track.clone());
        } else {
            tracing::warn!(%track, "automation names an unknown audio track");
        }
    }
    settings
}
