//! Automation — time-based rules that swap style, audio track and schedule.
//!
//! The settings document carries an [`AutomationSettings`] block: a set of
//! named [`StyleSet`]s, alternate schedules ([`EventPlan`]s), engine
//! defaults and a list of [`Rule`]s. [`AutomationSettings::select`] decides
//! which rule governs a given moment; applying the decision is the
//! application layer's job.

mod rule;

pub use rule::{Rule, RuleSlot};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;
use crate::settings::Fonts;
use crate::time::{LocalTime, TimeOfDay};

/// Named bundle of theme, font and slide-style overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSet {
    pub id: String,
    pub name: String,
    pub theme: BTreeMap<String, String>,
    pub fonts: Fonts,
    pub slide_style: BTreeMap<String, String>,
}

/// Named alternate schedule substituted while its rule is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPlan {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
}

/// Automation block of the settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationSettings {
    pub enabled: bool,
    pub style_sets: Vec<StyleSet>,
    pub rules: Vec<Rule>,
    pub event_plans: Vec<EventPlan>,
    /// Style used when no rule resolves one.
    pub default_style_set: Option<String>,
    /// Track used when no rule resolves one.
    pub default_audio_track: Option<String>,
}

/// Which rule produced a [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Automation disabled, no style-sets, or no rule at all.
    Fallback,
    /// Index into [`AutomationSettings::rules`].
    Range(usize),
    /// Index into [`AutomationSettings::rules`].
    Daily(usize),
}

/// What should be active at a given moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub style_set: Option<String>,
    pub audio_track: Option<String>,
    pub event_plan: Option<String>,
    pub source: SelectionSource,
}

impl AutomationSettings {
    /// Look up a style-set by id.
    #[must_use]
    pub fn style(&self, id: &str) -> Option<&StyleSet> {
        self.style_sets.iter().find(|s| s.id == id)
    }

    /// Look up an event plan by id.
    #[must_use]
    pub fn plan(&self, id: &str) -> Option<&EventPlan> {
        self.event_plans.iter().find(|p| p.id == id)
    }

    /// Decide what is active at `now`.
    ///
    /// 1. Disabled or no style-sets: engine defaults only.
    /// 2. A covering range rule; the latest start wins.
    /// 3. Otherwise the daily rule with the latest time not after `now`;
    ///    when none qualifies the latest daily rule overall carries over
    ///    from the previous day.
    /// 4. Fields the chosen rule leaves unresolved use the defaults.
    #[must_use]
    pub fn select(&self, now: &LocalTime) -> Selection {
        if !self.enabled || self.style_sets.is_empty() {
            return self.fallback();
        }

        let enabled = || self.rules.iter().enumerate().filter(|(_, r)| r.enabled);

        let range = enabled()
            .filter(|(_, rule)| rule.covers(now))
            .filter_map(|(index, rule)| match &rule.slot {
                RuleSlot::Range { start, .. } => Some((index, *start)),
                RuleSlot::Daily { .. } => None,
            })
            .max_by_key(|(_, start)| *start);
        if let Some((index, _)) = range {
            return self.resolve(&self.rules[index], SelectionSource::Range(index));
        }

        let daily: Vec<(usize, TimeOfDay)> = enabled()
            .filter_map(|(index, rule)| match rule.slot {
                RuleSlot::Daily { time } => Some((index, time)),
                RuleSlot::Range { .. } => None,
            })
            .collect();
        let current = TimeOfDay::of(now);
        let chosen = daily
            .iter()
            .filter(|(_, time)| *time <= current)
            .max_by_key(|(_, time)| *time)
            .or_else(|| daily.iter().max_by_key(|(_, time)| *time));

        match chosen {
            Some((index, _)) => self.resolve(&self.rules[*index], SelectionSource::Daily(*index)),
            None => self.fallback(),
        }
    }

    fn fallback(&self) -> Selection {
        Selection {
            style_set: self.default_style_set.clone(),
            audio_track: self.default_audio_track.clone(),
            event_plan: None,
            source: SelectionSource::Fallback,
        }
    }

    fn resolve(&self, rule: &Rule, source: SelectionSource) -> Selection {
        let style_set = rule
            .style_set
            .clone()
            .filter(|id| self.style(id).is_some())
            .or_else(|| self.default_style_set.clone());
        let audio_track = rule
            .audio_track
            .clone()
            .or_else(|| self.default_audio_track.clone());
        let event_plan = rule.event_plan.clone().filter(|id| self.plan(id).is_some());
        Selection {
            style_set,
            audio_track,
            event_plan,
            source,
        }
    }
}
