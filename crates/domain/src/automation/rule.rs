//! Rule — a time slot naming what should be active during it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{LocalTime, TimeOfDay};

/// When a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleSlot {
    /// Applies every day from `time` until the next daily rule.
    Daily { time: TimeOfDay },
    /// Applies between two absolute local times (`start <= now < end`).
    Range { start: LocalTime, end: LocalTime },
}

/// An automation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(flatten)]
    pub slot: RuleSlot,
    #[serde(default)]
    pub style_set: Option<String>,
    #[serde(default)]
    pub audio_track: Option<String>,
    #[serde(default)]
    pub event_plan: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl Rule {
    /// A daily rule starting at `time`.
    #[must_use]
    pub fn daily(time: TimeOfDay) -> Self {
        Self::from_slot(RuleSlot::Daily { time })
    }

    /// A range rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvertedRange`] when `end` precedes `start`.
    pub fn range(start: LocalTime, end: LocalTime) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvertedRange);
        }
        Ok(Self::from_slot(RuleSlot::Range { start, end }))
    }

    fn from_slot(slot: RuleSlot) -> Self {
        Self {
            slot,
            style_set: None,
            audio_track: None,
            event_plan: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn style_set(mut self, id: impl Into<String>) -> Self {
        self.style_set = Some(id.into());
        self
    }

    #[must_use]
    pub fn audio_track(mut self, id: impl Into<String>) -> Self {
        self.audio_track = Some(id.into());
        self
    }

    #[must_use]
    pub fn event_plan(mut self, id: impl Into<String>) -> Self {
        self.event_plan = Some(id.into());
        self
    }

    /// Whether a range rule covers `now`. Daily rules never match here.
    #[must_use]
    pub fn covers(&self, now: &LocalTime) -> bool {
        match &self.slot {
            RuleSlot::Range { start, end } => start <= now && now < end,
            RuleSlot::Daily { .. } => false,
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.slot {
            RuleSlot::Daily { time } => write!(f, "daily({time})"),
            RuleSlot::Range { start, end } => write!(f, "range({start}..{end})"),
        }
    }
}
