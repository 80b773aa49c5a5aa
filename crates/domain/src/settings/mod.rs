//! Settings — the versioned presentation document edited by administrators.
//!
//! The server sends settings alongside the schedule. The orchestrator never
//! mutates the document it received; automation overlays are applied to a
//! working copy produced by [`Settings::with_style`].

mod audio;
mod content;
mod display;

pub use audio::{AudioSettings, AudioTrack};
pub use content::{
    Badge, EventCountdown, Extras, InfoModule, MediaEntry, MediaKind, StoryEntry, WellnessTip,
};
pub use display::{ContentSource, DisplayConfig, LayoutMode, PageConfig, Region};

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::automation::{AutomationSettings, StyleSet};
use crate::schedule::Schedule;

/// Default uniform slide duration.
pub const DEFAULT_DWELL_SECONDS: u32 = 10;

/// Operational status of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoneStatus {
    Active,
    NoInfusions,
    OutOfOrder,
    Hidden,
}

impl ZoneStatus {
    /// Hidden zones never get a slide.
    #[must_use]
    pub fn is_visible(self) -> bool {
        self != Self::Hidden
    }
}

/// Font selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fonts {
    pub heading: Option<String>,
    pub body: Option<String>,
    pub scale: Option<f32>,
}

impl Fonts {
    /// Overlay the fields that `other` sets.
    pub fn merge(&mut self, other: &Self) {
        if other.heading.is_some() {
            self.heading.clone_from(&other.heading);
        }
        if other.body.is_some() {
            self.body.clone_from(&other.body);
        }
        if other.scale.is_some() {
            self.scale = other.scale;
        }
    }
}

/// Whether slides share one duration or carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DwellMode {
    #[default]
    Uniform,
    PerItem,
}

/// Which slides exist and how long they stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlidePolicy {
    pub show_overview: bool,
    pub show_hero_timeline: bool,
    pub dwell_mode: DwellMode,
    pub uniform_seconds: u32,
    pub overview_seconds: Option<u32>,
    pub hero_seconds: Option<u32>,
    /// Per-zone durations, used in per-item mode.
    pub zone_seconds: BTreeMap<String, u32>,
    /// Explicit order of references honored before the default order.
    pub sort_order: Vec<String>,
}

impl Default for SlidePolicy {
    fn default() -> Self {
        Self {
            show_overview: true,
            show_hero_timeline: false,
            dwell_mode: DwellMode::Uniform,
            uniform_seconds: DEFAULT_DWELL_SECONDS,
            overview_seconds: None,
            hero_seconds: None,
            zone_seconds: BTreeMap::new(),
            sort_order: Vec::new(),
        }
    }
}

impl SlidePolicy {
    /// Resolve the dwell an item gets from settings: the uniform duration in
    /// uniform mode, the item's own duration in per-item mode.
    #[must_use]
    pub fn dwell(&self, own_seconds: Option<u32>) -> Option<Duration> {
        let seconds = match self.dwell_mode {
            DwellMode::Uniform => Some(self.uniform_seconds),
            DwellMode::PerItem => own_seconds,
        };
        seconds
            .filter(|s| *s > 0)
            .map(|s| Duration::from_secs(u64::from(s)))
    }
}

/// The presentation document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub version: u64,
    /// Color tokens (`accent`, `background`, …).
    pub theme: BTreeMap<String, String>,
    pub fonts: Fonts,
    /// Free-form slide style tokens.
    pub slide_style: BTreeMap<String, String>,
    /// Explicit status per zone; missing zones derive theirs from the schedule.
    pub zone_status: BTreeMap<String, ZoneStatus>,
    pub slides: SlidePolicy,
    pub display: DisplayConfig,
    pub extras: Extras,
    pub media: Vec<MediaEntry>,
    pub stories: Vec<StoryEntry>,
    pub audio: AudioSettings,
    pub badges: Vec<Badge>,
    pub automation: AutomationSettings,
}

/// What [`Settings::sanitize`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub dropped_tracks: usize,
    pub dropped_badges: usize,
    pub dropped_badge_refs: usize,
}

impl SanitizeReport {
    /// Whether anything was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl Settings {
    /// Clean the audio registry and badge library, and drop cell references
    /// to badges that no longer exist, in `schedule` and in every event plan.
    pub fn sanitize(&mut self, schedule: &mut Schedule) -> SanitizeReport {
        let dropped_tracks = self.audio.sanitize();

        let before = self.badges.len();
        let mut seen = HashSet::new();
        self.badges.retain(|badge| {
            !badge.id.trim().is_empty()
                && !badge.label.trim().is_empty()
                && seen.insert(badge.id.clone())
        });
        let dropped_badges = before - self.badges.len();

        let plans = self
            .automation
            .event_plans
            .iter_mut()
            .map(|plan| &mut plan.schedule);
        let mut dropped_badge_refs = 0;
        for cell in std::iter::once(schedule).chain(plans).flat_map(Schedule::cells_mut) {
            let before = cell.badges.len();
            cell.badges.retain(|id| seen.contains(id));
            dropped_badge_refs += before - cell.badges.len();
        }

        SanitizeReport {
            dropped_tracks,
            dropped_badges,
            dropped_badge_refs,
        }
    }

    /// Status of every zone: the explicit override when present, otherwise
    /// `active` if the zone has at least one cell and `no-infusions` if not.
    #[must_use]
    pub fn zone_statuses(&self, schedule: &Schedule) -> BTreeMap<String, ZoneStatus> {
        schedule
            .zones
            .iter()
            .enumerate()
            .map(|(index, zone)| {
                let status = self.zone_status.get(zone).copied().unwrap_or_else(|| {
                    if schedule.zone_has_entries(index) {
                        ZoneStatus::Active
                    } else {
                        ZoneStatus::NoInfusions
                    }
                });
                (zone.clone(), status)
            })
            .collect()
    }

    /// A copy of these settings with a style-set's overrides merged in.
    #[must_use]
    pub fn with_style(&self, style: &StyleSet) -> Self {
        let mut merged = self.clone();
        merged
            .theme
            .extend(style.theme.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.fonts.merge(&style.fonts);
        merged.slide_style.extend(
            style
                .slide_style
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::EventPlan;
    use crate::schedule::{Cell, ScheduleRow};

    fn schedule() -> Schedule {
        Schedule {
            zones: vec!["A".to_string(), "B".to_string()],
            rows: vec![ScheduleRow {
                time: "10:00".parse().unwrap(),
                day_offset: 0,
                entries: vec![
                    Some(Cell {
                        title: "Aufguss".to_string(),
                        badges: vec!["vegan".to_string(), "ghost".to_string()],
                        ..Cell::default()
                    }),
                    None,
                ],
            }],
        }
    }

    #[test]
    fn should_derive_zone_status_from_cell_presence() {
        let statuses = Settings::default().zone_statuses(&schedule());
        assert_eq!(statuses["A"], ZoneStatus::Active);
        assert_eq!(statuses["B"], ZoneStatus::NoInfusions);
    }

    #[test]
    fn should_prefer_explicit_zone_status() {
        let mut settings = Settings::default();
        settings
            .zone_status
            .insert("A".to_string(), ZoneStatus::Hidden);
        let statuses = settings.zone_statuses(&schedule());
        assert_eq!(statuses["A"], ZoneStatus::Hidden);
        assert!(!statuses["A"].is_visible());
    }

    #[test]
    fn should_drop_invalid_badges_and_dangling_refs() {
        let mut settings = Settings {
            badges: vec![
                Badge {
                    id: "vegan".to_string(),
                    label: "Vegan".to_string(),
                    icon: None,
                    color: None,
                },
                Badge {
                    id: "nolabel".to_string(),
                    label: String::new(),
                    icon: None,
                    color: None,
                },
            ],
            ..Settings::default()
        };
        let mut schedule = schedule();
        let report = settings.sanitize(&mut schedule);
        assert_eq!(report.dropped_badges, 1);
        assert_eq!(report.dropped_badge_refs, 1);
        assert!(!report.is_clean());
        assert_eq!(
            schedule.rows[0].entries[0].as_ref().unwrap().badges,
            ["vegan"]
        );
    }

    #[test]
    fn should_drop_dangling_badge_refs_in_event_plans() {
        let mut settings = Settings::default();
        settings.automation.event_plans.push(EventPlan {
            id: "gala".to_string(),
            name: "Gala".to_string(),
            schedule: schedule(),
        });

        let report = settings.sanitize(&mut Schedule::default());

        assert_eq!(report.dropped_badge_refs, 2);
        let plan = &settings.automation.event_plans[0].schedule;
        assert!(plan.rows[0].entries[0].as_ref().unwrap().badges.is_empty());
    }

    #[test]
    fn should_merge_style_onto_copy_without_touching_original() {
        let mut base = Settings::default();
        base.theme.insert("accent".to_string(), "#fff".to_string());
        base.theme.insert("background".to_string(), "#000".to_string());
        let style = StyleSet {
            id: "evening".to_string(),
            name: "Evening".to_string(),
            theme: BTreeMap::from([("accent".to_string(), "#f80".to_string())]),
            fonts: Fonts {
                heading: Some("Serif".to_string()),
                ..Fonts::default()
            },
            slide_style: BTreeMap::new(),
        };

        let merged = base.with_style(&style);
        assert_eq!(merged.theme["accent"], "#f80");
        assert_eq!(merged.theme["background"], "#000");
        assert_eq!(merged.fonts.heading.as_deref(), Some("Serif"));
        assert_eq!(base.theme["accent"], "#fff");
    }

    #[test]
    fn should_resolve_uniform_and_per_item_dwell() {
        let mut policy = SlidePolicy::default();
        assert_eq!(policy.dwell(Some(30)), Some(Duration::from_secs(10)));
        policy.dwell_mode = DwellMode::PerItem;
        assert_eq!(policy.dwell(Some(30)), Some(Duration::from_secs(30)));
        assert_eq!(policy.dwell(None), None);
    }
}
