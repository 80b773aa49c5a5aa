//! Content catalogues carried by the settings document: interstitial media,
//! story slides, extras and the badge library.

use serde::{Deserialize, Serialize};

use crate::settings::Region;
use crate::time::LocalTime;

const fn yes() -> bool {
    true
}

/// Media flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
    Url,
}

/// One interstitial media entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub id: String,
    #[serde(default)]
    pub kind: MediaKind,
    pub url: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub wait_for_completion: bool,
    #[serde(default = "yes")]
    pub muted: bool,
    #[serde(default)]
    pub regions: Vec<Region>,
}

/// One narrative story slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Scroll-driven: the renderer decides when the story is done.
    #[serde(default)]
    pub scroll: bool,
    #[serde(default)]
    pub regions: Vec<Region>,
}

/// A short wellness tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessTip {
    pub id: String,
    pub text: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

/// Static information panel shown alongside the overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoModule {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "yes")]
    pub enabled: bool,
}

/// Countdown to an upcoming event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCountdown {
    pub id: String,
    pub title: String,
    pub target: LocalTime,
    #[serde(default = "yes")]
    pub enabled: bool,
}

impl EventCountdown {
    /// Whether the countdown is still running at `now`.
    #[must_use]
    pub fn is_upcoming(&self, now: &LocalTime) -> bool {
        self.enabled && self.target > *now
    }
}

/// Optional extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Extras {
    pub wellness_tips: Vec<WellnessTip>,
    pub info_modules: Vec<InfoModule>,
    pub event_countdowns: Vec<EventCountdown>,
}

/// A badge that schedule cells may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_default_media_to_enabled_and_muted() {
        let media: MediaEntry =
            serde_json::from_str(r#"{"id":"5","url":"https://cdn.example/a.jpg"}"#).unwrap();
        assert!(media.enabled);
        assert!(media.muted);
        assert_eq!(media.kind, MediaKind::Image);
        assert!(media.regions.is_empty());
    }

    #[test]
    fn should_report_countdown_upcoming_only_before_target() {
        let target = NaiveDate::from_ymd_opt(2026, 12, 31)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let countdown = EventCountdown {
            id: "nye".to_string(),
            title: "Silvester".to_string(),
            target,
            enabled: true,
        };
        assert!(countdown.is_upcoming(&(target - chrono::Duration::hours(1))));
        assert!(!countdown.is_upcoming(&target));
    }
}
