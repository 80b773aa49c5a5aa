//! Background-audio track registry.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A playable background track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Registry of tracks plus the pointer to the one that should play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    pub enabled: bool,
    pub tracks: Vec<AudioTrack>,
    pub active_track: Option<String>,
}

impl AudioSettings {
    /// Drop unusable tracks, de-duplicate ids and clear a dangling pointer.
    ///
    /// Returns the number of tracks removed.
    pub fn sanitize(&mut self) -> usize {
        let before = self.tracks.len();
        let mut seen = HashSet::new();
        self.tracks.retain(|track| {
            !track.id.trim().is_empty()
                && !track.url.trim().is_empty()
                && seen.insert(track.id.clone())
        });
        for track in &mut self.tracks {
            track.volume = track.volume.map(|v| v.clamp(0.0, 1.0));
        }
        if let Some(active) = &self.active_track {
            if self.track(active).is_none() {
                self.active_track = None;
            }
        }
        before - self.tracks.len()
    }

    /// Look up a track by id.
    #[must_use]
    pub fn track(&self, id: &str) -> Option<&AudioTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// The track the active pointer designates, if it exists.
    #[must_use]
    pub fn active(&self) -> Option<&AudioTrack> {
        self.active_track.as_deref().and_then(|id| self.track(id))
    }
}
