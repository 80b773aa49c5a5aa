use std::sync::{Mutex, PoisonError};

use signage_app::ports::AudioSink;
use signage_domain::settings::AudioTrack;

/// An audio sink that logs instead of playing.
#[derive(Debug, Default)]
pub struct HeadlessAudio {
    playing: Mutex<Option<AudioTrack>>,
}

impl HeadlessAudio {
    /// The track currently "playing".
    #[must_use]
    pub fn now_playing(&self) -> Option<AudioTrack> {
        self.playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AudioSink for HeadlessAudio {
    fn play(&self, track: &AudioTrack) {
        tracing::info!(track = %track.id, title = %track.title, volume = ?track.volume, "playing background audio");
        *self.playing.lock().unwrap_or_else(PoisonError::into_inner) = Some(track.clone());
    }

    fn pause(&self) {
        tracing::info!("pausing background audio");
        *self.playing.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
