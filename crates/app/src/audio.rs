//! Background audio controller — the single owner of play/pause decisions.
//!
//! Audio plays when it is wanted, a track is available and nobody holds a
//! suspension. The sink only hears about transitions.

use std::collections::HashSet;
use std::sync::Arc;

use signage_domain::id::SuspensionToken;
use signage_domain::settings::{AudioSettings, AudioTrack};

use crate::ports::AudioSink;

/// Drives an [`AudioSink`].
#[derive(Debug)]
pub struct BackgroundAudio<S> {
    sink: Arc<S>,
    desired: bool,
    track: Option<AudioTrack>,
    suspensions: HashSet<SuspensionToken>,
    playing: Option<AudioTrack>,
}

impl<S: AudioSink> BackgroundAudio<S> {
    #[must_use]
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            desired: false,
            track: None,
            suspensions: HashSet::new(),
            playing: None,
        }
    }

    /// Take the enabled flag and active track from the working settings.
    pub fn update(&mut self, settings: &AudioSettings) {
        self.desired = settings.enabled;
        self.track = settings.active().cloned();
        self.sync();
    }

    /// Silence the audio until the returned token is released.
    pub fn suspend(&mut self) -> SuspensionToken {
        let token = SuspensionToken::new();
        self.suspensions.insert(token);
        tracing::debug!(%token, outstanding = self.suspensions.len(), "audio suspended");
        self.sync();
        token
    }

    /// Release a suspension. Unknown tokens are ignored.
    pub fn release(&mut self, token: SuspensionToken) {
        if self.suspensions.remove(&token) {
            tracing::debug!(%token, outstanding = self.suspensions.len(), "audio suspension released");
            self.sync();
        }
    }

    /// Stop for good: not desired, no track.
    pub fn stop(&mut self) {
        self.desired = false;
        self.track = None;
        self.sync();
    }

    /// Whether the sink was last told to play.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    #[must_use]
    pub fn suspensions(&self) -> usize {
        self.suspensions.len()
    }

    fn sync(&mut self) {
        let wanted = if self.desired && self.suspensions.is_empty() {
            self.track.as_ref()
        } else {
            None
        };
        match (wanted, &self.playing) {
            (Some(track), Some(playing)) if track == playing => {}
            (Some(track), _) => {
                tracing::info!(track = %track.id, "playing background audio");
                self.sink.play(track);
                self.playing = Some(track.clone());
            }
            (None, Some(_)) => {
                tracing::info!("pausing background audio");
                self.sink.pause();
                self.playing = None;
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        commands: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl AudioSink for RecordingSink {
        fn play(&self, track: &AudioTrack) {
            self.commands.lock().unwrap().push(format!("play {}", track.id));
        }

        fn pause(&self) {
            self.commands.lock().unwrap().push("pause".to_string());
        }
    }

    fn track(id: &str) -> AudioTrack {
        AudioTrack {
            id: id.to_string(),
            title: id.to_string(),
            url: format!("https://cdn.example/{id}.mp3"),
            volume: None,
        }
    }

    fn settings(enabled: bool, active: Option<&str>) -> AudioSettings {
        AudioSettings {
            enabled,
            tracks: vec![track("lounge"), track("calm")],
            active_track: active.map(ToString::to_string),
        }
    }

    fn audio() -> (Arc<RecordingSink>, BackgroundAudio<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (Arc::clone(&sink), BackgroundAudio::new(sink))
    }

    #[test]
    fn should_play_only_when_desired_with_track() {
        let (sink, mut audio) = audio();
        audio.update(&settings(false, Some("lounge")));
        audio.update(&settings(true, None));
        assert!(sink.commands().is_empty());

        audio.update(&settings(true, Some("lounge")));
        assert_eq!(sink.commands(), ["play lounge"]);
        assert!(audio.is_playing());
    }

    #[test]
    fn should_not_repeat_commands_without_transition() {
        let (sink, mut audio) = audio();
        audio.update(&settings(true, Some("lounge")));
        audio.update(&settings(true, Some("lounge")));
        audio.update(&settings(true, Some("calm")));
        audio.update(&settings(false, Some("calm")));
        audio.update(&settings(false, Some("calm")));

        assert_eq!(sink.commands(), ["play lounge", "play calm", "pause"]);
    }

    #[test]
    fn should_stay_paused_until_every_suspension_is_released() {
        let (sink, mut audio) = audio();
        audio.update(&settings(true, Some("lounge")));
        let first = audio.suspend();
        let second = audio.suspend();

        audio.release(first);
        assert!(!audio.is_playing());
        audio.release(second);
        assert!(audio.is_playing());
        assert_eq!(sink.commands(), ["play lounge", "pause", "play lounge"]);
    }

    #[test]
    fn should_ignore_unknown_or_repeated_release() {
        let (sink, mut audio) = audio();
        audio.update(&settings(true, Some("lounge")));
        let token = audio.suspend();
        audio.release(token);
        audio.release(token);
        audio.release(SuspensionToken::new());

        assert_eq!(audio.suspensions(), 0);
        assert_eq!(sink.commands(), ["play lounge", "pause", "play lounge"]);
    }

    #[test]
    fn should_pick_up_track_change_while_suspended_on_release() {
        let (sink, mut audio) = audio();
        audio.update(&settings(true, Some("lounge")));
        let token = audio.suspend();
        audio.update(&settings(true, Some("calm")));
        audio.release(token);

        assert_eq!(sink.commands(), ["play lounge", "pause", "play calm"]);
    }

    #[test]
    fn should_pause_on_stop() {
        let (sink, mut audio) = audio();
        audio.update(&settings(true, Some("lounge")));
        audio.stop();
        audio.stop();
        assert_eq!(sink.commands(), ["play lounge", "pause"]);
    }
}
