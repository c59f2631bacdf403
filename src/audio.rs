//! Audio boundary
//!
//! The simulation only emits [`SoundRequest`]s. The manager applies the
//! player's volume settings and hands them to whatever backend is plugged in.

use crate::sim::{GameEvent, SoundRequest};

/// Playback backend
pub trait AudioSink {
    fn play(&mut self, request: SoundRequest);
}

/// Discards everything (headless runs)
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&mut self, _request: SoundRequest) {}
}

/// Keeps every request, for tests and tooling
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub played: Vec<SoundRequest>,
}

impl AudioSink for RecordingSink {
    fn play(&mut self, request: SoundRequest) {
        self.played.push(request);
    }
}

/// Audio manager for the game
pub struct AudioManager<S: AudioSink = NullSink> {
    sink: S,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for AudioManager<NullSink> {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

impl<S: AudioSink> AudioManager<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Play one request scaled by the current volume settings
    pub fn play(&mut self, mut request: SoundRequest) {
        let vol = self.effective_volume() * request.volume;
        if vol <= 0.0 {
            return;
        }
        request.volume = vol.clamp(0.0, 1.0);
        request.pan = request.pan.clamp(-1.0, 1.0);
        self.sink.play(request);
    }

    /// Play the sounds among a tick's events; returns how many were found
    pub fn play_events<'a>(&mut self, events: impl IntoIterator<Item = &'a GameEvent>) -> usize {
        let mut count = 0;
        for event in events {
            if let GameEvent::Sound(request) = event {
                self.play(*request);
                count += 1;
            }
        }
        count
    }
}
