//! Playback position reconciliation.
//!
//! The decoder reports percent-position asynchronously and with noticeable
//! lag. UI code wants a smooth position, so the clock keeps a locally
//! interpolated "logical" position that is re-anchored whenever an
//! authoritative update arrives. While paused the logical position is frozen
//! except for explicit seeks.

use std::time::Instant;

/// Slowest playback speed the decoder accepts.
pub const MIN_PLAYBACK_SPEED: f64 = 0.05;
/// Fastest playback speed the decoder accepts.
pub const MAX_PLAYBACK_SPEED: f64 = 3.0;

pub struct PlaybackClock {
    /// Clip duration in seconds. 0 until the decoder reports it.
    duration: f64,
    /// Decoder-reported position in [0, 1]. Authoritative but laggy.
    percent_pos: f64,
    /// Locally interpolated position in [0, 1]. What the UI reads.
    logical_position: f64,
    speed: f64,
    paused: bool,
    fps: f64,
    /// Wall-clock instant of the last authoritative anchor.
    last_sync: Option<Instant>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            duration: 0.0,
            percent_pos: 0.0,
            logical_position: 0.0,
            speed: 1.0,
            paused: true,
            fps: 30.0,
            last_sync: None,
        }
    }

    /// Authoritative percent-position update from the decoder.
    /// Re-anchors the logical position while playing.
    pub fn sync_position(&mut self, percent: f64, now: Instant) {
        let percent = percent.clamp(0.0, 1.0);
        self.percent_pos = percent;
        self.last_sync = Some(now);
        if !self.paused {
            self.logical_position = percent;
        }
    }

    /// Authoritative pause-flag update from the decoder.
    ///
    /// On the transition into pause, the time elapsed since the last anchor
    /// is folded into the logical position once: the decoder keeps playing
    /// for a moment after the pause command, and its last position report
    /// predates the actual stop.
    pub fn observe_pause(&mut self, paused: bool, now: Instant) {
        if paused && !self.paused && self.duration > 0.0 {
            if let Some(last) = self.last_sync {
                let elapsed = now.duration_since(last).as_secs_f64();
                let offset = elapsed * self.speed / self.duration;
                self.logical_position = (self.logical_position + offset).clamp(0.0, 1.0);
            }
        }
        self.last_sync = Some(now);
        self.paused = paused;
    }

    /// Optimistic seek: sets both logical and authoritative position before
    /// the decoder confirms, so the UI never waits on the seek round-trip.
    /// The confirmation re-anchors to a value that already matches.
    pub fn set_position_percent(&mut self, percent: f64) {
        let percent = percent.clamp(0.0, 1.0);
        self.logical_position = percent;
        self.percent_pos = percent;
    }

    /// Relative seek in seconds, clamped to the start of the clip.
    /// Returns the resulting percent position, or None without a duration.
    pub fn seek_relative_at(&mut self, delta_seconds: f64, now: Instant) -> Option<f64> {
        if self.duration <= 0.0 {
            return None;
        }
        let target = (self.current_time_at(now) + delta_seconds).max(0.0);
        let percent = (target / self.duration).clamp(0.0, 1.0);
        self.set_position_percent(percent);
        Some(percent)
    }

    /// Step by whole frames while paused. Returns the new percent position,
    /// or None while playing or without a duration.
    pub fn step_frames(&mut self, frames: i32) -> Option<f64> {
        if !self.paused || self.duration <= 0.0 {
            return None;
        }
        // Slight overshoot keeps the decoder from landing on the same frame
        let rel_seek = self.frame_time() * 1.000001 * f64::from(frames);
        let percent = (self.percent_pos + rel_seek / self.duration).clamp(0.0, 1.0);
        self.set_position_percent(percent);
        Some(percent)
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
    }

    pub fn set_fps(&mut self, fps: f64) {
        if fps > 0.0 {
            self.fps = fps;
        }
    }

    /// Current time in seconds at the given instant.
    ///
    /// Paused: exactly logical × duration, no extrapolation. Playing: the
    /// logical position advanced by wall time since the last anchor, clamped
    /// to the clip bounds. 0 until a duration is known.
    pub fn current_time_at(&self, now: Instant) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.paused {
            return self.logical_position * self.duration;
        }
        let elapsed = self
            .last_sync
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        let offset = elapsed * self.speed / self.duration;
        ((self.logical_position + offset) * self.duration).clamp(0.0, self.duration)
    }

    /// Current time in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_time_at(Instant::now())
    }

    /// Logical position in [0, 1].
    pub fn position(&self) -> f64 {
        self.logical_position
    }

    /// Last decoder-reported position in [0, 1].
    pub fn percent_position(&self) -> f64 {
        self.percent_pos
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Average frame duration in seconds.
    pub fn frame_time(&self) -> f64 {
        1.0 / self.fps
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
