//! Per-player orchestration: event drain, playback state, pipeline ticks.
//!
//! One [`VideoPlayer`] owns one backend instance and one [`DualPipeline`].
//! Every `update()` drains the backend's property stream in full before
//! anything renders, so state updates always precede the render and readback
//! that consume them within the same tick.

use std::time::Instant;

use crate::backend::{BackendError, MediaBackend, PlayerKind, PropertyEvent};
use crate::events::{EventSink, PlayerEvent};
use crate::gpu::{GpuContext, RenderTarget};
use crate::pipeline::{DualPipeline, PipelineError, TickOutcome};
use crate::playback::PlaybackClock;
use crate::settings::ProcessingSettings;
use crate::vr::VrFormatInfo;

/// Playback-side state: the clock plus the cached decoder properties.
/// GPU-free, so event dispatch is testable without a device.
pub struct PlaybackSession {
    pub clock: PlaybackClock,
    path: String,
    width: u32,
    height: u32,
    loaded: bool,
    kind: PlayerKind,
    sink: EventSink,
}

impl PlaybackSession {
    pub fn new(kind: PlayerKind, sink: EventSink) -> Self {
        Self {
            clock: PlaybackClock::new(),
            path: String::new(),
            width: 0,
            height: 0,
            loaded: false,
            kind,
            sink,
        }
    }

    /// Apply one property event. Returns true when the source dimensions
    /// changed and size-dependent targets must be reallocated.
    pub fn apply(&mut self, event: PropertyEvent, now: Instant) -> bool {
        match event {
            PropertyEvent::FileLoaded => {
                self.loaded = true;
                false
            }
            PropertyEvent::Duration(duration) => {
                self.clock.set_duration(duration);
                let _ = self.sink.send(PlayerEvent::DurationChanged {
                    duration: duration as f32,
                    player: self.kind,
                });
                false
            }
            PropertyEvent::PercentPos(percent) => {
                self.clock.sync_position(percent / 100.0, now);
                let _ = self.sink.send(PlayerEvent::TimeChanged {
                    time: (self.clock.duration() * self.clock.percent_position()) as f32,
                    player: self.kind,
                });
                false
            }
            PropertyEvent::Speed(speed) => {
                self.clock.set_speed(speed);
                let _ = self.sink.send(PlayerEvent::SpeedChanged {
                    speed: self.clock.speed() as f32,
                    player: self.kind,
                });
                false
            }
            PropertyEvent::Paused(paused) => {
                self.clock.observe_pause(paused, now);
                let _ = self.sink.send(PlayerEvent::PlayPauseChanged {
                    paused,
                    player: self.kind,
                });
                false
            }
            PropertyEvent::Width(width) => {
                let changed = width != self.width;
                self.width = width;
                if self.height > 0 && self.width > 0 {
                    self.loaded = true;
                }
                changed
            }
            PropertyEvent::Height(height) => {
                let changed = height != self.height;
                self.height = height;
                if self.height > 0 && self.width > 0 {
                    self.loaded = true;
                }
                changed
            }
            PropertyEvent::FilePath(path) => {
                self.path = path.clone();
                let _ = self.sink.send(PlayerEvent::VideoLoaded {
                    path,
                    player: self.kind,
                });
                false
            }
            PropertyEvent::Fps(fps) => {
                self.clock.set_fps(fps);
                false
            }
        }
    }

    /// Reset for a new clip, preserving speed and pause state across loads.
    fn reset_for_open(&mut self) {
        let speed = self.clock.speed();
        let paused = self.clock.is_paused();
        let fps = self.clock.fps();

        self.clock = PlaybackClock::new();
        self.clock.set_speed(speed);
        if !paused {
            self.clock.observe_pause(false, Instant::now());
        }
        self.clock.set_fps(fps);

        self.path.clear();
        self.width = 0;
        self.height = 0;
        self.loaded = false;
    }
}

/// A complete player: backend handle, playback session, frame pipeline.
/// All GPU handles live inside and are released when the player drops.
pub struct VideoPlayer<B: MediaBackend> {
    backend: B,
    session: PlaybackSession,
    pipeline: DualPipeline,
}

impl<B: MediaBackend> VideoPlayer<B> {
    pub fn new(gpu: &GpuContext, backend: B, kind: PlayerKind, sink: EventSink) -> Self {
        Self {
            backend,
            session: PlaybackSession::new(kind, sink),
            pipeline: DualPipeline::new(gpu, kind),
        }
    }

    /// Drive one tick: drain all pending property events, then render.
    /// Override settings are read exactly once per tick, here.
    pub fn update(
        &mut self,
        gpu: &GpuContext,
        settings: &ProcessingSettings,
    ) -> Result<TickOutcome, PipelineError> {
        let now = Instant::now();
        let mut dims_changed = false;
        for event in self.backend.poll_events() {
            dims_changed |= self.session.apply(event, now);
        }
        if dims_changed {
            self.pipeline
                .set_source_size(self.session.width, self.session.height);
        }

        self.pipeline.tick(
            gpu,
            &mut self.backend,
            &self.session.clock,
            settings,
            &self.session.path,
            &self.session.sink,
        )
    }

    /// Open a clip. Detection and all source-sized targets are invalidated;
    /// speed and pause state carry over, matching decoder behavior.
    pub fn open_video(&mut self, path: &str) -> Result<(), BackendError> {
        log::info!("opening video: {path:?}");
        self.close_video()?;

        self.backend.load(path)?;
        self.session.reset_for_open();
        self.pipeline.invalidate_detection();
        self.pipeline.set_source_size(0, 0);

        self.set_paused(true)?;
        self.backend.set_speed(self.session.clock.speed())?;
        Ok(())
    }

    pub fn close_video(&mut self) -> Result<(), BackendError> {
        self.session.loaded = false;
        self.backend.stop()?;
        self.set_paused(true)
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<(), BackendError> {
        if self.session.clock.is_paused() == paused {
            return Ok(());
        }
        self.backend.set_paused(paused)
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), BackendError> {
        let (min, max) = self.backend.speed_range();
        let speed = speed.clamp(min, max);
        if self.session.clock.speed() != speed {
            self.backend.set_speed(speed)?;
        }
        Ok(())
    }

    pub fn add_speed(&mut self, delta: f64) -> Result<(), BackendError> {
        self.set_speed(self.session.clock.speed() + delta)
    }

    /// Absolute seek. Applied optimistically to the clock before the backend
    /// confirms, so UI reads stay responsive.
    pub fn set_position_percent(
        &mut self,
        percent: f64,
        pauses_video: bool,
    ) -> Result<(), BackendError> {
        let percent = percent.clamp(0.0, 1.0);
        self.session.clock.set_position_percent(percent);
        if pauses_video {
            self.set_paused(true)?;
        }
        self.backend.seek_percent(percent)
    }

    pub fn set_position_seconds(
        &mut self,
        seconds: f64,
        pauses_video: bool,
    ) -> Result<(), BackendError> {
        let duration = self.session.clock.duration();
        if duration <= 0.0 {
            return Ok(());
        }
        let seconds = seconds.clamp(0.0, duration);
        self.set_position_percent(seconds / duration, pauses_video)
    }

    pub fn seek_relative(&mut self, delta_seconds: f64) -> Result<(), BackendError> {
        match self
            .session
            .clock
            .seek_relative_at(delta_seconds, Instant::now())
        {
            Some(percent) => self.backend.seek_percent(percent),
            None => Ok(()),
        }
    }

    /// Step one frame forward. Only effective while paused.
    pub fn next_frame(&mut self) -> Result<(), BackendError> {
        match self.session.clock.step_frames(1) {
            Some(percent) => self.backend.seek_percent(percent),
            None => Ok(()),
        }
    }

    /// Step one frame back. Only effective while paused.
    pub fn previous_frame(&mut self) -> Result<(), BackendError> {
        match self.session.clock.step_frames(-1) {
            Some(percent) => self.backend.seek_percent(percent),
            None => Ok(()),
        }
    }

    pub fn set_tracking_active(&mut self, active: bool) {
        self.pipeline.set_tracking_active(active);
    }

    pub fn is_tracking_active(&self) -> bool {
        self.pipeline.is_tracking_active()
    }

    // ---- Getters ----

    pub fn clock(&self) -> &PlaybackClock {
        &self.session.clock
    }

    pub fn video_width(&self) -> u32 {
        self.session.width
    }

    pub fn video_height(&self) -> u32 {
        self.session.height
    }

    pub fn video_path(&self) -> &str {
        &self.session.path
    }

    pub fn video_loaded(&self) -> bool {
        self.session.loaded
    }

    pub fn duration(&self) -> f64 {
        self.session.clock.duration()
    }

    pub fn is_paused(&self) -> bool {
        self.session.clock.is_paused()
    }

    pub fn current_time(&self) -> f64 {
        self.session.clock.current_time()
    }

    pub fn current_percent_position(&self) -> f64 {
        self.session.clock.position()
    }

    pub fn fps(&self) -> f64 {
        self.session.clock.fps()
    }

    pub fn frame_time(&self) -> f64 {
        self.session.clock.frame_time()
    }

    pub fn vr_format(&self) -> Option<VrFormatInfo> {
        self.pipeline.vr_format()
    }

    /// Display target for host presentation, once a frame has rendered.
    pub fn display_target(&self) -> Option<&RenderTarget> {
        self.pipeline.display_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;

    fn session() -> (PlaybackSession, Receiver<PlayerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (PlaybackSession::new(PlayerKind::Main, tx), rx)
    }

    #[test]
    fn duration_event_updates_clock_and_notifies() {
        let (mut session, rx) = session();
        session.apply(PropertyEvent::Duration(120.0), Instant::now());

        assert_eq!(session.clock.duration(), 120.0);
        match rx.try_recv().unwrap() {
            PlayerEvent::DurationChanged { duration, player } => {
                assert_eq!(duration, 120.0);
                assert_eq!(player, PlayerKind::Main);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn percent_pos_event_syncs_and_reports_time() {
        let (mut session, rx) = session();
        let now = Instant::now();
        session.apply(PropertyEvent::Duration(200.0), now);
        let _ = rx.try_recv();

        session.apply(PropertyEvent::PercentPos(25.0), now);
        assert_eq!(session.clock.percent_position(), 0.25);
        match rx.try_recv().unwrap() {
            PlayerEvent::TimeChanged { time, .. } => assert_eq!(time, 50.0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn dimension_events_flag_reallocation_once_both_known() {
        let (mut session, _rx) = session();
        let now = Instant::now();

        assert!(session.apply(PropertyEvent::Width(3840), now));
        assert!(!session.loaded);
        assert!(session.apply(PropertyEvent::Height(1920), now));
        assert!(session.loaded);

        // Same values again: no reallocation
        assert!(!session.apply(PropertyEvent::Width(3840), now));
        assert!(!session.apply(PropertyEvent::Height(1920), now));
    }

    #[test]
    fn file_path_event_announces_video() {
        let (mut session, rx) = session();
        session.apply(
            PropertyEvent::FilePath("scene_180_SBS.mp4".into()),
            Instant::now(),
        );
        match rx.try_recv().unwrap() {
            PlayerEvent::VideoLoaded { path, .. } => assert_eq!(path, "scene_180_SBS.mp4"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn pause_event_notifies_and_freezes_clock() {
        let (mut session, rx) = session();
        let now = Instant::now();
        session.apply(PropertyEvent::Duration(100.0), now);
        session.apply(PropertyEvent::Paused(false), now);
        session.apply(PropertyEvent::PercentPos(50.0), now);
        session.apply(PropertyEvent::Paused(true), now);

        assert!(session.clock.is_paused());
        assert_eq!(session.clock.current_time_at(now), 50.0);

        let kinds: Vec<_> = rx.try_iter().collect();
        assert!(matches!(kinds.last(), Some(PlayerEvent::PlayPauseChanged { paused: true, .. })));
    }

    #[test]
    fn reset_preserves_speed_and_pause_across_loads() {
        let (mut session, _rx) = session();
        let now = Instant::now();
        session.apply(PropertyEvent::Speed(2.0), now);
        session.apply(PropertyEvent::Width(1920), now);
        session.apply(PropertyEvent::Height(1080), now);
        session.apply(PropertyEvent::Duration(60.0), now);

        session.reset_for_open();
        assert_eq!(session.clock.speed(), 2.0);
        assert!(session.clock.is_paused());
        assert_eq!(session.clock.duration(), 0.0);
        assert_eq!(session.width, 0);
        assert!(!session.loaded);
    }

    #[test]
    fn speed_event_is_clamped_before_notify() {
        let (mut session, rx) = session();
        session.apply(PropertyEvent::Speed(99.0), Instant::now());
        match rx.try_recv().unwrap() {
            PlayerEvent::SpeedChanged { speed, .. } => {
                assert_eq!(f64::from(speed), crate::playback::MAX_PLAYBACK_SPEED);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
