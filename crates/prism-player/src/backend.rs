//! Seam to the external media backend (decoder + renderer).
//!
//! The backend decodes and renders; this crate never does. It surfaces its
//! state as a stream of discrete [`PropertyEvent`]s which the player drains
//! in full at the start of every tick, before any rendering.

use thiserror::Error;
use wgpu::{CommandEncoder, TextureView};

use crate::playback::{MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};

/// Which player instance an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Main,
    Preview,
}

/// A discrete property change reported by the media backend.
///
/// Closed set: each variant owns its payload, and the player dispatches on
/// the variant rather than on a property-name string.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEvent {
    /// A file finished loading; dimensions become available around this time.
    FileLoaded,
    /// Clip duration in seconds.
    Duration(f64),
    /// Playback position in percent (0–100).
    PercentPos(f64),
    /// Playback speed multiplier.
    Speed(f64),
    /// Pause flag.
    Paused(bool),
    /// Source video width in pixels.
    Width(u32),
    /// Source video height in pixels.
    Height(u32),
    /// Path of the currently loaded file.
    FilePath(String),
    /// Estimated frames per second of the source.
    Fps(f64),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("decoder command failed: {0}")]
    Command(String),
    #[error("render failed: {0}")]
    Render(String),
}

/// The external decoder/renderer, treated as opaque.
pub trait MediaBackend {
    /// Drain all pending property events. Called once at the start of each
    /// tick; must return everything accumulated since the previous call.
    fn poll_events(&mut self) -> Vec<PropertyEvent>;

    /// Render the current frame into `target` at the given resolution.
    fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Start loading a file. Completion is reported via property events.
    fn load(&mut self, path: &str) -> Result<(), BackendError>;

    /// Stop playback and unload the current file.
    fn stop(&mut self) -> Result<(), BackendError>;

    fn set_paused(&mut self, paused: bool) -> Result<(), BackendError>;

    fn set_speed(&mut self, speed: f64) -> Result<(), BackendError>;

    /// Seek to an absolute position in [0, 1].
    fn seek_percent(&mut self, percent: f64) -> Result<(), BackendError>;

    /// (min, max) playback speed the backend accepts.
    fn speed_range(&self) -> (f64, f64) {
        (MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
    }
}
