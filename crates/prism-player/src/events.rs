//! Notifications emitted to observers through a crossbeam channel.

use crate::backend::PlayerKind;

/// A downscaled frame from the processing path.
///
/// Ownership of the pixel data transfers with the event; the pipeline never
/// reads it back. `width`/`height` are the processing resolution, the source
/// dimensions are carried for coordinate mapping back onto the full frame.
#[derive(Debug, Clone)]
pub struct ProcessingFrame {
    /// Tightly packed RGBA8 rows.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of the frame in seconds (duration × decoder percent).
    pub time_seconds: f64,
    pub source_width: u32,
    pub source_height: u32,
    pub player: PlayerKind,
}

/// Player notifications. Observers subscribe via a
/// `crossbeam_channel::Receiver<PlayerEvent>`.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    VideoLoaded { path: String, player: PlayerKind },
    PlayPauseChanged { paused: bool, player: PlayerKind },
    TimeChanged { time: f32, player: PlayerKind },
    DurationChanged { duration: f32, player: PlayerKind },
    SpeedChanged { speed: f32, player: PlayerKind },
    ProcessingFrame(ProcessingFrame),
}

/// Sending half of the notification channel.
pub type EventSink = crossbeam_channel::Sender<PlayerEvent>;
