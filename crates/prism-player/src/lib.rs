//! Dual-pipeline video frame router.
//!
//! Frames from a hardware-accelerated decoder are driven through two
//! independently-paced paths each render tick: a full-resolution display
//! path, and a fixed-size downscaled path that crops stereo VR sources to a
//! single eye and reads pixels back for vision consumers (trackers and the
//! like). Playback position is reconciled between the decoder's laggy
//! property stream and a locally interpolated clock.
//!
//! The decoder itself is external, behind [`backend::MediaBackend`]; this
//! crate owns classification, synchronization, and the GPU frame plumbing.

pub mod backend;
pub mod events;
pub mod gpu;
pub mod pipeline;
pub mod playback;
pub mod player;
pub mod settings;
pub mod vr;

pub use backend::{BackendError, MediaBackend, PlayerKind, PropertyEvent};
pub use events::{EventSink, PlayerEvent, ProcessingFrame};
pub use gpu::GpuContext;
pub use pipeline::{DualPipeline, PipelineError, TickOutcome, PROCESSING_SIZE};
pub use playback::{PlaybackClock, MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
pub use player::{PlaybackSession, VideoPlayer};
pub use settings::{LayoutOverride, ProcessingSettings, VideoTypeOverride};
pub use vr::{detect_format, VrFormatInfo, VrLayout, VrProjection};
