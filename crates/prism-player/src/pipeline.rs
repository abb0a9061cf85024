//! Dual-pipeline frame routing.
//!
//! One tick drives both consumption paths: the display path renders the
//! decoder's frame at source resolution, and, only while tracking is active,
//! the processing path downscales it, optionally crops a single eye, and
//! reads the result back for vision consumers. Faults on the processing path
//! degrade to a skipped emission; the display path is never affected by them.

use thiserror::Error;
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindingResource, RenderPipeline,
};

use crate::backend::{BackendError, MediaBackend, PlayerKind};
use crate::events::{EventSink, PlayerEvent, ProcessingFrame};
use crate::gpu::{
    create_fs_pipeline, run_fullscreen_pass, sampler_entry, tex_entry, AsyncReadbackRing,
    FrameCropStage, GpuContext, RenderTarget, FRAME_FORMAT,
};
use crate::playback::PlaybackClock;
use crate::settings::{resolve_format, ProcessingSettings};
use crate::vr::{self, VrFormatInfo, VrLayout};

/// Edge length of the fixed square processing target.
pub const PROCESSING_SIZE: u32 = 640;

const DOWNSCALE_FS: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4f {
    return textureSample(src_tex, src_sampler, input.uv);
}
"#;

/// Where a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing rendered; source dimensions are not known yet.
    Idle,
    /// Display rendered; processing ran but produced no frame this tick
    /// (ring warm-up or a skipped readback).
    MainRendered,
    /// Display rendered; processing path disabled.
    ProcessingSkipped,
    /// Display rendered and a processing frame was emitted.
    ProcessingEmitted,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-player frame pipeline. Owns every GPU resource it renders into;
/// teardown is plain drop order, nothing outlives the pipeline.
pub struct DualPipeline {
    player: PlayerKind,
    source_width: u32,
    source_height: u32,
    /// Source-resolution display target. Reallocated lazily whenever the
    /// source dimensions change.
    display: Option<RenderTarget>,
    /// Fixed-size intermediate the display frame is downscaled into.
    /// Allocated once, reused across clips.
    intermediate: RenderTarget,
    crop: FrameCropStage,
    readback: AsyncReadbackRing,
    downscale_pipeline: RenderPipeline,
    downscale_bgl: BindGroupLayout,
    /// Cached detection result, valid for the lifetime of one loaded clip.
    vr_format: Option<VrFormatInfo>,
    tracking_active: bool,
}

impl DualPipeline {
    pub fn new(gpu: &GpuContext, player: PlayerKind) -> Self {
        let device = &gpu.device;

        let downscale_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("downscale-bgl"),
            entries: &[tex_entry(0), sampler_entry(1)],
        });
        let downscale_pipeline =
            create_fs_pipeline(device, "downscale", &downscale_bgl, DOWNSCALE_FS, FRAME_FORMAT);

        let intermediate = RenderTarget::new(
            device,
            PROCESSING_SIZE,
            PROCESSING_SIZE,
            FRAME_FORMAT,
            "processing-intermediate",
        );
        let crop = FrameCropStage::new(device, FRAME_FORMAT, PROCESSING_SIZE);
        let readback = AsyncReadbackRing::new(device, PROCESSING_SIZE, PROCESSING_SIZE);

        Self {
            player,
            source_width: 0,
            source_height: 0,
            display: None,
            intermediate,
            crop,
            readback,
            downscale_pipeline,
            downscale_bgl,
            vr_format: None,
            tracking_active: false,
        }
    }

    /// Record new source dimensions. The display target is torn down here
    /// and reallocated lazily on the next tick that needs it.
    pub fn set_source_size(&mut self, width: u32, height: u32) {
        if width == self.source_width && height == self.source_height {
            return;
        }
        self.source_width = width;
        self.source_height = height;
        self.display = None;
    }

    /// Enable or disable the processing path. Takes effect on the next tick;
    /// an in-flight readback copy completes on the GPU but is never mapped.
    pub fn set_tracking_active(&mut self, active: bool) {
        if self.tracking_active == active {
            return;
        }
        self.tracking_active = active;
        if active {
            log::info!("tracking enabled: processing path active");
        } else {
            self.readback.reset();
            log::info!("tracking disabled: processing path inactive");
        }
    }

    pub fn is_tracking_active(&self) -> bool {
        self.tracking_active
    }

    /// Forget the cached detection result. Called on video-open only;
    /// property updates never invalidate a classification mid-clip.
    pub fn invalidate_detection(&mut self) {
        self.vr_format = None;
    }

    /// Auto-detected format of the current clip, if detection has run.
    pub fn vr_format(&self) -> Option<VrFormatInfo> {
        self.vr_format
    }

    /// The texture the display path rendered into, for host presentation.
    pub fn display_target(&self) -> Option<&RenderTarget> {
        self.display.as_ref()
    }

    /// Drive one tick: render the display frame, then conditionally the
    /// processing path. Ordering within the tick is fixed: state updates
    /// (event drain, done by the caller) precede this, the main render
    /// precedes the downscale, and the readback map happens after submit.
    pub fn tick<B: MediaBackend>(
        &mut self,
        gpu: &GpuContext,
        backend: &mut B,
        clock: &PlaybackClock,
        settings: &ProcessingSettings,
        file_path: &str,
        sink: &EventSink,
    ) -> Result<TickOutcome, PipelineError> {
        if self.source_width == 0 || self.source_height == 0 {
            // Dimensions not known yet; target sizing is deferred
            return Ok(TickOutcome::Idle);
        }

        let device = &gpu.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pipeline-tick"),
        });

        // Display path, full resolution. Allocated lazily so a failed clip
        // load costs nothing.
        let (source_width, source_height) = (self.source_width, self.source_height);
        let display = self.display.get_or_insert_with(|| {
            log::info!("allocating display target {source_width}x{source_height}");
            RenderTarget::new(device, source_width, source_height, FRAME_FORMAT, "display")
        });
        backend.render(&mut encoder, &display.view, display.width, display.height)?;

        if !self.tracking_active {
            gpu.queue.submit(std::iter::once(encoder.finish()));
            return Ok(TickOutcome::ProcessingSkipped);
        }

        // Classification runs once per clip, as soon as dimensions are known
        if self.vr_format.is_none() {
            let info = vr::detect_format(self.source_width, self.source_height, file_path);
            if info.is_vr {
                log::info!(
                    "VR video detected: {:?} layout, {:?} projection, confidence {:.2}",
                    info.layout,
                    info.projection,
                    info.confidence
                );
            } else {
                log::info!("2D video detected");
            }
            self.vr_format = Some(info);
        }

        // Downscale the display frame into the fixed-size intermediate
        let downscale_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("downscale-bg"),
            layout: &self.downscale_bgl,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&display.view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&display.sampler),
                },
            ],
        });
        run_fullscreen_pass(
            &mut encoder,
            "downscale",
            &self.downscale_pipeline,
            &downscale_bg,
            &self.intermediate.view,
        );

        // Overrides win over detection; a forced-2D clip is never cropped
        let active = resolve_format(self.vr_format.unwrap_or_default(), settings);
        let read_source = if needs_crop(&active) {
            self.crop.encode(
                device,
                &gpu.queue,
                &mut encoder,
                &self.intermediate,
                active.layout,
                settings.use_right_eye,
            );
            &self.crop.output
        } else {
            &self.intermediate
        };

        self.readback.begin_write(&mut encoder, &read_source.texture);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        // Maps the copy issued one tick ago; skip-and-retry on failure
        match self.readback.complete_read(device) {
            Some(data) => {
                let frame = ProcessingFrame {
                    data,
                    width: PROCESSING_SIZE,
                    height: PROCESSING_SIZE,
                    time_seconds: clock.duration() * clock.percent_position(),
                    source_width: self.source_width,
                    source_height: self.source_height,
                    player: self.player,
                };
                let _ = sink.send(PlayerEvent::ProcessingFrame(frame));
                Ok(TickOutcome::ProcessingEmitted)
            }
            None => Ok(TickOutcome::MainRendered),
        }
    }
}

/// Whether the active format calls for single-eye extraction.
/// Mono VR (layout None) passes through uncropped.
fn needs_crop(format: &VrFormatInfo) -> bool {
    format.is_vr && format.layout != VrLayout::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LayoutOverride, VideoTypeOverride};
    use crate::vr::detect_format;

    #[test]
    fn stereo_vr_needs_crop() {
        let info = detect_format(3840, 1920, "scene_180_SBS.mp4");
        assert!(needs_crop(&info));
    }

    #[test]
    fn mono_vr_passes_through() {
        let info = detect_format(1920, 1080, "demo_OCULUS.mp4");
        assert!(info.is_vr);
        assert!(!needs_crop(&info));
    }

    #[test]
    fn flat_video_passes_through() {
        let info = detect_format(1920, 1080, "clip.mp4");
        assert!(!needs_crop(&info));
    }

    #[test]
    fn forced_2d_suppresses_crop_even_with_forced_layout() {
        let detected = detect_format(3840, 1920, "scene_180_SBS.mp4");
        let settings = ProcessingSettings {
            video_type: VideoTypeOverride::Force2D,
            layout: LayoutOverride::ForceSbs,
            ..Default::default()
        };
        let active = resolve_format(detected, &settings);
        assert!(!needs_crop(&active));
    }
}
