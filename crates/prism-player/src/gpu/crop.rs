//! Single-eye extraction from stereo (SBS/TB) frames.
//!
//! Vision consumers want raw pixels of one eye, not a view-dependent
//! reprojection. Unwarping is strictly a presentation concern and never
//! happens on this path.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindingResource, CommandEncoder, Device, Queue, RenderPipeline, TextureFormat,
};

use super::render_target::RenderTarget;
use super::{create_fs_pipeline, run_fullscreen_pass, sampler_entry, tex_entry, uniform_entry};
use crate::vr::VrLayout;

const CROP_FS: &str = r#"
@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;

struct CropUniforms {
    stereo_layout: u32,
    use_right_eye: u32,
    _pad0: u32,
    _pad1: u32,
}
@group(0) @binding(2) var<uniform> crop: CropUniforms;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4f {
    var uv = input.uv;
    let eye = select(0.0, 0.5, crop.use_right_eye == 1u);
    if crop.stereo_layout == 0u {
        // Side-by-side: left or right half, stretched to fill
        uv.x = uv.x * 0.5 + eye;
    } else {
        // Top-bottom: top or bottom half
        uv.y = uv.y * 0.5 + eye;
    }
    return textureSample(src_tex, src_sampler, uv);
}
"#;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CropUniforms {
    stereo_layout: u32,
    use_right_eye: u32,
    _pad0: u32,
    _pad1: u32,
}

/// GPU crop stage writing into a persistent fixed-size target,
/// reused across frames to avoid per-frame allocation.
pub struct FrameCropStage {
    pipeline: RenderPipeline,
    bgl: BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    pub output: RenderTarget,
}

impl FrameCropStage {
    pub fn new(device: &Device, format: TextureFormat, size: u32) -> Self {
        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("crop-bgl"),
            entries: &[
                tex_entry(0),
                sampler_entry(1),
                uniform_entry(2, std::mem::size_of::<CropUniforms>()),
            ],
        });
        let pipeline = create_fs_pipeline(device, "crop", &bgl, CROP_FS, format);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("crop-uniforms"),
            size: std::mem::size_of::<CropUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let output = RenderTarget::new(device, size, size, format, "crop-output");

        Self {
            pipeline,
            bgl,
            uniform_buffer,
            output,
        }
    }

    /// Encode the crop pass: one eye of `source` fills the output target.
    ///
    /// `layout` must be SideBySide or TopBottom; mono frames bypass this
    /// stage entirely (the coordinator reads the intermediate texture
    /// directly).
    pub fn encode(
        &self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        source: &RenderTarget,
        layout: VrLayout,
        use_right_eye: bool,
    ) {
        debug_assert_ne!(layout, VrLayout::None);

        let uniforms = CropUniforms {
            stereo_layout: u32::from(layout == VrLayout::TopBottom),
            use_right_eye: u32::from(use_right_eye),
            _pad0: 0,
            _pad1: 0,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("crop-bg"),
            layout: &self.bgl,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&source.view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&source.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        run_fullscreen_pass(encoder, "crop", &self.pipeline, &bind_group, &self.output.view);
    }
}
