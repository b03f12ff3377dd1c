//! `wgpu` implementation of the backend seams.
//!
//! - `context` wires instance, adapter, device and the window surface.
//! - `resources` creates the source texture, ping-pong targets and sampler.
//! - `pipeline` owns the shared layouts and builds one pipeline per stage.
//! - `uniforms` mirrors the `StageParams` block written before each draw.
//! - `frame` is the render-thread half: it owns the surface and records,
//!   submits and presents passes.
//!
//! [`WgpuBackend`] is shared between the command processor and the render
//! loop; `wgpu::Device` and `wgpu::Queue` are internally synchronised.
mod context;
mod frame;
mod pipeline;
mod resources;
mod uniforms;

use std::sync::Arc;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::GpuBackend;
use crate::compile::{compile_fragment_shader, UniformLayout};
use crate::error::PipelineError;
use crate::types::{Bounds, Precision, SourceImage, StageDescriptor};

use context::GpuContext;
use pipeline::{create_stage_pipeline, PipelineLayouts};
use uniforms::StageUniforms;

pub use frame::WgpuFrameSink;
pub use resources::{RenderTargetFormat, WgpuTexture};

pub(crate) enum CanvasKind {
    Screen,
    Offscreen {
        color_view: wgpu::TextureView,
        depth_view: wgpu::TextureView,
        bounds: Bounds,
    },
}

/// Renderable destination.
pub struct WgpuCanvas {
    pub(crate) kind: CanvasKind,
    pub(crate) format: wgpu::TextureFormat,
}

impl WgpuCanvas {
    pub fn is_screen(&self) -> bool {
        matches!(self.kind, CanvasKind::Screen)
    }
}

/// Compiled stage: pipeline plus its private uniform buffer.
pub struct WgpuShader {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) uniform_buffer: wgpu::Buffer,
    pub(crate) uniform_bind_group: wgpu::BindGroup,
    pub(crate) uniforms: StageUniforms,
}

pub struct WgpuBackend {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: PipelineLayouts,
    screen: Arc<WgpuCanvas>,
}

impl GpuBackend for WgpuBackend {
    type Format = RenderTargetFormat;
    type Texture = WgpuTexture;
    type Canvas = WgpuCanvas;
    type Shader = WgpuShader;

    fn choose_render_target_format(&self, precision: Precision) -> Option<RenderTargetFormat> {
        resources::choose_format(&self.adapter, precision)
    }

    fn create_source_texture(&self, image: &SourceImage) -> Result<WgpuTexture, PipelineError> {
        resources::create_source_texture(&self.device, &self.queue, image)
    }

    fn create_render_target(
        &self,
        format: RenderTargetFormat,
        bounds: Bounds,
    ) -> Result<(WgpuTexture, WgpuCanvas), PipelineError> {
        let (texture, depth_view) = resources::create_render_target(&self.device, format, bounds)?;
        let canvas = WgpuCanvas {
            kind: CanvasKind::Offscreen {
                color_view: texture.view.clone(),
                depth_view,
                bounds,
            },
            format: format.color,
        };
        Ok((texture, canvas))
    }

    fn compile_shader(
        &self,
        stage: &StageDescriptor,
        target: &WgpuCanvas,
    ) -> Result<WgpuShader, PipelineError> {
        let layout = UniformLayout::for_stage(stage)?;
        let fragment = compile_fragment_shader(&self.device, stage, &layout)?;
        let pipeline =
            create_stage_pipeline(&self.device, &self.layouts, &stage.name, &fragment, target.format)?;

        let uniforms = StageUniforms::new(&layout);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} uniforms", stage.name)),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} uniform bind group", stage.name)),
            layout: &self.layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(WgpuShader {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
        })
    }

    fn screen(&self) -> Arc<WgpuCanvas> {
        Arc::clone(&self.screen)
    }
}

/// Creates the shared backend and the render-thread frame sink for `window`.
pub fn create(window: Arc<Window>) -> Result<(WgpuBackend, WgpuFrameSink)> {
    let size = window.inner_size();
    let context = GpuContext::new(window.as_ref(), Bounds::new(size.width, size.height))?;
    let GpuContext {
        _instance: instance,
        adapter,
        surface,
        device,
        queue,
        config,
    } = context;

    let layouts = PipelineLayouts::new(&device);
    let screen = Arc::new(WgpuCanvas {
        kind: CanvasKind::Screen,
        format: config.format,
    });
    let sampler = resources::create_sampler(&device);
    let sink = WgpuFrameSink::new(
        window,
        instance,
        surface,
        config,
        device.clone(),
        queue.clone(),
        layouts.texture_layout.clone(),
        sampler,
    );
    let backend = WgpuBackend {
        adapter,
        device,
        queue,
        layouts,
        screen,
    };
    Ok((backend, sink))
}
