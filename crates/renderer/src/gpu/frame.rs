use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{DrawCall, FrameSink};
use crate::error::RenderError;
use crate::geometry::{Quad, QuadVertex};
use crate::types::{Bounds, Color};

use super::resources::{create_depth_view, DEPTH_FORMAT};
use super::{CanvasKind, WgpuBackend, WgpuCanvas};

struct ScreenFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// Render-thread half of the wgpu backend. Owns the window surface.
pub struct WgpuFrameSink {
    // Field order matters: the frame and surface must drop before the window.
    frame: Option<ScreenFrame>,
    encoder: Option<wgpu::CommandEncoder>,
    pending_clear: Option<(Color, f32)>,
    screen_depth: Option<(Bounds, wgpu::TextureView)>,
    vertex_buffer: Option<(Vec<QuadVertex>, wgpu::Buffer)>,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    surface: wgpu::Surface<'static>,
    _instance: wgpu::Instance,
    window: Arc<Window>,
}

impl WgpuFrameSink {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        window: Arc<Window>,
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        device: wgpu::Device,
        queue: wgpu::Queue,
        texture_layout: wgpu::BindGroupLayout,
        sampler: wgpu::Sampler,
    ) -> Self {
        Self {
            frame: None,
            encoder: None,
            pending_clear: None,
            screen_depth: None,
            vertex_buffer: None,
            texture_layout,
            sampler,
            device,
            queue,
            config,
            surface,
            _instance: instance,
            window,
        }
    }

    fn screen_bounds(&self) -> Bounds {
        Bounds::new(self.config.width, self.config.height)
    }

    /// Follows the window size. Never reconfigures while a frame is held.
    fn sync_surface_size(&mut self) {
        if self.frame.is_some() {
            return;
        }
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        if size.width != self.config.width || size.height != self.config.height {
            tracing::debug!(width = size.width, height = size.height, "resizing screen surface");
            self.config.width = size.width;
            self.config.height = size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn acquire_frame(&mut self) -> Result<(), RenderError> {
        if self.frame.is_some() {
            return Ok(());
        }
        self.sync_surface_size();
        let texture = self.surface.get_current_texture().map_err(map_surface_error)?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.frame = Some(ScreenFrame { texture, view });
        Ok(())
    }

    fn attachments(
        &mut self,
        canvas: &WgpuCanvas,
    ) -> Result<(wgpu::TextureView, wgpu::TextureView), RenderError> {
        match &canvas.kind {
            CanvasKind::Offscreen {
                color_view,
                depth_view,
                ..
            } => Ok((color_view.clone(), depth_view.clone())),
            CanvasKind::Screen => {
                self.acquire_frame()?;
                let bounds = self.screen_bounds();
                let stale = self
                    .screen_depth
                    .as_ref()
                    .map_or(true, |(depth_bounds, _)| *depth_bounds != bounds);
                if stale {
                    let view = create_depth_view(&self.device, DEPTH_FORMAT, bounds);
                    self.screen_depth = Some((bounds, view));
                }
                let color = self
                    .frame
                    .as_ref()
                    .map(|frame| frame.view.clone())
                    .ok_or_else(|| RenderError::Other("screen frame not acquired".into()))?;
                let depth = self
                    .screen_depth
                    .as_ref()
                    .map(|(_, view)| view.clone())
                    .ok_or_else(|| RenderError::Other("screen depth missing".into()))?;
                Ok((color, depth))
            }
        }
    }

    fn ensure_vertex_buffer(&mut self, quad: &Quad) {
        let current = self
            .vertex_buffer
            .as_ref()
            .is_some_and(|(vertices, _)| vertices.as_slice() == quad.vertices());
        if current {
            return;
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("card vertices"),
                contents: bytemuck::cast_slice(quad.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.vertex_buffer = Some((quad.vertices().to_vec(), buffer));
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pass encoder"),
            })
        })
    }

    fn load_ops(&mut self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
        match self.pending_clear.take() {
            Some((color, depth)) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: color.r as f64,
                    g: color.g as f64,
                    b: color.b as f64,
                    a: color.a as f64,
                }),
                wgpu::LoadOp::Clear(depth),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        }
    }
}

fn map_surface_error(err: wgpu::SurfaceError) -> RenderError {
    match err {
        wgpu::SurfaceError::Lost => RenderError::Lost,
        wgpu::SurfaceError::Outdated => RenderError::Outdated,
        wgpu::SurfaceError::Timeout => RenderError::Timeout,
        wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
        other => RenderError::Other(other.to_string()),
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    color: &wgpu::TextureView,
    depth: &wgpu::TextureView,
    (color_load, depth_load): (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>),
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("stage pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: color_load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth,
            depth_ops: Some(wgpu::Operations {
                load: depth_load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        occlusion_query_set: None,
        timestamp_writes: None,
    })
}

impl FrameSink<WgpuBackend> for WgpuFrameSink {
    fn bounds(&mut self, canvas: &WgpuCanvas) -> Bounds {
        match &canvas.kind {
            CanvasKind::Offscreen { bounds, .. } => *bounds,
            CanvasKind::Screen => {
                self.sync_surface_size();
                self.screen_bounds()
            }
        }
    }

    fn clear(&mut self, canvas: &WgpuCanvas, color: Color, depth: f32) -> Result<(), RenderError> {
        if canvas.is_screen() {
            self.acquire_frame()?;
        }
        self.pending_clear = Some((color, depth));
        Ok(())
    }

    fn draw(
        &mut self,
        canvas: &WgpuCanvas,
        call: &DrawCall<'_, WgpuBackend>,
    ) -> Result<(), RenderError> {
        let (color, depth) = self.attachments(canvas)?;
        self.ensure_vertex_buffer(call.quad);

        let mut uniforms = call.shader.uniforms;
        uniforms.set_mvp(call.mvp);
        self.queue
            .write_buffer(&call.shader.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let [source, previous] = call.textures;
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stage textures"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&previous.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let ops = self.load_ops();
        let vertex_count = call.quad.vertices().len() as u32;
        let vertex_buffer = match &self.vertex_buffer {
            Some((_, buffer)) => buffer.clone(),
            None => return Err(RenderError::Other("card vertex buffer missing".into())),
        };
        let encoder = self.encoder();
        let mut pass = begin_pass(encoder, &color, &depth, ops);
        pass.set_pipeline(&call.shader.pipeline);
        pass.set_bind_group(0, &call.shader.uniform_bind_group, &[]);
        pass.set_bind_group(1, &textures, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..vertex_count, 0..1);
        Ok(())
    }

    fn present(&mut self, canvas: &WgpuCanvas) -> Result<(), RenderError> {
        if self.pending_clear.is_some() {
            let (color, depth) = self.attachments(canvas)?;
            let ops = self.load_ops();
            let encoder = self.encoder();
            drop(begin_pass(encoder, &color, &depth, ops));
        }

        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        if canvas.is_screen() {
            if let Some(frame) = self.frame.take() {
                self.window.pre_present_notify();
                frame.texture.present();
            }
        }
        Ok(())
    }

    fn reconfigure(&mut self) {
        self.frame = None;
        self.encoder = None;
        self.pending_clear = None;
        self.sync_surface_size();
        self.surface.configure(&self.device, &self.config);
    }
}
