//! Seams between the pipeline controller and its collaborators.
//!
//! The controller never talks to `wgpu`, `winit`, the shader library, or the
//! image decoder directly. It goes through the traits below so the whole
//! command/render protocol can run against recording mocks in tests:
//!
//! ```text
//!   ShaderSetProvider ─┐                ┌─▶ GpuBackend   (resource creation)
//!   ImageProvider ─────┼─▶ processor ───┤
//!   WindowControl ◀────┘                └─▶ PipelineSlot ─▶ render loop ─▶ FrameSink
//! ```
//!
//! `GpuBackend` is shared between the command processor and the render loop
//! and must be `Sync`. `FrameSink` is owned exclusively by the render loop.
use std::fmt;

use crate::error::{PipelineError, RenderError};
use crate::geometry::{Mat4, Quad};
use crate::types::{Bounds, Color, Precision, ShaderSet, SourceImage, StageDescriptor};

/// Resource factory side of the GPU backend.
pub trait GpuBackend: Send + Sync + 'static {
    /// Render-to-texture configuration picked by [`GpuBackend::choose_render_target_format`].
    type Format: Copy + fmt::Debug + Send + Sync + 'static;
    /// Sampled texture handle.
    type Texture: Send + Sync + 'static;
    /// Renderable destination: off-screen target or the on-screen framebuffer.
    type Canvas: Send + Sync + 'static;
    /// Compiled stage program bound to one destination format.
    type Shader: Send + Sync + 'static;

    /// Best render-to-texture configuration matching `precision`, if any.
    fn choose_render_target_format(&self, precision: Precision) -> Option<Self::Format>;

    /// Uploads a decoded bitmap as the primary input texture.
    fn create_source_texture(&self, image: &SourceImage) -> Result<Self::Texture, PipelineError>;

    /// Creates an off-screen color+depth target and the texture that samples it.
    fn create_render_target(
        &self,
        format: Self::Format,
        bounds: Bounds,
    ) -> Result<(Self::Texture, Self::Canvas), PipelineError>;

    /// Compiles one stage for drawing into `target`.
    fn compile_shader(
        &self,
        stage: &StageDescriptor,
        target: &Self::Canvas,
    ) -> Result<Self::Shader, PipelineError>;

    /// The on-screen canvas. Its bounds follow the window.
    fn screen(&self) -> std::sync::Arc<Self::Canvas>;
}

/// One full-screen-quad draw.
pub struct DrawCall<'a, B: GpuBackend> {
    pub stage: usize,
    pub shader: &'a B::Shader,
    /// `[source, previous pass]`, bound as `Texture0` and `Texture1`.
    pub textures: [&'a B::Texture; 2],
    pub quad: &'a Quad,
    pub mvp: Mat4,
}

/// Draw/clear/present side of the GPU backend, driven by the render loop.
pub trait FrameSink<B: GpuBackend>: Send + 'static {
    /// Current pixel bounds of `canvas`.
    fn bounds(&mut self, canvas: &B::Canvas) -> Bounds;

    /// Clears color and depth of `canvas` before the next draw.
    fn clear(&mut self, canvas: &B::Canvas, color: Color, depth: f32) -> Result<(), RenderError>;

    fn draw(&mut self, canvas: &B::Canvas, call: &DrawCall<'_, B>) -> Result<(), RenderError>;

    /// Flushes recorded work for `canvas`; presents when it is the screen.
    fn present(&mut self, canvas: &B::Canvas) -> Result<(), RenderError>;

    /// Rebuilds the screen surface after it was lost or went stale.
    fn reconfigure(&mut self);
}

/// Requests the controller may issue against the window.
///
/// Implementations apply requests asynchronously and must never block the
/// caller on the platform event loop.
pub trait WindowControl: Send + Sync + 'static {
    /// Current inner size in physical pixels.
    fn size(&self) -> Bounds;

    /// Asks for a new inner size. Returns `false` when the window already has it.
    fn request_size(&self, bounds: Bounds) -> bool;

    fn set_title(&self, title: &str);

    /// Asks the platform loop to close the window and stop delivering events.
    fn close(&self);
}

/// Ordered library of shader descriptors with a wrap-around cursor.
pub trait ShaderSetProvider: Send + 'static {
    fn current(&self) -> &ShaderSet;

    /// Moves to the next descriptor, wrapping after the last one.
    fn advance(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of bitmaps, cycling through a fixed library.
pub trait ImageProvider: Send + 'static {
    /// Decodes the next image; `None` means there is nothing (more) to load.
    fn next(&mut self) -> Option<SourceImage>;
}
