use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::PipelineError;
use crate::types::{Bounds, Precision};

/// One off-screen destination and the texture that samples what was drawn
/// into it.
pub struct RenderSurface<B: GpuBackend> {
    pub texture: Arc<B::Texture>,
    pub canvas: Arc<B::Canvas>,
}

impl<B: GpuBackend> Clone for RenderSurface<B> {
    fn clone(&self) -> Self {
        Self {
            texture: Arc::clone(&self.texture),
            canvas: Arc::clone(&self.canvas),
        }
    }
}

/// The two ping-pong surfaces. Both always share `bounds`.
pub struct RenderSurfacePair<B: GpuBackend> {
    surfaces: [RenderSurface<B>; 2],
    bounds: Bounds,
}

impl<B: GpuBackend> RenderSurfacePair<B> {
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Surface for ping-pong slot `index`. Indices wrap modulo two.
    pub fn get(&self, index: usize) -> &RenderSurface<B> {
        &self.surfaces[index % 2]
    }
}

impl<B: GpuBackend> Clone for RenderSurfacePair<B> {
    fn clone(&self) -> Self {
        Self {
            surfaces: self.surfaces.clone(),
            bounds: self.bounds,
        }
    }
}

/// Allocates a fresh pair of color+depth surfaces sized to `bounds`.
///
/// Either both surfaces are created or the call fails; the caller drops the
/// previous pair once the new one has replaced it.
pub fn allocate<B: GpuBackend>(
    backend: &B,
    bounds: Bounds,
) -> Result<RenderSurfacePair<B>, PipelineError> {
    if bounds.is_empty() {
        return Err(PipelineError::Allocation(format!(
            "cannot allocate render targets of size {bounds}"
        )));
    }

    let format = backend
        .choose_render_target_format(Precision::rgba8_depth())
        .ok_or(PipelineError::NoRenderTargetFormat)?;

    let create = || -> Result<RenderSurface<B>, PipelineError> {
        let (texture, canvas) = backend.create_render_target(format, bounds)?;
        Ok(RenderSurface {
            texture: Arc::new(texture),
            canvas: Arc::new(canvas),
        })
    };
    let first = create()?;
    let second = create()?;

    tracing::debug!(%bounds, ?format, "allocated ping-pong render targets");
    Ok(RenderSurfacePair {
        surfaces: [first, second],
        bounds,
    })
}
