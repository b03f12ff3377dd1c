use thiserror::Error;

/// Failures while building or publishing a render pipeline.
///
/// Every variant except `MissingSource` is fatal for the viewer: without a
/// pipeline there is nothing sensible to render.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("GPU offers no 8-bit render-to-texture configuration")]
    NoRenderTargetFormat,

    #[error("shader set '{0}' has no stages")]
    EmptyShaderSet(String),

    #[error("no source image has been loaded yet")]
    MissingSource,

    #[error("failed to compile shader stage '{stage}': {message}")]
    ShaderCompile { stage: String, message: String },

    #[error("GPU allocation failed: {0}")]
    Allocation(String),

    #[error("window request failed: {0}")]
    Window(String),
}

/// Failures reported while drawing or presenting a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("surface lost")]
    Lost,

    #[error("surface outdated")]
    Outdated,

    #[error("timed out acquiring the next surface texture")]
    Timeout,

    #[error("out of GPU memory")]
    OutOfMemory,

    #[error("render failure: {0}")]
    Other(String),
}

impl RenderError {
    /// Errors the render loop survives by reconfiguring or skipping a frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::Lost | RenderError::Outdated | RenderError::Timeout
        )
    }

    /// Errors that require the screen surface to be reconfigured.
    pub fn needs_reconfigure(&self) -> bool {
        matches!(self, RenderError::Lost | RenderError::Outdated)
    }
}
