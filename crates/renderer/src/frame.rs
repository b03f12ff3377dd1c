use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::select;

use crate::backend::{DrawCall, FrameSink, GpuBackend, WindowControl};
use crate::error::RenderError;
use crate::runtime::FrameClock;
use crate::shutdown::ShutdownSignal;
use crate::state::{PipelineSlot, PipelineState};
use crate::types::Color;

/// Summary returned when the render loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopReport {
    /// Frames rendered to completion.
    pub frames: u64,
}

/// Steady-state frame driver.
pub struct RenderLoop<B, F, W>
where
    B: GpuBackend,
    F: FrameSink<B>,
    W: WindowControl,
{
    slot: Arc<PipelineSlot<B>>,
    sink: F,
    window: Arc<W>,
    shutdown: ShutdownSignal,
    clock: FrameClock,
    clear_color: Color,
}

impl<B, F, W> RenderLoop<B, F, W>
where
    B: GpuBackend,
    F: FrameSink<B>,
    W: WindowControl,
{
    pub fn new(
        slot: Arc<PipelineSlot<B>>,
        sink: F,
        window: Arc<W>,
        shutdown: ShutdownSignal,
        max_fps: f32,
        clear_color: Color,
    ) -> Self {
        Self {
            slot,
            sink,
            window,
            shutdown,
            clock: FrameClock::new(max_fps),
            clear_color,
        }
    }

    /// Renders until shutdown fires, then closes the window. Shutdown is only
    /// observed between frames, so a frame in flight always completes.
    pub fn run(mut self) -> Result<LoopReport, RenderError> {
        let result = self.render_until_shutdown();
        self.window.close();
        result
    }

    fn render_until_shutdown(&mut self) -> Result<LoopReport, RenderError> {
        let mut report = LoopReport::default();

        select! {
            recv(self.slot.ready()) -> _ => tracing::debug!("first pipeline published; rendering"),
            recv(self.shutdown.receiver()) -> _ => return Ok(report),
        }

        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let Some(snapshot) = self.slot.snapshot() else {
                // Ready only fires after a publish, and the slot is never emptied.
                break;
            };

            match self.render_frame(&snapshot.state) {
                Ok(()) => {
                    report.frames += 1;
                    tracing::trace!(
                        frame = report.frames,
                        version = snapshot.version,
                        "frame rendered"
                    );
                }
                Err(err) if err.needs_reconfigure() => {
                    tracing::warn!(error = %err, "screen surface needs reconfiguring");
                    self.sink.reconfigure();
                }
                Err(RenderError::Timeout) => {
                    tracing::warn!("surface timeout; retrying next frame");
                }
                Err(err) => {
                    tracing::error!(error = %err, "render loop failed");
                    return Err(err);
                }
            }

            if let Some(fps) = self.clock.tick(Instant::now()) {
                let state = &snapshot.state;
                tracing::debug!(fps, stages = state.chain.len(), "render stats");
                self.window
                    .set_title(&format!("{} ({:.0} FPS)", state.name, fps));
            }

            let deadline = self.clock.next_deadline().unwrap_or_else(Instant::now);
            if self.shutdown.wait_until(deadline) {
                break;
            }
        }

        tracing::debug!(frames = report.frames, "render loop stopped");
        Ok(report)
    }

    fn render_frame(&mut self, state: &PipelineState<B>) -> Result<(), RenderError> {
        for stage in state.chain.stages() {
            let bounds = self.sink.bounds(&stage.canvas);
            self.sink.clear(&stage.canvas, self.clear_color, 1.0)?;
            let call = DrawCall {
                stage: stage.index,
                shader: &stage.shader,
                textures: [state.source.as_ref(), stage.mpass_texture.as_ref()],
                quad: &state.quad,
                mvp: state.quad.mvp(&state.camera, bounds),
            };
            self.sink.draw(&stage.canvas, &call)?;
            self.sink.present(&stage.canvas)?;
        }
        Ok(())
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<LoopReport, RenderError>>> {
        thread::Builder::new()
            .name("passview-render".into())
            .spawn(move || self.run())
    }
}
