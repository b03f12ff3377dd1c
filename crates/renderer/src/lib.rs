//! Command-driven multi-pass image viewer.
//!
//! A source image is pushed through an ordered chain of fragment stages.
//! Every stage but the last renders into one of two ping-pong targets, and
//! the last one draws to the window. Keyboard input cycles images and shader
//! sets while the render loop keeps presenting the latest published chain.
//!
//! ```text
//!   winit event loop ──RawEvent──▶ EventTranslator ──Command──▶ CommandProcessor
//!          ▲                                                       │ publish
//!          │ WindowRequest                                          ▼
//!          └──────────── WinitWindow ◀── set_title/close ── RenderLoop ◀─ PipelineSlot
//! ```
//!
//! The event loop owns the platform thread. Everything else runs on named
//! worker threads and talks through bounded `crossbeam-channel` queues.

pub mod backend;
pub mod chain;
pub mod command;
pub mod compile;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod gpu;
pub mod images;
pub mod input;
pub mod processor;
pub mod runtime;
pub mod shutdown;
pub mod state;
pub mod targets;
pub mod types;
pub mod window;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;

pub use backend::{FrameSink, GpuBackend, ImageProvider, ShaderSetProvider, WindowControl};
pub use command::Command;
pub use error::{PipelineError, RenderError};
pub use images::DirectoryImages;
pub use types::{Bounds, Color, ShaderSet, SourceImage, UniformValue, ViewerConfig};

use command::command_queue;
use frame::RenderLoop;
use input::{spawn_translator, RawEvent};
use processor::CommandProcessor;
use shutdown::shutdown_channel;
use state::PipelineSlot;
use window::{build_event_loop, build_window, run_event_loop, WinitWindow};

/// Raw window events buffered between the platform thread and the translator.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Interactive viewer entry point.
pub struct Viewer {
    config: ViewerConfig,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Opens the window and blocks until the viewer quits.
    ///
    /// Must be called from the thread that is allowed to own the platform
    /// event loop (the main thread on most systems).
    pub fn run<S, I>(self, shaders: S, images: I) -> Result<()>
    where
        S: ShaderSetProvider,
        I: ImageProvider,
    {
        let config = self.config;
        let event_loop = build_event_loop()?;
        let window = build_window(&event_loop, &config.title, config.initial_size)?;
        let (backend, sink) = gpu::create(Arc::clone(&window))?;
        let control = Arc::new(WinitWindow::new(
            Arc::clone(&window),
            event_loop.create_proxy(),
        ));

        let slot = Arc::new(PipelineSlot::new());
        let (shutdown, signal) = shutdown_channel();
        let (event_tx, event_rx) = bounded::<RawEvent>(EVENT_QUEUE_CAPACITY);
        let (command_tx, command_rx) = command_queue();

        let translator = spawn_translator(event_rx, command_tx.clone())
            .context("failed to spawn input thread")?;
        let processor = CommandProcessor::new(
            Arc::new(backend),
            Arc::clone(&control),
            shaders,
            images,
            Arc::clone(&slot),
            shutdown.clone(),
        )
        .spawn(command_rx)
        .context("failed to spawn command thread")?;
        let render = RenderLoop::new(
            slot,
            sink,
            control,
            signal,
            config.max_fps,
            config.clear_color,
        )
        .spawn()
        .context("failed to spawn render thread")?;

        command_tx
            .send(Command::LoadImage)
            .map_err(|_| anyhow!("command processor exited before start-up"))?;
        drop(command_tx);
        tracing::info!(
            size = %config.initial_size,
            max_fps = config.max_fps,
            "viewer started"
        );

        let window_result = run_event_loop(event_loop, window, event_tx, shutdown.clone());
        shutdown.trigger();

        join("input", translator)?;
        let processed = join("command", processor)?;
        let rendered = join("render", render)?;
        window_result?;
        processed.context("pipeline command failed")?;
        let report = rendered.context("render loop failed")?;
        tracing::debug!(frames = report.frames, "viewer stopped");
        Ok(())
    }
}

fn join<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{name} thread panicked"))
}
