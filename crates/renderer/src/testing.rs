//! Recording backends for exercising the controller without a GPU or display.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{
    DrawCall, FrameSink, GpuBackend, ImageProvider, ShaderSetProvider, WindowControl,
};
use crate::chain::TEXTURE_SIZE_UNIFORM;
use crate::error::{PipelineError, RenderError};
use crate::shutdown::Shutdown;
use crate::types::{Bounds, Color, Precision, ShaderSet, SourceImage, StageDescriptor, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCanvasKind {
    Screen,
    Offscreen,
}

#[derive(Debug)]
pub struct MockCanvas {
    pub id: u64,
    pub kind: MockCanvasKind,
    pub bounds: Bounds,
}

#[derive(Debug)]
pub struct MockTexture {
    pub id: u64,
    pub bounds: Bounds,
}

#[derive(Debug)]
pub struct MockShader {
    pub name: String,
    pub canvas: u64,
}

#[derive(Default)]
struct GpuLog {
    render_targets_created: usize,
    fail_render_target_after: Option<usize>,
    reject_fragment: Option<String>,
    compiled: Vec<StageDescriptor>,
}

pub struct MockGpu {
    next_id: AtomicU64,
    screen: Arc<MockCanvas>,
    has_format: bool,
    log: Mutex<GpuLog>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            screen: Arc::new(MockCanvas {
                id: 0,
                kind: MockCanvasKind::Screen,
                bounds: Bounds::default(),
            }),
            has_format: true,
            log: Mutex::new(GpuLog::default()),
        }
    }

    pub fn without_render_target_format() -> Self {
        Self {
            has_format: false,
            ..Self::new()
        }
    }

    /// Lets `count` render targets succeed, then fails every further one.
    pub fn fail_render_target_after(&self, count: usize) {
        self.log.lock().unwrap().fail_render_target_after = Some(count);
    }

    pub fn reject_shaders_containing(&self, needle: &str) {
        self.log.lock().unwrap().reject_fragment = Some(needle.to_string());
    }

    pub fn render_targets_created(&self) -> usize {
        self.log.lock().unwrap().render_targets_created
    }

    pub fn shaders_compiled(&self) -> usize {
        self.log.lock().unwrap().compiled.len()
    }

    pub fn compiled_texture_sizes(&self) -> Vec<Option<[f32; 3]>> {
        self.log
            .lock()
            .unwrap()
            .compiled
            .iter()
            .map(|stage| match stage.uniforms.get(TEXTURE_SIZE_UNIFORM) {
                Some(UniformValue::Vec3(size)) => Some(*size),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl GpuBackend for MockGpu {
    type Format = Precision;
    type Texture = MockTexture;
    type Canvas = MockCanvas;
    type Shader = MockShader;

    fn choose_render_target_format(&self, precision: Precision) -> Option<Precision> {
        self.has_format.then_some(precision)
    }

    fn create_source_texture(&self, image: &SourceImage) -> Result<MockTexture, PipelineError> {
        Ok(MockTexture {
            id: self.next_id(),
            bounds: image.bounds,
        })
    }

    fn create_render_target(
        &self,
        _format: Precision,
        bounds: Bounds,
    ) -> Result<(MockTexture, MockCanvas), PipelineError> {
        let mut log = self.log.lock().unwrap();
        if log
            .fail_render_target_after
            .is_some_and(|limit| log.render_targets_created >= limit)
        {
            return Err(PipelineError::Allocation("mock allocation failure".into()));
        }
        log.render_targets_created += 1;
        let id = self.next_id();
        Ok((
            MockTexture { id, bounds },
            MockCanvas {
                id,
                kind: MockCanvasKind::Offscreen,
                bounds,
            },
        ))
    }

    fn compile_shader(
        &self,
        stage: &StageDescriptor,
        target: &MockCanvas,
    ) -> Result<MockShader, PipelineError> {
        let mut log = self.log.lock().unwrap();
        if let Some(needle) = &log.reject_fragment {
            if stage.fragment.contains(needle.as_str()) {
                return Err(PipelineError::ShaderCompile {
                    stage: stage.name.clone(),
                    message: "rejected by mock".into(),
                });
            }
        }
        log.compiled.push(stage.clone());
        Ok(MockShader {
            name: stage.name.clone(),
            canvas: target.id,
        })
    }

    fn screen(&self) -> Arc<MockCanvas> {
        Arc::clone(&self.screen)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Clear { canvas: u64, color: Color, depth: f32 },
    Draw { canvas: u64, stage: usize, textures: [u64; 2] },
    Present { canvas: u64 },
}

#[derive(Default)]
struct SinkState {
    ops: Vec<SinkOp>,
    reconfigures: usize,
    failures: VecDeque<RenderError>,
}

/// Shared view of what a [`MockSink`] recorded.
#[derive(Clone, Default)]
pub struct SinkLog(Arc<Mutex<SinkState>>);

impl SinkLog {
    pub fn ops(&self) -> Vec<SinkOp> {
        self.0.lock().unwrap().ops.clone()
    }

    pub fn reconfigures(&self) -> usize {
        self.0.lock().unwrap().reconfigures
    }
}

pub struct MockSink {
    screen_bounds: Bounds,
    log: SinkLog,
    stop: Option<(u64, Shutdown)>,
    frames: u64,
}

impl MockSink {
    pub fn new(screen_bounds: Bounds) -> Self {
        Self {
            screen_bounds,
            log: SinkLog::default(),
            stop: None,
            frames: 0,
        }
    }

    /// Triggers `shutdown` while presenting the `frames`th screen frame.
    pub fn stop_after_frames(mut self, frames: u64, shutdown: Shutdown) -> Self {
        self.stop = Some((frames, shutdown));
        self
    }

    /// Makes the next sink call fail with `error`.
    pub fn fail_next(&self, error: RenderError) {
        self.log.0.lock().unwrap().failures.push_back(error);
    }

    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }

    fn record(&self, op: SinkOp) -> Result<(), RenderError> {
        let mut state = self.log.0.lock().unwrap();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.ops.push(op);
        Ok(())
    }
}

impl FrameSink<MockGpu> for MockSink {
    fn bounds(&mut self, canvas: &MockCanvas) -> Bounds {
        match canvas.kind {
            MockCanvasKind::Screen => self.screen_bounds,
            MockCanvasKind::Offscreen => canvas.bounds,
        }
    }

    fn clear(&mut self, canvas: &MockCanvas, color: Color, depth: f32) -> Result<(), RenderError> {
        self.record(SinkOp::Clear {
            canvas: canvas.id,
            color,
            depth,
        })
    }

    fn draw(&mut self, canvas: &MockCanvas, call: &DrawCall<'_, MockGpu>) -> Result<(), RenderError> {
        assert_eq!(call.shader.canvas, canvas.id, "shader compiled for another canvas");
        self.record(SinkOp::Draw {
            canvas: canvas.id,
            stage: call.stage,
            textures: [call.textures[0].id, call.textures[1].id],
        })
    }

    fn present(&mut self, canvas: &MockCanvas) -> Result<(), RenderError> {
        self.record(SinkOp::Present { canvas: canvas.id })?;
        if canvas.kind == MockCanvasKind::Screen {
            self.frames += 1;
            if let Some((limit, shutdown)) = &self.stop {
                if self.frames >= *limit {
                    shutdown.trigger();
                }
            }
        }
        Ok(())
    }

    fn reconfigure(&mut self) {
        self.log.0.lock().unwrap().reconfigures += 1;
    }
}

#[derive(Default)]
struct WindowState {
    size: Bounds,
    size_requests: Vec<Bounds>,
    titles: Vec<String>,
    closed: bool,
}

pub struct MockWindow {
    state: Mutex<WindowState>,
}

impl MockWindow {
    pub fn new(size: Bounds) -> Self {
        Self {
            state: Mutex::new(WindowState {
                size,
                ..WindowState::default()
            }),
        }
    }

    pub fn size_requests(&self) -> Vec<Bounds> {
        self.state.lock().unwrap().size_requests.clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.state.lock().unwrap().titles.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl WindowControl for MockWindow {
    fn size(&self) -> Bounds {
        self.state.lock().unwrap().size
    }

    fn request_size(&self, bounds: Bounds) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.size == bounds {
            return false;
        }
        state.size = bounds;
        state.size_requests.push(bounds);
        true
    }

    fn set_title(&self, title: &str) {
        self.state.lock().unwrap().titles.push(title.to_string());
    }

    fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

pub struct CyclingShaders {
    sets: Vec<ShaderSet>,
    index: usize,
}

impl CyclingShaders {
    pub fn new(sets: Vec<ShaderSet>) -> Self {
        assert!(!sets.is_empty(), "at least one shader set is required");
        Self { sets, index: 0 }
    }
}

impl ShaderSetProvider for CyclingShaders {
    fn current(&self) -> &ShaderSet {
        &self.sets[self.index]
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.sets.len();
    }

    fn len(&self) -> usize {
        self.sets.len()
    }
}

pub struct ScriptedImages {
    images: VecDeque<SourceImage>,
}

impl ScriptedImages {
    pub fn new(images: Vec<SourceImage>) -> Self {
        Self {
            images: images.into(),
        }
    }
}

impl ImageProvider for ScriptedImages {
    fn next(&mut self) -> Option<SourceImage> {
        self.images.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::{unbounded, RecvTimeoutError};

    use super::*;
    use crate::command::{command_queue, Command};
    use crate::frame::RenderLoop;
    use crate::input::{spawn_translator, Key, KeyState, RawEvent};
    use crate::processor::CommandProcessor;
    use crate::shutdown::shutdown_channel;
    use crate::state::PipelineSlot;

    fn press(key: Key) -> RawEvent {
        RawEvent::Key {
            key,
            state: KeyState::Pressed,
            repeat: false,
        }
    }

    #[test]
    fn keyboard_drives_pipeline_end_to_end() {
        let gpu = Arc::new(MockGpu::new());
        let window = Arc::new(MockWindow::new(Bounds::new(320, 240)));
        let slot = Arc::new(PipelineSlot::new());
        let (shutdown, signal) = shutdown_channel();
        let sets = vec![
            ShaderSet::new("A", vec!["void main() {}".to_string()]),
            ShaderSet::new("B", vec!["void main() {}".to_string(); 3]),
        ];
        let images = vec![SourceImage::solid(
            "first.png",
            Bounds::new(800, 600),
            [0, 0, 0, 255],
        )];

        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = command_queue();
        let translator = spawn_translator(event_rx, command_tx.clone()).unwrap();
        let processor = CommandProcessor::new(
            Arc::clone(&gpu),
            Arc::clone(&window),
            CyclingShaders::new(sets),
            ScriptedImages::new(images),
            Arc::clone(&slot),
            shutdown.clone(),
        )
        .spawn(command_rx)
        .unwrap();
        let sink = MockSink::new(Bounds::new(800, 600));
        let log = sink.log();
        let renderer = RenderLoop::new(
            Arc::clone(&slot),
            sink,
            Arc::clone(&window),
            signal,
            500.0,
            Color::MAGENTA,
        )
        .spawn()
        .unwrap();

        command_tx.send(Command::LoadImage).unwrap();
        assert_eq!(
            slot.ready().recv_timeout(Duration::from_secs(5)),
            Err(RecvTimeoutError::Disconnected)
        );
        event_tx.send(press(Key::N)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while slot.snapshot().map(|s| s.state.name.clone()) != Some("B".into()) {
            assert!(std::time::Instant::now() < deadline, "shader switch never published");
            std::thread::sleep(Duration::from_millis(5));
        }
        event_tx.send(press(Key::Escape)).unwrap();

        processor.join().unwrap().unwrap();
        let report = renderer.join().unwrap().unwrap();
        drop(event_tx);
        translator.join().unwrap();

        assert!(shutdown.subscribe().is_triggered());
        assert!(report.frames >= 1);
        assert!(!log.ops().is_empty());
        assert_eq!(window.size_requests(), vec![Bounds::new(800, 600)]);
        assert_eq!(slot.snapshot().unwrap().state.chain.len(), 3);
        let titles = window.titles();
        assert_eq!(titles.first().map(String::as_str), Some("A"));
        assert!(titles.iter().any(|title| title == "B"));
        assert!(gpu.shaders_compiled() >= 4);
    }
}
