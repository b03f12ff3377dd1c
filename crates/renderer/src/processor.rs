//! Command processor: the only owner of mutable pipeline state.
//!
//! Commands are applied strictly in queue order on one thread. A command may
//! emit a follow-up, which is appended to the tail of the processor's FIFO:
//!
//! | command      | effect                                         | follow-up    |
//! |--------------|------------------------------------------------|--------------|
//! | load-image   | takes the next bitmap from the image provider  | image-loaded |
//! | image-loaded | uploads it, reallocates surfaces, sizes window | resize       |
//! | resize       | none                                           | load-shader  |
//! | next-shader  | advances the shader library                    | load-shader  |
//! | load-shader  | builds and publishes a new pipeline            | none         |
//! | quit         | fires shutdown and stops the processor         | none         |
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver};

use crate::backend::{GpuBackend, ImageProvider, ShaderSetProvider, WindowControl};
use crate::chain::build_chain;
use crate::command::Command;
use crate::error::PipelineError;
use crate::geometry::{OrthoCamera, Quad};
use crate::shutdown::Shutdown;
use crate::state::{PipelineSlot, PipelineState};
use crate::targets::{allocate, RenderSurfacePair};
use crate::types::{Bounds, SourceImage};

/// Outcome of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transition {
    pub follow_up: Option<Command>,
    pub stop: bool,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn emit(command: Command) -> Self {
        Self {
            follow_up: Some(command),
            stop: false,
        }
    }

    fn stop() -> Self {
        Self {
            follow_up: None,
            stop: true,
        }
    }
}

struct LoadedSource<B: GpuBackend> {
    name: String,
    texture: Arc<B::Texture>,
    surfaces: RenderSurfacePair<B>,
}

pub struct CommandProcessor<B, W, S, I>
where
    B: GpuBackend,
    W: WindowControl,
    S: ShaderSetProvider,
    I: ImageProvider,
{
    backend: Arc<B>,
    window: Arc<W>,
    shaders: S,
    images: I,
    slot: Arc<PipelineSlot<B>>,
    shutdown: Shutdown,
    pending_image: Option<SourceImage>,
    source: Option<LoadedSource<B>>,
    quad: Quad,
    camera: OrthoCamera,
}

impl<B, W, S, I> CommandProcessor<B, W, S, I>
where
    B: GpuBackend,
    W: WindowControl,
    S: ShaderSetProvider,
    I: ImageProvider,
{
    pub fn new(
        backend: Arc<B>,
        window: Arc<W>,
        shaders: S,
        images: I,
        slot: Arc<PipelineSlot<B>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            backend,
            window,
            shaders,
            images,
            slot,
            shutdown,
            pending_image: None,
            source: None,
            quad: Quad::unit(),
            camera: OrthoCamera::default(),
        }
    }

    /// Size of the currently loaded source image and its surfaces.
    pub fn source_bounds(&self) -> Option<Bounds> {
        self.source.as_ref().map(|source| source.surfaces.bounds())
    }

    pub fn shaders(&self) -> &S {
        &self.shaders
    }

    /// Applies a single command and reports what should happen next.
    pub fn apply(&mut self, command: Command) -> Result<Transition, PipelineError> {
        tracing::debug!(%command, code = command.code(), "processing command");
        match command {
            Command::LoadImage => Ok(self.load_image()),
            Command::ImageLoaded => self.image_loaded(),
            Command::Resize => Ok(Transition::emit(Command::LoadShader)),
            Command::NextShader => {
                self.shaders.advance();
                tracing::info!(shader = %self.shaders.current().name, "switched shader set");
                Ok(Transition::emit(Command::LoadShader))
            }
            Command::LoadShader => self.load_shader(),
            Command::Quit => {
                self.shutdown.trigger();
                Ok(Transition::stop())
            }
        }
    }

    fn load_image(&mut self) -> Transition {
        match self.images.next() {
            Some(image) => {
                tracing::debug!(image = %image.name, bounds = %image.bounds, "image decoded");
                self.pending_image = Some(image);
                Transition::emit(Command::ImageLoaded)
            }
            None => {
                tracing::debug!("image provider has nothing to load");
                Transition::none()
            }
        }
    }

    fn image_loaded(&mut self) -> Result<Transition, PipelineError> {
        let Some(image) = self.pending_image.take() else {
            tracing::debug!("image-loaded without a pending image; ignoring");
            return Ok(Transition::none());
        };

        let texture = self.backend.create_source_texture(&image)?;
        let surfaces = allocate(self.backend.as_ref(), image.bounds)?;
        let resized = self.window.request_size(image.bounds);
        tracing::info!(
            image = %image.name,
            bounds = %image.bounds,
            resized,
            "source image loaded"
        );
        self.source = Some(LoadedSource {
            name: image.name,
            texture: Arc::new(texture),
            surfaces,
        });
        // Reload unconditionally; a later window resize event only rebuilds again.
        Ok(Transition::emit(Command::Resize))
    }

    fn loaded_source(&self) -> Result<&LoadedSource<B>, PipelineError> {
        self.source.as_ref().ok_or(PipelineError::MissingSource)
    }

    fn load_shader(&mut self) -> Result<Transition, PipelineError> {
        let source = match self.loaded_source() {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!(reason = %err, "deferring shader load");
                return Ok(Transition::none());
            }
        };

        let set = self.shaders.current();
        let chain = build_chain(self.backend.as_ref(), set, &source.surfaces)?;
        let stages = chain.len();
        let state = PipelineState {
            name: set.name.clone(),
            bounds: source.surfaces.bounds(),
            source: Arc::clone(&source.texture),
            chain,
            quad: self.quad.clone(),
            camera: self.camera,
        };
        let version = self.slot.publish(state);
        tracing::info!(
            shader = %set.name,
            image = %source.name,
            stages,
            version,
            "pipeline published"
        );
        self.window.set_title(&set.name);
        Ok(Transition::none())
    }

    /// Drains `commands` until quit, shutdown, or a fatal error.
    ///
    /// The processor keeps its own FIFO. Input that has already arrived is
    /// moved into it before a follow-up is appended, so a follow-up never
    /// overtakes a command that was queued while its parent ran.
    pub fn run(mut self, commands: Receiver<Command>) -> Result<(), PipelineError> {
        let signal = self.shutdown.subscribe();
        let mut pending = VecDeque::new();
        loop {
            if signal.is_triggered() {
                break;
            }
            pending.extend(commands.try_iter());
            let command = match pending.pop_front() {
                Some(command) => command,
                None => select! {
                    recv(commands) -> command => match command {
                        Ok(command) => command,
                        Err(_) => break,
                    },
                    recv(signal.receiver()) -> _ => break,
                },
            };

            let transition = match self.apply(command) {
                Ok(transition) => transition,
                Err(err) => {
                    tracing::error!(%command, error = %err, "pipeline command failed");
                    self.shutdown.trigger();
                    return Err(err);
                }
            };
            if transition.stop {
                break;
            }
            if let Some(follow_up) = transition.follow_up {
                pending.extend(commands.try_iter());
                pending.push_back(follow_up);
            }
        }
        tracing::debug!(dropped = pending.len(), "command processor stopped");
        Ok(())
    }

    pub fn spawn(
        self,
        commands: Receiver<Command>,
    ) -> std::io::Result<JoinHandle<Result<(), PipelineError>>> {
        thread::Builder::new()
            .name("passview-commands".into())
            .spawn(move || self.run(commands))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

    use super::*;
    use crate::command::command_queue;
    use crate::shutdown::shutdown_channel;
    use crate::testing::{CyclingShaders, MockGpu, MockWindow, ScriptedImages};
    use crate::types::ShaderSet;

    type TestProcessor = CommandProcessor<MockGpu, MockWindow, CyclingShaders, ScriptedImages>;

    struct Harness {
        processor: TestProcessor,
        gpu: Arc<MockGpu>,
        window: Arc<MockWindow>,
        slot: Arc<PipelineSlot<MockGpu>>,
        signal: crate::shutdown::ShutdownSignal,
    }

    fn harness(images: Vec<SourceImage>, shaders: Vec<ShaderSet>) -> Harness {
        let gpu = Arc::new(MockGpu::new());
        let window = Arc::new(MockWindow::new(Bounds::new(640, 480)));
        let slot = Arc::new(PipelineSlot::new());
        let (shutdown, signal) = shutdown_channel();
        let processor = CommandProcessor::new(
            Arc::clone(&gpu),
            Arc::clone(&window),
            CyclingShaders::new(shaders),
            ScriptedImages::new(images),
            Arc::clone(&slot),
            shutdown,
        );
        Harness {
            processor,
            gpu,
            window,
            slot,
            signal,
        }
    }

    fn image(width: u32, height: u32) -> SourceImage {
        SourceImage::solid("photo.png", Bounds::new(width, height), [10, 20, 30, 255])
    }

    fn sets(names: &[&str], stages: usize) -> Vec<ShaderSet> {
        names
            .iter()
            .map(|name| ShaderSet::new(*name, vec!["void main() {}".to_string(); stages]))
            .collect()
    }

    #[test]
    fn image_load_walks_the_transition_table() {
        let mut h = harness(vec![image(800, 600)], sets(&["A"], 2));
        let p = &mut h.processor;

        assert_eq!(p.apply(Command::LoadImage).unwrap().follow_up, Some(Command::ImageLoaded));
        assert_eq!(p.apply(Command::ImageLoaded).unwrap().follow_up, Some(Command::Resize));
        assert_eq!(p.source_bounds(), Some(Bounds::new(800, 600)));
        assert_eq!(h.window.size_requests(), vec![Bounds::new(800, 600)]);
        assert_eq!(p.apply(Command::Resize).unwrap().follow_up, Some(Command::LoadShader));
        assert_eq!(p.apply(Command::LoadShader).unwrap(), Transition::default());

        let snapshot = h.slot.snapshot().unwrap();
        assert_eq!(snapshot.state.name, "A");
        assert_eq!(snapshot.state.chain.len(), 2);
        assert_eq!(snapshot.state.bounds, Bounds::new(800, 600));
        assert_eq!(h.window.titles(), vec!["A".to_string()]);
    }

    #[test]
    fn image_loaded_reloads_even_when_window_already_fits() {
        let mut h = harness(vec![image(640, 480)], sets(&["A"], 1));
        h.processor.apply(Command::LoadImage).unwrap();
        let transition = h.processor.apply(Command::ImageLoaded).unwrap();
        assert_eq!(transition.follow_up, Some(Command::Resize));
        assert!(h.window.size_requests().is_empty());
    }

    #[test]
    fn exhausted_images_are_a_no_op() {
        let mut h = harness(Vec::new(), sets(&["A"], 1));
        assert_eq!(h.processor.apply(Command::LoadImage).unwrap(), Transition::default());
        assert_eq!(h.processor.apply(Command::ImageLoaded).unwrap(), Transition::default());
        assert!(h.processor.source_bounds().is_none());
    }

    #[test]
    fn load_shader_without_image_publishes_nothing() {
        let mut h = harness(Vec::new(), sets(&["A"], 1));
        assert_eq!(h.processor.apply(Command::LoadShader).unwrap(), Transition::default());
        assert!(h.slot.snapshot().is_none());
        assert_eq!(h.gpu.shaders_compiled(), 0);
    }

    #[test]
    fn next_shader_cycles_through_library() {
        let mut h = harness(vec![image(32, 32)], sets(&["A", "B", "C"], 1));
        h.processor.apply(Command::LoadImage).unwrap();
        h.processor.apply(Command::ImageLoaded).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let transition = h.processor.apply(Command::NextShader).unwrap();
            assert_eq!(transition.follow_up, Some(Command::LoadShader));
            h.processor.apply(Command::LoadShader).unwrap();
            seen.push(h.slot.snapshot().unwrap().state.name.clone());
        }
        assert_eq!(seen, vec!["B", "C", "A"]);
        assert_eq!(h.processor.shaders().current().name, "A");
    }

    #[test]
    fn every_stage_sees_the_image_size() {
        let mut h = harness(vec![image(800, 600)], sets(&["A"], 3));
        for command in [
            Command::LoadImage,
            Command::ImageLoaded,
            Command::LoadShader,
        ] {
            h.processor.apply(command).unwrap();
        }
        let sizes = h.gpu.compiled_texture_sizes();
        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|size| *size == Some([800.0, 600.0, 0.0])));
    }

    #[test]
    fn allocation_failure_is_fatal() {
        let h = harness(vec![image(8, 8)], sets(&["A"], 1));
        h.gpu.fail_render_target_after(0);
        let (tx, rx) = command_queue();
        tx.send(Command::LoadImage).unwrap();
        let result = h.processor.run(rx);
        assert!(matches!(result, Err(PipelineError::Allocation(_))));
        assert!(h.signal.is_triggered());
    }

    #[test]
    fn quit_stops_before_later_commands() {
        let h = harness(vec![image(8, 8)], sets(&["A", "B"], 1));
        let (tx, rx) = command_queue();
        tx.send(Command::LoadImage).unwrap();
        tx.send(Command::Quit).unwrap();
        tx.send(Command::NextShader).unwrap();
        h.processor.run(rx).unwrap();

        assert!(h.signal.is_triggered());
        assert!(h.slot.snapshot().is_none());
        // image-loaded was queued behind quit and never ran.
        assert!(h.window.size_requests().is_empty());
        assert!(h.window.titles().is_empty());
    }

    /// Pushes `next-shader` onto the command queue while `load-image` runs.
    struct KeyPressDuringLoad {
        image: Option<SourceImage>,
        input: Option<Sender<Command>>,
    }

    impl ImageProvider for KeyPressDuringLoad {
        fn next(&mut self) -> Option<SourceImage> {
            let image = self.image.take()?;
            if let Some(input) = self.input.take() {
                input.try_send(Command::NextShader).unwrap();
            }
            Some(image)
        }
    }

    #[test]
    fn follow_ups_queue_behind_input_that_arrived_first() {
        let gpu = Arc::new(MockGpu::new());
        let window = Arc::new(MockWindow::new(Bounds::new(640, 480)));
        let slot = Arc::new(PipelineSlot::new());
        let (shutdown, _signal) = shutdown_channel();
        let (tx, rx) = bounded(1);
        let images = KeyPressDuringLoad {
            image: Some(image(8, 8)),
            input: Some(tx.clone()),
        };
        tx.send(Command::LoadImage).unwrap();
        drop(tx);

        let processor = CommandProcessor::new(
            gpu,
            Arc::clone(&window),
            CyclingShaders::new(sets(&["A", "B"], 1)),
            images,
            Arc::clone(&slot),
            shutdown,
        );
        processor.run(rx).unwrap();

        // next-shader runs before image-loaded, so set A is never published.
        assert_eq!(window.titles(), vec!["B".to_string(), "B".to_string()]);
        assert_eq!(slot.snapshot().unwrap().state.name, "B");
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn runs_on_its_own_thread_until_quit() {
        let h = harness(vec![image(16, 16)], sets(&["A"], 2));
        let (tx, rx) = command_queue();
        let handle = h.processor.spawn(rx).unwrap();
        tx.send(Command::LoadImage).unwrap();

        assert_eq!(
            h.slot.ready().recv_timeout(Duration::from_secs(5)),
            Err(RecvTimeoutError::Disconnected)
        );
        tx.send(Command::Quit).unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(h.slot.version(), 1);
        assert!(h.signal.is_triggered());
    }

    #[test]
    fn external_shutdown_stops_processor() {
        let gpu = Arc::new(MockGpu::new());
        let window = Arc::new(MockWindow::new(Bounds::new(8, 8)));
        let (shutdown, _signal) = shutdown_channel();
        let processor = CommandProcessor::new(
            gpu,
            window,
            CyclingShaders::new(sets(&["A"], 1)),
            ScriptedImages::new(Vec::new()),
            Arc::new(PipelineSlot::new()),
            shutdown.clone(),
        );
        let (tx, rx) = command_queue();
        let handle = processor.spawn(rx).unwrap();
        let _input = tx;
        shutdown.trigger();
        handle.join().unwrap().unwrap();
    }
}
