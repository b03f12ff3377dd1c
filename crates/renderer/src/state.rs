use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::backend::GpuBackend;
use crate::chain::PassChain;
use crate::geometry::{OrthoCamera, Quad};
use crate::types::Bounds;

/// Everything the render loop needs for one frame. Immutable once published.
pub struct PipelineState<B: GpuBackend> {
    /// Name of the shader set, shown in the window title.
    pub name: String,
    pub bounds: Bounds,
    pub source: Arc<B::Texture>,
    pub chain: PassChain<B>,
    pub quad: Quad,
    pub camera: OrthoCamera,
}

/// A published pipeline together with its publication number.
pub struct Snapshot<B: GpuBackend> {
    pub version: u64,
    pub state: Arc<PipelineState<B>>,
}

impl<B: GpuBackend> Clone for Snapshot<B> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            state: Arc::clone(&self.state),
        }
    }
}

struct Published<B: GpuBackend> {
    version: u64,
    state: Option<Arc<PipelineState<B>>>,
}

/// Single-writer handoff of the current pipeline.
///
/// The command processor swaps whole states in; the render loop clones the
/// `Arc` once per frame. Readers never see a partially built chain, and the
/// old chain lives on until the last frame holding it finishes.
pub struct PipelineSlot<B: GpuBackend> {
    published: RwLock<Published<B>>,
    ready_tx: Mutex<Option<Sender<()>>>,
    ready_rx: Receiver<()>,
}

impl<B: GpuBackend> PipelineSlot<B> {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = bounded(0);
        Self {
            published: RwLock::new(Published {
                version: 0,
                state: None,
            }),
            ready_tx: Mutex::new(Some(ready_tx)),
            ready_rx,
        }
    }

    /// Replaces the current pipeline and returns its version.
    pub fn publish(&self, state: PipelineState<B>) -> u64 {
        let state = Arc::new(state);
        let version = {
            // The guarded value is a plain swap; a poisoned lock holds no torn state.
            let mut published = self
                .published
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            published.version += 1;
            published.state = Some(state);
            published.version
        };
        // Dropping the sender latches readiness for every current and future waiter.
        self.ready_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        version
    }

    pub fn snapshot(&self) -> Option<Snapshot<B>> {
        let published = self
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        published.state.as_ref().map(|state| Snapshot {
            version: published.version,
            state: Arc::clone(state),
        })
    }

    pub fn version(&self) -> u64 {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// Disconnects once a pipeline has been published; usable in `select!`.
    pub fn ready(&self) -> &Receiver<()> {
        &self.ready_rx
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.ready_rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

impl<B: GpuBackend> Default for PipelineSlot<B> {
    fn default() -> Self {
        Self::new()
    }
}
