//! Pass-chain construction.
//!
//! A shader set with N stages becomes N passes. Off-screen passes alternate
//! between the two ping-pong surfaces; the last pass always draws on screen:
//!
//! ```text
//!   stage:   0        1        2      ...   N-1
//!   writes:  surf[0]  surf[1]  surf[0]      screen
//!   reads:   surf[1]  surf[0]  surf[1]      surf[N % 2]
//! ```
//!
//! Every stage also samples the source image, so a pass can composite the
//! raw input with the previous pass's output.
use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::PipelineError;
use crate::targets::RenderSurfacePair;
use crate::types::{Bounds, ShaderSet, StageDescriptor, UniformValue};

/// Uniform every stage receives with the source image size `(w, h, 0)`.
pub const TEXTURE_SIZE_UNIFORM: &str = "color_texture_sz";

/// Where a pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// Ping-pong surface index, `0` or `1`.
    Surface(usize),
    Screen,
}

/// Destination and secondary input of stage `index` in a chain of `len`.
pub fn pass_layout(index: usize, len: usize) -> (PassTarget, usize) {
    if index + 1 == len {
        (PassTarget::Screen, len % 2)
    } else {
        (PassTarget::Surface(index % 2), (index + 1) % 2)
    }
}

/// Builds the per-stage compile descriptors for `set` drawn over `bounds`.
pub fn stage_descriptors(set: &ShaderSet, bounds: Bounds) -> Vec<StageDescriptor> {
    set.stages
        .iter()
        .enumerate()
        .map(|(index, fragment)| {
            let mut uniforms = set.defaults.clone();
            uniforms.insert(
                TEXTURE_SIZE_UNIFORM.to_string(),
                UniformValue::Vec3([bounds.width as f32, bounds.height as f32, 0.0]),
            );
            StageDescriptor {
                name: format!("{}-pass{}", set.name, index + 1),
                index,
                fragment: fragment.clone(),
                uniforms,
            }
        })
        .collect()
}

/// One executable pass.
pub struct PassStage<B: GpuBackend> {
    pub index: usize,
    pub name: String,
    pub shader: B::Shader,
    pub target: PassTarget,
    pub canvas: Arc<B::Canvas>,
    /// Ping-pong surface sampled as `Texture1`.
    pub input_surface: usize,
    pub mpass_texture: Arc<B::Texture>,
}

/// Ordered passes that render one frame.
pub struct PassChain<B: GpuBackend> {
    stages: Vec<PassStage<B>>,
    bounds: Bounds,
}

impl<B: GpuBackend> PassChain<B> {
    pub fn stages(&self) -> &[PassStage<B>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Size of the off-screen surfaces the chain was built against.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Compiles every stage of `set` and wires it to its destination.
pub fn build_chain<B: GpuBackend>(
    backend: &B,
    set: &ShaderSet,
    surfaces: &RenderSurfacePair<B>,
) -> Result<PassChain<B>, PipelineError> {
    if set.stages.is_empty() {
        return Err(PipelineError::EmptyShaderSet(set.name.clone()));
    }

    let len = set.stages.len();
    let screen = backend.screen();
    let mut stages = Vec::with_capacity(len);
    for descriptor in stage_descriptors(set, surfaces.bounds()) {
        let (target, input_surface) = pass_layout(descriptor.index, len);
        let canvas = match target {
            PassTarget::Surface(slot) => Arc::clone(&surfaces.get(slot).canvas),
            PassTarget::Screen => Arc::clone(&screen),
        };
        let shader = backend.compile_shader(&descriptor, &canvas)?;
        tracing::debug!(
            stage = %descriptor.name,
            ?target,
            input_surface,
            "compiled pass"
        );
        stages.push(PassStage {
            index: descriptor.index,
            name: descriptor.name,
            shader,
            target,
            canvas,
            input_surface,
            mpass_texture: Arc::clone(&surfaces.get(input_surface).texture),
        });
    }

    Ok(PassChain {
        stages,
        bounds: surfaces.bounds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::allocate;
    use crate::testing::{MockCanvasKind, MockGpu};

    fn set_with(stages: usize) -> ShaderSet {
        ShaderSet::new(
            "blur",
            (0..stages).map(|i| format!("// stage {i}")).collect(),
        )
    }

    #[test]
    fn parity_never_reads_its_own_output() {
        for len in 1..=9 {
            for index in 0..len {
                let (target, input) = pass_layout(index, len);
                if let PassTarget::Surface(slot) = target {
                    assert_ne!(slot, input, "stage {index} of {len}");
                }
            }
            assert_eq!(pass_layout(len - 1, len).0, PassTarget::Screen);
        }
    }

    #[test]
    fn each_pass_reads_what_the_previous_wrote() {
        let len = 5;
        for index in 1..len {
            let (previous, _) = pass_layout(index - 1, len);
            let (_, input) = pass_layout(index, len);
            assert_eq!(previous, PassTarget::Surface(input));
        }
    }

    #[test]
    fn single_stage_draws_on_screen() {
        let gpu = MockGpu::new();
        let surfaces = allocate(&gpu, Bounds::new(800, 600)).unwrap();
        let chain = build_chain(&gpu, &set_with(1), &surfaces).unwrap();
        assert_eq!(chain.len(), 1);
        let stage = &chain.stages()[0];
        assert_eq!(stage.target, PassTarget::Screen);
        assert_eq!(stage.canvas.kind, MockCanvasKind::Screen);
        assert_eq!(stage.input_surface, 1);
        assert_eq!(stage.name, "blur-pass1");
    }

    #[test]
    fn chain_wires_canvases_to_surfaces() {
        let gpu = MockGpu::new();
        let surfaces = allocate(&gpu, Bounds::new(64, 32)).unwrap();
        let chain = build_chain(&gpu, &set_with(4), &surfaces).unwrap();
        assert_eq!(chain.len(), 4);
        for stage in &chain.stages()[..3] {
            let PassTarget::Surface(slot) = stage.target else {
                panic!("off-screen stage drew on screen");
            };
            assert_eq!(stage.canvas.id, surfaces.get(slot).canvas.id);
            assert!(Arc::ptr_eq(
                &stage.mpass_texture,
                &surfaces.get(stage.input_surface).texture
            ));
        }
        assert_eq!(chain.stages()[3].target, PassTarget::Screen);
        assert_eq!(chain.stages()[3].input_surface, 0);
        let compiled: Vec<_> = chain
            .stages()
            .iter()
            .map(|stage| stage.shader.name.as_str())
            .collect();
        assert_eq!(compiled, ["blur-pass1", "blur-pass2", "blur-pass3", "blur-pass4"]);
    }

    #[test]
    fn every_stage_carries_texture_size() {
        let set = set_with(3).with_default(TEXTURE_SIZE_UNIFORM, UniformValue::Float(1.0));
        let set = set.with_default("strength", UniformValue::Float(0.25));
        for descriptor in stage_descriptors(&set, Bounds::new(800, 600)) {
            assert_eq!(
                descriptor.uniforms.get(TEXTURE_SIZE_UNIFORM),
                Some(&UniformValue::Vec3([800.0, 600.0, 0.0]))
            );
            assert_eq!(
                descriptor.uniforms.get("strength"),
                Some(&UniformValue::Float(0.25))
            );
        }
    }

    #[test]
    fn empty_set_is_rejected() {
        let gpu = MockGpu::new();
        let surfaces = allocate(&gpu, Bounds::new(4, 4)).unwrap();
        assert!(matches!(
            build_chain(&gpu, &set_with(0), &surfaces),
            Err(PipelineError::EmptyShaderSet(name)) if name == "blur"
        ));
    }

    #[test]
    fn compile_failure_propagates() {
        let gpu = MockGpu::new();
        gpu.reject_shaders_containing("stage 2");
        let surfaces = allocate(&gpu, Bounds::new(4, 4)).unwrap();
        assert!(matches!(
            build_chain(&gpu, &set_with(3), &surfaces),
            Err(PipelineError::ShaderCompile { stage, .. }) if stage == "blur-pass3"
        ));
    }
}
