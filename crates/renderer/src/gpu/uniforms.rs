use bytemuck::{Pod, Zeroable};

use crate::compile::{UniformLayout, MAX_DEFAULT_UNIFORMS};
use crate::geometry::Mat4;

/// CPU mirror of the `StageParams` std140 block.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StageUniforms {
    pub mvp: [[f32; 4]; 4],
    pub color_texture_sz: [f32; 4],
    pub params: [[f32; 4]; MAX_DEFAULT_UNIFORMS],
}

unsafe impl Zeroable for StageUniforms {}
unsafe impl Pod for StageUniforms {}

impl StageUniforms {
    pub fn new(layout: &UniformLayout) -> Self {
        Self {
            mvp: Mat4::IDENTITY.to_cols_array(),
            color_texture_sz: layout.texture_size,
            params: layout.params(),
        }
    }

    pub fn set_mvp(&mut self, mvp: Mat4) {
        self.mvp = mvp.to_cols_array();
    }
}
