//! Static full-screen card and the orthographic camera that frames it.
//!
//! The card lives in `[0,1]²` model space. Each pass scales it to the pixel
//! bounds of its destination and projects `[0,w]x[0,h]` onto clip space, so the
//! card covers the destination exactly whatever its size:
//!
//! ```text
//!   (0,1)──(1,1)      tex (0,0)──(1,0)
//!     │  ╲   │              │  ╲   │
//!     │   ╲  │              │   ╲  │
//!   (0,0)──(1,0)      tex (0,1)──(1,1)
//! ```
use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

use crate::types::Bounds;

/// Column-major 4x4 matrix, laid out the way GLSL `mat4` expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        Mat4([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Mat4([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [x, y, z, 1.0],
        ])
    }

    /// Orthographic projection with a `[0,1]` depth range.
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;
        Mat4([
            [2.0 / width, 0.0, 0.0, 0.0],
            [0.0, 2.0 / height, 0.0, 0.0],
            [0.0, 0.0, 1.0 / depth, 0.0],
            [
                -(right + left) / width,
                -(top + bottom) / height,
                -near / depth,
                1.0,
            ],
        ])
    }

    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 4] {
        let mut out = [0.0; 4];
        let input = [point[0], point[1], point[2], 1.0];
        for (column, value) in self.0.iter().zip(input) {
            for row in 0..4 {
                out[row] += column[row] * value;
            }
        }
        out
    }

    pub fn to_cols_array(&self) -> [[f32; 4]; 4] {
        self.0
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (column, out_column) in out.iter_mut().enumerate() {
            for (row, cell) in out_column.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[k][row] * rhs.0[column][k]).sum();
            }
        }
        Mat4(out)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Two triangles covering the unit square.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    vertices: [QuadVertex; 6],
}

impl Quad {
    pub fn unit() -> Self {
        let vertex = |x: f32, y: f32, u: f32, v: f32| QuadVertex {
            position: [x, y],
            tex_coord: [u, v],
        };
        Self {
            vertices: [
                // Bottom-right triangle.
                vertex(0.0, 1.0, 0.0, 0.0),
                vertex(1.0, 0.0, 1.0, 1.0),
                vertex(1.0, 1.0, 1.0, 0.0),
                // Top-left triangle.
                vertex(0.0, 1.0, 0.0, 0.0),
                vertex(0.0, 0.0, 0.0, 1.0),
                vertex(1.0, 0.0, 1.0, 1.0),
            ],
        }
    }

    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// Scale that stretches the unit card over `bounds`.
    pub fn scale_for(&self, bounds: Bounds) -> (f32, f32) {
        let height = bounds.height.max(1) as f32;
        (height * bounds.aspect(), height)
    }

    pub fn model(&self, bounds: Bounds) -> Mat4 {
        let (x, y) = self.scale_for(bounds);
        Mat4::scale(x, y, 1.0)
    }

    /// Model-view-projection placing the card exactly over `bounds`.
    pub fn mvp(&self, camera: &OrthoCamera, bounds: Bounds) -> Mat4 {
        camera.view_projection(bounds) * self.model(bounds)
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::unit()
    }
}

/// Orthographic camera looking at the card from a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    pub near: f32,
    pub far: f32,
    pub distance: f32,
}

impl OrthoCamera {
    pub fn view_projection(&self, bounds: Bounds) -> Mat4 {
        let projection = Mat4::orthographic(
            0.0,
            bounds.width.max(1) as f32,
            0.0,
            bounds.height.max(1) as f32,
            self.near,
            self.far,
        );
        projection * Mat4::translation(0.0, 0.0, self.distance)
    }
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self {
            near: 0.001,
            far: 1000.0,
            distance: 2.0,
        }
    }
}
