use std::collections::BTreeMap;
use std::fmt;

/// Pixel dimensions of an image, surface, or window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero; nothing can be allocated for it.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Linear RGBA clear color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Loud default so unrendered regions are obvious.
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::MAGENTA
    }
}

/// Requested bits per channel when choosing a render-to-texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub red_bits: u8,
    pub green_bits: u8,
    pub blue_bits: u8,
    pub alpha_bits: u8,
    /// Whether the target also needs a depth attachment.
    pub depth: bool,
}

impl Precision {
    /// 8 bits per channel RGBA with depth, the configuration every pass renders into.
    pub const fn rgba8_depth() -> Self {
        Self {
            red_bits: 8,
            green_bits: 8,
            blue_bits: 8,
            alpha_bits: 8,
            depth: true,
        }
    }
}

/// Value assigned to a named shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// Widens the value into a std140 vec4 slot.
    pub fn to_vec4(self) -> [f32; 4] {
        match self {
            UniformValue::Float(value) => [value, 0.0, 0.0, 0.0],
            UniformValue::Int(value) => [value as f32, 0.0, 0.0, 0.0],
            UniformValue::Vec2([x, y]) => [x, y, 0.0, 0.0],
            UniformValue::Vec3([x, y, z]) => [x, y, z, 0.0],
            UniformValue::Vec4(value) => value,
        }
    }

    /// GLSL type name used when declaring the uniform.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Int(_) => "int",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
        }
    }
}

/// An ordered set of fragment stages belonging to one named shader descriptor.
///
/// Stages run in order; every stage after the first can sample the output of
/// the previous one. `defaults` is applied to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSet {
    pub name: String,
    pub stages: Vec<String>,
    pub defaults: BTreeMap<String, UniformValue>,
}

impl ShaderSet {
    pub fn new(name: impl Into<String>, stages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            stages,
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }
}

/// Everything a backend needs to compile one stage of a shader set.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDescriptor {
    /// `<set name>-pass<n>`, one-based.
    pub name: String,
    pub index: usize,
    pub fragment: String,
    pub uniforms: BTreeMap<String, UniformValue>,
}

/// A decoded RGBA8 bitmap ready for upload.
#[derive(Clone, PartialEq)]
pub struct SourceImage {
    pub name: String,
    pub bounds: Bounds,
    pub pixels: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bounds: Bounds, pixels: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bounds,
            pixels,
        }
    }

    /// Solid-color image, mostly useful for placeholders and tests.
    pub fn solid(name: impl Into<String>, bounds: Bounds, rgba: [u8; 4]) -> Self {
        let texels = bounds.width as usize * bounds.height as usize;
        let mut pixels = Vec::with_capacity(texels * 4);
        for _ in 0..texels {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(name, bounds, pixels)
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("bounds", &self.bounds)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Start-up configuration for the interactive viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Window size before the first image arrives.
    pub initial_size: Bounds,
    /// Frame rate ceiling for the render loop.
    pub max_fps: f32,
    /// Color every pass destination is cleared to before drawing.
    pub clear_color: Color,
    /// Window title shown until the first shader set is published.
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_size: Bounds::new(800, 600),
            max_fps: crate::runtime::DEFAULT_MAX_FPS,
            clear_color: Color::MAGENTA,
            title: "passview".to_string(),
        }
    }
}
