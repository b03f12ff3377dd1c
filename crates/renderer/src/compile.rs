use std::borrow::Cow;
use std::collections::BTreeMap;

use wgpu::naga::ShaderStage;

use crate::chain::TEXTURE_SIZE_UNIFORM;
use crate::error::PipelineError;
use crate::types::{StageDescriptor, UniformValue};

/// Number of vec4 slots reserved for per-set default uniforms.
pub const MAX_DEFAULT_UNIFORMS: usize = 16;

/// Default uniforms of one stage, assigned to uniform-block slots.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    pub texture_size: [f32; 4],
    /// Name and value per slot, in slot order.
    pub slots: Vec<(String, UniformValue)>,
}

impl UniformLayout {
    /// Assigns every default except the texture size to a slot, sorted by name.
    pub fn for_stage(stage: &StageDescriptor) -> Result<Self, PipelineError> {
        Self::from_uniforms(&stage.name, &stage.uniforms)
    }

    fn from_uniforms(
        stage: &str,
        uniforms: &BTreeMap<String, UniformValue>,
    ) -> Result<Self, PipelineError> {
        let texture_size = uniforms
            .get(TEXTURE_SIZE_UNIFORM)
            .map(|value| value.to_vec4())
            .unwrap_or_default();
        let slots: Vec<_> = uniforms
            .iter()
            .filter(|(name, _)| name.as_str() != TEXTURE_SIZE_UNIFORM)
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        if slots.len() > MAX_DEFAULT_UNIFORMS {
            return Err(PipelineError::ShaderCompile {
                stage: stage.to_string(),
                message: format!(
                    "{} default uniforms declared, at most {MAX_DEFAULT_UNIFORMS} are supported",
                    slots.len()
                ),
            });
        }
        if let Some((name, _)) = slots.iter().find(|(name, _)| !is_identifier(name)) {
            return Err(PipelineError::ShaderCompile {
                stage: stage.to_string(),
                message: format!("'{name}' is not a valid GLSL identifier"),
            });
        }
        if let Some((name, _)) = slots.iter().find(|(name, _)| clashes_with_prelude(name)) {
            return Err(PipelineError::ShaderCompile {
                stage: stage.to_string(),
                message: format!("default uniform '{name}' clashes with a prelude declaration"),
            });
        }
        Ok(Self {
            texture_size,
            slots,
        })
    }

    /// Slot contents in the order the uniform block expects.
    pub fn params(&self) -> [[f32; 4]; MAX_DEFAULT_UNIFORMS] {
        let mut params = [[0.0; 4]; MAX_DEFAULT_UNIFORMS];
        for (slot, (_, value)) in params.iter_mut().zip(&self.slots) {
            *slot = value.to_vec4();
        }
        params
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("passview card vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Wraps and compiles one stage. Validation errors are reported instead of
/// panicking the device.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    stage: &StageDescriptor,
    layout: &UniformLayout,
) -> Result<wgpu::ShaderModule, PipelineError> {
    let wrapped = wrap_fragment(&stage.fragment, layout);
    tracing::trace!(stage = %stage.name, source = %wrapped, "wrapped fragment shader");

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&stage.name),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(PipelineError::ShaderCompile {
            stage: stage.name.clone(),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

/// Produces a self-contained GLSL 450 fragment shader from a stage source.
///
/// `#version` directives and declarations of names the prelude already
/// provides are dropped, then [`FRAGMENT_PRELUDE`] and one `#define` per
/// default uniform are prepended.
pub fn wrap_fragment(source: &str, layout: &UniformLayout) -> String {
    let provided: Vec<&str> = PRELUDE_NAMES
        .iter()
        .copied()
        .chain(layout.slots.iter().map(|(name, _)| name.as_str()))
        .collect();

    let mut body = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") {
            continue;
        }
        if redeclares(trimmed, &provided) {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let mut defines = String::new();
    for (slot, (name, value)) in layout.slots.iter().enumerate() {
        let swizzle = match value {
            UniformValue::Float(_) => format!("stage._params[{slot}].x"),
            UniformValue::Int(_) => format!("int(stage._params[{slot}].x)"),
            UniformValue::Vec2(_) => format!("stage._params[{slot}].xy"),
            UniformValue::Vec3(_) => format!("stage._params[{slot}].xyz"),
            UniformValue::Vec4(_) => format!("stage._params[{slot}]"),
        };
        defines.push_str(&format!("#define {name} {swizzle}\n"));
    }

    format!("{FRAGMENT_PRELUDE}{defines}\n#line 1\n{body}")
}

fn redeclares(line: &str, names: &[&str]) -> bool {
    let is_declaration = ["uniform ", "in ", "out ", "varying ", "attribute "]
        .iter()
        .any(|keyword| line.starts_with(keyword))
        || line.starts_with("layout");
    if !is_declaration {
        return false;
    }
    line.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .last()
        .is_some_and(|name| names.contains(&name))
}

fn clashes_with_prelude(name: &str) -> bool {
    PRELUDE_NAMES.contains(&name)
        || name == "stage"
        || name.starts_with("gl_")
        || name.starts_with("passview_")
}

const PRELUDE_NAMES: &[&str] = &[
    "Texture0",
    "Texture1",
    "TexCoord0",
    "FragColor",
    "MVP",
    TEXTURE_SIZE_UNIFORM,
];

/// Uniform block shared by both stages. Must match `StageUniforms`.
macro_rules! stage_params_block {
    () => {
        r"layout(std140, set = 0, binding = 0) uniform StageParams {
    mat4 MVP;
    vec4 _color_texture_sz;
    vec4 _params[16];
} stage;
"
    };
}

const VERTEX_SHADER_GLSL: &str = concat!(
    r"#version 450
layout(location = 0) in vec2 position;
layout(location = 1) in vec2 tex_coord;
layout(location = 0) out vec2 TexCoord0;

",
    stage_params_block!(),
    r"
void main() {
    TexCoord0 = tex_coord;
    gl_Position = stage.MVP * vec4(position, 0.0, 1.0);
}
"
);

/// Declarations every stage can rely on: `Texture0` is the source image,
/// `Texture1` the previous pass, `TexCoord0` the card coordinate.
pub const FRAGMENT_PRELUDE: &str = concat!(
    r"#version 450
layout(location = 0) in vec2 TexCoord0;
layout(location = 0) out vec4 FragColor;

",
    stage_params_block!(),
    r"
layout(set = 1, binding = 0) uniform texture2D passview_texture0;
layout(set = 1, binding = 1) uniform texture2D passview_texture1;
layout(set = 1, binding = 2) uniform sampler passview_sampler;

#define Texture0 sampler2D(passview_texture0, passview_sampler)
#define Texture1 sampler2D(passview_texture1, passview_sampler)
#define color_texture_sz stage._color_texture_sz.xyz
#define gl_FragColor FragColor
"
);

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(uniforms: &[(&str, UniformValue)]) -> StageDescriptor {
        StageDescriptor {
            name: "glow-pass1".into(),
            index: 0,
            fragment: String::new(),
            uniforms: uniforms
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }

    #[test]
    fn wrap_strips_version_and_prelude_declarations() {
        let source = r"
            #version 330
            uniform sampler2D Texture0;
            uniform vec3 color_texture_sz;
            uniform float strength;
            in vec2 TexCoord0;
            out vec4 FragColor;
            uniform float keep_me;
            void main() {
                FragColor = texture(Texture0, TexCoord0) * strength;
            }
        ";
        let layout =
            UniformLayout::for_stage(&stage(&[("strength", UniformValue::Float(2.0))])).unwrap();
        let wrapped = wrap_fragment(source, &layout);

        assert!(wrapped.starts_with("#version 450"));
        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(!wrapped.contains("uniform sampler2D Texture0"));
        assert!(!wrapped.contains("uniform vec3 color_texture_sz"));
        assert!(!wrapped.contains("uniform float strength"));
        assert!(wrapped.contains("uniform float keep_me"));
        assert!(wrapped.contains("#define strength stage._params[0].x"));
        assert!(wrapped.contains("FragColor = texture(Texture0, TexCoord0) * strength;"));
    }

    #[test]
    fn layout_orders_slots_by_name_and_skips_texture_size() {
        let layout = UniformLayout::for_stage(&stage(&[
            ("tint", UniformValue::Vec3([1.0, 0.5, 0.25])),
            ("amount", UniformValue::Float(0.5)),
            ("taps", UniformValue::Int(4)),
            (TEXTURE_SIZE_UNIFORM, UniformValue::Vec3([800.0, 600.0, 0.0])),
        ]))
        .unwrap();

        let names: Vec<_> = layout.slots.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["amount", "taps", "tint"]);
        assert_eq!(layout.texture_size, [800.0, 600.0, 0.0, 0.0]);
        let params = layout.params();
        assert_eq!(params[1], [4.0, 0.0, 0.0, 0.0]);
        assert_eq!(params[2], [1.0, 0.5, 0.25, 0.0]);

        let wrapped = wrap_fragment("void main() {}", &layout);
        assert!(wrapped.contains("#define taps int(stage._params[1].x)"));
        assert!(wrapped.contains("#define tint stage._params[2].xyz"));
    }

    #[test]
    fn too_many_defaults_are_rejected() {
        let uniforms: Vec<(String, UniformValue)> = (0..=MAX_DEFAULT_UNIFORMS)
            .map(|i| (format!("u{i}"), UniformValue::Float(0.0)))
            .collect();
        let refs: Vec<(&str, UniformValue)> =
            uniforms.iter().map(|(n, v)| (n.as_str(), *v)).collect();
        assert!(matches!(
            UniformLayout::for_stage(&stage(&refs)),
            Err(PipelineError::ShaderCompile { stage, .. }) if stage == "glow-pass1"
        ));
    }

    #[test]
    fn invalid_uniform_names_are_rejected() {
        assert!(UniformLayout::for_stage(&stage(&[("1bad", UniformValue::Float(0.0))])).is_err());
        assert!(UniformLayout::for_stage(&stage(&[("ok_name2", UniformValue::Float(0.0))])).is_ok());
    }

    #[test]
    fn prelude_names_cannot_be_defaults() {
        for name in ["Texture1", "FragColor", "stage", "gl_FragColor", "passview_texture0"] {
            assert!(
                matches!(
                    UniformLayout::for_stage(&stage(&[(name, UniformValue::Float(0.0))])),
                    Err(PipelineError::ShaderCompile { message, .. }) if message.contains(name)
                ),
                "{name} accepted"
            );
        }
    }

    #[test]
    fn vertex_shader_shares_uniform_block() {
        assert!(VERTEX_SHADER_GLSL.contains("vec4 _params[16];"));
        assert!(FRAGMENT_PRELUDE.contains("vec4 _params[16];"));
    }
}
