//! Adapts `shaderlib` packs to the renderer's shader-set provider.
use anyhow::{bail, Context, Result};
use renderer::{ShaderSet, ShaderSetProvider, UniformValue};
use shaderlib::{DefaultValue, ShaderLibrary, ShaderPack};

/// Shader sets converted once up front, cycled by the command processor.
#[derive(Debug, Clone)]
pub struct LibraryShaders {
    sets: Vec<ShaderSet>,
    index: usize,
}

impl LibraryShaders {
    /// Starts at the library's current pack.
    pub fn from_library(library: &ShaderLibrary) -> Result<Self> {
        if library.is_empty() {
            bail!("shader library has no shader sets");
        }
        let sets = library
            .packs()
            .iter()
            .map(shader_set_from_pack)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            sets,
            index: library.index(),
        })
    }
}

impl ShaderSetProvider for LibraryShaders {
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

pub fn shader_set_from_pack(pack: &ShaderPack) -> Result<ShaderSet> {
    let mut set = ShaderSet::new(pack.name(), pack.sources().to_vec());
    for (name, value) in pack.defaults() {
        let uniform = uniform_from_default(value)
            .with_context(|| format!("shader '{}' default '{name}'", pack.name()))?;
        set = set.with_default(name.clone(), uniform);
    }
    Ok(set)
}

pub fn uniform_from_default(value: &DefaultValue) -> Result<UniformValue> {
    Ok(match value {
        DefaultValue::Int(value) => UniformValue::Int(
            i32::try_from(*value).with_context(|| format!("{value} does not fit a 32-bit int"))?,
        ),
        DefaultValue::Float(value) => UniformValue::Float(*value as f32),
        DefaultValue::Vector(items) => {
            let items: Vec<f32> = items.iter().map(|item| *item as f32).collect();
            match items[..] {
                [x, y] => UniformValue::Vec2([x, y]),
                [x, y, z] => UniformValue::Vec3([x, y, z]),
                [x, y, z, w] => UniformValue::Vec4([x, y, z, w]),
                _ => bail!("vectors need 2 to 4 components, got {}", items.len()),
            }
        }
    })
}
