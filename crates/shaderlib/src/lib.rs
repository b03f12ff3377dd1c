mod library;
mod manifest;
mod pack;

pub use library::ShaderLibrary;
pub use manifest::{DefaultValue, ShaderManifest, MANIFEST_FILE, MAX_DEFAULTS, RESERVED_NAMES};
pub use pack::{PackError, ShaderPack};
