//! Schema of the `shader.toml` file that describes one shader pack.
//!
//! Types:
//!
//! - `ShaderManifest` holds the display name, an optional description, the
//!   ordered list of fragment sources (one per pass), and the `[defaults]`
//!   uniform table applied to every pass.
//! - `DefaultValue` is one `[defaults]` entry: an integer, a float, or a
//!   2-4 component vector.
//!
//! Functions:
//!
//! - `ShaderManifest::validate` returns every problem it finds as a readable
//!   message so `pack` can report them together.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the manifest inside a pack directory.
pub const MANIFEST_FILE: &str = "shader.toml";

/// Uniform slots available to `[defaults]`.
pub const MAX_DEFAULTS: usize = 16;

/// Names the renderer's fragment prelude already declares.
pub const RESERVED_NAMES: &[&str] = &[
    "Texture0",
    "Texture1",
    "TexCoord0",
    "FragColor",
    "MVP",
    "stage",
];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShaderManifest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub passes: Vec<PathBuf>,
    #[serde(default)]
    pub defaults: BTreeMap<String, DefaultValue>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Vector(Vec<f64>),
}

impl DefaultValue {
    fn issue(&self, name: &str) -> Option<String> {
        match self {
            DefaultValue::Int(value) if i32::try_from(*value).is_err() => Some(format!(
                "default '{name}' = {value} does not fit a 32-bit int"
            )),
            DefaultValue::Vector(items) if !(2..=4).contains(&items.len()) => Some(format!(
                "default '{name}' has {} components; vectors need 2 to 4",
                items.len()
            )),
            _ => None,
        }
    }
}

impl ShaderManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.passes.is_empty() {
            issues.push("manifest must declare at least one pass".to_string());
        }
        for pass in &self.passes {
            if pass.as_os_str().is_empty() {
                issues.push("pass source path must not be empty".to_string());
            }
        }
        if self.defaults.len() > MAX_DEFAULTS {
            issues.push(format!(
                "manifest declares {} defaults; at most {MAX_DEFAULTS} are supported",
                self.defaults.len()
            ));
        }
        for (name, value) in &self.defaults {
            if !is_identifier(name) {
                issues.push(format!("default '{name}' is not a valid GLSL identifier"));
            } else if is_reserved(name) {
                issues.push(format!("default '{name}' clashes with a built-in shader name"));
            }
            issues.extend(value.issue(name));
        }
        issues
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name) || name.starts_with("gl_") || name.starts_with("passview_")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
