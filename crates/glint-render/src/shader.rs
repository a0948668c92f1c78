//! SPIR-V shader loading.
//!
//! Shaders are precompiled offline; the binary loads them from a `shaders/`
//! directory relative to the working directory at startup.

use crate::error::{RenderError, Result};
use std::fs::File;
use std::path::Path;

/// Default path of the precompiled vertex shader.
pub const VERTEX_SHADER_PATH: &str = "./shaders/vert.spv";
/// Default path of the precompiled fragment shader.
pub const FRAGMENT_SHADER_PATH: &str = "./shaders/frag.spv";

/// Read a SPIR-V module from disk into the word array Vulkan expects.
pub fn load_spirv<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })?;

    ash::util::read_spv(&mut file)
        .map_err(|e| RenderError::ShaderLoad(format!("{}: {e}", path.display())))
}
