//! Render error types.

use thiserror::Error;

/// Rendering errors. Like the GPU layer, every variant is terminal.
#[derive(Error, Debug)]
pub enum RenderError {
    /// GPU layer error.
    #[error(transparent)]
    Gpu(#[from] glint_gpu::GpuError),

    /// I/O failure with the path that produced it.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// SPIR-V payload could not be parsed.
    #[error("Shader load failed: {0}")]
    ShaderLoad(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
