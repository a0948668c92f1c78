//! Mesh upload and frame orchestration for the Glint renderer.
//!
//! Builds on `glint-gpu`: uploads vertex data through staging buffers,
//! records a static command buffer per swapchain image, and drives the
//! two-deep frame pipeline.

pub mod error;
pub mod mesh;
pub mod renderer;
pub mod shader;
pub mod uniforms;
pub mod vertex;

pub use error::{RenderError, Result};
pub use mesh::Mesh;
pub use renderer::{Renderer, RendererConfig};
pub use shader::load_spirv;
pub use uniforms::{SceneUniforms, UniformBuffers};
pub use vertex::Vertex;
