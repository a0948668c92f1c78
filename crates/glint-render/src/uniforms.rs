//! Per-frame uniform data.

use crate::error::Result;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use glint_gpu::{GpuBuffer, GpuContext};

/// Scene transforms consumed by the vertex shader, std140-compatible since
/// `Mat4` is 16 columns of f32 with no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl SceneUniforms {
    pub const SIZE: vk::DeviceSize = std::mem::size_of::<Self>() as vk::DeviceSize;
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// One host-visible uniform buffer per swapchain image.
///
/// A frame updates only the buffer belonging to the image it acquired, so a
/// write never races the GPU reading another in-flight frame's uniforms.
/// Scene changes flow exclusively through these buffers; command buffers stay
/// as recorded.
pub struct UniformBuffers {
    buffers: Vec<GpuBuffer>,
}

impl UniformBuffers {
    /// Allocate one buffer per swapchain image.
    pub fn new(gpu: &GpuContext, image_count: usize) -> Result<Self> {
        let mut buffers = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            buffers.push(GpuBuffer::new(
                gpu,
                SceneUniforms::SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?);
        }

        Ok(Self { buffers })
    }

    /// Raw buffer handle for a swapchain image.
    pub fn buffer(&self, image_index: usize) -> vk::Buffer {
        self.buffers[image_index].buffer
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Write this frame's transforms into the buffer for `image_index`.
    pub fn update(
        &self,
        device: &ash::Device,
        image_index: usize,
        uniforms: &SceneUniforms,
    ) -> Result<()> {
        self.buffers[image_index].write(device, std::slice::from_ref(uniforms))?;
        Ok(())
    }

    /// Destroy all buffers.
    ///
    /// # Safety
    /// No buffer may be referenced by a frame still in flight.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for buffer in &self.buffers {
            buffer.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_are_three_tightly_packed_mat4s() {
        assert_eq!(SceneUniforms::SIZE, 3 * 64);
    }

    #[test]
    fn default_uniforms_are_identity() {
        let uniforms = SceneUniforms::default();
        assert_eq!(uniforms.model, Mat4::IDENTITY);
        assert_eq!(uniforms.projection, Mat4::IDENTITY);
    }
}
