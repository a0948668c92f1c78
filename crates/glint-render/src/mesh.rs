//! Mesh storage and staged upload.

use crate::error::Result;
use crate::vertex::Vertex;
use ash::vk;
use glint_gpu::memory::{copy_buffer, GpuBuffer};
use glint_gpu::{CommandPool, GpuContext};

/// A mesh resident in device-local memory.
///
/// The index buffer is optional; meshes without one draw with a plain
/// vertex-count draw. Buffers are destroyed explicitly by the owner via
/// [`Mesh::destroy`] before the device goes away.
pub struct Mesh {
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Upload vertex (and optionally index) data to device-local memory.
    ///
    /// Each array goes through a host-visible staging buffer: map, copy,
    /// unmap, then a one-time transfer into the device-local destination.
    /// The transfer blocks until the queue drains, after which the staging
    /// buffer is destroyed. Slow but simple; uploads happen once at startup.
    pub fn upload(
        gpu: &GpuContext,
        pool: &CommandPool,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> Result<Self> {
        let vertex_buffer = upload_through_staging(
            gpu,
            pool,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = match indices {
            Some(indices) => Some(upload_through_staging(
                gpu,
                pool,
                bytemuck::cast_slice(indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?),
            None => None,
        };

        tracing::info!(
            vertices = vertices.len(),
            indices = indices.map_or(0, <[u32]>::len),
            "Mesh uploaded"
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.map_or(0, |i| i.len() as u32),
        })
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.buffer
    }

    pub fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer.as_ref().map(|b| b.buffer)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Destroy the mesh's buffers.
    ///
    /// # Safety
    /// The buffers must not be referenced by any pending command buffer.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.vertex_buffer.destroy(device);
        if let Some(index_buffer) = &self.index_buffer {
            index_buffer.destroy(device);
        }
    }
}

/// Stage `bytes` into a new device-local buffer with the given role usage.
fn upload_through_staging(
    gpu: &GpuContext,
    pool: &CommandPool,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    let size = bytes.len() as vk::DeviceSize;

    let staging = GpuBuffer::new(
        gpu,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    if let Err(e) = staging.write(gpu.device(), bytes) {
        unsafe { staging.destroy(gpu.device()) };
        return Err(e.into());
    }

    let device_local = GpuBuffer::new(
        gpu,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    );

    let device_local = match device_local {
        Ok(buffer) => buffer,
        Err(e) => {
            unsafe { staging.destroy(gpu.device()) };
            return Err(e.into());
        }
    };

    let copied = copy_buffer(gpu, pool, &staging, &device_local, size);

    unsafe { staging.destroy(gpu.device()) };

    match copied {
        Ok(()) => Ok(device_local),
        Err(e) => {
            unsafe { device_local.destroy(gpu.device()) };
            Err(e.into())
        }
    }
}
