//! GPU buffer and memory management.
//!
//! Allocation is deliberately simple: one `VkDeviceMemory` per buffer, bound
//! at offset 0, with the memory type chosen by a first-match scan over the
//! adapter's memory types.

use crate::command::execute_single_time_commands;
use crate::command::CommandPool;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use ash::vk;

/// Find the lowest memory type index compatible with a resource.
///
/// `type_bits` is the requirement bitmask from `vkGetBufferMemoryRequirements`;
/// bit `i` set means memory type `i` is usable. The chosen type's property
/// flags must additionally be a superset of `required`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties
        .memory_types
        .iter()
        .take(memory_properties.memory_type_count as usize)
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

/// A buffer with its dedicated backing memory.
///
/// Two flavors exist in practice: host-visible staging buffers the CPU maps
/// and writes, and device-local buffers the GPU alone reads. Device-local
/// buffers are only ever filled through [`copy_buffer`], never by mapping.
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Create a buffer and bind freshly allocated memory to it.
    pub fn new(
        gpu: &GpuContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let device = gpu.device();

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = find_memory_type_index(
            gpu.memory_properties(),
            requirements.memory_type_bits,
            properties,
        )
        .ok_or(GpuError::NoCompatibleMemoryType)?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(GpuError::from(e));
            }
        };

        unsafe { device.bind_buffer_memory(buffer, memory, 0)? };

        Ok(Self { buffer, memory, size })
    }

    /// Write data into a host-visible buffer: map, copy, unmap.
    pub fn write<T: Copy>(&self, device: &ash::Device, data: &[T]) -> Result<()> {
        let byte_size = std::mem::size_of_val(data) as vk::DeviceSize;
        if byte_size > self.size {
            return Err(GpuError::InvalidState(
                "Data too large for buffer".to_string(),
            ));
        }

        unsafe {
            let ptr = device.map_memory(self.memory, 0, byte_size, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(
                data.as_ptr().cast::<u8>(),
                ptr.cast::<u8>(),
                byte_size as usize,
            );
            device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Destroy the buffer and free its memory.
    ///
    /// # Safety
    /// The buffer must not be in use by the GPU.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// Copy the full byte range from one buffer into another through a one-time
/// command buffer, blocking until the transfer queue drains.
pub fn copy_buffer(
    gpu: &GpuContext,
    pool: &CommandPool,
    src: &GpuBuffer,
    dst: &GpuBuffer,
    size: vk::DeviceSize,
) -> Result<()> {
    execute_single_time_commands(gpu, pool, gpu.graphics_queue(), |device, cmd| {
        let region = vk::BufferCopy::default().size(size);
        unsafe {
            device.cmd_copy_buffer(cmd, src.buffer, dst.buffer, &[region]);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(
        types: &[vk::MemoryPropertyFlags],
    ) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i].property_flags = flags;
        }
        props
    }

    #[test]
    fn device_local_only_at_index_two() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        let index = find_memory_type_index(
            &props,
            0b111,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, Some(2));
    }

    #[test]
    fn requirement_bitmask_excludes_incompatible_types() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // The resource only accepts type 1.
        let index = find_memory_type_index(
            &props,
            0b10,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, Some(1));
    }

    #[test]
    fn first_match_wins_on_ties() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type_index(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        );
        assert_eq!(index, Some(0));
    }

    #[test]
    fn no_compatible_type_yields_none() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);

        let index = find_memory_type_index(
            &props,
            0b1,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        assert_eq!(index, None);
    }

    #[test]
    fn property_superset_is_required() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);

        let index = find_memory_type_index(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert_eq!(index, None);
    }
}
