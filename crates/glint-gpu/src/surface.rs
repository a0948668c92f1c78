//! Surface capability queries.

use crate::context::GpuContext;
use crate::error::Result;
use ash::vk;

/// Everything the surface reports about itself for swapchain negotiation.
pub struct SurfaceSupport {
    /// Raw surface capabilities: image counts, extents, transforms.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query surface support for the context's adapter.
    pub fn query(gpu: &GpuContext) -> Result<Self> {
        unsafe {
            let capabilities = gpu
                .surface_loader
                .get_physical_device_surface_capabilities(gpu.physical_device, gpu.surface)?;

            let formats = gpu
                .surface_loader
                .get_physical_device_surface_formats(gpu.physical_device, gpu.surface)?;

            let present_modes = gpu
                .surface_loader
                .get_physical_device_surface_present_modes(gpu.physical_device, gpu.surface)?;

            Ok(Self {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}
