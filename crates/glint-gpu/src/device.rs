//! Adapter selection and logical device creation.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// Queue family indices resolved for an adapter.
///
/// Graphics and presentation may resolve to the same family; they are still
/// tracked separately because a device may only offer them split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Whether graphics and presentation share one queue family.
    pub fn is_unified(&self) -> bool {
        self.graphics == self.present
    }
}

/// Required device extensions.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Search the queue family list for graphics and presentation support.
///
/// Each predicate takes the first family satisfying it, tracked
/// independently; the search stops as soon as both are found. Returns `None`
/// if either capability is missing on this adapter.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<Option<QueueFamilyIndices>>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if graphics.is_none()
            && family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            graphics = Some(index);
        }

        if present.is_none() && family.queue_count > 0 && supports_present(index)? {
            present = Some(index);
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            return Ok(Some(QueueFamilyIndices { graphics, present }));
        }
    }

    Ok(None)
}

/// Check that every required extension appears in the available set.
pub fn check_device_extension_support(
    available: &[vk::ExtensionProperties],
    required: &[&CStr],
) -> bool {
    let available_names: HashSet<&CStr> = available
        .iter()
        .filter_map(|props| props.extension_name_as_c_str().ok())
        .collect();

    required.iter().all(|ext| available_names.contains(ext))
}

/// Select the first adapter that can drive the given surface.
///
/// An adapter qualifies when it has a graphics-capable queue family, a queue
/// family that can present to the surface, all required device extensions,
/// and at least one surface format and one present mode.
///
/// # Safety
/// The instance, surface loader, and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
    let devices = instance.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    for device in devices {
        let families = instance.get_physical_device_queue_family_properties(device);
        let indices = find_queue_families(&families, |index| {
            Ok(surface_loader.get_physical_device_surface_support(device, index, surface)?)
        })?;

        let Some(indices) = indices else {
            continue;
        };

        let available = instance
            .enumerate_device_extension_properties(device)
            .unwrap_or_default();
        if !check_device_extension_support(&available, &required_device_extensions()) {
            continue;
        }

        let formats = surface_loader.get_physical_device_surface_formats(device, surface)?;
        let present_modes =
            surface_loader.get_physical_device_surface_present_modes(device, surface)?;
        if formats.is_empty() || present_modes.is_empty() {
            continue;
        }

        let properties = instance.get_physical_device_properties(device);
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Selected GPU: {name}");

        return Ok((device, indices));
    }

    Err(GpuError::NoSuitableDevice)
}

/// Create the logical device and retrieve the graphics and present queues.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    indices: QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let mut unique_families = HashSet::new();
    unique_families.insert(indices.graphics);
    unique_families.insert(indices.present);

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(indices.graphics, 0);
    let present_queue = device.get_device_queue(indices.present, 0);

    Ok((device, graphics_queue, present_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(count: u32, flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_adapter_without_graphics_family() {
        // Adapter A: compute and transfer only, even with present support.
        let families = [
            family(1, vk::QueueFlags::COMPUTE),
            family(2, vk::QueueFlags::TRANSFER),
        ];

        let result = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn finds_unified_graphics_and_present_family() {
        let families = [
            family(1, vk::QueueFlags::TRANSFER),
            family(4, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];

        let indices = find_queue_families(&families, |index| Ok(index == 1))
            .unwrap()
            .expect("adapter B must qualify");
        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 1 });
        assert!(indices.is_unified());
    }

    #[test]
    fn tracks_split_families_independently() {
        // Graphics on family 0, presentation only on family 2.
        let families = [
            family(1, vk::QueueFlags::GRAPHICS),
            family(1, vk::QueueFlags::COMPUTE),
            family(1, vk::QueueFlags::TRANSFER),
        ];

        let indices = find_queue_families(&families, |index| Ok(index == 2))
            .unwrap()
            .expect("split families still qualify");
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 2 });
        assert!(!indices.is_unified());
    }

    #[test]
    fn search_stops_at_first_satisfying_family() {
        let families = [
            family(1, vk::QueueFlags::GRAPHICS),
            family(1, vk::QueueFlags::GRAPHICS),
        ];

        let mut queried = Vec::new();
        let indices = find_queue_families(&families, |index| {
            queried.push(index);
            Ok(true)
        })
        .unwrap()
        .unwrap();

        assert_eq!(indices.graphics, 0);
        assert_eq!(indices.present, 0);
        // Early exit: family 1 is never probed for presentation.
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn skips_empty_queue_families() {
        let families = [
            family(0, vk::QueueFlags::GRAPHICS),
            family(1, vk::QueueFlags::GRAPHICS),
        ];

        let indices = find_queue_families(&families, |_| Ok(true)).unwrap().unwrap();
        assert_eq!(indices.graphics, 1);
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        let bytes = name.to_bytes_with_nul();
        for (dst, &src) in props.extension_name.iter_mut().zip(bytes) {
            *dst = src as _;
        }
        props
    }

    #[test]
    fn device_extension_check_requires_swapchain() {
        let available = [extension(c"VK_KHR_swapchain"), extension(c"VK_KHR_maintenance1")];
        assert!(check_device_extension_support(
            &available,
            &required_device_extensions()
        ));

        let missing = [extension(c"VK_KHR_maintenance1")];
        assert!(!check_device_extension_support(
            &missing,
            &required_device_extensions()
        ));
    }
}
