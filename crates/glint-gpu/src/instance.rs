//! Vulkan instance creation.

use crate::debug::validation_layers;
use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashSet;
use std::ffi::{CStr, CString};

/// Required instance extensions for windowed presentation.
pub fn required_instance_extensions(enable_validation: bool) -> Vec<&'static CStr> {
    let mut extensions = vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ];

    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME);
    }

    extensions
}

/// Check that every requested instance extension is available.
pub fn check_instance_extension_support(
    entry: &ash::Entry,
    requested: &[&CStr],
) -> Result<()> {
    let available = unsafe { entry.enumerate_instance_extension_properties(None)? };

    let available_names: HashSet<String> = available
        .iter()
        .filter_map(|props| {
            unsafe { CStr::from_ptr(props.extension_name.as_ptr()) }
                .to_str()
                .ok()
                .map(String::from)
        })
        .collect();

    for ext in requested {
        let name = ext.to_str().unwrap_or_default();
        if !available_names.contains(name) {
            return Err(GpuError::ExtensionNotSupported(name.to_string()));
        }
    }

    Ok(())
}

/// Check that every requested validation layer is available.
pub fn check_validation_layer_support(entry: &ash::Entry) -> Result<()> {
    let available = unsafe { entry.enumerate_instance_layer_properties()? };

    for layer in validation_layers() {
        let layer_name = layer.to_str().unwrap_or_default();
        let found = available.iter().any(|props| {
            unsafe { CStr::from_ptr(props.layer_name.as_ptr()) }.to_str().ok()
                == Some(layer_name)
        });
        if !found {
            return Err(GpuError::LayerNotSupported(layer_name.to_string()));
        }
    }

    Ok(())
}

/// Create a Vulkan instance.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name).unwrap();
    let engine_name = CString::new("Glint").unwrap();

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let extensions = required_instance_extensions(enable_validation);
    check_instance_extension_support(entry, &extensions)?;
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let layers = if enable_validation {
        check_validation_layer_support(entry)?;
        tracing::info!("Validation layers enabled");
        validation_layers()
    } else {
        vec![]
    };
    let layer_names: Vec<*const i8> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = entry.create_instance(&create_info, None)?;

    Ok(instance)
}
