//! Vulkan abstraction layer for the Glint renderer.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - Adapter selection against a presentation surface
//! - Manual buffer/memory allocation
//! - Command buffer management
//! - Swapchain, render pass, and pipeline handling
//! - Frame synchronization primitives

pub mod command;
pub mod context;
pub mod debug;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pass;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use debug::DebugMessenger;
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use device::QueueFamilyIndices;
pub use error::{GpuError, Result};
pub use memory::{find_memory_type_index, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::SurfaceSupport;
pub use swapchain::Swapchain;
pub use sync::{
    create_fence, create_semaphore, FrameRing, FrameSync, ImageFences, MAX_FRAMES_IN_FLIGHT,
};
