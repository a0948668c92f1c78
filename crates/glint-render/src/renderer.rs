//! Frame orchestration.
//!
//! The renderer owns everything derived from the swapchain: render pass,
//! framebuffers, pipeline, per-image uniform buffers and descriptor sets,
//! and one pre-recorded command buffer per swapchain image. The scene is
//! static; only uniform contents change between frames.

use crate::error::Result;
use crate::mesh::Mesh;
use crate::shader::{self, load_spirv};
use crate::uniforms::{SceneUniforms, UniformBuffers};
use crate::vertex::Vertex;
use ash::vk;
use glint_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffers};
use glint_gpu::descriptors::write_uniform_buffer;
use glint_gpu::pass::{create_framebuffers, create_render_pass};
use glint_gpu::sync::wait_for_fence;
use glint_gpu::{
    CommandPool, DescriptorPool, DescriptorSetLayoutBuilder, FrameRing, GpuContext, GpuError,
    GraphicsPipeline, GraphicsPipelineConfig, ImageFences, Swapchain, MAX_FRAMES_IN_FLIGHT,
};
use std::path::PathBuf;
use std::sync::Arc;

// The same command buffer may be resubmitted while its previous submission
// is still pending when the presentation engine hands out one image twice
// in a row.
const RECORD_FLAGS: vk::CommandBufferUsageFlags = vk::CommandBufferUsageFlags::SIMULTANEOUS_USE;

/// Renderer configuration.
pub struct RendererConfig {
    pub clear_color: [f32; 4],
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.01, 0.01, 0.02, 1.0],
            vertex_shader: PathBuf::from(shader::VERTEX_SHADER_PATH),
            fragment_shader: PathBuf::from(shader::FRAGMENT_SHADER_PATH),
        }
    }
}

/// Frame orchestrator for a single static mesh.
pub struct Renderer {
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniform_buffers: UniformBuffers,
    pipeline: GraphicsPipeline,
    command_pool: CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    frames: FrameRing,
    image_fences: ImageFences,
    recorded: bool,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Build the full frame infrastructure for the context's surface.
    ///
    /// `drawable_width`/`drawable_height` are the window's pixel dimensions,
    /// used only when the surface does not fix its own extent.
    pub fn new(
        gpu: &GpuContext,
        config: RendererConfig,
        drawable_width: u32,
        drawable_height: u32,
    ) -> Result<Self> {
        let device = gpu.device();

        let swapchain = Swapchain::new(gpu, drawable_width, drawable_height)?;
        let image_count = swapchain.images.len();

        let render_pass = create_render_pass(device, swapchain.format)?;
        let framebuffers =
            create_framebuffers(device, render_pass, &swapchain.image_views, swapchain.extent)?;

        let descriptor_set_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(device)?
        };

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(image_count as u32)];
        let descriptor_pool =
            unsafe { DescriptorPool::new(device, image_count as u32, &pool_sizes)? };

        let layouts = vec![descriptor_set_layout; image_count];
        let descriptor_sets = unsafe { descriptor_pool.allocate(device, &layouts)? };

        let uniform_buffers = UniformBuffers::new(gpu, image_count)?;
        for (i, &set) in descriptor_sets.iter().enumerate() {
            unsafe {
                write_uniform_buffer(
                    device,
                    set,
                    0,
                    uniform_buffers.buffer(i),
                    0,
                    SceneUniforms::SIZE,
                );
            }
        }

        let pipeline_config = GraphicsPipelineConfig {
            vertex_shader: load_spirv(&config.vertex_shader)?,
            fragment_shader: load_spirv(&config.fragment_shader)?,
            vertex_bindings: vec![Vertex::binding_description()],
            vertex_attributes: Vertex::attribute_descriptions().to_vec(),
            extent: swapchain.extent,
            ..GraphicsPipelineConfig::default()
        };

        let pipeline = unsafe {
            GraphicsPipeline::new(
                device,
                &pipeline_config,
                render_pass,
                &[descriptor_set_layout],
            )?
        };

        // Buffers are recorded once and replayed, so the pool needs no
        // reset capability.
        let command_pool = CommandPool::new(
            gpu,
            gpu.queue_families().graphics,
            vk::CommandPoolCreateFlags::empty(),
        )?;
        let command_buffers = command_pool.allocate_command_buffers(device, image_count as u32)?;

        let frames = FrameRing::new(device, MAX_FRAMES_IN_FLIGHT)?;

        tracing::info!(
            images = image_count,
            frames_in_flight = MAX_FRAMES_IN_FLIGHT,
            "Renderer created"
        );

        Ok(Self {
            device: gpu.device_arc(),
            swapchain_loader: gpu.swapchain_loader().clone(),
            swapchain,
            render_pass,
            framebuffers,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_sets,
            uniform_buffers,
            pipeline,
            command_pool,
            command_buffers,
            frames,
            image_fences: ImageFences::new(image_count),
            recorded: false,
            clear_color: config.clear_color,
        })
    }

    /// Record every per-image command buffer against `mesh`.
    ///
    /// Must be called exactly once, before the first [`Renderer::draw_frame`];
    /// the pool has no reset capability, so a second call is rejected.
    pub fn record(&mut self, mesh: &Mesh) -> Result<()> {
        if self.recorded {
            return Err(GpuError::InvalidState(
                "command buffers already recorded".to_string(),
            )
            .into());
        }

        let device = self.device.as_ref();

        for (i, &cmd) in self.command_buffers.iter().enumerate() {
            begin_command_buffer(device, cmd, RECORD_FLAGS)?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            }];

            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(self.framebuffers[i])
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: self.swapchain.extent,
                })
                .clear_values(&clear_values);

            unsafe {
                device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.pipeline,
                );
                device.cmd_bind_vertex_buffers(cmd, 0, &[mesh.vertex_buffer()], &[0]);
                device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline.layout,
                    0,
                    &[self.descriptor_sets[i]],
                    &[],
                );

                if let Some(index_buffer) = mesh.index_buffer() {
                    device.cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
                    device.cmd_draw_indexed(cmd, mesh.index_count(), 1, 0, 0, 0);
                } else {
                    device.cmd_draw(cmd, mesh.vertex_count(), 1, 0, 0);
                }

                device.cmd_end_render_pass(cmd);
            }

            end_command_buffer(device, cmd)?;
        }

        self.recorded = true;
        Ok(())
    }

    /// Draw one frame.
    ///
    /// Waits for the current slot's fence, acquires an image, waits out any
    /// still-pending submission against that image, updates the image's
    /// uniform buffer, submits the pre-recorded command buffer, and presents.
    /// The ring cursor advances on success; any failure is fatal to the
    /// caller.
    pub fn draw_frame(&mut self, gpu: &GpuContext, uniforms: &SceneUniforms) -> Result<()> {
        let device = self.device.as_ref();
        let frame = self.frames.current();

        frame.wait(device)?;

        let image_index =
            self.swapchain
                .acquire_next_image(gpu, frame.image_available, u64::MAX)?;

        // The slot fence only covers this slot's own previous frame; the
        // acquired image may still be in flight under another slot.
        if let Some(pending) = self
            .image_fences
            .replace(image_index as usize, frame.in_flight)
        {
            wait_for_fence(device, pending, u64::MAX)?;
        }

        frame.reset(device)?;

        self.uniform_buffers
            .update(device, image_index as usize, uniforms)?;

        submit_command_buffers(
            device,
            gpu.graphics_queue(),
            &[self.command_buffers[image_index as usize]],
            &[frame.image_available],
            &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            &[frame.render_finished],
            frame.in_flight,
        )?;

        self.swapchain.present(
            gpu,
            gpu.present_queue(),
            image_index,
            &[frame.render_finished],
        )?;

        self.frames.advance();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.frames.destroy(&self.device);
            self.command_pool.destroy(&self.device);
            self.pipeline.destroy(&self.device);
            self.uniform_buffers.destroy(&self.device);
            self.descriptor_pool.destroy(&self.device);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
            self.swapchain.destroy(&self.device, &self.swapchain_loader);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_buffers_allow_concurrent_resubmission() {
        // Pre-recorded buffers are replayed without reset, so they must be
        // usable while a previous submission is still pending.
        assert!(RECORD_FLAGS.contains(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE));
    }
}
