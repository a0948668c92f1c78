//! Glint demo viewer.
//!
//! Opens a fixed-size window and renders a spinning colored quad. Precompiled
//! SPIR-V shaders are loaded from `./shaders/` relative to the working
//! directory.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use glam::{Mat4, Vec3};
use glint_gpu::{CommandPool, GpuContext, GpuContextBuilder};
use glint_render::{Mesh, Renderer, RendererConfig, SceneUniforms, Vertex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Glint Viewer".to_string(),
            width: 1280,
            height: 720,
            validation: cfg!(debug_assertions),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::new("Glint Viewer").with_size(1280, 720);

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        config,
        state: None,
        failed: false,
    };

    event_loop.run_app(&mut viewer)?;

    if viewer.failed {
        anyhow::bail!("viewer exited after a render error");
    }
    Ok(())
}

struct Viewer {
    config: AppConfig,
    state: Option<ViewerState>,
    failed: bool,
}

/// Live application state.
///
/// Field order matters for drop: the renderer goes before the GPU context.
struct ViewerState {
    window: Arc<Window>,
    mesh: Option<Mesh>,
    renderer: Renderer,
    gpu: GpuContext,
    start: Instant,
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match create_state(&self.config, event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Viewer ready");
            }
            Err(e) => {
                error!("Failed to initialize: {e}");
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let result = match &mut self.state {
                    Some(state) => state.render_frame(),
                    None => return,
                };

                match result {
                    Ok(()) => {
                        if let Some(state) = &self.state {
                            state.window.request_redraw();
                        }
                    }
                    Err(e) => {
                        error!("Render error: {e}");
                        self.failed = true;
                        if let Some(state) = self.state.take() {
                            state.cleanup();
                        }
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn create_state(config: &AppConfig, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
    // Fixed-size window: there is no swapchain recreate path.
    let window_attrs = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(false);

    let window = Arc::new(event_loop.create_window(window_attrs)?);

    let gpu = GpuContextBuilder::new()
        .app_name(&config.title)
        .validation(config.validation)
        .build(window.as_ref())?;

    let size = window.inner_size();
    let mut renderer = Renderer::new(&gpu, RendererConfig::default(), size.width, size.height)?;

    let mesh = upload_quad(&gpu)?;
    renderer.record(&mesh)?;

    Ok(ViewerState {
        window,
        mesh: Some(mesh),
        renderer,
        gpu,
        start: Instant::now(),
    })
}

/// Upload the demo quad through a transient transfer pool.
fn upload_quad(gpu: &GpuContext) -> anyhow::Result<Mesh> {
    let vertices = [
        Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(1.0, 0.0, 0.0)),
        Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec3::new(0.0, 1.0, 0.0)),
        Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::new(1.0, 1.0, 0.0)),
    ];
    let indices = [0u32, 1, 2, 2, 3, 0];

    let pool = CommandPool::new(
        gpu,
        gpu.queue_families().graphics,
        vk::CommandPoolCreateFlags::TRANSIENT,
    )?;

    let mesh = Mesh::upload(gpu, &pool, &vertices, Some(&indices));

    unsafe { pool.destroy(gpu.device()) };

    Ok(mesh?)
}

impl ViewerState {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let elapsed = self.start.elapsed().as_secs_f32();
        let size = self.window.inner_size();
        let aspect = size.width as f32 / size.height as f32;

        let mut projection =
            Mat4::perspective_rh(45_f32.to_radians(), aspect, 0.1, 100.0);
        // Vulkan clip space has Y pointing down.
        projection.y_axis.y *= -1.0;

        let uniforms = SceneUniforms {
            model: Mat4::from_rotation_z(elapsed),
            view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y),
            projection,
        };

        self.renderer.draw_frame(&self.gpu, &uniforms)?;
        Ok(())
    }

    fn cleanup(mut self) {
        info!("Starting cleanup...");
        if let Err(e) = self.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        if let Some(mesh) = self.mesh.take() {
            unsafe { mesh.destroy(self.gpu.device()) };
        }

        // Renderer and context drop in field order.
        info!("Cleanup complete");
    }
}
