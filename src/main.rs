// Final snapshot: draw a triangle every frame.
//
// Owns the full chain instance -> surface -> device -> swapchain ->
// pipeline -> frame renderer. Field order on App encodes teardown order;
// the device is waited idle before anything is released.

use anyhow::Result;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use vk_triangle::backend::{shader, Instance, Pipeline, Surface, Swapchain, VulkanDevice};
use vk_triangle::config::Config;
use vk_triangle::frame::FrameRenderer;

use std::sync::Arc;

fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    log::info!(
        "Starting {} ({}x{})",
        config.window.title,
        config.window.width,
        config.window.height
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Initialization/frame errors were already logged where they occurred;
    // returning them here turns them into a nonzero exit code.
    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

/// Application state. Fields are declared in teardown order: the frame
/// renderer goes first, the instance and window last.
struct App {
    config: Config,

    frame: Option<FrameRenderer>,
    pipeline: Option<Pipeline>,
    swapchain: Option<Swapchain>,
    surface: Option<Surface>,
    device: Option<Arc<VulkanDevice>>,
    instance: Option<Arc<Instance>>,
    window: Option<Window>,

    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            frame: None,
            pipeline: None,
            swapchain: None,
            surface: None,
            device: None,
            instance: None,
            window: None,
            error: None,
        }
    }

    fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let display_handle = window.raw_display_handle();
        let window_handle = window.raw_window_handle();

        let instance = Instance::new(
            &self.config.window.title,
            display_handle,
            self.config.validation_enabled(),
        )?;
        let surface = instance.create_surface(display_handle, window_handle)?;
        let device = VulkanDevice::new(instance.clone(), &surface)?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(device.clone(), &surface, size.width, size.height)?;

        let spirv = shader::load_spirv(&self.config.graphics.shader_path)?;
        log::info!(
            "Loaded shader binary {} ({} bytes)",
            self.config.graphics.shader_path,
            spirv.len()
        );
        let pipeline = Pipeline::new(device.clone(), swapchain.format, &spirv)?;

        let frame = FrameRenderer::new(device.clone(), self.config.graphics.clear_color)?;

        self.instance = Some(instance);
        self.surface = Some(surface);
        self.device = Some(device);
        self.swapchain = Some(swapchain);
        self.pipeline = Some(pipeline);
        self.frame = Some(frame);

        log::info!("Vulkan initialized");
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // Fixed-size window; swapchain recreation is not implemented
        let attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.fail(event_loop, e);
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                if let Some(ref device) = self.device {
                    let _ = device.wait_idle();
                }
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                if let (Some(frame), Some(swapchain), Some(pipeline)) = (
                    self.frame.as_mut(),
                    self.swapchain.as_ref(),
                    self.pipeline.as_ref(),
                ) {
                    if let Err(e) = frame.draw(swapchain, pipeline) {
                        self.fail(event_loop, e.into());
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // In-flight GPU work must finish before resources are released
        if let Some(ref device) = self.device {
            let _ = device.wait_idle();
        }
    }
}
