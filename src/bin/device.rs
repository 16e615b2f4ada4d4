// Snapshot 2: select an adapter and create the logical device.
//
// Builds on snapshot 1: adds the window surface, filters physical devices
// by API version / graphics queue / required extensions, creates the
// logical device with dynamic rendering and synchronization2 enabled, and
// retrieves the graphics and present queues. Still no drawing.

use anyhow::Result;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use vk_triangle::backend::{Instance, Surface, VulkanDevice};
use vk_triangle::config::Config;

use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = Config::load();
    let event_loop = EventLoop::new()?;
    let mut app = App {
        config,
        device: None,
        surface: None,
        instance: None,
        window: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Teardown order: device, surface, instance, window.
struct App {
    config: Config,
    device: Option<Arc<VulkanDevice>>,
    surface: Option<Surface>,
    instance: Option<Arc<Instance>>,
    window: Option<Window>,
    error: Option<anyhow::Error>,
}

impl App {
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

        log::info!(
            "Queues ready: graphics family {}, present family {}",
            device.graphics_queue_family,
            device.present_queue_family
        );

        self.instance = Some(instance);
        self.surface = Some(surface);
        self.device = Some(device);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

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
                log::error!("{:#}", e);
                self.error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("{:#}", e);
            self.error = Some(e);
            event_loop.exit();
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
        if let WindowEvent::CloseRequested = event {
            if let Some(ref device) = self.device {
                let _ = device.wait_idle();
            }
            event_loop.exit();
        }
    }
}
