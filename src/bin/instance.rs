// Snapshot 1: create a validated Vulkan instance.
//
// Opens the window, checks layers and instance extensions against what the
// platform reports, creates the instance plus debug messenger, then idles
// until the window is closed. No device, no drawing yet.

use anyhow::Result;
use raw_window_handle::HasRawDisplayHandle;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use vk_triangle::backend::Instance;
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

struct App {
    config: Config,
    instance: Option<Arc<Instance>>,
    window: Option<Window>,
    error: Option<anyhow::Error>,
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

        let result = event_loop.create_window(attributes).map_err(Into::into).and_then(
            |window| -> Result<()> {
                let display_handle = window.raw_display_handle();
                let instance = Instance::new(
                    &self.config.window.title,
                    display_handle,
                    self.config.validation_enabled(),
                )?;
                log::info!("Vulkan instance ready");
                self.instance = Some(instance);
                self.window = Some(window);
                Ok(())
            },
        );

        if let Err(e) = result {
            log::error!("{:#}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            event_loop.exit();
        }
    }
}
