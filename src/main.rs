// =============================================================================
// VULKAN BOOTSTRAP DEMO
// =============================================================================
//
// Opens a window, runs the setup pipeline against the real driver, rebuilds
// the swapchain on resize and tears everything down on close.
//
// STARTUP:
// 1. Load config.toml (defaults if missing)
// 2. Initialize logging
// 3. Create the window once the event loop resumes
// 4. RenderContext::initialize (instance ... descriptor pool)
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use vk_bootstrap_core::backend::AshDriver;
use vk_bootstrap_core::{Config, RenderContext};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vulkan bootstrap demo");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop terminated abnormally")?;
    Ok(())
}

fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::from_default_env();
    builder.filter_level(config.debug.level_filter());
    builder.init();
}

/// Field order matters for Drop: the context must go before the window it
/// presents to.
struct App {
    config: Config,
    context: Option<RenderContext<AshDriver>>,
    window: Option<Window>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
        }
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let driver = AshDriver::load().context("Failed to load Vulkan")?;
        let mut context = RenderContext::new(driver, self.config.clone());

        if let Err(e) = context.initialize(window) {
            context.teardown();
            return Err(e).context("Failed to initialize render context");
        }

        if let Some(physical) = context.physical_device() {
            log::info!("Running on {}", physical.name);
        }
        self.context = Some(context);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.teardown();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("{:#}", e);
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
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                // Minimized; keep the current swapchain until there is something to draw to
                if size.width == 0 || size.height == 0 {
                    log::debug!("Window minimized, skipping resize");
                    return;
                }

                let Some(context) = self.context.as_mut() else {
                    return;
                };
                let extent = vk::Extent2D {
                    width: size.width,
                    height: size.height,
                };
                if let Err(e) = context.resize(extent) {
                    log::error!("Resize failed: {}", e);
                    if context.state().is_failed() {
                        self.shutdown();
                        event_loop.exit();
                    } else if context.needs_resize() {
                        log::warn!("Swapchain retired; retrying on the next resize event");
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown();
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}
