//! Application lifecycle and the main loop

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::config::ApplicationConfig;
use crate::render::frame::{FrameScheduler, PresentationResult};
use crate::render::vulkan::{Renderer, VulkanContext, VulkanError, VulkanPresenter, Window};
use crate::render::window::PresentationSurface;

/// Application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Rendering error
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Application-defined error
    #[error("{0}")]
    Custom(String),
}

/// An application driven by [`run`]
pub trait Application {
    /// Settings used to create the window, device and swapchain
    fn config(&self) -> &ApplicationConfig;

    /// Create shaders, buffers and pipelines
    fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), AppError>;

    /// Advance simulation state by `delta_time` seconds
    fn update(&mut self, delta_time: f64) -> Result<(), AppError>;

    /// Record the current frame
    ///
    /// Per-slot resources such as uniform buffers can be written here for
    /// `renderer.current_slot()`. The default draws every registered
    /// pipeline over a black clear.
    fn render(&mut self, renderer: &mut Renderer) -> Result<(), AppError> {
        renderer.record_pipelines()?;
        Ok(())
    }

    /// Release GPU resources; the device is idle when this is called
    fn terminate(&mut self, renderer: &mut Renderer);
}

/// Run `app` until its window closes or a fatal error occurs
///
/// Fatal errors are logged before being returned. The device is idle before
/// [`Application::terminate`] runs, and everything the application owns is
/// dropped before the device is destroyed.
pub fn run<A: Application>(app: A) -> Result<(), AppError> {
    let config = app.config().clone();
    config.validate()?;

    let mut window = Window::new(&config.window).map_err(VulkanError::from)?;
    let context = VulkanContext::new(&window, &config)?;
    let device = context.device_context();

    let presenter = VulkanPresenter::new(&device, window.drawable_size(), config.vsync, config.frames_in_flight)?;
    let mut scheduler = FrameScheduler::new(presenter, config.frames_in_flight)?;
    let mut app = app;

    log::info!("Running {}", config.name);

    let result = app
        .initialize(scheduler.engine_mut().renderer_mut())
        .and_then(|()| main_loop(&mut app, &mut scheduler, &mut window));

    if let Err(e) = &result {
        log::error!("Fatal error: {}", e);
    }

    if let Err(e) = scheduler.wait_idle() {
        log::error!("Failed to idle device before shutdown: {}", e);
    }
    app.terminate(scheduler.engine_mut().renderer_mut());

    drop(app);
    drop(scheduler);
    drop(context);
    drop(window);

    log::info!("Shutdown complete");
    result
}

fn main_loop<A: Application>(
    app: &mut A,
    scheduler: &mut FrameScheduler<VulkanPresenter>,
    window: &mut Window,
) -> Result<(), AppError> {
    let mut last_time = window.time();

    while window.is_open() {
        let now = window.time();
        let delta_time = now - last_time;
        last_time = now;

        app.update(delta_time)?;

        let result = scheduler.run_frame(|renderer| app.render(renderer))?;
        let resized = window.take_resized();
        if result == PresentationResult::SurfaceOutOfDate || resized {
            scheduler.rebuild(window)?;
        }

        window.poll_events();
    }

    Ok(())
}
