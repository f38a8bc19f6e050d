//! Window management using GLFW
//!
//! Provides window creation, event handling and Vulkan surface creation.
//! Resize notifications are read from the window's own event queue, so no
//! process-wide callback state is needed.

use ash::vk;
use thiserror::Error;

use crate::core::config::WindowConfig;
use crate::render::window::PresentationSurface;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
}

impl Window {
    /// Create a window without a client API context
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_size_limits(
            size_limit(config.min_width),
            size_limit(config.min_height),
            size_limit(config.max_width),
            size_limit(config.max_height),
        );

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::debug!("Created window \"{}\" ({}x{})", config.title, config.width, config.height);

        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
        })
    }

    /// Request the window to close at the next loop iteration
    pub fn close(&mut self) {
        self.window.set_should_close(true);
    }

    /// Window size in screen coordinates
    pub fn size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_size();
        (clamp_dimension(width), clamp_dimension(height))
    }

    /// Seconds since GLFW was initialized
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Vulkan is not supported by this GLFW build".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {result:?}")))
        }
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::trace!("Framebuffer resized to {}x{}", width, height);
                    self.resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}

impl PresentationSurface for Window {
    fn is_open(&self) -> bool {
        !self.window.should_close()
    }

    fn drawable_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (clamp_dimension(width), clamp_dimension(height))
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }
}

const fn size_limit(value: u32) -> Option<u32> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn clamp_dimension(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_means_dont_care() {
        assert_eq!(size_limit(0), None);
        assert_eq!(size_limit(640), Some(640));
    }

    #[test]
    fn test_negative_dimensions_clamp_to_zero() {
        assert_eq!(clamp_dimension(-1), 0);
        assert_eq!(clamp_dimension(0), 0);
        assert_eq!(clamp_dimension(1920), 1920);
    }
}
