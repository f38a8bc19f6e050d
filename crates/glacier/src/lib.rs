//! # Glacier
//!
//! A thin application layer over Vulkan and GLFW. Glacier owns the window,
//! the device, and the swapchain, and drives the acquire → render → submit →
//! present cycle with a fixed number of frames in flight. Out-of-date and
//! suboptimal surfaces are handled by rebuilding the swapchain in place.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glacier::prelude::*;
//!
//! struct MyApp {
//!     config: ApplicationConfig,
//! }
//!
//! impl Application for MyApp {
//!     fn config(&self) -> &ApplicationConfig {
//!         &self.config
//!     }
//!
//!     fn initialize(&mut self, renderer: &mut Renderer) -> Result<(), AppError> {
//!         // Create shaders, buffers and pipelines here
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, delta_time: f64) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn terminate(&mut self, renderer: &mut Renderer) {}
//! }
//!
//! fn main() {
//!     glacier::foundation::logging::init();
//!     let app = MyApp { config: ApplicationConfig::default() };
//!     if let Err(e) = glacier::run(app) {
//!         log::error!("{}", e);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

mod application;

pub use application::{run, AppError, Application};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{ApplicationConfig, WindowConfig},
        render::camera::{CameraUniform, OrthographicCamera, PerspectiveCamera, Projection},
        render::frame::{FrameScheduler, PresentationResult, SwapchainDependent},
        render::vulkan::{
            DeviceContext, ElementType, IndexBuffer, Pipeline, PipelineDescriptor, PipelineId,
            Renderer, ShaderModule, ShaderStage, UniformBuffer, VertexBuffer, VertexLayout,
            VulkanError, VulkanResult,
        },
        render::window::PresentationSurface,
        run, AppError, Application,
    };
}
