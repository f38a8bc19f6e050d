//! Presentation surface abstraction
//!
//! The frame scheduler never talks to GLFW directly. It sees the window
//! through [`PresentationSurface`], which the GLFW window in
//! `render::vulkan::window` implements and tests replace with a double.

pub mod backend;

pub use backend::PresentationSurface;
