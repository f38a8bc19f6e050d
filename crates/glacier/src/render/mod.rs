//! Rendering subsystem
//!
//! - `window`: the presentation surface contract the frame loop talks to
//! - `vulkan`: device, swapchain and GPU resource wrappers
//! - `frame`: the frame scheduler driving acquire, submit and present
//! - `camera`: view and projection matrices for fly cameras

pub mod camera;
pub mod frame;
pub mod vulkan;
pub mod window;
