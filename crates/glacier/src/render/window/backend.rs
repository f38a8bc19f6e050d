//! Window contract consumed by the frame loop

/// Window operations the frame loop depends on
///
/// Sizes are drawable-area sizes in physical pixels, which can differ from
/// screen coordinates under display scaling.
pub trait PresentationSurface {
    /// Returns false once the user or the application asked the window to close
    fn is_open(&self) -> bool;

    /// Current drawable-area size in physical pixels
    ///
    /// Either dimension is zero while the window is minimized.
    fn drawable_size(&self) -> (u32, u32);

    /// Dispatch queued events without blocking
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then dispatch it
    ///
    /// Only used to stall while the window is minimized.
    fn wait_events(&mut self);

    /// Returns true once per resize of the drawable area since the last call
    fn take_resized(&mut self) -> bool {
        false
    }

    /// Whether the drawable area is empty
    fn is_minimized(&self) -> bool {
        let (width, height) = self.drawable_size();
        width == 0 || height == 0
    }
}
