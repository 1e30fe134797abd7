use super::FluentExtents2D;
use raw_window_handle::RawWindowHandle;

/// What the device layer needs from the windowing layer. The window is never owned here.
///
/// Instance extensions and the native surface are derived from `raw_window_handle`, the sizes are
/// queried on swapchain creation and resize.
pub trait FluentWsi: Send + Sync {
    fn raw_window_handle(&self) -> RawWindowHandle;

    /// Size of the window in logical units
    fn window_size(&self) -> FluentExtents2D;

    /// Size of the drawable area in pixels. Differs from `window_size` on high-dpi displays.
    fn framebuffer_size(&self) -> FluentExtents2D;
}
