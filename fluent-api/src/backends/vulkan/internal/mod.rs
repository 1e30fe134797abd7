pub(crate) mod conversions;
mod debug_reporter;
pub(crate) mod instance;
pub(crate) mod physical_device;
pub(crate) mod render_pass;
pub(crate) mod swapchain;
