//! Vulkan implementation built on ash, with memory allocated through vk-mem.
//!
//! Render passes and framebuffers are created on demand from `cmd_begin_render_pass` and kept in
//! the device's pass cache. Descriptor sets come from one device-wide pool sized by
//! `FluentDeviceInfo`.

mod internal;

mod api;
pub use api::FluentBackendVulkan;

mod device;
pub use device::FluentDeviceVulkan;
