//! CPU implementation of every device operation.
//!
//! Buffers and images live in host memory. Commands are validated while recorded and executed in
//! order when submitted, so work is complete by the time `queue_submit` returns. Image layouts are
//! tracked through barriers, descriptor sets are accounted against a pool sized like the native
//! backends' pools, and render passes and framebuffers go through the same pass cache as vulkan.
//!
//! Useful for tests and tools that must run without a GPU.

mod api;
pub use api::FluentBackendHeadless;

mod device;
pub use device::{FluentDeviceHeadless, FluentHeadlessStats};

mod commands;
mod texels;

#[cfg(test)]
mod tests;
