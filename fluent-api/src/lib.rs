//! A cross-platform graphics device abstraction.
//!
//! `create_renderer_backend` picks one backend (vulkan, d3d12, metal or the CPU-only headless
//! backend). Everything else is reached through the `FluentDevice` it creates: queues, swapchains,
//! command buffers, shaders, pipelines, descriptor sets, buffers, images and samplers.
//!
//! Shaders are SPIR-V. Bindings are reflected when a shader is created, and descriptor writes are
//! resolved by name against that reflection data. Backends that need retained render pass and
//! framebuffer objects build them on demand from `cmd_begin_render_pass` and cache them per device.
//!
//! The `extra` module holds helpers built on the public API, such as the threaded resource loader
//! and a small render graph.

pub use error::*;
pub use types::*;

pub use api::*;
pub use barriers::*;
pub use command_buffer::*;
pub use device_context::*;
pub use pass_cache::*;
pub use queue::*;
pub use reflection::{reflect_spirv, reflect_spirv_words, FluentBinding, FluentReflectionData};
pub use resources::*;
pub use swapchain::*;

pub use backend::{FluentResolvedDescriptorWrite, FluentSwapchainImages};
pub use backends::*;

pub use extra::render_graph::*;
pub use extra::resource_loader::*;

mod error;
mod types;

mod api;
mod backend;
mod backends;
mod barriers;
mod command_buffer;
mod device_context;
mod pass_cache;
mod queue;
mod reflection;
mod resources;
mod swapchain;

pub mod extra;
