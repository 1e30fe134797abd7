// Accounting shared by backends that allocate descriptor sets from one device-wide pool
#[cfg(any(feature = "fluent-headless", feature = "fluent-vulkan"))]
pub(crate) mod descriptor_pool;
#[cfg(any(feature = "fluent-headless", feature = "fluent-vulkan"))]
pub(crate) mod slab_lookup;

#[cfg(feature = "fluent-headless")]
pub mod headless;

#[cfg(feature = "fluent-vulkan")]
pub mod vulkan;

#[cfg(feature = "fluent-dx12")]
pub mod dx12;

#[cfg(feature = "fluent-metal")]
pub mod metal;
