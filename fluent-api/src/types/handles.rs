use fluent_base::slab::SlabKey;

// Every handle wraps a generation-checked key into an arena owned by the backend that created it.
// Handles never carry backend types, so the same public structs work with every backend.
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        pub struct $name(pub(crate) SlabKey);

        impl $name {
            #[allow(dead_code)]
            pub(crate) fn new(key: SlabKey) -> Self {
                $name(key)
            }

            #[allow(dead_code)]
            pub(crate) fn key(self) -> SlabKey {
                self.0
            }
        }
    };
}

define_handle!(FluentQueueHandle);
define_handle!(FluentSemaphoreHandle);
define_handle!(FluentFenceHandle);
define_handle!(FluentSwapchainHandle);
define_handle!(FluentCommandPoolHandle);
define_handle!(FluentCommandBufferHandle);
define_handle!(FluentShaderHandle);
define_handle!(FluentDescriptorSetLayoutHandle);
define_handle!(FluentDescriptorSetHandle);
define_handle!(FluentPipelineHandle);
define_handle!(FluentBufferHandle);
define_handle!(
    /// Images owned by a swapchain get handles too; they are destroyed by the swapchain, never by
    /// the client
    FluentImageHandle
);
define_handle!(FluentSamplerHandle);
