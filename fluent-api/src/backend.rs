//! The seam between the public wrappers and the backends.
//!
//! Each backend provides one `FluentBackendImpl` and one `FluentDeviceImpl`. The public types
//! (`FluentBackend`, `FluentDevice`, `FluentQueue`, ...) hold these as trait objects, assert their
//! preconditions and forward unchanged. Every operation has a default implementation that reports
//! `FluentError::Unsupported`, so partial backends only implement what they support.
//!
//! Backends receive handles and plain-data definitions only. Reflection, descriptor name
//! resolution and precondition checks happen before calls reach this layer.

use crate::*;
use std::sync::Arc;

fn unsupported<T>(
    api: FluentApiType,
    operation: &'static str,
) -> FluentResult<T> {
    log::error!(
        "{} was called on the {} backend, which does not support it",
        operation,
        api.name()
    );
    Err(FluentError::Unsupported { api, operation })
}

pub trait FluentBackendImpl: Send + Sync {
    fn api_type(&self) -> FluentApiType;

    fn create_device(
        &self,
        _device_info: &FluentDeviceInfo,
    ) -> FluentResult<Arc<dyn FluentDeviceImpl>> {
        unsupported(self.api_type(), "create_device")
    }

    fn destroy(&mut self) -> FluentResult<()> {
        Ok(())
    }
}

/// Images belonging to a swapchain, reported on creation and after every resize
#[derive(Clone, Debug)]
pub struct FluentSwapchainImages {
    pub width: u32,
    pub height: u32,
    pub format: FluentFormat,
    pub images: Vec<FluentImage>,
}

/// A descriptor write whose name was already resolved against the layout's reflection data
#[derive(Clone, Debug)]
pub struct FluentResolvedDescriptorWrite<'a> {
    pub binding: &'a FluentBinding,
    pub write: &'a FluentDescriptorWrite<'a>,
}

#[allow(unused_variables)]
pub trait FluentDeviceImpl: Send + Sync {
    fn api_type(&self) -> FluentApiType;

    fn wait_idle(&self) -> FluentResult<()> {
        unsupported(self.api_type(), "device_wait_idle")
    }

    /// Tear down every remaining object, including the pass cache
    fn destroy(&self) -> FluentResult<()> {
        Ok(())
    }

    fn pass_cache_stats(&self) -> FluentPassCacheStats {
        FluentPassCacheStats::default()
    }

    #[cfg(feature = "fluent-headless")]
    fn headless_device(&self) -> Option<&crate::headless::FluentDeviceHeadless> {
        None
    }

    //
    // Queues
    //
    fn create_queue(
        &self,
        queue_type: FluentQueueType,
    ) -> FluentResult<FluentQueueHandle> {
        unsupported(self.api_type(), "create_queue")
    }

    fn destroy_queue(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_queue")
    }

    fn queue_wait_idle(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "queue_wait_idle")
    }

    fn queue_submit(
        &self,
        queue: FluentQueueHandle,
        submit_info: &FluentQueueSubmitInfo,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "queue_submit")
    }

    fn queue_present(
        &self,
        queue: FluentQueueHandle,
        present_info: &FluentQueuePresentInfo,
    ) -> FluentResult<FluentPresentResult> {
        unsupported(self.api_type(), "queue_present")
    }

    //
    // Synchronization
    //
    fn create_semaphore(&self) -> FluentResult<FluentSemaphoreHandle> {
        unsupported(self.api_type(), "create_semaphore")
    }

    fn destroy_semaphore(
        &self,
        semaphore: FluentSemaphoreHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_semaphore")
    }

    fn create_fence(&self) -> FluentResult<FluentFenceHandle> {
        unsupported(self.api_type(), "create_fence")
    }

    fn destroy_fence(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_fence")
    }

    fn wait_for_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "wait_for_fences")
    }

    fn reset_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "reset_fences")
    }

    fn fence_status(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<FluentFenceStatus> {
        unsupported(self.api_type(), "fence_status")
    }

    //
    // Swapchains
    //
    fn create_swapchain(
        &self,
        swapchain_info: &FluentSwapchainInfo,
    ) -> FluentResult<(FluentSwapchainHandle, FluentSwapchainImages)> {
        unsupported(self.api_type(), "create_swapchain")
    }

    fn resize_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
        width: u32,
        height: u32,
    ) -> FluentResult<FluentSwapchainImages> {
        unsupported(self.api_type(), "resize_swapchain")
    }

    fn destroy_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_swapchain")
    }

    fn acquire_next_image(
        &self,
        swapchain: FluentSwapchainHandle,
        semaphore: Option<FluentSemaphoreHandle>,
        fence: Option<FluentFenceHandle>,
    ) -> FluentResult<u32> {
        unsupported(self.api_type(), "acquire_next_image")
    }

    //
    // Command pools and buffers
    //
    fn create_command_pool(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<FluentCommandPoolHandle> {
        unsupported(self.api_type(), "create_command_pool")
    }

    fn destroy_command_pool(
        &self,
        command_pool: FluentCommandPoolHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_command_pool")
    }

    fn create_command_buffers(
        &self,
        command_pool: FluentCommandPoolHandle,
        count: u32,
    ) -> FluentResult<Vec<FluentCommandBufferHandle>> {
        unsupported(self.api_type(), "create_command_buffers")
    }

    fn free_command_buffers(
        &self,
        command_pool: FluentCommandPoolHandle,
        command_buffers: &[FluentCommandBufferHandle],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "free_command_buffers")
    }

    fn begin_command_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "begin_command_buffer")
    }

    fn end_command_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "end_command_buffer")
    }

    //
    // Shaders, layouts and pipelines
    //
    fn create_shader(
        &self,
        shader_info: &FluentShaderInfo,
    ) -> FluentResult<FluentShaderHandle> {
        unsupported(self.api_type(), "create_shader")
    }

    fn destroy_shader(
        &self,
        shader: FluentShaderHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_shader")
    }

    /// `reflection` is the merged reflection data of every stage of the shader
    fn create_descriptor_set_layout(
        &self,
        reflection: &FluentReflectionData,
    ) -> FluentResult<FluentDescriptorSetLayoutHandle> {
        unsupported(self.api_type(), "create_descriptor_set_layout")
    }

    fn destroy_descriptor_set_layout(
        &self,
        descriptor_set_layout: FluentDescriptorSetLayoutHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_descriptor_set_layout")
    }

    fn create_graphics_pipeline(
        &self,
        pipeline_info: &FluentPipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        unsupported(self.api_type(), "create_graphics_pipeline")
    }

    fn create_compute_pipeline(
        &self,
        pipeline_info: &FluentComputePipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        unsupported(self.api_type(), "create_compute_pipeline")
    }

    fn destroy_pipeline(
        &self,
        pipeline: FluentPipelineHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_pipeline")
    }

    //
    // Descriptor sets
    //
    fn create_descriptor_set(
        &self,
        descriptor_set_info: &FluentDescriptorSetInfo,
    ) -> FluentResult<FluentDescriptorSetHandle> {
        unsupported(self.api_type(), "create_descriptor_set")
    }

    fn destroy_descriptor_set(
        &self,
        descriptor_set: FluentDescriptorSetHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_descriptor_set")
    }

    fn update_descriptor_set(
        &self,
        descriptor_set: FluentDescriptorSetHandle,
        writes: &[FluentResolvedDescriptorWrite],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "update_descriptor_set")
    }

    //
    // Buffers, images and samplers
    //
    fn create_buffer(
        &self,
        buffer_info: &FluentBufferInfo,
    ) -> FluentResult<FluentBufferHandle> {
        unsupported(self.api_type(), "create_buffer")
    }

    fn destroy_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_buffer")
    }

    /// Pointer to the start of the buffer's memory. Stays valid until `unmap_buffer`.
    fn map_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<*mut u8> {
        unsupported(self.api_type(), "map_buffer")
    }

    fn unmap_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "unmap_buffer")
    }

    fn create_image(
        &self,
        image_info: &FluentImageInfo,
    ) -> FluentResult<FluentImageHandle> {
        unsupported(self.api_type(), "create_image")
    }

    fn destroy_image(
        &self,
        image: FluentImageHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_image")
    }

    fn create_sampler(
        &self,
        sampler_info: &FluentSamplerInfo,
    ) -> FluentResult<FluentSamplerHandle> {
        unsupported(self.api_type(), "create_sampler")
    }

    fn destroy_sampler(
        &self,
        sampler: FluentSamplerHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "destroy_sampler")
    }

    //
    // Commands
    //
    fn cmd_begin_render_pass(
        &self,
        command_buffer: FluentCommandBufferHandle,
        begin_info: &FluentRenderPassBeginInfo,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_begin_render_pass")
    }

    fn cmd_end_render_pass(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_end_render_pass")
    }

    fn cmd_barrier(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer_barriers: &[FluentBufferBarrier],
        image_barriers: &[FluentImageBarrier],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_barrier")
    }

    fn cmd_set_viewport(
        &self,
        command_buffer: FluentCommandBufferHandle,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_set_viewport")
    }

    fn cmd_set_scissor(
        &self,
        command_buffer: FluentCommandBufferHandle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_set_scissor")
    }

    fn cmd_bind_pipeline(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_bind_pipeline")
    }

    fn cmd_bind_vertex_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        first_binding: u32,
        buffer: &FluentBuffer,
        offset: u64,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_bind_vertex_buffer")
    }

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer: &FluentBuffer,
        offset: u64,
        index_type: FluentIndexType,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_bind_index_buffer")
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        descriptor_set: &FluentDescriptorSet,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_bind_descriptor_set")
    }

    fn cmd_push_constants(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        offset: u32,
        data: &[u8],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_push_constants")
    }

    fn cmd_draw(
        &self,
        command_buffer: FluentCommandBufferHandle,
        vertex_count: u32,
        first_vertex: u32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_draw")
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: FluentCommandBufferHandle,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_draw_indexed")
    }

    fn cmd_draw_indexed_indirect(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer: &FluentBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_draw_indexed_indirect")
    }

    fn cmd_dispatch(
        &self,
        command_buffer: FluentCommandBufferHandle,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_dispatch")
    }

    fn cmd_copy_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        src_buffer: &FluentBuffer,
        src_offset: u64,
        dst_buffer: &FluentBuffer,
        dst_offset: u64,
        size: u64,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_copy_buffer")
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        src_buffer: &FluentBuffer,
        dst_image: &FluentImage,
        copy: &FluentBufferImageCopy,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_copy_buffer_to_image")
    }

    /// `state` is the state the image is in. It is transitioned to TRANSFER_DST for the clear and
    /// back afterwards.
    fn cmd_clear_color_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        state: FluentResourceState,
        color: [f32; 4],
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_clear_color_image")
    }

    /// Fill mip levels 1.. from level 0, which must be in `state`. Every level ends in `state`.
    fn cmd_generate_mipmaps(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        state: FluentResourceState,
    ) -> FluentResult<()> {
        unsupported(self.api_type(), "cmd_generate_mipmaps")
    }
}
