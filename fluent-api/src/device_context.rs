use crate::backend::{FluentDeviceImpl, FluentResolvedDescriptorWrite};
use crate::*;
use std::sync::Arc;

/// A cloneable, thread-safe handle used to create graphics resources.
///
/// Every `create_*` call checks its preconditions (panicking on violation) and forwards to the
/// backend selected by `create_renderer_backend`. Objects are destroyed explicitly with the
/// matching `destroy_*` call. `destroy` tears down whatever is left, including cached render
/// passes and framebuffers.
#[derive(Clone)]
pub struct FluentDevice {
    inner: Arc<dyn FluentDeviceImpl>,
}

impl std::fmt::Debug for FluentDevice {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FluentDevice")
            .field("api_type", &self.inner.api_type())
            .finish()
    }
}

impl FluentDevice {
    pub(crate) fn new(inner: Arc<dyn FluentDeviceImpl>) -> Self {
        FluentDevice { inner }
    }

    pub(crate) fn inner(&self) -> &dyn FluentDeviceImpl {
        &*self.inner
    }

    pub fn api_type(&self) -> FluentApiType {
        self.inner.api_type()
    }

    /// Block until all queues of the device are idle
    pub fn wait_idle(&self) -> FluentResult<()> {
        self.inner.wait_idle()
    }

    /// Counters for the render pass and framebuffer caches owned by this device
    pub fn pass_cache_stats(&self) -> FluentPassCacheStats {
        self.inner.pass_cache_stats()
    }

    /// Get the headless implementation of this device, if it is one. Exposes CPU-side inspection
    /// of images and execution counters.
    #[cfg(feature = "fluent-headless")]
    pub fn headless_device(&self) -> Option<&crate::headless::FluentDeviceHeadless> {
        self.inner.headless_device()
    }

    /// Destroy the device and every object still alive on it. All clones of this device become
    /// unusable.
    pub fn destroy(&self) -> FluentResult<()> {
        log::info!("Destroying {} device", self.api_type().name());
        self.inner.destroy()
    }

    //
    // Queues and synchronization
    //
    pub fn create_queue(
        &self,
        queue_type: FluentQueueType,
    ) -> FluentResult<FluentQueue> {
        let handle = self.inner.create_queue(queue_type)?;
        Ok(FluentQueue::new(self.clone(), handle, queue_type))
    }

    pub fn destroy_queue(
        &self,
        queue: &FluentQueue,
    ) -> FluentResult<()> {
        self.inner.destroy_queue(queue.handle())
    }

    pub fn create_semaphore(&self) -> FluentResult<FluentSemaphore> {
        Ok(FluentSemaphore {
            handle: self.inner.create_semaphore()?,
        })
    }

    pub fn destroy_semaphore(
        &self,
        semaphore: &FluentSemaphore,
    ) -> FluentResult<()> {
        self.inner.destroy_semaphore(semaphore.handle)
    }

    pub fn create_fence(&self) -> FluentResult<FluentFence> {
        Ok(FluentFence {
            handle: self.inner.create_fence()?,
        })
    }

    pub fn destroy_fence(
        &self,
        fence: &FluentFence,
    ) -> FluentResult<()> {
        self.inner.destroy_fence(fence.handle)
    }

    /// Block until every fence is signaled. There is no timeout.
    pub fn wait_for_fences(
        &self,
        fences: &[&FluentFence],
    ) -> FluentResult<()> {
        if fences.is_empty() {
            return Ok(());
        }

        let handles: Vec<_> = fences.iter().map(|x| x.handle).collect();
        self.inner.wait_for_fences(&handles)
    }

    pub fn reset_fences(
        &self,
        fences: &[&FluentFence],
    ) -> FluentResult<()> {
        if fences.is_empty() {
            return Ok(());
        }

        let handles: Vec<_> = fences.iter().map(|x| x.handle).collect();
        self.inner.reset_fences(&handles)
    }

    pub fn fence_status(
        &self,
        fence: &FluentFence,
    ) -> FluentResult<FluentFenceStatus> {
        self.inner.fence_status(fence.handle)
    }

    //
    // Swapchain
    //
    pub fn create_swapchain(
        &self,
        swapchain_info: &FluentSwapchainInfo,
    ) -> FluentResult<FluentSwapchain> {
        swapchain_info.verify();
        let (handle, images) = self.inner.create_swapchain(swapchain_info)?;
        log::info!(
            "Created {}x{} swapchain with {} {:?} images",
            images.width,
            images.height,
            images.images.len(),
            images.format
        );
        Ok(FluentSwapchain::new(self.clone(), handle, images))
    }

    pub fn destroy_swapchain(
        &self,
        swapchain: &FluentSwapchain,
    ) -> FluentResult<()> {
        self.inner.destroy_swapchain(swapchain.handle())
    }

    //
    // Shaders, layouts and pipelines
    //

    /// Create shader modules and reflect every stage. Bindings shared between stages are merged
    /// into one binding visible to all of them.
    pub fn create_shader(
        &self,
        shader_info: &FluentShaderInfo,
    ) -> FluentResult<FluentShader> {
        shader_info.verify();

        let mut stages = FluentShaderStageFlags::empty();
        let mut stage_reflection = Vec::default();
        for (stage, bytecode) in shader_info.stages() {
            stages |= stage;
            stage_reflection.push(reflect_spirv(bytecode, stage)?);
        }

        let stage_reflection_refs: Vec<_> = stage_reflection.iter().collect();
        let reflection = FluentReflectionData::merge(&stage_reflection_refs)?;

        let handle = self.inner.create_shader(shader_info)?;
        log::trace!(
            "Created shader {:?} with stages {:?} and {} bindings",
            handle,
            stages,
            reflection.binding_count()
        );
        Ok(FluentShader {
            handle,
            stages,
            reflection: Arc::new(reflection),
        })
    }

    pub fn destroy_shader(
        &self,
        shader: &FluentShader,
    ) -> FluentResult<()> {
        self.inner.destroy_shader(shader.handle)
    }

    /// Create a layout covering every set index the shader uses
    pub fn create_descriptor_set_layout(
        &self,
        shader: &FluentShader,
    ) -> FluentResult<FluentDescriptorSetLayout> {
        let reflection = shader.reflection.clone();
        assert!(
            reflection.set_count() as usize <= MAX_SET_COUNT,
            "shader uses {} descriptor sets, max is {}",
            reflection.set_count(),
            MAX_SET_COUNT
        );
        for set in 0..reflection.set_count() {
            assert!(
                reflection.bindings_in_set(set).count() <= MAX_DESCRIPTOR_BINDING_COUNT,
                "set {} has more than {} bindings",
                set,
                MAX_DESCRIPTOR_BINDING_COUNT
            );
        }

        let handle = self.inner.create_descriptor_set_layout(&reflection)?;
        Ok(FluentDescriptorSetLayout { handle, reflection })
    }

    pub fn destroy_descriptor_set_layout(
        &self,
        descriptor_set_layout: &FluentDescriptorSetLayout,
    ) -> FluentResult<()> {
        self.inner
            .destroy_descriptor_set_layout(descriptor_set_layout.handle)
    }

    pub fn create_graphics_pipeline(
        &self,
        pipeline_info: &FluentPipelineInfo,
    ) -> FluentResult<FluentPipeline> {
        pipeline_info.verify();
        let handle = self.inner.create_graphics_pipeline(pipeline_info)?;
        Ok(FluentPipeline {
            handle,
            pipeline_type: FluentPipelineType::Graphics,
            layout: pipeline_info.descriptor_set_layout.clone(),
        })
    }

    pub fn create_compute_pipeline(
        &self,
        pipeline_info: &FluentComputePipelineInfo,
    ) -> FluentResult<FluentPipeline> {
        pipeline_info.verify();
        let handle = self.inner.create_compute_pipeline(pipeline_info)?;
        Ok(FluentPipeline {
            handle,
            pipeline_type: FluentPipelineType::Compute,
            layout: pipeline_info.descriptor_set_layout.clone(),
        })
    }

    pub fn destroy_pipeline(
        &self,
        pipeline: &FluentPipeline,
    ) -> FluentResult<()> {
        self.inner.destroy_pipeline(pipeline.handle)
    }

    //
    // Descriptor sets
    //
    pub fn create_descriptor_set(
        &self,
        descriptor_set_info: &FluentDescriptorSetInfo,
    ) -> FluentResult<FluentDescriptorSet> {
        assert!(
            (descriptor_set_info.set as usize) < MAX_SET_COUNT,
            "set index {} out of range",
            descriptor_set_info.set
        );
        let handle = self.inner.create_descriptor_set(descriptor_set_info)?;
        Ok(FluentDescriptorSet {
            handle,
            set: descriptor_set_info.set,
            layout: descriptor_set_info.descriptor_set_layout.clone(),
        })
    }

    pub fn destroy_descriptor_set(
        &self,
        descriptor_set: &FluentDescriptorSet,
    ) -> FluentResult<()> {
        self.inner.destroy_descriptor_set(descriptor_set.handle)
    }

    /// Write descriptors by binding name. Names are resolved against the reflection data of the
    /// set's layout and must belong to the set's index.
    pub fn update_descriptor_set(
        &self,
        descriptor_set: &FluentDescriptorSet,
        writes: &[FluentDescriptorWrite],
    ) -> FluentResult<()> {
        let reflection = descriptor_set.layout.reflection();

        let mut resolved_writes = Vec::with_capacity(writes.len());
        for write in writes {
            write.verify();

            let binding = reflection
                .binding_by_name(write.descriptor_name)
                .ok_or_else(|| {
                    format!(
                        "descriptor {} not found in the layout of descriptor set {:?}",
                        write.descriptor_name,
                        descriptor_set.handle()
                    )
                })?;

            if binding.set != descriptor_set.set {
                Err(format!(
                    "descriptor {} is in set {}, but the descriptor set has index {}",
                    write.descriptor_name, binding.set, descriptor_set.set
                ))?;
            }

            assert!(
                write.descriptor_count <= binding.descriptor_count,
                "descriptor {} has {} elements, {} were written",
                write.descriptor_name,
                binding.descriptor_count,
                write.descriptor_count
            );

            let kind_matches = match write.descriptors {
                FluentDescriptors::Buffers(_) => binding.descriptor_type.intersects(
                    FluentDescriptorType::UNIFORM_BUFFER
                        | FluentDescriptorType::STORAGE_BUFFER
                        | FluentDescriptorType::UNIFORM_BUFFER_DYNAMIC
                        | FluentDescriptorType::STORAGE_BUFFER_DYNAMIC
                        | FluentDescriptorType::UNIFORM_TEXEL_BUFFER
                        | FluentDescriptorType::STORAGE_TEXEL_BUFFER,
                ),
                FluentDescriptors::Images(_) => binding.descriptor_type.intersects(
                    FluentDescriptorType::SAMPLED_IMAGE
                        | FluentDescriptorType::STORAGE_IMAGE
                        | FluentDescriptorType::INPUT_ATTACHMENT,
                ),
                FluentDescriptors::Samplers(_) => binding
                    .descriptor_type
                    .contains(FluentDescriptorType::SAMPLER),
            };
            assert!(
                kind_matches,
                "descriptor {} is a {:?} binding and can't be written with {:?}",
                write.descriptor_name,
                binding.descriptor_type,
                write.descriptors
            );

            resolved_writes.push(FluentResolvedDescriptorWrite { binding, write });
        }

        self.inner
            .update_descriptor_set(descriptor_set.handle, &resolved_writes)
    }

    //
    // Buffers, images and samplers
    //
    pub fn create_buffer(
        &self,
        buffer_info: &FluentBufferInfo,
    ) -> FluentResult<FluentBuffer> {
        buffer_info.verify();
        let handle = self.inner.create_buffer(buffer_info)?;
        Ok(FluentBuffer {
            handle,
            info: *buffer_info,
        })
    }

    pub fn destroy_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<()> {
        self.inner.destroy_buffer(buffer.handle)
    }

    /// Map a host-visible buffer. The pointer is valid until `unmap_buffer`.
    pub fn map_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<*mut u8> {
        if !buffer.info.memory_usage.is_host_visible() {
            Err(format!(
                "buffer {:?} uses {:?} memory and can't be mapped",
                buffer.handle, buffer.info.memory_usage
            ))?;
        }

        self.inner.map_buffer(buffer.handle)
    }

    pub fn unmap_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<()> {
        self.inner.unmap_buffer(buffer.handle)
    }

    pub fn copy_to_host_visible_buffer<T: Copy>(
        &self,
        buffer: &FluentBuffer,
        data: &[T],
    ) -> FluentResult<()> {
        self.copy_to_host_visible_buffer_with_offset(buffer, data, 0)
    }

    pub fn copy_to_host_visible_buffer_with_offset<T: Copy>(
        &self,
        buffer: &FluentBuffer,
        data: &[T],
        buffer_byte_offset: u64,
    ) -> FluentResult<()> {
        let data_size_in_bytes = std::mem::size_of_val(data) as u64;
        assert!(
            buffer_byte_offset + data_size_in_bytes <= buffer.size(),
            "{} bytes at offset {} do not fit in a buffer of {} bytes",
            data_size_in_bytes,
            buffer_byte_offset,
            buffer.size()
        );

        let src = data.as_ptr() as *const u8;
        let dst = self.map_buffer(buffer)?;
        unsafe {
            let dst = dst.add(buffer_byte_offset as usize);
            std::ptr::copy_nonoverlapping(src, dst, data_size_in_bytes as usize);
        }

        self.unmap_buffer(buffer)
    }

    /// Copy the contents of a host-visible buffer out. Used to read back results.
    pub fn read_host_visible_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<Vec<u8>> {
        let size = buffer.size() as usize;
        let mut data = vec![0; size];
        let src = self.map_buffer(buffer)?;
        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, data.as_mut_ptr(), size);
        }

        self.unmap_buffer(buffer)?;
        Ok(data)
    }

    pub fn create_image(
        &self,
        image_info: &FluentImageInfo,
    ) -> FluentResult<FluentImage> {
        image_info.verify();
        let handle = self.inner.create_image(image_info)?;
        Ok(FluentImage {
            handle,
            info: *image_info,
            owned_by_swapchain: false,
        })
    }

    pub fn destroy_image(
        &self,
        image: &FluentImage,
    ) -> FluentResult<()> {
        assert!(
            !image.owned_by_swapchain,
            "swapchain images are destroyed with their swapchain"
        );
        self.inner.destroy_image(image.handle)
    }

    pub fn create_sampler(
        &self,
        sampler_info: &FluentSamplerInfo,
    ) -> FluentResult<FluentSampler> {
        let handle = self.inner.create_sampler(sampler_info)?;
        Ok(FluentSampler {
            handle,
            info: *sampler_info,
        })
    }

    pub fn destroy_sampler(
        &self,
        sampler: &FluentSampler,
    ) -> FluentResult<()> {
        self.inner.destroy_sampler(sampler.handle)
    }
}
