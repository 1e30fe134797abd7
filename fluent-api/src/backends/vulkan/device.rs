use super::internal::conversions::{
    blend_attachments_to_create_info, buffer_usage_flags, clear_value_to_vk,
    depth_state_to_create_info, descriptor_type_to_vk, image_format_to_aspect_mask,
    image_usage_flags, rasterizer_state_to_create_info, resource_state_to_image_layout,
};
use super::internal::instance::VkInstance;
use super::internal::physical_device::{
    choose_physical_device, create_logical_device, PhysicalDeviceInfo,
};
use super::internal::render_pass::{create_framebuffer, create_render_pass};
use super::internal::swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, create_surface,
    query_swapchain_support,
};
use crate::backend::{FluentDeviceImpl, FluentResolvedDescriptorWrite, FluentSwapchainImages};
use crate::backends::descriptor_pool::{DescriptorPool, DescriptorSetCost};
use crate::backends::slab_lookup::{lookup, lookup_mut, take};
use crate::*;
use ash::extensions::khr;
use ash::version::DeviceV1_0;
use ash::vk;
use fluent_base::slab::GenSlab;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SHADER_ENTRY_POINT: &str = "main";

// Five u32s per indexed indirect command
const DRAW_INDEXED_INDIRECT_COMMAND_SIZE: u64 = 20;

struct VulkanQueue {
    queue_type: FluentQueueType,
    family_index: u32,
    queue: vk::Queue,
}

struct VulkanSemaphore {
    semaphore: vk::Semaphore,
}

struct VulkanFence {
    fence: vk::Fence,
    // Waiting on a fence nothing will signal would block forever
    submitted: bool,
}

struct VulkanSwapchain {
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<FluentImageHandle>,
    format: FluentFormat,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    min_image_count: u32,
    extent: vk::Extent2D,
    wsi: Arc<dyn FluentWsi>,
}

struct VulkanCommandPool {
    command_pool: vk::CommandPool,
    queue_type: FluentQueueType,
    command_buffers: Vec<FluentCommandBufferHandle>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RecordingState {
    Initial,
    Recording,
    Executable,
}

struct VulkanCommandBuffer {
    command_buffer: vk::CommandBuffer,
    command_pool: FluentCommandPoolHandle,
    queue_type: FluentQueueType,
    recording_state: RecordingState,
    in_render_pass: bool,
    bound_pipeline: Option<FluentPipelineType>,
}

struct VulkanShader {
    modules: Vec<(FluentShaderStageFlags, vk::ShaderModule)>,
}

struct VulkanDescriptorSetLayout {
    // Indexed by set
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    reflection: FluentReflectionData,
}

struct VulkanPipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    pipeline_type: FluentPipelineType,
}

struct VulkanDescriptorSet {
    descriptor_set: vk::DescriptorSet,
    set: u32,
    cost: DescriptorSetCost,
    bindings: Vec<FluentBinding>,
}

struct VulkanBuffer {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: u64,
    mapped: bool,
}

struct VulkanImage {
    image: vk::Image,
    /// Covers every aspect, level and layer
    view: vk::ImageView,
    /// Depth-only view of a depth-stencil image, shaders can only read one aspect
    shader_view: Option<vk::ImageView>,
    /// One view per mip level, only for images with more than one level
    mip_views: Vec<vk::ImageView>,
    /// None for swapchain images, which the swapchain owns
    allocation: Option<vk_mem::Allocation>,
    info: FluentImageInfo,
    aspect_mask: vk::ImageAspectFlags,
}

impl VulkanImage {
    fn attachment_view(&self) -> vk::ImageView {
        self.mip_views.first().copied().unwrap_or(self.view)
    }

    fn descriptor_view(
        &self,
        mip_level: Option<u32>,
    ) -> FluentResult<vk::ImageView> {
        match mip_level {
            Some(mip_level) if self.info.mip_levels > 1 => {
                self.mip_views.get(mip_level as usize).copied().ok_or_else(|| {
                    format!(
                        "image has {} mip levels, can't bind mip level {}",
                        self.info.mip_levels, mip_level
                    )
                    .into()
                })
            }
            Some(mip_level) if mip_level > 0 => Err(format!(
                "image has one mip level, can't bind mip level {}",
                mip_level
            )
            .into()),
            _ => Ok(self.shader_view.unwrap_or(self.view)),
        }
    }

    fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        }
    }

    fn mip_subresource_range(
        &self,
        mip_level: u32,
    ) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: self.info.layer_count,
        }
    }

    fn mip_extent(
        &self,
        mip_level: u32,
    ) -> (u32, u32, u32) {
        (
            (self.info.width >> mip_level).max(1),
            (self.info.height >> mip_level).max(1),
            (self.info.depth >> mip_level).max(1),
        )
    }
}

struct VulkanSampler {
    sampler: vk::Sampler,
}

struct VulkanDeviceState {
    queues: GenSlab<VulkanQueue>,
    semaphores: GenSlab<VulkanSemaphore>,
    fences: GenSlab<VulkanFence>,
    swapchains: GenSlab<VulkanSwapchain>,
    command_pools: GenSlab<VulkanCommandPool>,
    command_buffers: GenSlab<VulkanCommandBuffer>,
    shaders: GenSlab<VulkanShader>,
    descriptor_set_layouts: GenSlab<VulkanDescriptorSetLayout>,
    pipelines: GenSlab<VulkanPipeline>,
    descriptor_sets: GenSlab<VulkanDescriptorSet>,
    buffers: GenSlab<VulkanBuffer>,
    images: GenSlab<VulkanImage>,
    samplers: GenSlab<VulkanSampler>,

    descriptor_pool: DescriptorPool,
    pass_cache: FluentPassCache<vk::RenderPass, vk::Framebuffer>,
}

impl VulkanDeviceState {
    fn recording_command_buffer(
        &mut self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<&mut VulkanCommandBuffer> {
        let command_buffer = lookup_mut(
            &mut self.command_buffers,
            command_buffer.key(),
            "command buffer",
        )?;
        if command_buffer.recording_state != RecordingState::Recording {
            Err("commands can only be recorded between begin and end")?;
        }

        Ok(command_buffer)
    }

    // For transfers, barriers and dispatches
    fn command_buffer_outside_render_pass(
        &mut self,
        command_buffer: FluentCommandBufferHandle,
        operation: &str,
    ) -> FluentResult<&mut VulkanCommandBuffer> {
        let command_buffer = self.recording_command_buffer(command_buffer)?;
        if command_buffer.in_render_pass {
            Err(format!("{} can't be recorded inside a render pass", operation))?;
        }

        Ok(command_buffer)
    }

    fn draw_command_buffer(
        &mut self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<vk::CommandBuffer> {
        let command_buffer = self.recording_command_buffer(command_buffer)?;
        if !command_buffer.in_render_pass {
            Err("draws must be recorded inside a render pass")?;
        }

        if command_buffer.bound_pipeline != Some(FluentPipelineType::Graphics) {
            Err("draws require a bound graphics pipeline")?;
        }

        Ok(command_buffer.command_buffer)
    }

    fn buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<vk::Buffer> {
        Ok(lookup(&self.buffers, buffer.handle().key(), "buffer")?.buffer)
    }

    fn image(
        &self,
        image: &FluentImage,
    ) -> FluentResult<&VulkanImage> {
        lookup(&self.images, image.handle().key(), "image")
    }

    fn queue_family(
        &self,
        queue: Option<&FluentQueue>,
    ) -> FluentResult<u32> {
        match queue {
            Some(queue) => Ok(lookup(&self.queues, queue.handle().key(), "queue")?.family_index),
            None => Ok(vk::QUEUE_FAMILY_IGNORED),
        }
    }

    // Ownership only moves between distinct families
    fn queue_families(
        &self,
        src_queue: Option<&FluentQueue>,
        dst_queue: Option<&FluentQueue>,
    ) -> FluentResult<(u32, u32)> {
        let src_family = self.queue_family(src_queue)?;
        let dst_family = self.queue_family(dst_queue)?;
        if src_family == dst_family
            || src_family == vk::QUEUE_FAMILY_IGNORED
            || dst_family == vk::QUEUE_FAMILY_IGNORED
        {
            Ok((vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED))
        } else {
            Ok((src_family, dst_family))
        }
    }
}

/// A vulkan device with one queue per queue family it picked.
///
/// Object bookkeeping and command recording happen under one state mutex. Queue operations take a
/// separate lock, so a long wait on one queue does not block recording on other threads.
pub struct FluentDeviceVulkan {
    device_info: FluentDeviceInfo,
    physical_device: vk::PhysicalDevice,
    physical_device_info: PhysicalDeviceInfo,
    device: ash::Device,
    allocator: vk_mem::Allocator,
    surface_loader: khr::Surface,
    swapchain_loader: khr::Swapchain,
    descriptor_pool: vk::DescriptorPool,
    wsi: Option<Arc<dyn FluentWsi>>,
    queue_lock: Mutex<()>,
    state: Mutex<VulkanDeviceState>,
    destroyed: AtomicBool,
    // Must outlive the device, so it is dropped last
    instance: Arc<VkInstance>,
}

fn create_descriptor_pool(
    device: &ash::Device,
    device_info: &FluentDeviceInfo,
) -> FluentResult<vk::DescriptorPool> {
    let pool_sizes: Vec<_> = DESCRIPTOR_POOL_TYPES
        .iter()
        .filter_map(|x| descriptor_type_to_vk(*x))
        .map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: device_info.descriptors_per_type,
        })
        .collect();

    let create_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(device_info.max_descriptor_sets)
        .pool_sizes(&pool_sizes);

    let descriptor_pool = unsafe { device.create_descriptor_pool(&*create_info, None)? };
    Ok(descriptor_pool)
}

fn image_view_type(info: &FluentImageInfo) -> vk::ImageViewType {
    if info.depth > 1 {
        vk::ImageViewType::TYPE_3D
    } else if info.layer_count > 1 {
        vk::ImageViewType::TYPE_2D_ARRAY
    } else {
        vk::ImageViewType::TYPE_2D
    }
}

impl FluentDeviceVulkan {
    pub fn new(
        instance: Arc<VkInstance>,
        wsi: Option<Arc<dyn FluentWsi>>,
        device_info: &FluentDeviceInfo,
    ) -> FluentResult<Self> {
        let (physical_device, physical_device_info) = choose_physical_device(&instance.instance)?;
        let device =
            create_logical_device(&instance.instance, physical_device, &physical_device_info)?;

        let allocator_create_info = vk_mem::AllocatorCreateInfo {
            physical_device,
            device: device.clone(),
            instance: instance.instance.clone(),
            flags: vk_mem::AllocatorCreateFlags::default(),
            preferred_large_heap_block_size: Default::default(),
            frame_in_use_count: 0,
            heap_size_limits: Default::default(),
        };

        let mut allocator = match vk_mem::Allocator::new(&allocator_create_info) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.destroy_device(None);
                }
                return Err(e.into());
            }
        };

        let descriptor_pool = match create_descriptor_pool(&device, device_info) {
            Ok(descriptor_pool) => descriptor_pool,
            Err(e) => {
                allocator.destroy();
                unsafe {
                    device.destroy_device(None);
                }
                return Err(e);
            }
        };

        let surface_loader = khr::Surface::new(&instance.entry, &instance.instance);
        let swapchain_loader = khr::Swapchain::new(&instance.instance, &device);

        let state = VulkanDeviceState {
            queues: Default::default(),
            semaphores: Default::default(),
            fences: Default::default(),
            swapchains: Default::default(),
            command_pools: Default::default(),
            command_buffers: Default::default(),
            shaders: Default::default(),
            descriptor_set_layouts: Default::default(),
            pipelines: Default::default(),
            descriptor_sets: Default::default(),
            buffers: Default::default(),
            images: Default::default(),
            samplers: Default::default(),
            descriptor_pool: DescriptorPool::new(device_info),
            pass_cache: FluentPassCache::new(),
        };

        Ok(FluentDeviceVulkan {
            device_info: *device_info,
            physical_device,
            physical_device_info,
            device,
            allocator,
            surface_loader,
            swapchain_loader,
            descriptor_pool,
            wsi,
            queue_lock: Mutex::new(()),
            state: Mutex::new(state),
            destroyed: AtomicBool::new(false),
            instance,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn physical_device_name(&self) -> &str {
        &self.physical_device_info.device_name
    }

    pub fn device_info(&self) -> &FluentDeviceInfo {
        &self.device_info
    }

    fn state(&self) -> MutexGuard<VulkanDeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue_lock(&self) -> MutexGuard<()> {
        self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        info: &FluentImageInfo,
        aspect_mask: vk::ImageAspectFlags,
        base_mip_level: u32,
        level_count: u32,
    ) -> FluentResult<vk::ImageView> {
        let subresource_range = vk::ImageSubresourceRange::builder()
            .aspect_mask(aspect_mask)
            .base_mip_level(base_mip_level)
            .level_count(level_count)
            .base_array_layer(0)
            .layer_count(info.layer_count);

        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(image_view_type(info))
            .format(info.format.into())
            .components(vk::ComponentMapping::default())
            .subresource_range(*subresource_range);

        let view = unsafe { self.device.create_image_view(&*create_info, None)? };
        Ok(view)
    }

    /// Views for every way the image may be used. Destroys what it created if any view fails.
    fn create_image_views(
        &self,
        image: vk::Image,
        info: &FluentImageInfo,
        allocation: Option<vk_mem::Allocation>,
    ) -> FluentResult<VulkanImage> {
        let aspect_mask = image_format_to_aspect_mask(info.format);
        let mut vulkan_image = VulkanImage {
            image,
            view: vk::ImageView::null(),
            shader_view: None,
            mip_views: Vec::default(),
            allocation,
            info: *info,
            aspect_mask,
        };

        let result = (|| -> FluentResult<()> {
            vulkan_image.view =
                self.create_image_view(image, info, aspect_mask, 0, info.mip_levels)?;

            if aspect_mask.contains(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL) {
                vulkan_image.shader_view = Some(self.create_image_view(
                    image,
                    info,
                    vk::ImageAspectFlags::DEPTH,
                    0,
                    info.mip_levels,
                )?);
            }

            if info.mip_levels > 1 {
                for mip_level in 0..info.mip_levels {
                    let view = self.create_image_view(image, info, aspect_mask, mip_level, 1)?;
                    vulkan_image.mip_views.push(view);
                }
            }

            Ok(())
        })();

        match result {
            Ok(()) => Ok(vulkan_image),
            Err(e) => {
                vulkan_image.allocation = None;
                self.destroy_image_views(&vulkan_image);
                Err(e)
            }
        }
    }

    fn destroy_image_views(
        &self,
        image: &VulkanImage,
    ) {
        unsafe {
            if image.view != vk::ImageView::null() {
                self.device.destroy_image_view(image.view, None);
            }

            if let Some(shader_view) = image.shader_view {
                self.device.destroy_image_view(shader_view, None);
            }

            for mip_view in &image.mip_views {
                self.device.destroy_image_view(*mip_view, None);
            }
        }
    }

    fn destroy_vulkan_image(
        &self,
        image: VulkanImage,
    ) -> FluentResult<()> {
        self.destroy_image_views(&image);
        if let Some(allocation) = &image.allocation {
            self.allocator.destroy_image(image.image, allocation)?;
        }

        Ok(())
    }

    fn destroy_framebuffers(
        &self,
        framebuffers: Vec<vk::Framebuffer>,
    ) {
        for framebuffer in framebuffers {
            unsafe {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    /// Create (or recreate, when `old_swapchain` is given) the native swapchain and views for its
    /// images. The old swapchain is retired but not destroyed.
    fn build_swapchain(
        &self,
        state: &mut VulkanDeviceState,
        surface: vk::SurfaceKHR,
        preferred_format: FluentFormat,
        vsync: bool,
        min_image_count: u32,
        width: u32,
        height: u32,
        wsi: &Arc<dyn FluentWsi>,
        old_swapchain: vk::SwapchainKHR,
    ) -> FluentResult<(
        vk::SwapchainKHR,
        FluentSwapchainImages,
        Vec<FluentImageHandle>,
        vk::SurfaceFormatKHR,
        vk::PresentModeKHR,
        vk::Extent2D,
    )> {
        let support = query_swapchain_support(&self.surface_loader, self.physical_device, surface)?;
        let (format, surface_format) = choose_surface_format(&support.formats, preferred_format)?;
        let present_mode = choose_present_mode(&support.present_modes, vsync);

        let (width, height) = match wsi.framebuffer_size() {
            size if size.width > 0 && size.height > 0 => (size.width, size.height),
            _ => (width, height),
        };
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = choose_image_count(&support.capabilities, min_image_count);

        log::debug!(
            "Swapchain: {:?} {}x{} with {} images, present mode {:?}",
            format,
            extent.width,
            extent.height,
            image_count,
            present_mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            )
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&*create_info, None)? };
        let vk_images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(vk_images) => vk_images,
            Err(e) => {
                unsafe {
                    self.swapchain_loader.destroy_swapchain(swapchain, None);
                }
                return Err(e.into());
            }
        };

        let info = FluentImageInfo {
            width: extent.width,
            height: extent.height,
            format,
            descriptor_type: FluentDescriptorType::COLOR_ATTACHMENT,
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(vk_images.len());
        let mut images = Vec::with_capacity(vk_images.len());
        for vk_image in vk_images {
            let vulkan_image = match self.create_image_views(vk_image, &info, None) {
                Ok(vulkan_image) => vulkan_image,
                Err(e) => {
                    for handle in &handles {
                        if let Some(image) = state.images.remove(handle.key()) {
                            self.destroy_image_views(&image);
                        }
                    }
                    unsafe {
                        self.swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(e);
                }
            };

            let handle = FluentImageHandle::new(state.images.insert(vulkan_image));
            handles.push(handle);
            images.push(FluentImage {
                handle,
                info,
                owned_by_swapchain: true,
            });
        }

        Ok((
            swapchain,
            FluentSwapchainImages {
                width: extent.width,
                height: extent.height,
                format,
                images,
            },
            handles,
            surface_format,
            present_mode,
            extent,
        ))
    }

    fn destroy_swapchain_images(
        &self,
        state: &mut VulkanDeviceState,
        images: &[FluentImageHandle],
    ) {
        for image in images {
            let framebuffers = state.pass_cache.remove_framebuffers_referencing(*image);
            self.destroy_framebuffers(framebuffers);
            if let Some(image) = state.images.remove(image.key()) {
                self.destroy_image_views(&image);
            }
        }
    }

    fn record_image_barriers(
        &self,
        command_buffer: vk::CommandBuffer,
        queue_type: FluentQueueType,
        image_barriers: &[(vk::ImageMemoryBarrier, FluentResourceState, FluentResourceState)],
    ) {
        let (src_scope, dst_scope) = determine_barrier_scopes(
            image_barriers.iter().map(|(_, old, new)| (*old, *new)),
            queue_type,
        );
        let barriers: Vec<_> = image_barriers.iter().map(|(x, _, _)| *x).collect();
        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                src_scope.stages.into(),
                dst_scope.stages.into(),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
        }
    }
}

fn image_barrier(
    image: &VulkanImage,
    subresource_range: vk::ImageSubresourceRange,
    old_state: FluentResourceState,
    new_state: FluentResourceState,
    old_layout: vk::ImageLayout,
) -> (vk::ImageMemoryBarrier, FluentResourceState, FluentResourceState) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .src_access_mask(determine_access_flags(old_state).into())
        .dst_access_mask(determine_access_flags(new_state).into())
        .old_layout(old_layout)
        .new_layout(resource_state_to_image_layout(new_state))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image.image)
        .subresource_range(subresource_range)
        .build();

    (barrier, old_state, new_state)
}

impl Drop for FluentDeviceVulkan {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("Error destroying vulkan device: {}", e);
        }

        unsafe {
            log::trace!("destroying device");
            self.allocator.destroy();
            self.device.destroy_device(None);
            log::trace!("destroyed device");
        }
    }
}

impl FluentDeviceImpl for FluentDeviceVulkan {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::Vulkan
    }

    fn wait_idle(&self) -> FluentResult<()> {
        let _queue_lock = self.queue_lock();
        unsafe {
            self.device.device_wait_idle()?;
        }

        Ok(())
    }

    fn destroy(&self) -> FluentResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.wait_idle()?;

        let mut state = self.state();
        let state = &mut *state;

        let (render_passes, framebuffers) = state.pass_cache.drain();
        log::debug!(
            "Destroying {} cached render passes and {} cached framebuffers",
            render_passes.len(),
            framebuffers.len()
        );
        self.destroy_framebuffers(framebuffers);

        unsafe {
            for render_pass in render_passes {
                self.device.destroy_render_pass(render_pass, None);
            }

            // Freed along with the pool
            state.descriptor_sets.drain();

            for pipeline in state.pipelines.drain() {
                self.device.destroy_pipeline(pipeline.pipeline, None);
            }

            for layout in state.descriptor_set_layouts.drain() {
                self.device
                    .destroy_pipeline_layout(layout.pipeline_layout, None);
                for set_layout in layout.set_layouts {
                    self.device.destroy_descriptor_set_layout(set_layout, None);
                }
            }

            for shader in state.shaders.drain() {
                for (_, module) in shader.modules {
                    self.device.destroy_shader_module(module, None);
                }
            }

            for sampler in state.samplers.drain() {
                self.device.destroy_sampler(sampler.sampler, None);
            }
        }

        let mut leaked_images = 0;
        for image in state.images.drain() {
            if image.allocation.is_some() {
                leaked_images += 1;
            }
            self.destroy_vulkan_image(image)?;
        }

        let mut leaked_buffers = 0;
        for buffer in state.buffers.drain() {
            leaked_buffers += 1;
            if buffer.mapped {
                self.allocator.unmap_memory(&buffer.allocation)?;
            }
            self.allocator
                .destroy_buffer(buffer.buffer, &buffer.allocation)?;
        }

        if leaked_buffers > 0 || leaked_images > 0 {
            log::warn!(
                "Vulkan device destroyed with {} buffers and {} images still alive",
                leaked_buffers,
                leaked_images
            );
        }

        unsafe {
            for swapchain in state.swapchains.drain() {
                self.swapchain_loader
                    .destroy_swapchain(swapchain.swapchain, None);
                self.surface_loader.destroy_surface(swapchain.surface, None);
            }

            // Command buffers are freed with their pool
            state.command_buffers.drain();
            for command_pool in state.command_pools.drain() {
                self.device
                    .destroy_command_pool(command_pool.command_pool, None);
            }

            for fence in state.fences.drain() {
                self.device.destroy_fence(fence.fence, None);
            }

            for semaphore in state.semaphores.drain() {
                self.device.destroy_semaphore(semaphore.semaphore, None);
            }

            state.queues.drain();

            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }

        Ok(())
    }

    fn pass_cache_stats(&self) -> FluentPassCacheStats {
        self.state().pass_cache.stats()
    }

    //
    // Queues
    //
    fn create_queue(
        &self,
        queue_type: FluentQueueType,
    ) -> FluentResult<FluentQueueHandle> {
        let family_index = self
            .physical_device_info
            .queue_family_indices
            .family_index(queue_type);
        let queue = unsafe { self.device.get_device_queue(family_index, 0) };
        log::trace!(
            "Created {:?} queue on family {}",
            queue_type,
            family_index
        );

        let key = self.state().queues.insert(VulkanQueue {
            queue_type,
            family_index,
            queue,
        });
        Ok(FluentQueueHandle::new(key))
    }

    fn destroy_queue(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<()> {
        take(&mut self.state().queues, queue.key(), "queue").map(|_| ())
    }

    fn queue_wait_idle(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<()> {
        let queue = lookup(&self.state().queues, queue.key(), "queue")?.queue;
        let _queue_lock = self.queue_lock();
        unsafe {
            self.device.queue_wait_idle(queue)?;
        }

        Ok(())
    }

    fn queue_submit(
        &self,
        queue: FluentQueueHandle,
        submit_info: &FluentQueueSubmitInfo,
    ) -> FluentResult<()> {
        profiling::scope!("FluentDeviceVulkan::queue_submit");
        let (queue, command_buffers, wait_semaphores, signal_semaphores, fence) = {
            let mut state = self.state();
            let queue = lookup(&state.queues, queue.key(), "queue")?;
            let (queue_type, vk_queue) = (queue.queue_type, queue.queue);

            let mut command_buffers = Vec::with_capacity(submit_info.command_buffers.len());
            for command_buffer in &submit_info.command_buffers {
                let command_buffer = lookup(
                    &state.command_buffers,
                    command_buffer.handle().key(),
                    "command buffer",
                )?;
                if command_buffer.recording_state != RecordingState::Executable {
                    Err("command buffers must be ended before they are submitted")?;
                }

                if command_buffer.queue_type != queue_type {
                    Err(format!(
                        "command buffer was allocated for a {:?} queue, but submitted to a {:?} queue",
                        command_buffer.queue_type, queue_type
                    ))?;
                }

                command_buffers.push(command_buffer.command_buffer);
            }

            let mut wait_semaphores = Vec::with_capacity(submit_info.wait_semaphores.len());
            for semaphore in &submit_info.wait_semaphores {
                wait_semaphores.push(
                    lookup(&state.semaphores, semaphore.handle().key(), "semaphore")?.semaphore,
                );
            }

            let mut signal_semaphores = Vec::with_capacity(submit_info.signal_semaphores.len());
            for semaphore in &submit_info.signal_semaphores {
                signal_semaphores.push(
                    lookup(&state.semaphores, semaphore.handle().key(), "semaphore")?.semaphore,
                );
            }

            let fence = match submit_info.signal_fence {
                Some(fence) => {
                    let fence = lookup_mut(&mut state.fences, fence.handle().key(), "fence")?;
                    fence.submitted = true;
                    fence.fence
                }
                None => vk::Fence::null(),
            };

            (
                vk_queue,
                command_buffers,
                wait_semaphores,
                signal_semaphores,
                fence,
            )
        };

        let wait_dst_stage_mask = vec![vk::PipelineStageFlags::ALL_COMMANDS; wait_semaphores.len()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_dst_stage_mask)
            .signal_semaphores(&signal_semaphores)
            .command_buffers(&command_buffers);

        let _queue_lock = self.queue_lock();
        unsafe {
            self.device.queue_submit(queue, &[*submit_info], fence)?;
        }

        Ok(())
    }

    fn queue_present(
        &self,
        queue: FluentQueueHandle,
        present_info: &FluentQueuePresentInfo,
    ) -> FluentResult<FluentPresentResult> {
        let (queue, swapchain, wait_semaphores) = {
            let state = self.state();
            let queue = lookup(&state.queues, queue.key(), "queue")?.queue;
            let swapchain = lookup(
                &state.swapchains,
                present_info.swapchain.handle().key(),
                "swapchain",
            )?;
            if present_info.image_index as usize >= swapchain.images.len() {
                Err("image index out of range")?;
            }

            let mut wait_semaphores = Vec::with_capacity(present_info.wait_semaphores.len());
            for semaphore in &present_info.wait_semaphores {
                wait_semaphores.push(
                    lookup(&state.semaphores, semaphore.handle().key(), "semaphore")?.semaphore,
                );
            }

            (queue, swapchain.swapchain, wait_semaphores)
        };

        let swapchains = [swapchain];
        let image_indices = [present_info.image_index];
        let vk_present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _queue_lock = self.queue_lock();
        let result = unsafe {
            self.swapchain_loader
                .queue_present(queue, &vk_present_info)
        };

        match result {
            Ok(false) => Ok(FluentPresentResult::Success),
            Ok(true) => Ok(FluentPresentResult::SuboptimalOrOutOfDate),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Ok(FluentPresentResult::SuboptimalOrOutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    //
    // Synchronization
    //
    fn create_semaphore(&self) -> FluentResult<FluentSemaphoreHandle> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { self.device.create_semaphore(&*create_info, None)? };
        let key = self
            .state()
            .semaphores
            .insert(VulkanSemaphore { semaphore });
        Ok(FluentSemaphoreHandle::new(key))
    }

    fn destroy_semaphore(
        &self,
        semaphore: FluentSemaphoreHandle,
    ) -> FluentResult<()> {
        let semaphore = take(&mut self.state().semaphores, semaphore.key(), "semaphore")?;
        unsafe {
            self.device.destroy_semaphore(semaphore.semaphore, None);
        }

        Ok(())
    }

    fn create_fence(&self) -> FluentResult<FluentFenceHandle> {
        let create_info = vk::FenceCreateInfo::builder();
        let fence = unsafe { self.device.create_fence(&*create_info, None)? };
        let key = self.state().fences.insert(VulkanFence {
            fence,
            submitted: false,
        });
        Ok(FluentFenceHandle::new(key))
    }

    fn destroy_fence(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<()> {
        let fence = take(&mut self.state().fences, fence.key(), "fence")?;
        unsafe {
            self.device.destroy_fence(fence.fence, None);
        }

        Ok(())
    }

    fn wait_for_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        let vk_fences = {
            let state = self.state();
            let mut vk_fences = Vec::with_capacity(fences.len());
            for fence in fences {
                let fence = lookup(&state.fences, fence.key(), "fence")?;
                if !fence.submitted {
                    Err("waiting on a fence that was never submitted")?;
                }

                vk_fences.push(fence.fence);
            }

            vk_fences
        };

        if !vk_fences.is_empty() {
            unsafe {
                self.device.wait_for_fences(&vk_fences, true, std::u64::MAX)?;
            }
        }

        Ok(())
    }

    fn reset_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        let mut state = self.state();
        let mut vk_fences = Vec::with_capacity(fences.len());
        for fence in fences {
            vk_fences.push(lookup(&state.fences, fence.key(), "fence")?.fence);
        }

        if !vk_fences.is_empty() {
            unsafe {
                self.device.reset_fences(&vk_fences)?;
            }
        }

        for fence in fences {
            lookup_mut(&mut state.fences, fence.key(), "fence")?.submitted = false;
        }

        Ok(())
    }

    fn fence_status(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<FluentFenceStatus> {
        let state = self.state();
        let fence = lookup(&state.fences, fence.key(), "fence")?;
        if !fence.submitted {
            return Ok(FluentFenceStatus::Incomplete);
        }

        let signaled = unsafe { self.device.get_fence_status(fence.fence)? };
        if signaled {
            Ok(FluentFenceStatus::Complete)
        } else {
            Ok(FluentFenceStatus::Incomplete)
        }
    }

    //
    // Swapchains
    //
    fn create_swapchain(
        &self,
        swapchain_info: &FluentSwapchainInfo,
    ) -> FluentResult<(FluentSwapchainHandle, FluentSwapchainImages)> {
        let wsi = swapchain_info
            .wsi
            .clone()
            .or_else(|| self.wsi.clone())
            .ok_or("vulkan swapchains need a window, none was given to the backend or swapchain")?;

        let mut state = self.state();
        let state = &mut *state;
        let family_index = lookup(
            &state.queues,
            swapchain_info.queue.handle().key(),
            "queue",
        )?
        .family_index;

        let surface = create_surface(
            &self.instance.entry,
            &self.instance.instance,
            wsi.raw_window_handle(),
        )?;

        let present_supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device,
                family_index,
                surface,
            )
        };
        if present_supported != Ok(true) {
            unsafe {
                self.surface_loader.destroy_surface(surface, None);
            }
            Err(format!(
                "queue family {} can't present to this surface",
                family_index
            ))?;
        }

        let built = self.build_swapchain(
            state,
            surface,
            swapchain_info.format,
            swapchain_info.vsync,
            swapchain_info.min_image_count,
            swapchain_info.width,
            swapchain_info.height,
            &wsi,
            vk::SwapchainKHR::null(),
        );
        let (swapchain, images, handles, surface_format, present_mode, extent) = match built {
            Ok(built) => built,
            Err(e) => {
                unsafe {
                    self.surface_loader.destroy_surface(surface, None);
                }
                return Err(e);
            }
        };

        let key = state.swapchains.insert(VulkanSwapchain {
            surface,
            swapchain,
            images: handles,
            format: images.format,
            surface_format,
            present_mode,
            min_image_count: swapchain_info.min_image_count,
            extent,
            wsi,
        });

        Ok((FluentSwapchainHandle::new(key), images))
    }

    fn resize_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
        width: u32,
        height: u32,
    ) -> FluentResult<FluentSwapchainImages> {
        // Old images may still be in flight
        self.wait_idle()?;

        let mut state = self.state();
        let state = &mut *state;
        let (surface, old_swapchain, old_images, format, present_mode, min_image_count, wsi) = {
            let swapchain = lookup(&state.swapchains, swapchain.key(), "swapchain")?;
            (
                swapchain.surface,
                swapchain.swapchain,
                swapchain.images.clone(),
                swapchain.format,
                swapchain.present_mode,
                swapchain.min_image_count,
                swapchain.wsi.clone(),
            )
        };

        let vsync = present_mode == vk::PresentModeKHR::FIFO;
        let (new_swapchain, images, handles, surface_format, present_mode, extent) = self
            .build_swapchain(
                state,
                surface,
                format,
                vsync,
                min_image_count,
                width,
                height,
                &wsi,
                old_swapchain,
            )?;

        self.destroy_swapchain_images(state, &old_images);
        // Framebuffers of other attachments may have the old extent baked in as well
        let framebuffers = state.pass_cache.clear_framebuffers();
        self.destroy_framebuffers(framebuffers);

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        let swapchain = lookup_mut(&mut state.swapchains, swapchain.key(), "swapchain")?;
        swapchain.swapchain = new_swapchain;
        swapchain.images = handles;
        swapchain.format = images.format;
        swapchain.surface_format = surface_format;
        swapchain.present_mode = present_mode;
        swapchain.extent = extent;
        Ok(images)
    }

    fn destroy_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let state = &mut *state;
        let swapchain = take(&mut state.swapchains, swapchain.key(), "swapchain")?;
        self.destroy_swapchain_images(state, &swapchain.images);
        log::trace!(
            "Destroying {}x{} swapchain ({:?})",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.surface_format.format
        );

        unsafe {
            self.swapchain_loader
                .destroy_swapchain(swapchain.swapchain, None);
            self.surface_loader.destroy_surface(swapchain.surface, None);
        }

        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: FluentSwapchainHandle,
        semaphore: Option<FluentSemaphoreHandle>,
        fence: Option<FluentFenceHandle>,
    ) -> FluentResult<u32> {
        let (swapchain, semaphore, fence) = {
            let mut state = self.state();
            let swapchain = lookup(&state.swapchains, swapchain.key(), "swapchain")?.swapchain;
            let semaphore = match semaphore {
                Some(semaphore) => {
                    lookup(&state.semaphores, semaphore.key(), "semaphore")?.semaphore
                }
                None => vk::Semaphore::null(),
            };
            let fence = match fence {
                Some(fence) => {
                    let fence = lookup_mut(&mut state.fences, fence.key(), "fence")?;
                    fence.submitted = true;
                    fence.fence
                }
                None => vk::Fence::null(),
            };

            (swapchain, semaphore, fence)
        };

        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, std::u64::MAX, semaphore, fence)?
        };
        if suboptimal {
            log::debug!("Acquired image {} from a suboptimal swapchain", image_index);
        }

        Ok(image_index)
    }

    //
    // Command pools and buffers
    //
    fn create_command_pool(
        &self,
        queue: FluentQueueHandle,
    ) -> FluentResult<FluentCommandPoolHandle> {
        let mut state = self.state();
        let queue = lookup(&state.queues, queue.key(), "queue")?;
        let queue_type = queue.queue_type;

        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue.family_index);
        let command_pool = unsafe { self.device.create_command_pool(&*create_info, None)? };

        let key = state.command_pools.insert(VulkanCommandPool {
            command_pool,
            queue_type,
            command_buffers: Vec::default(),
        });
        Ok(FluentCommandPoolHandle::new(key))
    }

    fn destroy_command_pool(
        &self,
        command_pool: FluentCommandPoolHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_pool = take(&mut state.command_pools, command_pool.key(), "command pool")?;
        for command_buffer in &command_pool.command_buffers {
            state.command_buffers.remove(command_buffer.key());
        }

        unsafe {
            self.device
                .destroy_command_pool(command_pool.command_pool, None);
        }

        Ok(())
    }

    fn create_command_buffers(
        &self,
        command_pool: FluentCommandPoolHandle,
        count: u32,
    ) -> FluentResult<Vec<FluentCommandBufferHandle>> {
        let mut state = self.state();
        let pool = lookup(&state.command_pools, command_pool.key(), "command pool")?;
        let queue_type = pool.queue_type;

        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        let vk_command_buffers = unsafe { self.device.allocate_command_buffers(&*allocate_info)? };

        let mut handles = Vec::with_capacity(vk_command_buffers.len());
        for command_buffer in vk_command_buffers {
            let key = state.command_buffers.insert(VulkanCommandBuffer {
                command_buffer,
                command_pool,
                queue_type,
                recording_state: RecordingState::Initial,
                in_render_pass: false,
                bound_pipeline: None,
            });
            handles.push(FluentCommandBufferHandle::new(key));
        }

        lookup_mut(&mut state.command_pools, command_pool.key(), "command pool")?
            .command_buffers
            .extend_from_slice(&handles);
        Ok(handles)
    }

    fn free_command_buffers(
        &self,
        command_pool: FluentCommandPoolHandle,
        command_buffers: &[FluentCommandBufferHandle],
    ) -> FluentResult<()> {
        let mut state = self.state();
        let mut vk_command_buffers = Vec::with_capacity(command_buffers.len());
        for command_buffer in command_buffers {
            let command_buffer = lookup(
                &state.command_buffers,
                command_buffer.key(),
                "command buffer",
            )?;
            if command_buffer.command_pool != command_pool {
                Err("command buffers must be freed to the pool they were allocated from")?;
            }

            vk_command_buffers.push(command_buffer.command_buffer);
        }

        let pool = lookup_mut(&mut state.command_pools, command_pool.key(), "command pool")?;
        pool.command_buffers
            .retain(|x| !command_buffers.contains(x));
        if !vk_command_buffers.is_empty() {
            unsafe {
                self.device
                    .free_command_buffers(pool.command_pool, &vk_command_buffers);
            }
        }

        for command_buffer in command_buffers {
            state.command_buffers.remove(command_buffer.key());
        }

        Ok(())
    }

    fn begin_command_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = lookup_mut(
            &mut state.command_buffers,
            command_buffer.key(),
            "command buffer",
        )?;
        if command_buffer.recording_state == RecordingState::Recording {
            Err("command buffer is already recording")?;
        }

        // Beginning implicitly resets the buffer, the pool allows it
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(command_buffer.command_buffer, &*begin_info)?;
        }

        command_buffer.recording_state = RecordingState::Recording;
        command_buffer.in_render_pass = false;
        command_buffer.bound_pipeline = None;
        Ok(())
    }

    fn end_command_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if command_buffer.in_render_pass {
            Err("command buffer ended inside a render pass")?;
        }

        unsafe {
            self.device
                .end_command_buffer(command_buffer.command_buffer)?;
        }

        command_buffer.recording_state = RecordingState::Executable;
        Ok(())
    }

    //
    // Shaders, layouts and pipelines
    //
    fn create_shader(
        &self,
        shader_info: &FluentShaderInfo,
    ) -> FluentResult<FluentShaderHandle> {
        let mut modules = Vec::default();
        let result = (|| -> FluentResult<()> {
            for (stage, bytecode) in shader_info.stages() {
                let code = ash::util::read_spv(&mut Cursor::new(bytecode))?;
                let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
                let module = unsafe { self.device.create_shader_module(&*create_info, None)? };
                modules.push((stage, module));
            }

            Ok(())
        })();

        if let Err(e) = result {
            for (_, module) in modules {
                unsafe {
                    self.device.destroy_shader_module(module, None);
                }
            }

            return Err(e);
        }

        let key = self.state().shaders.insert(VulkanShader { modules });
        Ok(FluentShaderHandle::new(key))
    }

    fn destroy_shader(
        &self,
        shader: FluentShaderHandle,
    ) -> FluentResult<()> {
        let shader = take(&mut self.state().shaders, shader.key(), "shader")?;
        for (_, module) in shader.modules {
            unsafe {
                self.device.destroy_shader_module(module, None);
            }
        }

        Ok(())
    }

    fn create_descriptor_set_layout(
        &self,
        reflection: &FluentReflectionData,
    ) -> FluentResult<FluentDescriptorSetLayoutHandle> {
        // Fail at layout creation rather than at the first allocation
        for set in 0..reflection.set_count() {
            DescriptorSetCost::for_bindings(reflection.bindings_in_set(set))?;
        }

        let mut set_layouts = Vec::with_capacity(reflection.set_count() as usize);
        let result = (|| -> FluentResult<vk::PipelineLayout> {
            for set in 0..reflection.set_count() {
                let mut vk_bindings = Vec::default();
                for binding in reflection.bindings_in_set(set) {
                    let descriptor_type = descriptor_type_to_vk(binding.descriptor_type)
                        .ok_or_else(|| {
                            format!(
                                "binding {} has type {:?}, which can't be used in a descriptor set",
                                binding.name, binding.descriptor_type
                            )
                        })?;

                    vk_bindings.push(
                        vk::DescriptorSetLayoutBinding::builder()
                            .binding(binding.binding)
                            .descriptor_type(descriptor_type)
                            .descriptor_count(binding.descriptor_count)
                            .stage_flags(binding.stage.into())
                            .build(),
                    );
                }

                let create_info =
                    vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);
                let set_layout = unsafe {
                    self.device
                        .create_descriptor_set_layout(&*create_info, None)?
                };
                set_layouts.push(set_layout);
            }

            let push_constant_ranges = [vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::ALL,
                offset: 0,
                size: MAX_PUSH_CONSTANT_RANGE,
            }];
            let create_info = vk::PipelineLayoutCreateInfo::builder()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_constant_ranges);
            let pipeline_layout =
                unsafe { self.device.create_pipeline_layout(&*create_info, None)? };
            Ok(pipeline_layout)
        })();

        let pipeline_layout = match result {
            Ok(pipeline_layout) => pipeline_layout,
            Err(e) => {
                for set_layout in set_layouts {
                    unsafe {
                        self.device.destroy_descriptor_set_layout(set_layout, None);
                    }
                }

                return Err(e);
            }
        };

        let key = self
            .state()
            .descriptor_set_layouts
            .insert(VulkanDescriptorSetLayout {
                set_layouts,
                pipeline_layout,
                reflection: reflection.clone(),
            });
        Ok(FluentDescriptorSetLayoutHandle::new(key))
    }

    fn destroy_descriptor_set_layout(
        &self,
        descriptor_set_layout: FluentDescriptorSetLayoutHandle,
    ) -> FluentResult<()> {
        let layout = take(
            &mut self.state().descriptor_set_layouts,
            descriptor_set_layout.key(),
            "descriptor set layout",
        )?;

        unsafe {
            self.device
                .destroy_pipeline_layout(layout.pipeline_layout, None);
            for set_layout in layout.set_layouts {
                self.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }

        Ok(())
    }

    fn create_graphics_pipeline(
        &self,
        pipeline_info: &FluentPipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        let mut state = self.state();
        let state = &mut *state;
        let shader = lookup(&state.shaders, pipeline_info.shader.handle().key(), "shader")?;
        if !shader
            .modules
            .iter()
            .any(|(stage, _)| *stage == FluentShaderStageFlags::VERTEX)
        {
            Err("graphics pipelines need a vertex stage")?;
        }

        let pipeline_layout = lookup(
            &state.descriptor_set_layouts,
            pipeline_info.descriptor_set_layout.handle().key(),
            "descriptor set layout",
        )?
        .pipeline_layout;

        let render_pass_key = FluentRenderPassKey::for_pipeline(
            &pipeline_info.color_attachment_formats,
            pipeline_info.depth_stencil_format,
            pipeline_info.sample_count,
        );
        let device = &self.device;
        let render_pass = state
            .pass_cache
            .get_or_create_render_pass(&render_pass_key, |key| create_render_pass(device, key))?;

        let entry_name = CString::new(SHADER_ENTRY_POINT).map_err(|_| "invalid entry point")?;
        let stages: Vec<_> = shader
            .modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage((*stage).into())
                    .module(*module)
                    .name(&entry_name)
                    .build()
            })
            .collect();

        let vertex_bindings: Vec<_> = pipeline_info
            .vertex_layout
            .bindings
            .iter()
            .map(|x| vk::VertexInputBindingDescription {
                binding: x.binding,
                stride: x.stride,
                input_rate: x.input_rate.into(),
            })
            .collect();
        let vertex_attributes: Vec<_> = pipeline_info
            .vertex_layout
            .attributes
            .iter()
            .map(|x| vk::VertexInputAttributeDescription {
                location: x.location,
                binding: x.binding,
                format: x.format.into(),
                offset: x.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(pipeline_info.topology.into())
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic, only the counts matter here
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = rasterizer_state_to_create_info(&pipeline_info.rasterizer_info);
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(pipeline_info.sample_count.into())
            .sample_shading_enable(false)
            .min_sample_shading(0.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false);
        let depth_stencil_state = depth_state_to_create_info(&pipeline_info.depth_state_info);

        let blend_attachments = blend_attachments_to_create_info(
            &pipeline_info.blend_state_info,
            pipeline_info.color_attachment_formats.len(),
        );
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::CLEAR)
            .attachments(&blend_attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0)
            .base_pipeline_index(-1);

        let pipeline = unsafe {
            match self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[*create_info],
                None,
            ) {
                Ok(result) => Ok(result),
                Err(e) => Err(e.1),
            }?
        };

        let key = state.pipelines.insert(VulkanPipeline {
            pipeline: pipeline[0],
            pipeline_layout,
            pipeline_type: FluentPipelineType::Graphics,
        });
        Ok(FluentPipelineHandle::new(key))
    }

    fn create_compute_pipeline(
        &self,
        pipeline_info: &FluentComputePipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        let mut state = self.state();
        let shader = lookup(&state.shaders, pipeline_info.shader.handle().key(), "shader")?;
        let module = shader
            .modules
            .iter()
            .find(|(stage, _)| *stage == FluentShaderStageFlags::COMPUTE)
            .map(|(_, module)| *module)
            .ok_or("compute pipelines need a compute stage")?;

        let pipeline_layout = lookup(
            &state.descriptor_set_layouts,
            pipeline_info.descriptor_set_layout.handle().key(),
            "descriptor set layout",
        )?
        .pipeline_layout;

        let entry_name = CString::new(SHADER_ENTRY_POINT).map_err(|_| "invalid entry point")?;
        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(&entry_name);

        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(*stage)
            .layout(pipeline_layout)
            .base_pipeline_index(-1);

        let pipeline = unsafe {
            match self.device.create_compute_pipelines(
                vk::PipelineCache::null(),
                &[*create_info],
                None,
            ) {
                Ok(result) => Ok(result),
                Err(e) => Err(e.1),
            }?
        };

        let key = state.pipelines.insert(VulkanPipeline {
            pipeline: pipeline[0],
            pipeline_layout,
            pipeline_type: FluentPipelineType::Compute,
        });
        Ok(FluentPipelineHandle::new(key))
    }

    fn destroy_pipeline(
        &self,
        pipeline: FluentPipelineHandle,
    ) -> FluentResult<()> {
        let pipeline = take(&mut self.state().pipelines, pipeline.key(), "pipeline")?;
        // The render pass it was created against stays cached
        unsafe {
            self.device.destroy_pipeline(pipeline.pipeline, None);
        }

        Ok(())
    }

    //
    // Descriptor sets
    //
    fn create_descriptor_set(
        &self,
        descriptor_set_info: &FluentDescriptorSetInfo,
    ) -> FluentResult<FluentDescriptorSetHandle> {
        let mut state = self.state();
        let layout = lookup(
            &state.descriptor_set_layouts,
            descriptor_set_info.descriptor_set_layout.handle().key(),
            "descriptor set layout",
        )?;

        let set = descriptor_set_info.set;
        let set_layout = *layout.set_layouts.get(set as usize).ok_or_else(|| {
            format!(
                "descriptor set layout has {} sets, can't allocate set {}",
                layout.set_layouts.len(),
                set
            )
        })?;
        let bindings: Vec<_> = layout.reflection.bindings_in_set(set).cloned().collect();
        let cost = DescriptorSetCost::for_bindings(&bindings)?;
        state.descriptor_pool.allocate(&cost)?;

        let set_layouts = [set_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);
        let descriptor_set = match unsafe { self.device.allocate_descriptor_sets(&*allocate_info) }
        {
            Ok(descriptor_sets) => descriptor_sets[0],
            Err(e) => {
                state.descriptor_pool.free(&cost);
                return Err(e.into());
            }
        };

        let key = state.descriptor_sets.insert(VulkanDescriptorSet {
            descriptor_set,
            set,
            cost,
            bindings,
        });
        Ok(FluentDescriptorSetHandle::new(key))
    }

    fn destroy_descriptor_set(
        &self,
        descriptor_set: FluentDescriptorSetHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let descriptor_set = take(
            &mut state.descriptor_sets,
            descriptor_set.key(),
            "descriptor set",
        )?;
        state.descriptor_pool.free(&descriptor_set.cost);
        unsafe {
            self.device
                .free_descriptor_sets(self.descriptor_pool, &[descriptor_set.descriptor_set]);
        }

        Ok(())
    }

    fn update_descriptor_set(
        &self,
        descriptor_set: FluentDescriptorSetHandle,
        writes: &[FluentResolvedDescriptorWrite],
    ) -> FluentResult<()> {
        let state = self.state();
        let descriptor_set = lookup(
            &state.descriptor_sets,
            descriptor_set.key(),
            "descriptor set",
        )?;

        // Every info vector is fully built before any write points into it
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        for write in writes {
            let known_binding = descriptor_set
                .bindings
                .iter()
                .any(|x| x.binding == write.binding.binding);
            if write.binding.set != descriptor_set.set || !known_binding {
                Err(format!(
                    "descriptor {} is not part of this descriptor set",
                    write.binding.name
                ))?;
            }

            let mut write_buffer_infos = Vec::default();
            let mut write_image_infos = Vec::default();
            match &write.write.descriptors {
                FluentDescriptors::Buffers(buffers) => {
                    for descriptor in buffers {
                        let buffer = state.buffer(descriptor.buffer)?;
                        if descriptor.offset + descriptor.range > descriptor.buffer.size() {
                            Err(format!(
                                "descriptor {} range exceeds the buffer",
                                write.binding.name
                            ))?;
                        }

                        let range = if descriptor.range == 0 {
                            vk::WHOLE_SIZE
                        } else {
                            descriptor.range
                        };
                        write_buffer_infos.push(vk::DescriptorBufferInfo {
                            buffer,
                            offset: descriptor.offset,
                            range,
                        });
                    }
                }
                FluentDescriptors::Images(images) => {
                    for descriptor in images {
                        let image = state.image(descriptor.image)?;
                        write_image_infos.push(vk::DescriptorImageInfo {
                            sampler: vk::Sampler::null(),
                            image_view: image.descriptor_view(descriptor.mip_level)?,
                            image_layout: resource_state_to_image_layout(
                                descriptor.resource_state,
                            ),
                        });
                    }
                }
                FluentDescriptors::Samplers(samplers) => {
                    for descriptor in samplers {
                        let sampler = lookup(
                            &state.samplers,
                            descriptor.sampler.handle().key(),
                            "sampler",
                        )?;
                        write_image_infos.push(vk::DescriptorImageInfo {
                            sampler: sampler.sampler,
                            image_view: vk::ImageView::null(),
                            image_layout: vk::ImageLayout::UNDEFINED,
                        });
                    }
                }
            }

            buffer_infos.push(write_buffer_infos);
            image_infos.push(write_image_infos);
        }

        let mut vk_writes = Vec::with_capacity(writes.len());
        for (index, write) in writes.iter().enumerate() {
            let descriptor_type = descriptor_type_to_vk(write.binding.descriptor_type)
                .ok_or_else(|| {
                    format!(
                        "binding {} has type {:?}, which can't be written",
                        write.binding.name, write.binding.descriptor_type
                    )
                })?;

            let mut vk_write = vk::WriteDescriptorSet::builder()
                .dst_set(descriptor_set.descriptor_set)
                .dst_binding(write.binding.binding)
                .dst_array_element(0)
                .descriptor_type(descriptor_type);

            if !buffer_infos[index].is_empty() {
                vk_write = vk_write.buffer_info(&buffer_infos[index]);
            } else if !image_infos[index].is_empty() {
                vk_write = vk_write.image_info(&image_infos[index]);
            } else {
                continue;
            }

            vk_writes.push(vk_write.build());
        }

        unsafe {
            self.device.update_descriptor_sets(&vk_writes, &[]);
        }

        Ok(())
    }

    //
    // Buffers, images and samplers
    //
    fn create_buffer(
        &self,
        buffer_info: &FluentBufferInfo,
    ) -> FluentResult<FluentBufferHandle> {
        let allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: buffer_info.memory_usage.into(),
            flags: vk_mem::AllocationCreateFlags::NONE,
            required_flags: vk::MemoryPropertyFlags::empty(),
            preferred_flags: vk::MemoryPropertyFlags::empty(),
            memory_type_bits: 0,
            pool: None,
            user_data: None,
        };

        let create_info = vk::BufferCreateInfo::builder()
            .size(buffer_info.size)
            .usage(buffer_usage_flags(buffer_info.descriptor_type))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (buffer, allocation, _allocation_info) = self
            .allocator
            .create_buffer(&create_info, &allocation_create_info)?;
        log::trace!(
            "Created buffer {:?} of {} bytes",
            buffer,
            buffer_info.size
        );

        let key = self.state().buffers.insert(VulkanBuffer {
            buffer,
            allocation,
            size: buffer_info.size,
            mapped: false,
        });
        Ok(FluentBufferHandle::new(key))
    }

    fn destroy_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        let buffer = take(&mut self.state().buffers, buffer.key(), "buffer")?;
        if buffer.mapped {
            log::warn!("Destroyed a buffer of {} bytes while mapped", buffer.size);
            self.allocator.unmap_memory(&buffer.allocation)?;
        }

        self.allocator
            .destroy_buffer(buffer.buffer, &buffer.allocation)?;
        Ok(())
    }

    fn map_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<*mut u8> {
        let mut state = self.state();
        let buffer = lookup_mut(&mut state.buffers, buffer.key(), "buffer")?;
        if buffer.mapped {
            Err("buffer is already mapped")?;
        }

        let ptr = self.allocator.map_memory(&buffer.allocation)?;
        buffer.mapped = true;
        Ok(ptr)
    }

    fn unmap_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let buffer = lookup_mut(&mut state.buffers, buffer.key(), "buffer")?;
        if buffer.mapped {
            self.allocator.unmap_memory(&buffer.allocation)?;
            buffer.mapped = false;
        }

        Ok(())
    }

    fn create_image(
        &self,
        image_info: &FluentImageInfo,
    ) -> FluentResult<FluentImageHandle> {
        let allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::GpuOnly,
            flags: vk_mem::AllocationCreateFlags::NONE,
            required_flags: vk::MemoryPropertyFlags::empty(),
            preferred_flags: vk::MemoryPropertyFlags::empty(),
            memory_type_bits: 0,
            pool: None,
            user_data: None,
        };

        let image_type = if image_info.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };

        let extent = vk::Extent3D {
            width: image_info.width,
            height: image_info.height,
            depth: image_info.depth,
        };

        let create_info = vk::ImageCreateInfo::builder()
            .image_type(image_type)
            .extent(extent)
            .mip_levels(image_info.mip_levels)
            .array_layers(image_info.layer_count)
            .format(image_info.format.into())
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(image_usage_flags(image_info.descriptor_type))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(image_info.sample_count.into());

        let (image, allocation, _allocation_info) = self
            .allocator
            .create_image(&create_info, &allocation_create_info)?;

        let vulkan_image = match self.create_image_views(image, image_info, Some(allocation)) {
            Ok(vulkan_image) => vulkan_image,
            Err(e) => {
                self.allocator.destroy_image(image, &allocation)?;
                return Err(e);
            }
        };

        let key = self.state().images.insert(vulkan_image);
        Ok(FluentImageHandle::new(key))
    }

    fn destroy_image(
        &self,
        image: FluentImageHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let destroyed = take(&mut state.images, image.key(), "image")?;
        if destroyed.allocation.is_none() {
            log::error!("Destroyed a swapchain image directly");
        }

        let framebuffers = state.pass_cache.remove_framebuffers_referencing(image);
        self.destroy_framebuffers(framebuffers);
        self.destroy_vulkan_image(destroyed)
    }

    fn create_sampler(
        &self,
        sampler_info: &FluentSamplerInfo,
    ) -> FluentResult<FluentSamplerHandle> {
        let anisotropy_supported =
            self.physical_device_info.features.sampler_anisotropy == vk::TRUE;
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(sampler_info.mag_filter.into())
            .min_filter(sampler_info.min_filter.into())
            .mipmap_mode(sampler_info.mipmap_mode.into())
            .address_mode_u(sampler_info.address_mode_u.into())
            .address_mode_v(sampler_info.address_mode_v.into())
            .address_mode_w(sampler_info.address_mode_w.into())
            .mip_lod_bias(sampler_info.mip_lod_bias)
            .anisotropy_enable(sampler_info.anisotropy_enable && anisotropy_supported)
            .max_anisotropy(sampler_info.max_anisotropy)
            .compare_enable(sampler_info.compare_enable)
            .compare_op(sampler_info.compare_op.into())
            .min_lod(sampler_info.min_lod)
            .max_lod(sampler_info.max_lod)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&*create_info, None)? };
        let key = self.state().samplers.insert(VulkanSampler { sampler });
        Ok(FluentSamplerHandle::new(key))
    }

    fn destroy_sampler(
        &self,
        sampler: FluentSamplerHandle,
    ) -> FluentResult<()> {
        let sampler = take(&mut self.state().samplers, sampler.key(), "sampler")?;
        unsafe {
            self.device.destroy_sampler(sampler.sampler, None);
        }

        Ok(())
    }

    //
    // Commands
    //
    fn cmd_begin_render_pass(
        &self,
        command_buffer: FluentCommandBufferHandle,
        begin_info: &FluentRenderPassBeginInfo,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let state = &mut *state;

        let mut image_views = Vec::with_capacity(begin_info.color_attachments.len() + 1);
        let mut clear_values = Vec::with_capacity(begin_info.color_attachments.len() + 1);
        for attachment in begin_info
            .color_attachments
            .iter()
            .chain(begin_info.depth_attachment.iter())
        {
            image_views.push(state.image(attachment.image)?.attachment_view());
            clear_values.push(clear_value_to_vk(
                &attachment.clear_value,
                attachment.image.format(),
            ));
        }

        if state
            .recording_command_buffer(command_buffer)?
            .in_render_pass
        {
            Err("render passes can't be nested")?;
        }

        let render_pass_key = FluentRenderPassKey::from_begin_info(begin_info);
        let framebuffer_key =
            FluentFramebufferKey::from_begin_info(render_pass_key.clone(), begin_info);

        let device = &self.device;
        let render_pass = state
            .pass_cache
            .get_or_create_render_pass(&render_pass_key, |key| create_render_pass(device, key))?;
        let framebuffer = state
            .pass_cache
            .get_or_create_framebuffer(&framebuffer_key, |key| {
                create_framebuffer(device, render_pass, &image_views, key.width, key.height)
            })?;

        let extent = vk::Extent2D {
            width: begin_info.width,
            height: begin_info.height,
        };
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let vk_begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer.command_buffer,
                &*vk_begin_info,
                vk::SubpassContents::INLINE,
            );

            // Cover the whole framebuffer until told otherwise
            self.device.cmd_set_viewport(
                command_buffer.command_buffer,
                0,
                &[vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            self.device
                .cmd_set_scissor(command_buffer.command_buffer, 0, &[render_area]);
        }

        command_buffer.in_render_pass = true;
        Ok(())
    }

    fn cmd_end_render_pass(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if !command_buffer.in_render_pass {
            Err("cmd_end_render_pass without a matching cmd_begin_render_pass")?;
        }

        unsafe {
            self.device
                .cmd_end_render_pass(command_buffer.command_buffer);
        }

        command_buffer.in_render_pass = false;
        Ok(())
    }

    fn cmd_barrier(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer_barriers: &[FluentBufferBarrier],
        image_barriers: &[FluentImageBarrier],
    ) -> FluentResult<()> {
        let mut state = self.state();
        let (vk_command_buffer, queue_type) = {
            let command_buffer =
                state.command_buffer_outside_render_pass(command_buffer, "barriers")?;
            (command_buffer.command_buffer, command_buffer.queue_type)
        };

        let mut vk_buffer_barriers = Vec::with_capacity(buffer_barriers.len());
        for barrier in buffer_barriers {
            let buffer = state.buffer(barrier.buffer)?;
            let (src_family, dst_family) =
                state.queue_families(barrier.src_queue, barrier.dst_queue)?;
            let size = if barrier.size == 0 {
                vk::WHOLE_SIZE
            } else {
                barrier.size
            };

            vk_buffer_barriers.push(
                vk::BufferMemoryBarrier::builder()
                    .src_access_mask(determine_access_flags(barrier.old_state).into())
                    .dst_access_mask(determine_access_flags(barrier.new_state).into())
                    .src_queue_family_index(src_family)
                    .dst_queue_family_index(dst_family)
                    .buffer(buffer)
                    .offset(barrier.offset)
                    .size(size)
                    .build(),
            );
        }

        let mut vk_image_barriers = Vec::with_capacity(image_barriers.len());
        for barrier in image_barriers {
            let image = state.image(barrier.image)?;
            let (src_family, dst_family) =
                state.queue_families(barrier.src_queue, barrier.dst_queue)?;

            vk_image_barriers.push(
                vk::ImageMemoryBarrier::builder()
                    .src_access_mask(determine_access_flags(barrier.old_state).into())
                    .dst_access_mask(determine_access_flags(barrier.new_state).into())
                    .old_layout(resource_state_to_image_layout(barrier.old_state))
                    .new_layout(resource_state_to_image_layout(barrier.new_state))
                    .src_queue_family_index(src_family)
                    .dst_queue_family_index(dst_family)
                    .image(image.image)
                    .subresource_range(image.subresource_range())
                    .build(),
            );
        }

        let (src_scope, dst_scope) = determine_barrier_scopes(
            buffer_barriers
                .iter()
                .map(|x| (x.old_state, x.new_state))
                .chain(image_barriers.iter().map(|x| (x.old_state, x.new_state))),
            queue_type,
        );

        unsafe {
            self.device.cmd_pipeline_barrier(
                vk_command_buffer,
                src_scope.stages.into(),
                dst_scope.stages.into(),
                vk::DependencyFlags::empty(),
                &[],
                &vk_buffer_barriers,
                &vk_image_barriers,
            );
        }

        Ok(())
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
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if width <= 0.0 || height <= 0.0 || min_depth > max_depth {
            Err(format!(
                "invalid viewport {}x{} depth {}..{}",
                width, height, min_depth, max_depth
            ))?;
        }

        unsafe {
            self.device.cmd_set_viewport(
                command_buffer.command_buffer,
                0,
                &[vk::Viewport {
                    x,
                    y,
                    width,
                    height,
                    min_depth,
                    max_depth,
                }],
            );
        }

        Ok(())
    }

    fn cmd_set_scissor(
        &self,
        command_buffer: FluentCommandBufferHandle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if x < 0 || y < 0 {
            Err("scissor offset can't be negative")?;
        }

        unsafe {
            self.device.cmd_set_scissor(
                command_buffer.command_buffer,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x, y },
                    extent: vk::Extent2D { width, height },
                }],
            );
        }

        Ok(())
    }

    fn cmd_bind_pipeline(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let pipeline = lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?;
        let (vk_pipeline, pipeline_type) = (pipeline.pipeline, pipeline.pipeline_type);

        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer.command_buffer,
                pipeline_type.into(),
                vk_pipeline,
            );
        }

        command_buffer.bound_pipeline = Some(pipeline_type);
        Ok(())
    }

    fn cmd_bind_vertex_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        first_binding: u32,
        buffer: &FluentBuffer,
        offset: u64,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let buffer = state.buffer(buffer)?;
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                command_buffer.command_buffer,
                first_binding,
                &[buffer],
                &[offset],
            );
        }

        Ok(())
    }

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer: &FluentBuffer,
        offset: u64,
        index_type: FluentIndexType,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let buffer = state.buffer(buffer)?;
        if offset % index_type.size_in_bytes() as u64 != 0 {
            Err("index buffer offset must be a multiple of the index size")?;
        }

        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_bind_index_buffer(
                command_buffer.command_buffer,
                buffer,
                offset,
                index_type.into(),
            );
        }

        Ok(())
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        descriptor_set: &FluentDescriptorSet,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let pipeline = lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?;
        let (pipeline_layout, pipeline_type) = (pipeline.pipeline_layout, pipeline.pipeline_type);
        let descriptor_set = lookup(
            &state.descriptor_sets,
            descriptor_set.handle().key(),
            "descriptor set",
        )?;
        let (vk_descriptor_set, set) = (descriptor_set.descriptor_set, descriptor_set.set);

        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer.command_buffer,
                pipeline_type.into(),
                pipeline_layout,
                set,
                &[vk_descriptor_set],
                &[],
            );
        }

        Ok(())
    }

    fn cmd_push_constants(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        offset: u32,
        data: &[u8],
    ) -> FluentResult<()> {
        if offset as usize + data.len() > MAX_PUSH_CONSTANT_RANGE as usize {
            Err(format!(
                "push constants {}..{} exceed the {} byte range",
                offset,
                offset as usize + data.len(),
                MAX_PUSH_CONSTANT_RANGE
            ))?;
        }

        let mut state = self.state();
        let pipeline_layout =
            lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?.pipeline_layout;
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_push_constants(
                command_buffer.command_buffer,
                pipeline_layout,
                vk::ShaderStageFlags::ALL,
                offset,
                data,
            );
        }

        Ok(())
    }

    fn cmd_draw(
        &self,
        command_buffer: FluentCommandBufferHandle,
        vertex_count: u32,
        first_vertex: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.draw_command_buffer(command_buffer)?;
        unsafe {
            self.device
                .cmd_draw(command_buffer, vertex_count, 1, first_vertex, 0);
        }

        Ok(())
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: FluentCommandBufferHandle,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.draw_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_draw_indexed(
                command_buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }

        Ok(())
    }

    fn cmd_draw_indexed_indirect(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer: &FluentBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let vk_buffer = state.buffer(buffer)?;

        let stride = if draw_count > 1 {
            stride as u64
        } else {
            DRAW_INDEXED_INDIRECT_COMMAND_SIZE
        };
        if draw_count > 0
            && (stride < DRAW_INDEXED_INDIRECT_COMMAND_SIZE
                || offset + stride * (draw_count as u64 - 1) + DRAW_INDEXED_INDIRECT_COMMAND_SIZE
                    > buffer.size())
        {
            Err("indirect draw commands exceed the buffer")?;
        }

        let command_buffer = state.draw_command_buffer(command_buffer)?;
        unsafe {
            self.device.cmd_draw_indexed_indirect(
                command_buffer,
                vk_buffer,
                offset,
                draw_count,
                stride as u32,
            );
        }

        Ok(())
    }

    fn cmd_dispatch(
        &self,
        command_buffer: FluentCommandBufferHandle,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.command_buffer_outside_render_pass(command_buffer, "dispatch")?;
        if command_buffer.bound_pipeline != Some(FluentPipelineType::Compute) {
            Err("dispatch requires a bound compute pipeline")?;
        }

        unsafe {
            self.device.cmd_dispatch(
                command_buffer.command_buffer,
                group_count_x,
                group_count_y,
                group_count_z,
            );
        }

        Ok(())
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
        let mut state = self.state();
        let src = state.buffer(src_buffer)?;
        let dst = state.buffer(dst_buffer)?;
        if src_offset + size > src_buffer.size() || dst_offset + size > dst_buffer.size() {
            Err("buffer copy exceeds the source or destination buffer")?;
        }

        let command_buffer = state.command_buffer_outside_render_pass(command_buffer, "copies")?;
        unsafe {
            self.device.cmd_copy_buffer(
                command_buffer.command_buffer,
                src,
                dst,
                &[vk::BufferCopy {
                    src_offset,
                    dst_offset,
                    size,
                }],
            );
        }

        Ok(())
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        src_buffer: &FluentBuffer,
        dst_image: &FluentImage,
        copy: &FluentBufferImageCopy,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let src = state.buffer(src_buffer)?;
        let (image, aspect_mask, (mip_width, mip_height, mip_depth)) = {
            let image = state.image(dst_image)?;
            if copy.mip_level >= image.info.mip_levels || copy.array_layer >= image.info.layer_count
            {
                Err(format!(
                    "image has {} layers and {} mip levels, can't copy to layer {} mip level {}",
                    image.info.layer_count,
                    image.info.mip_levels,
                    copy.array_layer,
                    copy.mip_level
                ))?;
            }

            (
                image.image,
                image.aspect_mask,
                image.mip_extent(copy.mip_level),
            )
        };

        let width = if copy.width == 0 { mip_width } else { copy.width };
        let height = if copy.height == 0 {
            mip_height
        } else {
            copy.height
        };

        let region = vk::BufferImageCopy {
            buffer_offset: copy.buffer_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask,
                mip_level: copy.mip_level,
                base_array_layer: copy.array_layer,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width,
                height,
                depth: mip_depth,
            },
        };

        let command_buffer = state.command_buffer_outside_render_pass(command_buffer, "copies")?;
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                command_buffer.command_buffer,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        Ok(())
    }

    fn cmd_clear_color_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        resource_state: FluentResourceState,
        color: [f32; 4],
    ) -> FluentResult<()> {
        let mut state = self.state();
        let (vk_command_buffer, queue_type) = {
            let command_buffer =
                state.command_buffer_outside_render_pass(command_buffer, "clears")?;
            (command_buffer.command_buffer, command_buffer.queue_type)
        };

        let image = state.image(image)?;
        if image.aspect_mask != vk::ImageAspectFlags::COLOR {
            Err("only color images can be cleared with cmd_clear_color_image")?;
        }

        let range = image.subresource_range();
        let layout = resource_state_to_image_layout(resource_state);
        self.record_image_barriers(
            vk_command_buffer,
            queue_type,
            &[image_barrier(
                image,
                range,
                resource_state,
                FluentResourceState::TRANSFER_DST,
                layout,
            )],
        );

        unsafe {
            self.device.cmd_clear_color_image(
                vk_command_buffer,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue { float32: color },
                &[range],
            );
        }

        self.record_image_barriers(
            vk_command_buffer,
            queue_type,
            &[image_barrier(
                image,
                range,
                FluentResourceState::TRANSFER_DST,
                resource_state,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )],
        );

        Ok(())
    }

    fn cmd_generate_mipmaps(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        resource_state: FluentResourceState,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let (vk_command_buffer, queue_type) = {
            let command_buffer =
                state.command_buffer_outside_render_pass(command_buffer, "mipmap generation")?;
            (command_buffer.command_buffer, command_buffer.queue_type)
        };

        let image = state.image(image)?;
        let mip_levels = image.info.mip_levels;
        if mip_levels <= 1 {
            return Ok(());
        }

        log::trace!("Generating {} mip levels", mip_levels);
        let layout = resource_state_to_image_layout(resource_state);

        // Level 0 becomes the first blit source, the rest are overwritten
        let mut first_barriers = vec![image_barrier(
            image,
            image.mip_subresource_range(0),
            resource_state,
            FluentResourceState::TRANSFER_SRC,
            layout,
        )];
        first_barriers.push(image_barrier(
            image,
            vk::ImageSubresourceRange {
                base_mip_level: 1,
                level_count: mip_levels - 1,
                ..image.mip_subresource_range(1)
            },
            FluentResourceState::UNDEFINED,
            FluentResourceState::TRANSFER_DST,
            vk::ImageLayout::UNDEFINED,
        ));
        self.record_image_barriers(vk_command_buffer, queue_type, &first_barriers);

        for mip_level in 1..mip_levels {
            let (src_width, src_height, src_depth) = image.mip_extent(mip_level - 1);
            let (dst_width, dst_height, dst_depth) = image.mip_extent(mip_level);

            let subresource = |mip_level: u32| vk::ImageSubresourceLayers {
                aspect_mask: image.aspect_mask,
                mip_level,
                base_array_layer: 0,
                layer_count: image.info.layer_count,
            };

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: src_width as i32,
                        y: src_height as i32,
                        z: src_depth as i32,
                    },
                ])
                .src_subresource(subresource(mip_level - 1))
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: dst_width as i32,
                        y: dst_height as i32,
                        z: dst_depth as i32,
                    },
                ])
                .dst_subresource(subresource(mip_level));

            unsafe {
                self.device.cmd_blit_image(
                    vk_command_buffer,
                    image.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[*blit],
                    vk::Filter::LINEAR,
                );
            }

            // This level is the source of the next blit
            self.record_image_barriers(
                vk_command_buffer,
                queue_type,
                &[image_barrier(
                    image,
                    image.mip_subresource_range(mip_level),
                    FluentResourceState::TRANSFER_DST,
                    FluentResourceState::TRANSFER_SRC,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )],
            );
        }

        self.record_image_barriers(
            vk_command_buffer,
            queue_type,
            &[image_barrier(
                image,
                image.subresource_range(),
                FluentResourceState::TRANSFER_SRC,
                resource_state,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            )],
        );

        Ok(())
    }
}
