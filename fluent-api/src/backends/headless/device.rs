use super::commands::{HeadlessAttachment, HeadlessCommand};
use crate::backends::descriptor_pool::{DescriptorPool, DescriptorSetCost};
use crate::backends::slab_lookup::{lookup, lookup_mut, take};
use crate::backend::{FluentDeviceImpl, FluentResolvedDescriptorWrite, FluentSwapchainImages};
use crate::*;
use fluent_base::slab::GenSlab;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Capabilities of the pretend surface that headless swapchains present to
const SURFACE_MIN_IMAGE_COUNT: u32 = 2;
const SURFACE_MAX_IMAGE_COUNT: u32 = 8;
const SURFACE_MAX_EXTENT: u32 = 16384;
const FALLBACK_SWAPCHAIN_FORMAT: FluentFormat = FluentFormat::B8G8R8A8_SRGB;

/// Work done by a headless device since it was created
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FluentHeadlessStats {
    pub submits: u64,
    pub presents: u64,
    pub draws: u64,
    pub dispatches: u64,
}

pub(super) struct HeadlessQueue {
    queue_type: FluentQueueType,
}

pub(super) struct HeadlessSemaphore {
    signaled: bool,
}

pub(super) struct HeadlessFence {
    signaled: bool,
}

pub(super) struct HeadlessSwapchain {
    images: Vec<FluentImageHandle>,
    format: FluentFormat,
    width: u32,
    height: u32,
    image_count: u32,
    next_image_index: u32,
    wsi: Option<Arc<dyn FluentWsi>>,
}

pub(super) struct HeadlessCommandPool {
    queue_type: FluentQueueType,
    command_buffers: Vec<FluentCommandBufferHandle>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RecordingState {
    Initial,
    Recording,
    Executable,
}

pub(super) struct HeadlessCommandBuffer {
    command_pool: FluentCommandPoolHandle,
    queue_type: FluentQueueType,
    recording_state: RecordingState,
    commands: Vec<HeadlessCommand>,
    render_pass_attachments: Option<Vec<HeadlessAttachment>>,
    bound_pipeline: Option<FluentPipelineType>,
}

pub(super) struct HeadlessShader {
    stages: FluentShaderStageFlags,
}

pub(super) struct HeadlessDescriptorSetLayout {
    reflection: FluentReflectionData,
}

pub(super) struct HeadlessPipeline {
    pipeline_type: FluentPipelineType,
    render_pass: Option<u64>,
}

pub(super) struct HeadlessDescriptorSet {
    set: u32,
    cost: DescriptorSetCost,
    bindings: Vec<FluentBinding>,
}

pub(super) struct HeadlessBuffer {
    pub(super) info: FluentBufferInfo,
    pub(super) data: Vec<u8>,
    mapped: bool,
}

pub(super) struct HeadlessImage {
    pub(super) info: FluentImageInfo,
    /// One byte vector per (layer, mip level), layer-major
    pub(super) subresources: Vec<Vec<u8>>,
    /// Tracked for the whole image, barriers transition every subresource
    pub(super) layout: FluentImageLayout,
    owned_by_swapchain: bool,
}

impl HeadlessImage {
    fn new(
        info: FluentImageInfo,
        owned_by_swapchain: bool,
    ) -> Self {
        let mut subresources = Vec::with_capacity((info.layer_count * info.mip_levels) as usize);
        for _ in 0..info.layer_count {
            for mip_level in 0..info.mip_levels {
                subresources.push(vec![0; info.mip_level_size_in_bytes(mip_level) as usize]);
            }
        }

        HeadlessImage {
            info,
            subresources,
            layout: FluentImageLayout::Undefined,
            owned_by_swapchain,
        }
    }

    pub(super) fn subresource_index(
        &self,
        array_layer: u32,
        mip_level: u32,
    ) -> usize {
        (array_layer * self.info.mip_levels + mip_level) as usize
    }

    pub(super) fn extent(
        &self,
        mip_level: u32,
    ) -> (u32, u32) {
        (
            (self.info.width >> mip_level).max(1),
            (self.info.height >> mip_level).max(1),
        )
    }
}

pub(super) struct HeadlessSampler;

pub(super) struct HeadlessDeviceState {
    queues: GenSlab<HeadlessQueue>,
    semaphores: GenSlab<HeadlessSemaphore>,
    fences: GenSlab<HeadlessFence>,
    swapchains: GenSlab<HeadlessSwapchain>,
    command_pools: GenSlab<HeadlessCommandPool>,
    command_buffers: GenSlab<HeadlessCommandBuffer>,
    shaders: GenSlab<HeadlessShader>,
    descriptor_set_layouts: GenSlab<HeadlessDescriptorSetLayout>,
    pipelines: GenSlab<HeadlessPipeline>,
    descriptor_sets: GenSlab<HeadlessDescriptorSet>,
    pub(super) buffers: GenSlab<HeadlessBuffer>,
    pub(super) images: GenSlab<HeadlessImage>,
    samplers: GenSlab<HeadlessSampler>,

    descriptor_pool: DescriptorPool,
    // Render passes and framebuffers have no CPU-side contents, ids stand in for native objects
    pass_cache: FluentPassCache<u64, u64>,
    next_native_id: u64,
    pub(super) stats: FluentHeadlessStats,
}

impl HeadlessDeviceState {
    fn recording_command_buffer(
        &mut self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<&mut HeadlessCommandBuffer> {
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

    fn record(
        &mut self,
        command_buffer: FluentCommandBufferHandle,
        command: HeadlessCommand,
    ) -> FluentResult<()> {
        let command_buffer = self.recording_command_buffer(command_buffer)?;
        if command_buffer.render_pass_attachments.is_some() {
            Err(format!(
                "{:?} can't be recorded inside a render pass",
                command
            ))?;
        }

        command_buffer.commands.push(command);
        Ok(())
    }

    fn verify_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<()> {
        lookup(&self.buffers, buffer.handle().key(), "buffer").map(|_| ())
    }

    fn verify_image(
        &self,
        image: &FluentImage,
    ) -> FluentResult<()> {
        lookup(&self.images, image.handle().key(), "image").map(|_| ())
    }

    fn wait_semaphores(
        &mut self,
        semaphores: &[&FluentSemaphore],
    ) -> FluentResult<()> {
        for semaphore in semaphores {
            let semaphore = lookup_mut(&mut self.semaphores, semaphore.handle().key(), "semaphore")?;
            if !semaphore.signaled {
                // On a GPU this wait would never complete
                Err("waiting on a semaphore that nothing signals")?;
            }

            semaphore.signaled = false;
        }

        Ok(())
    }

    fn native_id(&mut self) -> u64 {
        self.next_native_id += 1;
        self.next_native_id
    }

    fn create_swapchain_images(
        &mut self,
        format: FluentFormat,
        width: u32,
        height: u32,
        image_count: u32,
    ) -> (Vec<FluentImageHandle>, FluentSwapchainImages) {
        let info = FluentImageInfo {
            width,
            height,
            format,
            descriptor_type: FluentDescriptorType::COLOR_ATTACHMENT,
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(image_count as usize);
        let mut images = Vec::with_capacity(image_count as usize);
        for _ in 0..image_count {
            let handle = FluentImageHandle::new(self.images.insert(HeadlessImage::new(info, true)));
            handles.push(handle);
            images.push(FluentImage {
                handle,
                info,
                owned_by_swapchain: true,
            });
        }

        (
            handles,
            FluentSwapchainImages {
                width,
                height,
                format,
                images,
            },
        )
    }

    fn destroy_swapchain_images(
        &mut self,
        images: &[FluentImageHandle],
    ) {
        for image in images {
            self.pass_cache.remove_framebuffers_referencing(*image);
            self.images.remove(image.key());
        }
    }
}

fn swapchain_extent(
    wsi: Option<&Arc<dyn FluentWsi>>,
    width: u32,
    height: u32,
) -> (u32, u32) {
    // Like a native surface, a known window size wins over the requested size
    let (width, height) = match wsi.map(|x| x.framebuffer_size()) {
        Some(size) if size.width > 0 && size.height > 0 => (size.width, size.height),
        _ => (width, height),
    };

    (
        width.max(1).min(SURFACE_MAX_EXTENT),
        height.max(1).min(SURFACE_MAX_EXTENT),
    )
}

/// A device that executes everything on the CPU.
///
/// All state lives behind one mutex, so the device may be used from several threads. Work runs to
/// completion inside `queue_submit`, which makes fences and waits trivially satisfied.
pub struct FluentDeviceHeadless {
    device_info: FluentDeviceInfo,
    state: Mutex<HeadlessDeviceState>,
}

impl FluentDeviceHeadless {
    pub fn new(device_info: &FluentDeviceInfo) -> Self {
        let state = HeadlessDeviceState {
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
            next_native_id: 0,
            stats: Default::default(),
        };

        FluentDeviceHeadless {
            device_info: *device_info,
            state: Mutex::new(state),
        }
    }

    pub fn device_info(&self) -> &FluentDeviceInfo {
        &self.device_info
    }

    // Operations never leave the state half-modified on error, so a panic elsewhere does not
    // invalidate it
    fn state(&self) -> MutexGuard<HeadlessDeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> FluentHeadlessStats {
        self.state().stats
    }

    pub fn allocated_descriptor_set_count(&self) -> u32 {
        self.state().descriptor_pool.allocated_set_count()
    }

    /// Copy out the contents of one mip level of one layer, tightly packed
    pub fn read_image(
        &self,
        image: &FluentImage,
        array_layer: u32,
        mip_level: u32,
    ) -> FluentResult<Vec<u8>> {
        let state = self.state();
        let image = lookup(&state.images, image.handle().key(), "image")?;
        if array_layer >= image.info.layer_count || mip_level >= image.info.mip_levels {
            Err(format!(
                "image has {} layers and {} mip levels, can't read layer {} mip level {}",
                image.info.layer_count, image.info.mip_levels, array_layer, mip_level
            ))?;
        }

        Ok(image.subresources[image.subresource_index(array_layer, mip_level)].clone())
    }

    /// Contents of any buffer, including ones that could not be mapped on a GPU
    pub fn read_buffer(
        &self,
        buffer: &FluentBuffer,
    ) -> FluentResult<Vec<u8>> {
        let state = self.state();
        Ok(lookup(&state.buffers, buffer.handle().key(), "buffer")?
            .data
            .clone())
    }

    /// The layout the image is in after all submitted work
    pub fn image_layout(
        &self,
        image: &FluentImage,
    ) -> FluentResult<FluentImageLayout> {
        let state = self.state();
        Ok(lookup(&state.images, image.handle().key(), "image")?.layout)
    }
}

impl FluentDeviceImpl for FluentDeviceHeadless {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::Headless
    }

    fn wait_idle(&self) -> FluentResult<()> {
        Ok(())
    }

    fn destroy(&self) -> FluentResult<()> {
        let mut state = self.state();
        let (render_passes, framebuffers) = state.pass_cache.drain();
        log::debug!(
            "Destroying {} cached render passes and {} cached framebuffers",
            render_passes.len(),
            framebuffers.len()
        );

        let leaked_buffers = state.buffers.drain().len();
        let leaked_images = state
            .images
            .drain()
            .into_iter()
            .filter(|x| !x.owned_by_swapchain)
            .count();
        if leaked_buffers > 0 || leaked_images > 0 {
            log::warn!(
                "Headless device destroyed with {} buffers and {} images still alive",
                leaked_buffers,
                leaked_images
            );
        }

        state.descriptor_sets.drain();
        state.pipelines.drain();
        state.descriptor_set_layouts.drain();
        state.shaders.drain();
        state.samplers.drain();
        state.command_buffers.drain();
        state.command_pools.drain();
        state.swapchains.drain();
        state.fences.drain();
        state.semaphores.drain();
        state.queues.drain();
        Ok(())
    }

    fn pass_cache_stats(&self) -> FluentPassCacheStats {
        self.state().pass_cache.stats()
    }

    fn headless_device(&self) -> Option<&FluentDeviceHeadless> {
        Some(self)
    }

    //
    // Queues
    //
    fn create_queue(
        &self,
        queue_type: FluentQueueType,
    ) -> FluentResult<FluentQueueHandle> {
        let key = self.state().queues.insert(HeadlessQueue { queue_type });
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
        lookup(&self.state().queues, queue.key(), "queue").map(|_| ())
    }

    fn queue_submit(
        &self,
        queue: FluentQueueHandle,
        submit_info: &FluentQueueSubmitInfo,
    ) -> FluentResult<()> {
        profiling::scope!("FluentDeviceHeadless::queue_submit");
        let mut state = self.state();
        let queue_type = lookup(&state.queues, queue.key(), "queue")?.queue_type;

        // Validate everything up front so a failed submit changes nothing
        let mut commands = Vec::default();
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

            commands.extend(command_buffer.commands.iter().cloned());
        }

        for semaphore in submit_info
            .signal_semaphores
            .iter()
            .chain(submit_info.wait_semaphores.iter())
        {
            lookup(&state.semaphores, semaphore.handle().key(), "semaphore")?;
        }

        if let Some(fence) = submit_info.signal_fence {
            lookup(&state.fences, fence.handle().key(), "fence")?;
        }

        state.wait_semaphores(&submit_info.wait_semaphores)?;

        for command in &commands {
            state.execute(command)?;
        }

        for semaphore in &submit_info.signal_semaphores {
            lookup_mut(&mut state.semaphores, semaphore.handle().key(), "semaphore")?.signaled =
                true;
        }

        if let Some(fence) = submit_info.signal_fence {
            lookup_mut(&mut state.fences, fence.handle().key(), "fence")?.signaled = true;
        }

        state.stats.submits += 1;
        Ok(())
    }

    fn queue_present(
        &self,
        queue: FluentQueueHandle,
        present_info: &FluentQueuePresentInfo,
    ) -> FluentResult<FluentPresentResult> {
        let mut state = self.state();
        lookup(&state.queues, queue.key(), "queue")?;

        let swapchain = lookup(
            &state.swapchains,
            present_info.swapchain.handle().key(),
            "swapchain",
        )?;
        let image = *swapchain
            .images
            .get(present_info.image_index as usize)
            .ok_or("image index out of range")?;
        let extent = (swapchain.width, swapchain.height);
        let wsi_size = swapchain.wsi.as_ref().map(|x| x.framebuffer_size());

        let layout = lookup(&state.images, image.key(), "image")?.layout;
        if layout != FluentImageLayout::PresentSrc {
            Err(format!(
                "presented images must be in the PRESENT state, image is in {:?}",
                layout
            ))?;
        }

        state.wait_semaphores(&present_info.wait_semaphores)?;
        state.stats.presents += 1;

        match wsi_size {
            Some(size) if (size.width, size.height) != extent => {
                log::debug!(
                    "Window is {}x{}, swapchain is {}x{}",
                    size.width,
                    size.height,
                    extent.0,
                    extent.1
                );
                Ok(FluentPresentResult::SuboptimalOrOutOfDate)
            }
            _ => Ok(FluentPresentResult::Success),
        }
    }

    //
    // Synchronization
    //
    fn create_semaphore(&self) -> FluentResult<FluentSemaphoreHandle> {
        let key = self
            .state()
            .semaphores
            .insert(HeadlessSemaphore { signaled: false });
        Ok(FluentSemaphoreHandle::new(key))
    }

    fn destroy_semaphore(
        &self,
        semaphore: FluentSemaphoreHandle,
    ) -> FluentResult<()> {
        take(&mut self.state().semaphores, semaphore.key(), "semaphore").map(|_| ())
    }

    fn create_fence(&self) -> FluentResult<FluentFenceHandle> {
        let key = self.state().fences.insert(HeadlessFence { signaled: false });
        Ok(FluentFenceHandle::new(key))
    }

    fn destroy_fence(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<()> {
        take(&mut self.state().fences, fence.key(), "fence").map(|_| ())
    }

    fn wait_for_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        let state = self.state();
        for fence in fences {
            if !lookup(&state.fences, fence.key(), "fence")?.signaled {
                // Submitted work is already complete, so an unsignaled fence was never submitted
                Err("waiting on a fence that was never submitted")?;
            }
        }

        Ok(())
    }

    fn reset_fences(
        &self,
        fences: &[FluentFenceHandle],
    ) -> FluentResult<()> {
        let mut state = self.state();
        for fence in fences {
            lookup_mut(&mut state.fences, fence.key(), "fence")?.signaled = false;
        }

        Ok(())
    }

    fn fence_status(
        &self,
        fence: FluentFenceHandle,
    ) -> FluentResult<FluentFenceStatus> {
        let state = self.state();
        if lookup(&state.fences, fence.key(), "fence")?.signaled {
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
        let mut state = self.state();
        lookup(&state.queues, swapchain_info.queue.handle().key(), "queue")?;

        let format = if swapchain_info.format == FluentFormat::UNDEFINED
            || swapchain_info.format.is_depth_or_stencil()
        {
            log::warn!(
                "Swapchain format {:?} can't be presented, using {:?}",
                swapchain_info.format,
                FALLBACK_SWAPCHAIN_FORMAT
            );
            FALLBACK_SWAPCHAIN_FORMAT
        } else {
            swapchain_info.format
        };

        let (width, height) = swapchain_extent(
            swapchain_info.wsi.as_ref(),
            swapchain_info.width,
            swapchain_info.height,
        );
        let image_count = swapchain_info
            .min_image_count
            .max(SURFACE_MIN_IMAGE_COUNT)
            .min(SURFACE_MAX_IMAGE_COUNT);
        log::debug!(
            "Headless swapchain: {:?} {}x{} with {} images, vsync: {}",
            format,
            width,
            height,
            image_count,
            swapchain_info.vsync
        );

        let (image_handles, images) =
            state.create_swapchain_images(format, width, height, image_count);
        let key = state.swapchains.insert(HeadlessSwapchain {
            images: image_handles,
            format,
            width,
            height,
            image_count,
            next_image_index: 0,
            wsi: swapchain_info.wsi.clone(),
        });

        Ok((FluentSwapchainHandle::new(key), images))
    }

    fn resize_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
        width: u32,
        height: u32,
    ) -> FluentResult<FluentSwapchainImages> {
        let mut state = self.state();
        let (old_images, format, image_count, wsi) = {
            let swapchain = lookup(&state.swapchains, swapchain.key(), "swapchain")?;
            (
                swapchain.images.clone(),
                swapchain.format,
                swapchain.image_count,
                swapchain.wsi.clone(),
            )
        };

        state.destroy_swapchain_images(&old_images);
        // Framebuffers of other attachments may have the old extent baked in as well
        state.pass_cache.clear_framebuffers();

        let (width, height) = swapchain_extent(wsi.as_ref(), width, height);
        let (image_handles, images) =
            state.create_swapchain_images(format, width, height, image_count);

        let swapchain = lookup_mut(&mut state.swapchains, swapchain.key(), "swapchain")?;
        swapchain.images = image_handles;
        swapchain.width = width;
        swapchain.height = height;
        swapchain.next_image_index = 0;
        Ok(images)
    }

    fn destroy_swapchain(
        &self,
        swapchain: FluentSwapchainHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let swapchain = take(&mut state.swapchains, swapchain.key(), "swapchain")?;
        state.destroy_swapchain_images(&swapchain.images);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: FluentSwapchainHandle,
        semaphore: Option<FluentSemaphoreHandle>,
        fence: Option<FluentFenceHandle>,
    ) -> FluentResult<u32> {
        let mut state = self.state();
        if let Some(semaphore) = semaphore {
            lookup_mut(&mut state.semaphores, semaphore.key(), "semaphore")?.signaled = true;
        }

        if let Some(fence) = fence {
            lookup_mut(&mut state.fences, fence.key(), "fence")?.signaled = true;
        }

        let swapchain = lookup_mut(&mut state.swapchains, swapchain.key(), "swapchain")?;
        let image_index = swapchain.next_image_index;
        swapchain.next_image_index = (image_index + 1) % swapchain.image_count;
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
        let queue_type = lookup(&state.queues, queue.key(), "queue")?.queue_type;
        let key = state.command_pools.insert(HeadlessCommandPool {
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
        for command_buffer in command_pool.command_buffers {
            state.command_buffers.remove(command_buffer.key());
        }

        Ok(())
    }

    fn create_command_buffers(
        &self,
        command_pool: FluentCommandPoolHandle,
        count: u32,
    ) -> FluentResult<Vec<FluentCommandBufferHandle>> {
        let mut state = self.state();
        let queue_type =
            lookup(&state.command_pools, command_pool.key(), "command pool")?.queue_type;

        let mut handles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = state.command_buffers.insert(HeadlessCommandBuffer {
                command_pool,
                queue_type,
                recording_state: RecordingState::Initial,
                commands: Vec::default(),
                render_pass_attachments: None,
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
        for command_buffer in command_buffers {
            let owner = lookup(
                &state.command_buffers,
                command_buffer.key(),
                "command buffer",
            )?
            .command_pool;
            if owner != command_pool {
                Err("command buffers must be freed to the pool they were allocated from")?;
            }
        }

        let pool = lookup_mut(&mut state.command_pools, command_pool.key(), "command pool")?;
        pool.command_buffers
            .retain(|x| !command_buffers.contains(x));
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

        command_buffer.recording_state = RecordingState::Recording;
        command_buffer.commands.clear();
        command_buffer.render_pass_attachments = None;
        command_buffer.bound_pipeline = None;
        Ok(())
    }

    fn end_command_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if command_buffer.render_pass_attachments.is_some() {
            Err("command buffer ended inside a render pass")?;
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
        let mut stages = FluentShaderStageFlags::empty();
        for (stage, bytecode) in shader_info.stages() {
            if bytecode.len() % 4 != 0 {
                Err(format!(
                    "{:?} bytecode is {} bytes, not a whole number of words",
                    stage,
                    bytecode.len()
                ))?;
            }

            stages |= stage;
        }

        let key = self.state().shaders.insert(HeadlessShader { stages });
        Ok(FluentShaderHandle::new(key))
    }

    fn destroy_shader(
        &self,
        shader: FluentShaderHandle,
    ) -> FluentResult<()> {
        take(&mut self.state().shaders, shader.key(), "shader").map(|_| ())
    }

    fn create_descriptor_set_layout(
        &self,
        reflection: &FluentReflectionData,
    ) -> FluentResult<FluentDescriptorSetLayoutHandle> {
        // Fail at layout creation rather than at the first allocation
        for set in 0..reflection.set_count() {
            DescriptorSetCost::for_bindings(reflection.bindings_in_set(set))?;
        }

        let key = self
            .state()
            .descriptor_set_layouts
            .insert(HeadlessDescriptorSetLayout {
                reflection: reflection.clone(),
            });
        Ok(FluentDescriptorSetLayoutHandle::new(key))
    }

    fn destroy_descriptor_set_layout(
        &self,
        descriptor_set_layout: FluentDescriptorSetLayoutHandle,
    ) -> FluentResult<()> {
        take(
            &mut self.state().descriptor_set_layouts,
            descriptor_set_layout.key(),
            "descriptor set layout",
        )
        .map(|_| ())
    }

    fn create_graphics_pipeline(
        &self,
        pipeline_info: &FluentPipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        let mut state = self.state();
        let state = &mut *state;
        let shader = lookup(&state.shaders, pipeline_info.shader.handle().key(), "shader")?;
        if !shader.stages.contains(FluentShaderStageFlags::VERTEX) {
            Err("graphics pipelines need a vertex stage")?;
        }

        lookup(
            &state.descriptor_set_layouts,
            pipeline_info.descriptor_set_layout.handle().key(),
            "descriptor set layout",
        )?;

        let render_pass_key = FluentRenderPassKey::for_pipeline(
            &pipeline_info.color_attachment_formats,
            pipeline_info.depth_stencil_format,
            pipeline_info.sample_count,
        );
        let next_native_id = &mut state.next_native_id;
        let render_pass = state
            .pass_cache
            .get_or_create_render_pass(&render_pass_key, |_| {
                *next_native_id += 1;
                Ok(*next_native_id)
            })?;

        let key = state.pipelines.insert(HeadlessPipeline {
            pipeline_type: FluentPipelineType::Graphics,
            render_pass: Some(render_pass),
        });
        Ok(FluentPipelineHandle::new(key))
    }

    fn create_compute_pipeline(
        &self,
        pipeline_info: &FluentComputePipelineInfo,
    ) -> FluentResult<FluentPipelineHandle> {
        let mut state = self.state();
        lookup(&state.shaders, pipeline_info.shader.handle().key(), "shader")?;
        lookup(
            &state.descriptor_set_layouts,
            pipeline_info.descriptor_set_layout.handle().key(),
            "descriptor set layout",
        )?;

        let key = state.pipelines.insert(HeadlessPipeline {
            pipeline_type: FluentPipelineType::Compute,
            render_pass: None,
        });
        Ok(FluentPipelineHandle::new(key))
    }

    fn destroy_pipeline(
        &self,
        pipeline: FluentPipelineHandle,
    ) -> FluentResult<()> {
        let pipeline = take(&mut self.state().pipelines, pipeline.key(), "pipeline")?;
        log::trace!(
            "Destroyed {:?} pipeline (render pass {:?} stays cached)",
            pipeline.pipeline_type,
            pipeline.render_pass
        );
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
        let bindings: Vec<_> = layout.reflection.bindings_in_set(set).cloned().collect();
        let cost = DescriptorSetCost::for_bindings(&bindings)?;
        state.descriptor_pool.allocate(&cost)?;

        let key = state.descriptor_sets.insert(HeadlessDescriptorSet {
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
        Ok(())
    }

    fn update_descriptor_set(
        &self,
        descriptor_set: FluentDescriptorSetHandle,
        writes: &[FluentResolvedDescriptorWrite],
    ) -> FluentResult<()> {
        let mut state = self.state();
        for write in writes {
            match &write.write.descriptors {
                FluentDescriptors::Buffers(buffers) => {
                    for descriptor in buffers {
                        state.verify_buffer(descriptor.buffer)?;
                        if descriptor.offset + descriptor.range > descriptor.buffer.size() {
                            Err(format!(
                                "descriptor {} range exceeds the buffer",
                                write.binding.name
                            ))?;
                        }
                    }
                }
                FluentDescriptors::Images(images) => {
                    for descriptor in images {
                        state.verify_image(descriptor.image)?;
                    }
                }
                FluentDescriptors::Samplers(samplers) => {
                    for descriptor in samplers {
                        lookup(
                            &state.samplers,
                            descriptor.sampler.handle().key(),
                            "sampler",
                        )?;
                    }
                }
            }
        }

        let descriptor_set = lookup(
            &state.descriptor_sets,
            descriptor_set.key(),
            "descriptor set",
        )?;
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
        let key = self.state().buffers.insert(HeadlessBuffer {
            info: *buffer_info,
            data: vec![0; buffer_info.size as usize],
            mapped: false,
        });
        log::trace!("Created buffer {:?} of {} bytes", key, buffer_info.size);
        Ok(FluentBufferHandle::new(key))
    }

    fn destroy_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        let buffer = take(&mut self.state().buffers, buffer.key(), "buffer")?;
        if buffer.mapped {
            log::warn!("Destroyed a buffer of {} bytes while mapped", buffer.info.size);
        }

        Ok(())
    }

    fn map_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<*mut u8> {
        let mut state = self.state();
        let buffer = lookup_mut(&mut state.buffers, buffer.key(), "buffer")?;
        buffer.mapped = true;
        // The vector is never resized, so the pointer stays valid while the buffer lives
        Ok(buffer.data.as_mut_ptr())
    }

    fn unmap_buffer(
        &self,
        buffer: FluentBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        lookup_mut(&mut state.buffers, buffer.key(), "buffer")?.mapped = false;
        Ok(())
    }

    fn create_image(
        &self,
        image_info: &FluentImageInfo,
    ) -> FluentResult<FluentImageHandle> {
        let key = self
            .state()
            .images
            .insert(HeadlessImage::new(*image_info, false));
        Ok(FluentImageHandle::new(key))
    }

    fn destroy_image(
        &self,
        image: FluentImageHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let destroyed = take(&mut state.images, image.key(), "image")?;
        if destroyed.owned_by_swapchain {
            log::error!("Destroyed a swapchain image directly");
        }

        state.pass_cache.remove_framebuffers_referencing(image);
        Ok(())
    }

    fn create_sampler(
        &self,
        _sampler_info: &FluentSamplerInfo,
    ) -> FluentResult<FluentSamplerHandle> {
        let key = self.state().samplers.insert(HeadlessSampler);
        Ok(FluentSamplerHandle::new(key))
    }

    fn destroy_sampler(
        &self,
        sampler: FluentSamplerHandle,
    ) -> FluentResult<()> {
        take(&mut self.state().samplers, sampler.key(), "sampler").map(|_| ())
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

        for attachment in begin_info
            .color_attachments
            .iter()
            .chain(begin_info.depth_attachment.iter())
        {
            state.verify_image(attachment.image)?;
        }

        if state
            .recording_command_buffer(command_buffer)?
            .render_pass_attachments
            .is_some()
        {
            Err("render passes can't be nested")?;
        }

        let render_pass_key = FluentRenderPassKey::from_begin_info(begin_info);
        let framebuffer_key = FluentFramebufferKey::from_begin_info(render_pass_key.clone(), begin_info);

        let next_native_id = &mut state.next_native_id;
        let render_pass = state
            .pass_cache
            .get_or_create_render_pass(&render_pass_key, |key| {
                *next_native_id += 1;
                log::debug!(
                    "Created render pass {} with {} attachments",
                    next_native_id,
                    key.attachment_count()
                );
                Ok(*next_native_id)
            })?;
        let framebuffer = state
            .pass_cache
            .get_or_create_framebuffer(&framebuffer_key, |_| {
                *next_native_id += 1;
                Ok(*next_native_id)
            })?;
        log::trace!(
            "Begin render pass {} with framebuffer {}",
            render_pass,
            framebuffer
        );

        let attachments: Vec<_> = begin_info
            .color_attachments
            .iter()
            .chain(begin_info.depth_attachment.iter())
            .map(|x| HeadlessAttachment {
                image: x.image.handle(),
                load_op: x.load_op,
                clear_value: x.clear_value,
                state: x.state,
            })
            .collect();

        let command_buffer = state.recording_command_buffer(command_buffer)?;
        command_buffer.commands.push(HeadlessCommand::BeginRenderPass {
            width: begin_info.width,
            height: begin_info.height,
            attachments: attachments.clone(),
        });
        command_buffer.render_pass_attachments = Some(attachments);
        Ok(())
    }

    fn cmd_end_render_pass(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if command_buffer.render_pass_attachments.take().is_none() {
            Err("cmd_end_render_pass without a matching cmd_begin_render_pass")?;
        }

        Ok(())
    }

    fn cmd_barrier(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer_barriers: &[FluentBufferBarrier],
        image_barriers: &[FluentImageBarrier],
    ) -> FluentResult<()> {
        let mut state = self.state();
        for barrier in buffer_barriers {
            state.verify_buffer(barrier.buffer)?;
        }

        for barrier in image_barriers {
            state.verify_image(barrier.image)?;
        }

        for barrier in image_barriers {
            state.record(
                command_buffer,
                HeadlessCommand::ImageBarrier {
                    image: barrier.image.handle(),
                    old_state: barrier.old_state,
                    new_state: barrier.new_state,
                },
            )?;
        }

        if image_barriers.is_empty() {
            // Buffer barriers have no CPU-side effect, but the same rules apply to them
            let command_buffer = state.recording_command_buffer(command_buffer)?;
            if command_buffer.render_pass_attachments.is_some() {
                Err("barriers can't be recorded inside a render pass")?;
            }
        }

        Ok(())
    }

    fn cmd_set_viewport(
        &self,
        command_buffer: FluentCommandBufferHandle,
        _x: f32,
        _y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.recording_command_buffer(command_buffer)?;
        if width <= 0.0 || height <= 0.0 || min_depth > max_depth {
            Err(format!(
                "invalid viewport {}x{} depth {}..{}",
                width, height, min_depth, max_depth
            ))?;
        }

        Ok(())
    }

    fn cmd_set_scissor(
        &self,
        command_buffer: FluentCommandBufferHandle,
        x: i32,
        y: i32,
        _width: u32,
        _height: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.recording_command_buffer(command_buffer)?;
        if x < 0 || y < 0 {
            Err("scissor offset can't be negative")?;
        }

        Ok(())
    }

    fn cmd_bind_pipeline(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let pipeline_type = lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?.pipeline_type;
        state.recording_command_buffer(command_buffer)?.bound_pipeline = Some(pipeline_type);
        Ok(())
    }

    fn cmd_bind_vertex_buffer(
        &self,
        command_buffer: FluentCommandBufferHandle,
        _first_binding: u32,
        buffer: &FluentBuffer,
        _offset: u64,
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.verify_buffer(buffer)?;
        state.recording_command_buffer(command_buffer)?;
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
        state.verify_buffer(buffer)?;
        if offset % index_type.size_in_bytes() as u64 != 0 {
            Err("index buffer offset must be a multiple of the index size")?;
        }

        state.recording_command_buffer(command_buffer)?;
        Ok(())
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        descriptor_set: &FluentDescriptorSet,
    ) -> FluentResult<()> {
        let mut state = self.state();
        lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?;
        lookup(
            &state.descriptor_sets,
            descriptor_set.handle().key(),
            "descriptor set",
        )?;
        state.recording_command_buffer(command_buffer)?;
        Ok(())
    }

    fn cmd_push_constants(
        &self,
        command_buffer: FluentCommandBufferHandle,
        pipeline: &FluentPipeline,
        _offset: u32,
        _data: &[u8],
    ) -> FluentResult<()> {
        let mut state = self.state();
        lookup(&state.pipelines, pipeline.handle().key(), "pipeline")?;
        state.recording_command_buffer(command_buffer)?;
        Ok(())
    }

    fn cmd_draw(
        &self,
        command_buffer: FluentCommandBufferHandle,
        _vertex_count: u32,
        _first_vertex: u32,
    ) -> FluentResult<()> {
        self.record_draw(command_buffer)
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: FluentCommandBufferHandle,
        _index_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
    ) -> FluentResult<()> {
        self.record_draw(command_buffer)
    }

    fn cmd_draw_indexed_indirect(
        &self,
        command_buffer: FluentCommandBufferHandle,
        buffer: &FluentBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> FluentResult<()> {
        {
            let state = self.state();
            state.verify_buffer(buffer)?;
        }

        // Five u32s per indexed indirect command
        const COMMAND_SIZE: u64 = 20;
        let stride = if draw_count > 1 { stride as u64 } else { COMMAND_SIZE };
        if stride < COMMAND_SIZE
            || offset + stride * (draw_count as u64 - 1) + COMMAND_SIZE > buffer.size()
        {
            Err("indirect draw commands exceed the buffer")?;
        }

        for _ in 0..draw_count {
            self.record_draw(command_buffer)?;
        }

        Ok(())
    }

    fn cmd_dispatch(
        &self,
        command_buffer: FluentCommandBufferHandle,
        _group_count_x: u32,
        _group_count_y: u32,
        _group_count_z: u32,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if command_buffer.render_pass_attachments.is_some() {
            Err("dispatch can't be recorded inside a render pass")?;
        }

        if command_buffer.bound_pipeline != Some(FluentPipelineType::Compute) {
            Err("dispatch requires a bound compute pipeline")?;
        }

        command_buffer.commands.push(HeadlessCommand::Dispatch);
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
        state.verify_buffer(src_buffer)?;
        state.verify_buffer(dst_buffer)?;
        state.record(
            command_buffer,
            HeadlessCommand::CopyBuffer {
                src_buffer: src_buffer.handle(),
                src_offset,
                dst_buffer: dst_buffer.handle(),
                dst_offset,
                size,
            },
        )
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        src_buffer: &FluentBuffer,
        dst_image: &FluentImage,
        copy: &FluentBufferImageCopy,
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.verify_buffer(src_buffer)?;
        state.verify_image(dst_image)?;
        state.record(
            command_buffer,
            HeadlessCommand::CopyBufferToImage {
                src_buffer: src_buffer.handle(),
                dst_image: dst_image.handle(),
                copy: *copy,
            },
        )
    }

    fn cmd_clear_color_image(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        resource_state: FluentResourceState,
        color: [f32; 4],
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.verify_image(image)?;
        let image = image.handle();
        state.record(
            command_buffer,
            HeadlessCommand::ImageBarrier {
                image,
                old_state: resource_state,
                new_state: FluentResourceState::TRANSFER_DST,
            },
        )?;
        state.record(command_buffer, HeadlessCommand::ClearColorImage { image, color })?;
        state.record(
            command_buffer,
            HeadlessCommand::ImageBarrier {
                image,
                old_state: FluentResourceState::TRANSFER_DST,
                new_state: resource_state,
            },
        )
    }

    fn cmd_generate_mipmaps(
        &self,
        command_buffer: FluentCommandBufferHandle,
        image: &FluentImage,
        resource_state: FluentResourceState,
    ) -> FluentResult<()> {
        let mut state = self.state();
        state.verify_image(image)?;
        state.record(
            command_buffer,
            HeadlessCommand::GenerateMipmaps {
                image: image.handle(),
                state: resource_state,
            },
        )
    }
}

impl FluentDeviceHeadless {
    fn record_draw(
        &self,
        command_buffer: FluentCommandBufferHandle,
    ) -> FluentResult<()> {
        let mut state = self.state();
        let command_buffer = state.recording_command_buffer(command_buffer)?;
        if command_buffer.render_pass_attachments.is_none() {
            Err("draws must be recorded inside a render pass")?;
        }

        if command_buffer.bound_pipeline != Some(FluentPipelineType::Graphics) {
            Err("draws require a bound graphics pipeline")?;
        }

        command_buffer.commands.push(HeadlessCommand::Draw);
        Ok(())
    }
}
