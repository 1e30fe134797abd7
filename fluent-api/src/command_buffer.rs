use crate::*;

/// A list of commands recorded by the CPU and submitted to the GPU.
///
/// It cannot be created directly. It must be allocated out of a pool with
/// `FluentQueue::create_command_buffers`.
///
/// Do not record into a command buffer that is still in use by the GPU. Resources referenced by a
/// submitted command buffer must stay alive until the work completes.
#[derive(Clone)]
pub struct FluentCommandBuffer {
    device: FluentDevice,
    handle: FluentCommandBufferHandle,
    queue_type: FluentQueueType,
}

impl std::fmt::Debug for FluentCommandBuffer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FluentCommandBuffer")
            .field("handle", &self.handle)
            .field("queue_type", &self.queue_type)
            .finish()
    }
}

impl FluentCommandBuffer {
    pub(crate) fn new(
        device: FluentDevice,
        handle: FluentCommandBufferHandle,
        queue_type: FluentQueueType,
    ) -> Self {
        FluentCommandBuffer {
            device,
            handle,
            queue_type,
        }
    }

    pub fn handle(&self) -> FluentCommandBufferHandle {
        self.handle
    }

    pub fn queue_type(&self) -> FluentQueueType {
        self.queue_type
    }

    /// Begins writing a command buffer. Previously recorded commands are discarded.
    pub fn begin(&self) -> FluentResult<()> {
        self.device.inner().begin_command_buffer(self.handle)
    }

    /// End writing the command buffer. This must be called before submitting the command buffer
    /// to the GPU
    pub fn end(&self) -> FluentResult<()> {
        self.device.inner().end_command_buffer(self.handle)
    }

    /// Begin a render pass. The backend looks up (or creates) a render pass and framebuffer that
    /// match the attachments. Attachments must already be in the state given for them.
    pub fn cmd_begin_render_pass(
        &self,
        begin_info: &FluentRenderPassBeginInfo,
    ) -> FluentResult<()> {
        profiling::scope!("FluentCommandBuffer::cmd_begin_render_pass");
        assert_eq!(
            self.queue_type,
            FluentQueueType::Graphics,
            "render passes require a graphics queue"
        );
        begin_info.verify();
        self.device
            .inner()
            .cmd_begin_render_pass(self.handle, begin_info)
    }

    pub fn cmd_end_render_pass(&self) -> FluentResult<()> {
        self.device.inner().cmd_end_render_pass(self.handle)
    }

    /// Record a memory barrier and state transition for buffers and images
    pub fn cmd_barrier(
        &self,
        buffer_barriers: &[FluentBufferBarrier],
        image_barriers: &[FluentImageBarrier],
    ) -> FluentResult<()> {
        if buffer_barriers.is_empty() && image_barriers.is_empty() {
            return Ok(());
        }

        for barrier in buffer_barriers {
            assert_eq!(
                barrier.src_queue.is_some(),
                barrier.dst_queue.is_some(),
                "queue transitions need both a source and a destination queue"
            );
        }

        for barrier in image_barriers {
            assert_eq!(
                barrier.src_queue.is_some(),
                barrier.dst_queue.is_some(),
                "queue transitions need both a source and a destination queue"
            );
        }

        self.device
            .inner()
            .cmd_barrier(self.handle, buffer_barriers, image_barriers)
    }

    pub fn cmd_set_viewport(
        &self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) -> FluentResult<()> {
        self.device
            .inner()
            .cmd_set_viewport(self.handle, x, y, width, height, min_depth, max_depth)
    }

    pub fn cmd_set_scissor(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> FluentResult<()> {
        self.device
            .inner()
            .cmd_set_scissor(self.handle, x, y, width, height)
    }

    pub fn cmd_bind_pipeline(
        &self,
        pipeline: &FluentPipeline,
    ) -> FluentResult<()> {
        if pipeline.pipeline_type() == FluentPipelineType::Graphics {
            assert_eq!(self.queue_type, FluentQueueType::Graphics);
        }

        self.device.inner().cmd_bind_pipeline(self.handle, pipeline)
    }

    pub fn cmd_bind_vertex_buffer(
        &self,
        first_binding: u32,
        buffer: &FluentBuffer,
        offset: u64,
    ) -> FluentResult<()> {
        assert!(offset < buffer.size());
        assert!((first_binding as usize) < MAX_VERTEX_BINDING_COUNT);
        self.device
            .inner()
            .cmd_bind_vertex_buffer(self.handle, first_binding, buffer, offset)
    }

    pub fn cmd_bind_index_buffer(
        &self,
        buffer: &FluentBuffer,
        offset: u64,
        index_type: FluentIndexType,
    ) -> FluentResult<()> {
        assert!(offset < buffer.size());
        self.device
            .inner()
            .cmd_bind_index_buffer(self.handle, buffer, offset, index_type)
    }

    pub fn cmd_bind_descriptor_set(
        &self,
        pipeline: &FluentPipeline,
        descriptor_set: &FluentDescriptorSet,
    ) -> FluentResult<()> {
        assert_eq!(
            pipeline.descriptor_set_layout().handle(),
            descriptor_set.layout().handle(),
            "descriptor set was created from a different layout than the pipeline's"
        );
        self.device
            .inner()
            .cmd_bind_descriptor_set(self.handle, pipeline, descriptor_set)
    }

    /// Push constant data is visible to every stage. `offset + data.len()` may not exceed
    /// `MAX_PUSH_CONSTANT_RANGE`.
    pub fn cmd_push_constants(
        &self,
        pipeline: &FluentPipeline,
        offset: u32,
        data: &[u8],
    ) -> FluentResult<()> {
        assert!(!data.is_empty());
        assert!(
            offset as usize + data.len() <= MAX_PUSH_CONSTANT_RANGE as usize,
            "push constants at offset {} with {} bytes exceed {} bytes",
            offset,
            data.len(),
            MAX_PUSH_CONSTANT_RANGE
        );
        self.device
            .inner()
            .cmd_push_constants(self.handle, pipeline, offset, data)
    }

    pub fn cmd_draw(
        &self,
        vertex_count: u32,
        first_vertex: u32,
    ) -> FluentResult<()> {
        assert!(vertex_count > 0);
        self.device
            .inner()
            .cmd_draw(self.handle, vertex_count, first_vertex)
    }

    pub fn cmd_draw_indexed(
        &self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> FluentResult<()> {
        assert!(index_count > 0);
        self.device
            .inner()
            .cmd_draw_indexed(self.handle, index_count, first_index, vertex_offset)
    }

    pub fn cmd_draw_indexed_indirect(
        &self,
        buffer: &FluentBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> FluentResult<()> {
        assert!(
            buffer
                .info()
                .descriptor_type
                .contains(FluentDescriptorType::INDIRECT_BUFFER),
            "indirect draws need a buffer created with INDIRECT_BUFFER"
        );
        assert!(draw_count > 0);
        self.device.inner().cmd_draw_indexed_indirect(
            self.handle,
            buffer,
            offset,
            draw_count,
            stride,
        )
    }

    pub fn cmd_dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> FluentResult<()> {
        assert!(group_count_x > 0 && group_count_y > 0 && group_count_z > 0);
        self.device.inner().cmd_dispatch(
            self.handle,
            group_count_x,
            group_count_y,
            group_count_z,
        )
    }

    pub fn cmd_copy_buffer(
        &self,
        src_buffer: &FluentBuffer,
        src_offset: u64,
        dst_buffer: &FluentBuffer,
        dst_offset: u64,
        size: u64,
    ) -> FluentResult<()> {
        assert!(size > 0);
        assert!(src_offset + size <= src_buffer.size());
        assert!(dst_offset + size <= dst_buffer.size());
        self.device.inner().cmd_copy_buffer(
            self.handle,
            src_buffer,
            src_offset,
            dst_buffer,
            dst_offset,
            size,
        )
    }

    /// The image must be in TRANSFER_DST state
    pub fn cmd_copy_buffer_to_image(
        &self,
        src_buffer: &FluentBuffer,
        dst_image: &FluentImage,
        copy: &FluentBufferImageCopy,
    ) -> FluentResult<()> {
        assert!(copy.mip_level < dst_image.mip_levels());
        assert!(copy.array_layer < dst_image.info().layer_count);
        self.device
            .inner()
            .cmd_copy_buffer_to_image(self.handle, src_buffer, dst_image, copy)
    }

    pub fn cmd_clear_color_image(
        &self,
        image: &FluentImage,
        state: FluentResourceState,
        color: [f32; 4],
    ) -> FluentResult<()> {
        assert!(
            !image.format().is_depth_or_stencil(),
            "clear_color_image can't clear depth/stencil images"
        );
        self.device
            .inner()
            .cmd_clear_color_image(self.handle, image, state, color)
    }

    /// Fill every mip level below 0 by successive downsampling
    pub fn cmd_generate_mipmaps(
        &self,
        image: &FluentImage,
        state: FluentResourceState,
    ) -> FluentResult<()> {
        if image.mip_levels() <= 1 {
            return Ok(());
        }

        self.device
            .inner()
            .cmd_generate_mipmaps(self.handle, image, state)
    }
}
