use crate::*;

/// A queue allows work to be submitted to the GPU
///
/// Work that has been submitted to the same queue executes in submission order. Ordering between
/// queues only exists through semaphores passed to `submit`.
///
/// Resources may only be accessed from one queue type at a time. If a resource is to be used by
/// a different queue, a barrier naming both queues is required.
#[derive(Clone)]
pub struct FluentQueue {
    device: FluentDevice,
    handle: FluentQueueHandle,
    queue_type: FluentQueueType,
}

impl std::fmt::Debug for FluentQueue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FluentQueue")
            .field("handle", &self.handle)
            .field("queue_type", &self.queue_type)
            .finish()
    }
}

impl FluentQueue {
    pub(crate) fn new(
        device: FluentDevice,
        handle: FluentQueueHandle,
        queue_type: FluentQueueType,
    ) -> Self {
        FluentQueue {
            device,
            handle,
            queue_type,
        }
    }

    pub fn device(&self) -> &FluentDevice {
        &self.device
    }

    pub fn handle(&self) -> FluentQueueHandle {
        self.handle
    }

    /// Get the type of queue that this is
    pub fn queue_type(&self) -> FluentQueueType {
        self.queue_type
    }

    /// Create a command pool for use with this queue
    pub fn create_command_pool(&self) -> FluentResult<FluentCommandPool> {
        let handle = self.device.inner().create_command_pool(self.handle)?;
        Ok(FluentCommandPool {
            handle,
            queue_type: self.queue_type,
        })
    }

    pub fn destroy_command_pool(
        &self,
        command_pool: &FluentCommandPool,
    ) -> FluentResult<()> {
        self.device.inner().destroy_command_pool(command_pool.handle)
    }

    /// Allocate command buffers out of a pool created from this queue
    pub fn create_command_buffers(
        &self,
        command_pool: &FluentCommandPool,
        count: u32,
    ) -> FluentResult<Vec<FluentCommandBuffer>> {
        assert!(count > 0);
        assert_eq!(command_pool.queue_type, self.queue_type);

        let handles = self
            .device
            .inner()
            .create_command_buffers(command_pool.handle, count)?;
        Ok(handles
            .into_iter()
            .map(|handle| FluentCommandBuffer::new(self.device.clone(), handle, self.queue_type))
            .collect())
    }

    /// Return command buffers to their pool. They must not be in use by the GPU.
    pub fn free_command_buffers(
        &self,
        command_pool: &FluentCommandPool,
        command_buffers: &[FluentCommandBuffer],
    ) -> FluentResult<()> {
        let handles: Vec<_> = command_buffers.iter().map(|x| x.handle()).collect();
        self.device
            .inner()
            .free_command_buffers(command_pool.handle, &handles)
    }

    /// Block until all work submitted to this queue completes
    pub fn wait_idle(&self) -> FluentResult<()> {
        self.device.inner().queue_wait_idle(self.handle)
    }

    /// Submit command buffers for processing by the GPU.
    ///
    /// Execution will not begin until all `wait_semaphores` are signaled.
    ///
    /// After execution, the given `signal_semaphores` and `signal_fence` are signaled as completed.
    pub fn submit(
        &self,
        submit_info: &FluentQueueSubmitInfo,
    ) -> FluentResult<()> {
        profiling::scope!("FluentQueue::submit");
        assert!(
            !submit_info.command_buffers.is_empty(),
            "submit requires at least one command buffer"
        );
        for command_buffer in &submit_info.command_buffers {
            assert_eq!(
                command_buffer.queue_type(),
                self.queue_type,
                "command buffer was recorded for a {:?} queue",
                command_buffer.queue_type()
            );
        }

        self.device.inner().queue_submit(self.handle, submit_info)
    }

    /// Submit and block until the work completes. Intended for uploads and tools, not per-frame
    /// work.
    pub fn immediate_submit(
        &self,
        command_buffer: &FluentCommandBuffer,
    ) -> FluentResult<()> {
        self.submit(&FluentQueueSubmitInfo {
            command_buffers: vec![command_buffer],
            ..Default::default()
        })?;
        self.wait_idle()
    }

    /// Presents an image in the swapchain.
    ///
    /// Execution will not begin until all `wait_semaphores` are signaled.
    pub fn present(
        &self,
        present_info: &FluentQueuePresentInfo,
    ) -> FluentResult<FluentPresentResult> {
        profiling::scope!("FluentQueue::present");
        assert!(
            (present_info.image_index as usize) < present_info.swapchain.image_count(),
            "image index {} out of range",
            present_info.image_index
        );

        self.device.inner().queue_present(self.handle, present_info)
    }
}
