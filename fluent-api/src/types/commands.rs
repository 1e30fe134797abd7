use super::*;
use crate::{
    FluentBuffer, FluentCommandBuffer, FluentFence, FluentImage, FluentQueue, FluentSampler,
    FluentSemaphore, FluentSwapchain,
};

/// One attachment of a render pass
#[derive(Copy, Clone, Debug)]
pub struct FluentAttachmentInfo<'a> {
    pub image: &'a FluentImage,
    pub load_op: FluentLoadOp,
    pub clear_value: FluentClearValue,
    /// State the image is in for the duration of the pass. Also its layout before and after.
    pub state: FluentResourceState,
}

impl<'a> FluentAttachmentInfo<'a> {
    pub fn color(
        image: &'a FluentImage,
        load_op: FluentLoadOp,
        clear_value: FluentClearValue,
    ) -> Self {
        FluentAttachmentInfo {
            image,
            load_op,
            clear_value,
            state: FluentResourceState::COLOR_ATTACHMENT,
        }
    }

    pub fn depth_stencil(
        image: &'a FluentImage,
        load_op: FluentLoadOp,
        clear_value: FluentClearValue,
    ) -> Self {
        FluentAttachmentInfo {
            image,
            load_op,
            clear_value,
            state: FluentResourceState::DEPTH_STENCIL_WRITE,
        }
    }
}

/// Everything needed to begin a render pass. Backends that need retained render pass and
/// framebuffer objects derive (and cache) them from this.
#[derive(Clone, Debug)]
pub struct FluentRenderPassBeginInfo<'a> {
    pub width: u32,
    pub height: u32,
    pub color_attachments: Vec<FluentAttachmentInfo<'a>>,
    pub depth_attachment: Option<FluentAttachmentInfo<'a>>,
}

impl<'a> FluentRenderPassBeginInfo<'a> {
    pub fn verify(&self) {
        assert!(self.width > 0 && self.height > 0);
        assert!(
            self.color_attachments.len() <= MAX_ATTACHMENTS_COUNT,
            "render pass has {} color attachments, max is {}",
            self.color_attachments.len(),
            MAX_ATTACHMENTS_COUNT
        );
        assert!(
            !self.color_attachments.is_empty() || self.depth_attachment.is_some(),
            "render pass needs at least one attachment"
        );

        for attachment in &self.color_attachments {
            assert!(!attachment.image.format().is_depth_or_stencil());
        }

        if let Some(depth_attachment) = &self.depth_attachment {
            assert!(depth_attachment.image.format().is_depth_or_stencil());
        }
    }
}

/// Memory barrier for a buffer. Queues are only needed for queue ownership transfers.
#[derive(Copy, Clone, Debug)]
pub struct FluentBufferBarrier<'a> {
    pub buffer: &'a FluentBuffer,
    pub old_state: FluentResourceState,
    pub new_state: FluentResourceState,
    pub src_queue: Option<&'a FluentQueue>,
    pub dst_queue: Option<&'a FluentQueue>,
    pub offset: u64,
    /// Zero means the whole buffer
    pub size: u64,
}

impl<'a> FluentBufferBarrier<'a> {
    pub fn state_transition(
        buffer: &'a FluentBuffer,
        old_state: FluentResourceState,
        new_state: FluentResourceState,
    ) -> Self {
        FluentBufferBarrier {
            buffer,
            old_state,
            new_state,
            src_queue: None,
            dst_queue: None,
            offset: 0,
            size: 0,
        }
    }
}

/// Layout transition and memory barrier for every subresource of an image
#[derive(Copy, Clone, Debug)]
pub struct FluentImageBarrier<'a> {
    pub image: &'a FluentImage,
    pub old_state: FluentResourceState,
    pub new_state: FluentResourceState,
    pub src_queue: Option<&'a FluentQueue>,
    pub dst_queue: Option<&'a FluentQueue>,
}

impl<'a> FluentImageBarrier<'a> {
    pub fn state_transition(
        image: &'a FluentImage,
        old_state: FluentResourceState,
        new_state: FluentResourceState,
    ) -> Self {
        FluentImageBarrier {
            image,
            old_state,
            new_state,
            src_queue: None,
            dst_queue: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct FluentQueueSubmitInfo<'a> {
    pub wait_semaphores: Vec<&'a FluentSemaphore>,
    pub command_buffers: Vec<&'a FluentCommandBuffer>,
    pub signal_semaphores: Vec<&'a FluentSemaphore>,
    pub signal_fence: Option<&'a FluentFence>,
}

#[derive(Clone)]
pub struct FluentQueuePresentInfo<'a> {
    pub wait_semaphores: Vec<&'a FluentSemaphore>,
    pub swapchain: &'a FluentSwapchain,
    pub image_index: u32,
}

/// Where to copy from/to when copying a buffer into an image
#[derive(Copy, Clone, Debug, Default)]
pub struct FluentBufferImageCopy {
    pub buffer_offset: u64,
    pub mip_level: u32,
    pub array_layer: u32,
    /// Zero means the full extent of the mip level
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct FluentBufferDescriptor<'a> {
    pub buffer: &'a FluentBuffer,
    pub offset: u64,
    /// Zero means the remainder of the buffer
    pub range: u64,
}

#[derive(Copy, Clone, Debug)]
pub struct FluentImageDescriptor<'a> {
    pub image: &'a FluentImage,
    /// State the image will be in when the descriptor is used. Picks the image layout, and GENERAL
    /// selects storage access.
    pub resource_state: FluentResourceState,
    pub mip_level: Option<u32>,
}

#[derive(Copy, Clone, Debug)]
pub struct FluentSamplerDescriptor<'a> {
    pub sampler: &'a FluentSampler,
}

#[derive(Clone, Debug)]
pub enum FluentDescriptors<'a> {
    Buffers(Vec<FluentBufferDescriptor<'a>>),
    Images(Vec<FluentImageDescriptor<'a>>),
    Samplers(Vec<FluentSamplerDescriptor<'a>>),
}

impl<'a> FluentDescriptors<'a> {
    pub fn len(&self) -> usize {
        match self {
            FluentDescriptors::Buffers(x) => x.len(),
            FluentDescriptors::Images(x) => x.len(),
            FluentDescriptors::Samplers(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes descriptors into the binding with the given name. The name is resolved against the
/// reflection data of the descriptor set's layout.
#[derive(Clone, Debug)]
pub struct FluentDescriptorWrite<'a> {
    pub descriptor_name: &'a str,
    pub descriptor_count: u32,
    pub descriptors: FluentDescriptors<'a>,
}

impl<'a> FluentDescriptorWrite<'a> {
    pub fn verify(&self) {
        assert!(self.descriptor_count > 0);
        assert_eq!(
            self.descriptor_count as usize,
            self.descriptors.len(),
            "descriptor write '{}' count does not match the descriptors provided",
            self.descriptor_name
        );
    }
}
