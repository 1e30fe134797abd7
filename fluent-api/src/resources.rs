//! Plain resource objects. Each carries its backend handle plus the metadata needed to use it
//! without asking the backend (sizes, formats, reflection data).
//!
//! These are destroyed explicitly through the `FluentDevice` that created them. Using one after it
//! was destroyed fails with `FluentError::StaleHandle`.

use crate::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FluentBuffer {
    pub(crate) handle: FluentBufferHandle,
    pub(crate) info: FluentBufferInfo,
}

impl FluentBuffer {
    pub fn handle(&self) -> FluentBufferHandle {
        self.handle
    }

    pub fn info(&self) -> &FluentBufferInfo {
        &self.info
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }
}

#[derive(Clone, Debug)]
pub struct FluentImage {
    pub(crate) handle: FluentImageHandle,
    pub(crate) info: FluentImageInfo,
    pub(crate) owned_by_swapchain: bool,
}

impl FluentImage {
    pub fn handle(&self) -> FluentImageHandle {
        self.handle
    }

    pub fn info(&self) -> &FluentImageInfo {
        &self.info
    }

    pub fn format(&self) -> FluentFormat {
        self.info.format
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn mip_levels(&self) -> u32 {
        self.info.mip_levels
    }

    /// Swapchain images are destroyed with their swapchain, never directly
    pub fn is_swapchain_image(&self) -> bool {
        self.owned_by_swapchain
    }
}

#[derive(Clone, Debug)]
pub struct FluentSampler {
    pub(crate) handle: FluentSamplerHandle,
    pub(crate) info: FluentSamplerInfo,
}

impl FluentSampler {
    pub fn handle(&self) -> FluentSamplerHandle {
        self.handle
    }

    pub fn info(&self) -> &FluentSamplerInfo {
        &self.info
    }
}

/// Shader modules for one or more stages, with the reflection data of every stage merged
#[derive(Clone, Debug)]
pub struct FluentShader {
    pub(crate) handle: FluentShaderHandle,
    pub(crate) stages: FluentShaderStageFlags,
    pub(crate) reflection: Arc<FluentReflectionData>,
}

impl FluentShader {
    pub fn handle(&self) -> FluentShaderHandle {
        self.handle
    }

    pub fn stages(&self) -> FluentShaderStageFlags {
        self.stages
    }

    pub fn reflection(&self) -> &FluentReflectionData {
        &self.reflection
    }
}

#[derive(Clone, Debug)]
pub struct FluentDescriptorSetLayout {
    pub(crate) handle: FluentDescriptorSetLayoutHandle,
    pub(crate) reflection: Arc<FluentReflectionData>,
}

impl FluentDescriptorSetLayout {
    pub fn handle(&self) -> FluentDescriptorSetLayoutHandle {
        self.handle
    }

    pub fn reflection(&self) -> &FluentReflectionData {
        &self.reflection
    }
}

/// One set index of a descriptor set layout, with storage for its descriptors
#[derive(Clone, Debug)]
pub struct FluentDescriptorSet {
    pub(crate) handle: FluentDescriptorSetHandle,
    pub(crate) set: u32,
    pub(crate) layout: FluentDescriptorSetLayout,
}

impl FluentDescriptorSet {
    pub fn handle(&self) -> FluentDescriptorSetHandle {
        self.handle
    }

    pub fn set(&self) -> u32 {
        self.set
    }

    pub fn layout(&self) -> &FluentDescriptorSetLayout {
        &self.layout
    }
}

#[derive(Clone, Debug)]
pub struct FluentPipeline {
    pub(crate) handle: FluentPipelineHandle,
    pub(crate) pipeline_type: FluentPipelineType,
    pub(crate) layout: FluentDescriptorSetLayout,
}

impl FluentPipeline {
    pub fn handle(&self) -> FluentPipelineHandle {
        self.handle
    }

    pub fn pipeline_type(&self) -> FluentPipelineType {
        self.pipeline_type
    }

    pub fn descriptor_set_layout(&self) -> &FluentDescriptorSetLayout {
        &self.layout
    }
}

#[derive(Clone, Debug)]
pub struct FluentSemaphore {
    pub(crate) handle: FluentSemaphoreHandle,
}

impl FluentSemaphore {
    pub fn handle(&self) -> FluentSemaphoreHandle {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct FluentFence {
    pub(crate) handle: FluentFenceHandle,
}

impl FluentFence {
    pub fn handle(&self) -> FluentFenceHandle {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct FluentCommandPool {
    pub(crate) handle: FluentCommandPoolHandle,
    pub(crate) queue_type: FluentQueueType,
}

impl FluentCommandPool {
    pub fn handle(&self) -> FluentCommandPoolHandle {
        self.handle
    }

    pub fn queue_type(&self) -> FluentQueueType {
        self.queue_type
    }
}
