use super::*;
use crate::{FluentDescriptorSetLayout, FluentQueue, FluentShader};
use std::sync::Arc;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Maximum color attachments in one render pass
pub const MAX_ATTACHMENTS_COUNT: usize = 10;
/// Bytes of push constant data available to every pipeline
pub const MAX_PUSH_CONSTANT_RANGE: u32 = 128;
pub const MAX_VERTEX_BINDING_COUNT: usize = 15;
pub const MAX_VERTEX_ATTRIBUTE_COUNT: usize = 15;
pub const MAX_DESCRIPTOR_BINDING_COUNT: usize = 15;
pub const MAX_SET_COUNT: usize = 10;
/// Default staging buffer size used by upload helpers
pub const DEFAULT_STAGING_BUFFER_SIZE: u64 = 25 * 1024 * 1024 * 8;

/// Sets per device-wide descriptor pool
pub const DESCRIPTOR_POOL_MAX_SETS: u32 = 2048 * DESCRIPTOR_POOL_TYPES.len() as u32;
/// Descriptors of each type per device-wide descriptor pool
pub const DESCRIPTOR_POOL_DESCRIPTORS_PER_TYPE: u32 = 1024;

/// Used to create a `FluentBackend`
#[derive(Clone)]
pub struct FluentBackendInfo {
    pub app_name: String,
    pub validation_mode: FluentValidationMode,
    /// Needed by backends that must know the surface type before creating an instance (vulkan)
    pub wsi: Option<Arc<dyn FluentWsi>>,
}

impl Default for FluentBackendInfo {
    fn default() -> Self {
        FluentBackendInfo {
            app_name: "fluent".to_string(),
            validation_mode: Default::default(),
            wsi: None,
        }
    }
}

/// Used to create a `FluentDevice`
#[derive(Copy, Clone, Debug)]
pub struct FluentDeviceInfo {
    pub max_descriptor_sets: u32,
    pub descriptors_per_type: u32,
}

impl Default for FluentDeviceInfo {
    fn default() -> Self {
        FluentDeviceInfo {
            max_descriptor_sets: DESCRIPTOR_POOL_MAX_SETS,
            descriptors_per_type: DESCRIPTOR_POOL_DESCRIPTORS_PER_TYPE,
        }
    }
}

/// Used to create a `FluentSwapchain`
#[derive(Clone)]
pub struct FluentSwapchainInfo<'a> {
    /// Queue the swapchain will be presented from
    pub queue: &'a FluentQueue,
    pub width: u32,
    pub height: u32,
    /// Preferred surface format. The backend falls back to a supported one if needed.
    pub format: FluentFormat,
    pub vsync: bool,
    pub min_image_count: u32,
    pub wsi: Option<Arc<dyn FluentWsi>>,
}

impl<'a> FluentSwapchainInfo<'a> {
    pub fn verify(&self) {
        assert!(self.width > 0 && self.height > 0, "swapchain extent must be non-zero");
        assert!(self.min_image_count > 0);
    }
}

/// Used to create a `FluentBuffer`
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentBufferInfo {
    pub size: u64,
    pub descriptor_type: FluentDescriptorType,
    pub memory_usage: FluentMemoryUsage,
}

impl Default for FluentBufferInfo {
    fn default() -> Self {
        FluentBufferInfo {
            size: 0,
            descriptor_type: FluentDescriptorType::UNDEFINED,
            memory_usage: FluentMemoryUsage::GpuOnly,
        }
    }
}

impl FluentBufferInfo {
    pub fn verify(&self) {
        assert_ne!(self.size, 0, "buffer size must be non-zero");
    }

    pub fn for_staging_buffer(size: u64) -> FluentBufferInfo {
        FluentBufferInfo {
            size,
            descriptor_type: FluentDescriptorType::UNDEFINED,
            memory_usage: FluentMemoryUsage::CpuToGpu,
        }
    }
}

/// Used to create a `FluentImage`
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentImageInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: FluentFormat,
    pub sample_count: FluentSampleCount,
    pub layer_count: u32,
    pub mip_levels: u32,
    pub descriptor_type: FluentDescriptorType,
}

impl Default for FluentImageInfo {
    fn default() -> Self {
        FluentImageInfo {
            width: 1,
            height: 1,
            depth: 1,
            format: FluentFormat::UNDEFINED,
            sample_count: FluentSampleCount::SampleCount1,
            layer_count: 1,
            mip_levels: 1,
            descriptor_type: FluentDescriptorType::SAMPLED_IMAGE,
        }
    }
}

impl FluentImageInfo {
    pub fn verify(&self) {
        assert!(self.width > 0 && self.height > 0 && self.depth > 0);
        assert!(self.layer_count > 0);
        assert!(self.mip_levels > 0);
        assert_ne!(self.format, FluentFormat::UNDEFINED);
    }

    /// Bytes of one mip level of one layer
    pub fn mip_level_size_in_bytes(
        &self,
        mip_level: u32,
    ) -> u64 {
        let width = (self.width >> mip_level).max(1) as u64;
        let height = (self.height >> mip_level).max(1) as u64;
        let depth = (self.depth >> mip_level).max(1) as u64;
        width * height * depth * self.format.block_size_in_bytes() as u64
    }
}

/// Used to create a `FluentSampler`
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentSamplerInfo {
    pub mag_filter: FluentFilter,
    pub min_filter: FluentFilter,
    pub mipmap_mode: FluentMipmapMode,
    pub address_mode_u: FluentAddressMode,
    pub address_mode_v: FluentAddressMode,
    pub address_mode_w: FluentAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: FluentCompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for FluentSamplerInfo {
    fn default() -> Self {
        FluentSamplerInfo {
            mag_filter: FluentFilter::Linear,
            min_filter: FluentFilter::Linear,
            mipmap_mode: FluentMipmapMode::Linear,
            address_mode_u: FluentAddressMode::Repeat,
            address_mode_v: FluentAddressMode::Repeat,
            address_mode_w: FluentAddressMode::Repeat,
            mip_lod_bias: 0.0,
            anisotropy_enable: false,
            max_anisotropy: 1.0,
            compare_enable: false,
            compare_op: FluentCompareOp::Never,
            min_lod: 0.0,
            max_lod: 1000.0,
        }
    }
}

/// Precompiled bytecode for each stage of a shader. SPIR-V for the vulkan and headless backends.
#[derive(Copy, Clone, Default, Debug)]
pub struct FluentShaderInfo<'a> {
    pub vertex: Option<&'a [u8]>,
    pub tessellation_control: Option<&'a [u8]>,
    pub tessellation_evaluation: Option<&'a [u8]>,
    pub geometry: Option<&'a [u8]>,
    pub fragment: Option<&'a [u8]>,
    pub compute: Option<&'a [u8]>,
}

impl<'a> FluentShaderInfo<'a> {
    /// All provided stages, in pipeline order
    pub fn stages(&self) -> Vec<(FluentShaderStageFlags, &'a [u8])> {
        let all = [
            (FluentShaderStageFlags::VERTEX, self.vertex),
            (
                FluentShaderStageFlags::TESSELLATION_CONTROL,
                self.tessellation_control,
            ),
            (
                FluentShaderStageFlags::TESSELLATION_EVALUATION,
                self.tessellation_evaluation,
            ),
            (FluentShaderStageFlags::GEOMETRY, self.geometry),
            (FluentShaderStageFlags::FRAGMENT, self.fragment),
            (FluentShaderStageFlags::COMPUTE, self.compute),
        ];

        all.iter()
            .filter_map(|(stage, bytecode)| bytecode.map(|bytecode| (*stage, bytecode)))
            .collect()
    }

    pub fn verify(&self) {
        let stages = self.stages();
        assert!(!stages.is_empty(), "a shader needs at least one stage");
        for (stage, bytecode) in stages {
            assert!(!bytecode.is_empty(), "{:?} bytecode is empty", stage);
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentVertexBindingInfo {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: FluentVertexInputRate,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentVertexAttributeInfo {
    pub location: u32,
    pub binding: u32,
    pub format: FluentFormat,
    pub offset: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentVertexLayout {
    pub bindings: Vec<FluentVertexBindingInfo>,
    pub attributes: Vec<FluentVertexAttributeInfo>,
}

impl FluentVertexLayout {
    pub fn verify(&self) {
        assert!(self.bindings.len() <= MAX_VERTEX_BINDING_COUNT);
        assert!(self.attributes.len() <= MAX_VERTEX_ATTRIBUTE_COUNT);
        for attribute in &self.attributes {
            assert!(
                self.bindings.iter().any(|x| x.binding == attribute.binding),
                "vertex attribute {} references missing binding {}",
                attribute.location,
                attribute.binding
            );
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentRasterizerStateInfo {
    pub cull_mode: FluentCullMode,
    pub front_face: FluentFrontFace,
    pub polygon_mode: FluentPolygonMode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentDepthStateInfo {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare_op: FluentCompareOp,
}

/// Blending for one color attachment. Blending is enabled unless `src_factor` is Zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentBlendAttachmentState {
    pub src_factor: FluentBlendFactor,
    pub dst_factor: FluentBlendFactor,
    pub src_alpha_factor: FluentBlendFactor,
    pub dst_alpha_factor: FluentBlendFactor,
    pub op: FluentBlendOp,
    pub alpha_op: FluentBlendOp,
}

impl FluentBlendAttachmentState {
    pub fn blend_enabled(&self) -> bool {
        self.src_factor != FluentBlendFactor::Zero
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentBlendStateInfo {
    /// One entry per color attachment. Missing entries mean blending disabled.
    pub attachment_states: Vec<FluentBlendAttachmentState>,
}

/// Used to create a graphics pipeline
#[derive(Clone)]
pub struct FluentPipelineInfo<'a> {
    pub shader: &'a FluentShader,
    pub descriptor_set_layout: &'a FluentDescriptorSetLayout,
    pub vertex_layout: FluentVertexLayout,
    pub rasterizer_info: FluentRasterizerStateInfo,
    pub depth_state_info: FluentDepthStateInfo,
    pub blend_state_info: FluentBlendStateInfo,
    pub topology: FluentPrimitiveTopology,
    pub sample_count: FluentSampleCount,
    pub color_attachment_formats: Vec<FluentFormat>,
    /// UNDEFINED if there is no depth attachment
    pub depth_stencil_format: FluentFormat,
}

impl<'a> FluentPipelineInfo<'a> {
    pub fn verify(&self) {
        self.vertex_layout.verify();
        assert!(self.color_attachment_formats.len() <= MAX_ATTACHMENTS_COUNT);
        assert!(
            !self.color_attachment_formats.is_empty()
                || self.depth_stencil_format != FluentFormat::UNDEFINED,
            "a graphics pipeline needs at least one attachment"
        );
        assert!(
            !self
                .shader
                .stages()
                .contains(FluentShaderStageFlags::COMPUTE),
            "graphics pipelines can't use a compute shader"
        );
    }
}

/// Used to create a compute pipeline
#[derive(Clone)]
pub struct FluentComputePipelineInfo<'a> {
    pub shader: &'a FluentShader,
    pub descriptor_set_layout: &'a FluentDescriptorSetLayout,
}

impl<'a> FluentComputePipelineInfo<'a> {
    pub fn verify(&self) {
        assert_eq!(
            self.shader.stages(),
            FluentShaderStageFlags::COMPUTE,
            "compute pipelines need a shader with only a compute stage"
        );
    }
}

/// Used to create a `FluentDescriptorSet`
#[derive(Clone)]
pub struct FluentDescriptorSetInfo<'a> {
    pub descriptor_set_layout: &'a FluentDescriptorSetLayout,
    pub set: u32,
}
