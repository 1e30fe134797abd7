use crate::*;
use ash::vk;

impl Into<vk::Format> for FluentFormat {
    fn into(self) -> vk::Format {
        match self {
            FluentFormat::UNDEFINED => vk::Format::UNDEFINED,
            FluentFormat::R8_UNORM => vk::Format::R8_UNORM,
            FluentFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
            FluentFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
            FluentFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
            FluentFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
            FluentFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
            FluentFormat::R16_SFLOAT => vk::Format::R16_SFLOAT,
            FluentFormat::R16G16_SFLOAT => vk::Format::R16G16_SFLOAT,
            FluentFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
            FluentFormat::R32_UINT => vk::Format::R32_UINT,
            FluentFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
            FluentFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
            FluentFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
            FluentFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
            FluentFormat::D16_UNORM => vk::Format::D16_UNORM,
            FluentFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
            FluentFormat::S8_UINT => vk::Format::S8_UINT,
            FluentFormat::D16_UNORM_S8_UINT => vk::Format::D16_UNORM_S8_UINT,
            FluentFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
            FluentFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        }
    }
}

/// Reverse of the format conversion. Surfaces may report formats we have no name for.
pub(crate) fn format_from_vk(format: vk::Format) -> Option<FluentFormat> {
    let format = match format {
        vk::Format::R8_UNORM => FluentFormat::R8_UNORM,
        vk::Format::R8G8_UNORM => FluentFormat::R8G8_UNORM,
        vk::Format::R8G8B8A8_UNORM => FluentFormat::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => FluentFormat::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => FluentFormat::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => FluentFormat::B8G8R8A8_SRGB,
        vk::Format::R16_SFLOAT => FluentFormat::R16_SFLOAT,
        vk::Format::R16G16_SFLOAT => FluentFormat::R16G16_SFLOAT,
        vk::Format::R16G16B16A16_SFLOAT => FluentFormat::R16G16B16A16_SFLOAT,
        vk::Format::R32_UINT => FluentFormat::R32_UINT,
        vk::Format::R32_SFLOAT => FluentFormat::R32_SFLOAT,
        vk::Format::R32G32_SFLOAT => FluentFormat::R32G32_SFLOAT,
        vk::Format::R32G32B32_SFLOAT => FluentFormat::R32G32B32_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => FluentFormat::R32G32B32A32_SFLOAT,
        vk::Format::D16_UNORM => FluentFormat::D16_UNORM,
        vk::Format::D32_SFLOAT => FluentFormat::D32_SFLOAT,
        vk::Format::S8_UINT => FluentFormat::S8_UINT,
        vk::Format::D16_UNORM_S8_UINT => FluentFormat::D16_UNORM_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT => FluentFormat::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT => FluentFormat::D32_SFLOAT_S8_UINT,
        _ => return None,
    };

    Some(format)
}

impl Into<vk::SampleCountFlags> for FluentSampleCount {
    fn into(self) -> vk::SampleCountFlags {
        match self {
            FluentSampleCount::SampleCount1 => vk::SampleCountFlags::TYPE_1,
            FluentSampleCount::SampleCount2 => vk::SampleCountFlags::TYPE_2,
            FluentSampleCount::SampleCount4 => vk::SampleCountFlags::TYPE_4,
            FluentSampleCount::SampleCount8 => vk::SampleCountFlags::TYPE_8,
            FluentSampleCount::SampleCount16 => vk::SampleCountFlags::TYPE_16,
            FluentSampleCount::SampleCount32 => vk::SampleCountFlags::TYPE_32,
            FluentSampleCount::SampleCount64 => vk::SampleCountFlags::TYPE_64,
        }
    }
}

impl Into<vk_mem::MemoryUsage> for FluentMemoryUsage {
    fn into(self) -> vk_mem::MemoryUsage {
        use vk_mem::MemoryUsage;
        match self {
            // vk-mem 0.2 has no CPU_COPY usage, host-only memory is the closest match
            FluentMemoryUsage::CpuOnly | FluentMemoryUsage::CpuCopy => MemoryUsage::CpuOnly,
            FluentMemoryUsage::GpuOnly => MemoryUsage::GpuOnly,
            FluentMemoryUsage::CpuToGpu => MemoryUsage::CpuToGpu,
            FluentMemoryUsage::GpuToCpu => MemoryUsage::GpuToCpu,
        }
    }
}

impl Into<vk::ShaderStageFlags> for FluentShaderStageFlags {
    fn into(self) -> vk::ShaderStageFlags {
        // Bit values are shared
        vk::ShaderStageFlags::from_raw(self.bits())
    }
}

impl Into<vk::AccessFlags> for FluentAccessFlags {
    fn into(self) -> vk::AccessFlags {
        vk::AccessFlags::from_raw(self.bits())
    }
}

impl Into<vk::PipelineStageFlags> for FluentPipelineStageFlags {
    fn into(self) -> vk::PipelineStageFlags {
        vk::PipelineStageFlags::from_raw(self.bits())
    }
}

impl Into<vk::ImageLayout> for FluentImageLayout {
    fn into(self) -> vk::ImageLayout {
        match self {
            FluentImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
            FluentImageLayout::General => vk::ImageLayout::GENERAL,
            FluentImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            FluentImageLayout::DepthStencilAttachmentOptimal => {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            }
            FluentImageLayout::DepthStencilReadOnlyOptimal => {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            }
            FluentImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            FluentImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            FluentImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            FluentImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

/// Image layout for a resource state
pub(crate) fn resource_state_to_image_layout(state: FluentResourceState) -> vk::ImageLayout {
    determine_image_layout(state).into()
}

impl Into<vk::AttachmentLoadOp> for FluentLoadOp {
    fn into(self) -> vk::AttachmentLoadOp {
        match self {
            FluentLoadOp::Load => vk::AttachmentLoadOp::LOAD,
            FluentLoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
            FluentLoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        }
    }
}

impl Into<vk::CompareOp> for FluentCompareOp {
    fn into(self) -> vk::CompareOp {
        match self {
            FluentCompareOp::Never => vk::CompareOp::NEVER,
            FluentCompareOp::Less => vk::CompareOp::LESS,
            FluentCompareOp::Equal => vk::CompareOp::EQUAL,
            FluentCompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            FluentCompareOp::Greater => vk::CompareOp::GREATER,
            FluentCompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            FluentCompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
            FluentCompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

impl Into<vk::CullModeFlags> for FluentCullMode {
    fn into(self) -> vk::CullModeFlags {
        match self {
            FluentCullMode::None => vk::CullModeFlags::NONE,
            FluentCullMode::Back => vk::CullModeFlags::BACK,
            FluentCullMode::Front => vk::CullModeFlags::FRONT,
        }
    }
}

impl Into<vk::FrontFace> for FluentFrontFace {
    fn into(self) -> vk::FrontFace {
        match self {
            FluentFrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FluentFrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

impl Into<vk::PolygonMode> for FluentPolygonMode {
    fn into(self) -> vk::PolygonMode {
        match self {
            FluentPolygonMode::Fill => vk::PolygonMode::FILL,
            FluentPolygonMode::Line => vk::PolygonMode::LINE,
        }
    }
}

impl Into<vk::PrimitiveTopology> for FluentPrimitiveTopology {
    fn into(self) -> vk::PrimitiveTopology {
        match self {
            FluentPrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            FluentPrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            FluentPrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            FluentPrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            FluentPrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

impl Into<vk::BlendFactor> for FluentBlendFactor {
    fn into(self) -> vk::BlendFactor {
        match self {
            FluentBlendFactor::Zero => vk::BlendFactor::ZERO,
            FluentBlendFactor::One => vk::BlendFactor::ONE,
            FluentBlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
            FluentBlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
            FluentBlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
            FluentBlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
            FluentBlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
            FluentBlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            FluentBlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
            FluentBlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
            FluentBlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
            FluentBlendFactor::ConstantColor => vk::BlendFactor::CONSTANT_COLOR,
            FluentBlendFactor::OneMinusConstantColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

impl Into<vk::BlendOp> for FluentBlendOp {
    fn into(self) -> vk::BlendOp {
        match self {
            FluentBlendOp::Add => vk::BlendOp::ADD,
            FluentBlendOp::Subtract => vk::BlendOp::SUBTRACT,
            FluentBlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
            FluentBlendOp::Min => vk::BlendOp::MIN,
            FluentBlendOp::Max => vk::BlendOp::MAX,
        }
    }
}

impl Into<vk::Filter> for FluentFilter {
    fn into(self) -> vk::Filter {
        match self {
            FluentFilter::Nearest => vk::Filter::NEAREST,
            FluentFilter::Linear => vk::Filter::LINEAR,
        }
    }
}

impl Into<vk::SamplerMipmapMode> for FluentMipmapMode {
    fn into(self) -> vk::SamplerMipmapMode {
        match self {
            FluentMipmapMode::Nearest => vk::SamplerMipmapMode::NEAREST,
            FluentMipmapMode::Linear => vk::SamplerMipmapMode::LINEAR,
        }
    }
}

impl Into<vk::SamplerAddressMode> for FluentAddressMode {
    fn into(self) -> vk::SamplerAddressMode {
        match self {
            FluentAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            FluentAddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
            FluentAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            FluentAddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        }
    }
}

impl Into<vk::VertexInputRate> for FluentVertexInputRate {
    fn into(self) -> vk::VertexInputRate {
        match self {
            FluentVertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
            FluentVertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
        }
    }
}

impl Into<vk::IndexType> for FluentIndexType {
    fn into(self) -> vk::IndexType {
        match self {
            FluentIndexType::Uint16 => vk::IndexType::UINT16,
            FluentIndexType::Uint32 => vk::IndexType::UINT32,
        }
    }
}

impl Into<vk::PipelineBindPoint> for FluentPipelineType {
    fn into(self) -> vk::PipelineBindPoint {
        match self {
            FluentPipelineType::Graphics => vk::PipelineBindPoint::GRAPHICS,
            FluentPipelineType::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

/// None for types that are not bound through descriptor sets (vertex buffers, attachments...)
pub(crate) fn descriptor_type_to_vk(descriptor_type: FluentDescriptorType) -> Option<vk::DescriptorType> {
    let descriptor_type = match descriptor_type {
        FluentDescriptorType::SAMPLER => vk::DescriptorType::SAMPLER,
        FluentDescriptorType::COMBINED_IMAGE_SAMPLER => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        FluentDescriptorType::SAMPLED_IMAGE => vk::DescriptorType::SAMPLED_IMAGE,
        FluentDescriptorType::STORAGE_IMAGE => vk::DescriptorType::STORAGE_IMAGE,
        FluentDescriptorType::UNIFORM_TEXEL_BUFFER => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        FluentDescriptorType::STORAGE_TEXEL_BUFFER => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        FluentDescriptorType::UNIFORM_BUFFER => vk::DescriptorType::UNIFORM_BUFFER,
        FluentDescriptorType::STORAGE_BUFFER => vk::DescriptorType::STORAGE_BUFFER,
        FluentDescriptorType::UNIFORM_BUFFER_DYNAMIC => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        FluentDescriptorType::STORAGE_BUFFER_DYNAMIC => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        FluentDescriptorType::INPUT_ATTACHMENT => vk::DescriptorType::INPUT_ATTACHMENT,
        _ => return None,
    };

    Some(descriptor_type)
}

pub(crate) fn buffer_usage_flags(descriptor_type: FluentDescriptorType) -> vk::BufferUsageFlags {
    let mut usage_flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;

    if descriptor_type.intersects(
        FluentDescriptorType::UNIFORM_BUFFER | FluentDescriptorType::UNIFORM_BUFFER_DYNAMIC,
    ) {
        usage_flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }

    if descriptor_type.intersects(
        FluentDescriptorType::STORAGE_BUFFER | FluentDescriptorType::STORAGE_BUFFER_DYNAMIC,
    ) {
        usage_flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }

    if descriptor_type.intersects(FluentDescriptorType::UNIFORM_TEXEL_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER;
    }

    if descriptor_type.intersects(FluentDescriptorType::STORAGE_TEXEL_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER;
    }

    if descriptor_type.intersects(FluentDescriptorType::VERTEX_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }

    if descriptor_type.intersects(FluentDescriptorType::INDEX_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }

    if descriptor_type.intersects(FluentDescriptorType::INDIRECT_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }

    usage_flags
}

pub(crate) fn image_usage_flags(descriptor_type: FluentDescriptorType) -> vk::ImageUsageFlags {
    // Transient attachments may only be combined with other attachment usages
    let mut usage_flags = if descriptor_type.intersects(FluentDescriptorType::TRANSIENT_ATTACHMENT)
    {
        vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
    } else {
        vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST
    };

    if descriptor_type.intersects(FluentDescriptorType::SAMPLED_IMAGE) {
        usage_flags |= vk::ImageUsageFlags::SAMPLED;
    }

    if descriptor_type.intersects(FluentDescriptorType::STORAGE_IMAGE) {
        usage_flags |= vk::ImageUsageFlags::STORAGE;
    }

    if descriptor_type.intersects(FluentDescriptorType::INPUT_ATTACHMENT) {
        usage_flags |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
    }

    if descriptor_type.intersects(FluentDescriptorType::COLOR_ATTACHMENT) {
        usage_flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }

    if descriptor_type.intersects(FluentDescriptorType::DEPTH_STENCIL_ATTACHMENT) {
        usage_flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }

    usage_flags
}

pub(crate) fn image_format_to_aspect_mask(format: FluentFormat) -> vk::ImageAspectFlags {
    let mut aspect_mask = vk::ImageAspectFlags::empty();
    if format.has_depth_aspect() {
        aspect_mask |= vk::ImageAspectFlags::DEPTH;
    }

    if format.has_stencil_aspect() {
        aspect_mask |= vk::ImageAspectFlags::STENCIL;
    }

    if aspect_mask.is_empty() {
        aspect_mask = vk::ImageAspectFlags::COLOR;
    }

    aspect_mask
}

pub(crate) fn clear_value_to_vk(
    clear_value: &FluentClearValue,
    format: FluentFormat,
) -> vk::ClearValue {
    if format.is_depth_or_stencil() {
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: clear_value.depth,
                stencil: clear_value.stencil,
            },
        }
    } else {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_value.color,
            },
        }
    }
}

pub(crate) fn rasterizer_state_to_create_info(
    rasterizer_state: &FluentRasterizerStateInfo
) -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(rasterizer_state.polygon_mode.into())
        .cull_mode(rasterizer_state.cull_mode.into())
        .front_face(rasterizer_state.front_face.into())
        .depth_bias_enable(false)
        .line_width(1.0)
        .build()
}

pub(crate) fn depth_state_to_create_info(
    depth_state: &FluentDepthStateInfo
) -> vk::PipelineDepthStencilStateCreateInfo {
    vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(depth_state.depth_test)
        .depth_write_enable(depth_state.depth_write)
        .depth_compare_op(depth_state.compare_op.into())
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false)
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0)
        .build()
}

pub(crate) fn blend_attachment_to_create_info(
    attachment_state: &FluentBlendAttachmentState
) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(attachment_state.blend_enabled())
        .color_write_mask(vk::ColorComponentFlags::all())
        .src_color_blend_factor(attachment_state.src_factor.into())
        .dst_color_blend_factor(attachment_state.dst_factor.into())
        .src_alpha_blend_factor(attachment_state.src_alpha_factor.into())
        .dst_alpha_blend_factor(attachment_state.dst_alpha_factor.into())
        .color_blend_op(attachment_state.op.into())
        .alpha_blend_op(attachment_state.alpha_op.into())
        .build()
}

/// One blend attachment per color attachment. Attachments without an entry do not blend.
pub(crate) fn blend_attachments_to_create_info(
    blend_state: &FluentBlendStateInfo,
    color_attachment_count: usize,
) -> Vec<vk::PipelineColorBlendAttachmentState> {
    (0..color_attachment_count)
        .map(|index| {
            blend_state
                .attachment_states
                .get(index)
                .map(blend_attachment_to_create_info)
                .unwrap_or_else(|| {
                    vk::PipelineColorBlendAttachmentState::builder()
                        .blend_enable(false)
                        .color_write_mask(vk::ColorComponentFlags::all())
                        .build()
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip_for_surface_formats() {
        for &format in &[
            FluentFormat::B8G8R8A8_SRGB,
            FluentFormat::B8G8R8A8_UNORM,
            FluentFormat::R8G8B8A8_SRGB,
            FluentFormat::R16G16B16A16_SFLOAT,
        ] {
            let vk_format: vk::Format = format.into();
            assert_eq!(Some(format), format_from_vk(vk_format));
        }

        assert_eq!(None, format_from_vk(vk::Format::A2B10G10R10_UNORM_PACK32));
        assert_eq!(None, format_from_vk(vk::Format::UNDEFINED));
    }

    #[test]
    fn test_barrier_flags_share_bits() {
        let access: vk::AccessFlags =
            (FluentAccessFlags::TRANSFER_WRITE | FluentAccessFlags::SHADER_READ).into();
        assert_eq!(
            vk::AccessFlags::TRANSFER_WRITE | vk::AccessFlags::SHADER_READ,
            access
        );

        let stages: vk::PipelineStageFlags =
            (FluentPipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | FluentPipelineStageFlags::HOST)
                .into();
        assert_eq!(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::HOST,
            stages
        );

        let stage_flags: vk::ShaderStageFlags =
            (FluentShaderStageFlags::VERTEX | FluentShaderStageFlags::COMPUTE).into();
        assert_eq!(
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::COMPUTE,
            stage_flags
        );
    }

    #[test]
    fn test_state_layouts() {
        assert_eq!(
            vk::ImageLayout::UNDEFINED,
            resource_state_to_image_layout(FluentResourceState::UNDEFINED)
        );
        assert_eq!(
            vk::ImageLayout::PRESENT_SRC_KHR,
            resource_state_to_image_layout(FluentResourceState::PRESENT)
        );
        assert_eq!(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            resource_state_to_image_layout(FluentResourceState::TRANSFER_DST)
        );
        assert_eq!(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            resource_state_to_image_layout(FluentResourceState::SHADER_READ_ONLY)
        );
    }

    #[test]
    fn test_descriptor_pool_types_all_map() {
        for &descriptor_type in &DESCRIPTOR_POOL_TYPES {
            assert!(descriptor_type_to_vk(descriptor_type).is_some());
        }

        assert_eq!(None, descriptor_type_to_vk(FluentDescriptorType::VERTEX_BUFFER));
    }

    #[test]
    fn test_usage_flags() {
        let buffer_usage = buffer_usage_flags(
            FluentDescriptorType::VERTEX_BUFFER | FluentDescriptorType::UNIFORM_BUFFER_DYNAMIC,
        );
        assert!(buffer_usage.contains(
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::UNIFORM_BUFFER
        ));
        assert!(buffer_usage.contains(vk::BufferUsageFlags::TRANSFER_DST));
        assert!(!buffer_usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));

        let image_usage = image_usage_flags(FluentDescriptorType::SAMPLED_IMAGE);
        assert!(image_usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(image_usage.contains(vk::ImageUsageFlags::TRANSFER_DST));

        let transient = image_usage_flags(
            FluentDescriptorType::COLOR_ATTACHMENT | FluentDescriptorType::TRANSIENT_ATTACHMENT,
        );
        assert!(!transient.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(transient.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }

    #[test]
    fn test_aspect_masks() {
        assert_eq!(
            vk::ImageAspectFlags::COLOR,
            image_format_to_aspect_mask(FluentFormat::R8G8B8A8_UNORM)
        );
        assert_eq!(
            vk::ImageAspectFlags::DEPTH,
            image_format_to_aspect_mask(FluentFormat::D32_SFLOAT)
        );
        assert_eq!(
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            image_format_to_aspect_mask(FluentFormat::D24_UNORM_S8_UINT)
        );
        assert_eq!(
            vk::ImageAspectFlags::STENCIL,
            image_format_to_aspect_mask(FluentFormat::S8_UINT)
        );
    }

    #[test]
    fn test_missing_blend_states_disable_blending() {
        let blend_state = FluentBlendStateInfo {
            attachment_states: vec![FluentBlendAttachmentState {
                src_factor: FluentBlendFactor::SrcAlpha,
                dst_factor: FluentBlendFactor::OneMinusSrcAlpha,
                src_alpha_factor: FluentBlendFactor::One,
                dst_alpha_factor: FluentBlendFactor::Zero,
                op: FluentBlendOp::Add,
                alpha_op: FluentBlendOp::Add,
            }],
        };

        let attachments = blend_attachments_to_create_info(&blend_state, 2);
        assert_eq!(2, attachments.len());
        assert_eq!(vk::TRUE, attachments[0].blend_enable);
        assert_eq!(vk::BlendFactor::SRC_ALPHA, attachments[0].src_color_blend_factor);
        assert_eq!(vk::FALSE, attachments[1].blend_enable);
    }
}
