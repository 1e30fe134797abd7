#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Selects which backend `create_renderer_backend` instantiates
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentApiType {
    Vulkan,
    D3D12,
    Metal,
    /// CPU implementation of every operation. Useful for tests and tools that need no GPU.
    Headless,
}

impl FluentApiType {
    pub fn name(self) -> &'static str {
        match self {
            FluentApiType::Vulkan => "vulkan",
            FluentApiType::D3D12 => "d3d12",
            FluentApiType::Metal => "metal",
            FluentApiType::Headless => "headless",
        }
    }
}

/// Controls if validation is enabled or not. The requirements/behaviors of validation is
/// API-specific.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FluentValidationMode {
    Disabled,
    /// Enable validation if the layers are present, otherwise log a warning and continue
    EnabledIfAvailable,
    /// Enable validation and fail backend creation if it is not available
    Enabled,
}

impl Default for FluentValidationMode {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        let validation_mode = FluentValidationMode::EnabledIfAvailable;
        #[cfg(not(debug_assertions))]
        let validation_mode = FluentValidationMode::Disabled;

        validation_mode
    }
}

/// Used to indicate which type of queue to use. Some operations require certain types of queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentQueueType {
    /// Graphics queues generally supports all operations and are a safe default choice
    Graphics,
    Compute,
    /// Transfer queues are generally limited to copies
    Transfer,
}

impl Default for FluentQueueType {
    fn default() -> Self {
        FluentQueueType::Graphics
    }
}

bitflags::bitflags! {
    /// How a resource is currently being used. Resources move between states with barriers.
    ///
    /// Only set the bits relevant to one operation. Translation ORs together flags for every set
    /// bit, and image layouts are picked by a fixed priority, so mixing transition endpoints (like
    /// PRESENT with TRANSFER_DST) produces nonsense.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FluentResourceState: u32 {
        /// Freshly created resource, contents undefined
        const UNDEFINED = 0;
        /// Read/write storage access. Similar to vulkan's GENERAL image layout
        const GENERAL = 1 << 0;
        /// Similar to vulkan's COLOR_ATTACHMENT_OPTIMAL image layout
        const COLOR_ATTACHMENT = 1 << 1;
        /// Similar to vulkan's DEPTH_STENCIL_ATTACHMENT_OPTIMAL image layout
        const DEPTH_STENCIL_WRITE = 1 << 2;
        /// Similar to vulkan's DEPTH_STENCIL_READ_ONLY_OPTIMAL image layout
        const DEPTH_STENCIL_READ_ONLY = 1 << 3;
        /// Similar to vulkan's SHADER_READ_ONLY_OPTIMAL image layout
        const SHADER_READ_ONLY = 1 << 4;
        /// Similar to vulkan's TRANSFER_SRC_OPTIMAL image layout
        const TRANSFER_SRC = 1 << 5;
        /// Similar to vulkan's TRANSFER_DST_OPTIMAL image layout
        const TRANSFER_DST = 1 << 6;
        /// Similar to vulkan's PRESENT_SRC_KHR image layout
        const PRESENT = 1 << 7;
    }
}

/// Every state bit, in declaration order
pub const ALL_RESOURCE_STATES: [FluentResourceState; 8] = [
    FluentResourceState::GENERAL,
    FluentResourceState::COLOR_ATTACHMENT,
    FluentResourceState::DEPTH_STENCIL_WRITE,
    FluentResourceState::DEPTH_STENCIL_READ_ONLY,
    FluentResourceState::SHADER_READ_ONLY,
    FluentResourceState::TRANSFER_SRC,
    FluentResourceState::TRANSFER_DST,
    FluentResourceState::PRESENT,
];

bitflags::bitflags! {
    /// How a buffer or image will be used. Doubles as the descriptor type of a reflected binding,
    /// in which case exactly one bit is set.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FluentDescriptorType: u32 {
        const UNDEFINED = 0;
        const SAMPLER = 1 << 0;
        const SAMPLED_IMAGE = 1 << 1;
        const STORAGE_IMAGE = 1 << 2;
        const UNIFORM_TEXEL_BUFFER = 1 << 3;
        const STORAGE_TEXEL_BUFFER = 1 << 4;
        const UNIFORM_BUFFER = 1 << 5;
        const STORAGE_BUFFER = 1 << 6;
        const UNIFORM_BUFFER_DYNAMIC = 1 << 7;
        const STORAGE_BUFFER_DYNAMIC = 1 << 8;
        const INPUT_ATTACHMENT = 1 << 9;
        const VERTEX_BUFFER = 1 << 10;
        const INDEX_BUFFER = 1 << 11;
        const INDIRECT_BUFFER = 1 << 12;
        const COLOR_ATTACHMENT = 1 << 13;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 14;
        const TRANSIENT_ATTACHMENT = 1 << 15;
        /// Not supported by the engine. Reflection reports shaders that use it as an error.
        const COMBINED_IMAGE_SAMPLER = 1 << 16;
    }
}

/// The descriptor types that can be bound through a descriptor set, one per native pool size
pub const DESCRIPTOR_POOL_TYPES: [FluentDescriptorType; 11] = [
    FluentDescriptorType::SAMPLER,
    FluentDescriptorType::COMBINED_IMAGE_SAMPLER,
    FluentDescriptorType::SAMPLED_IMAGE,
    FluentDescriptorType::STORAGE_IMAGE,
    FluentDescriptorType::UNIFORM_TEXEL_BUFFER,
    FluentDescriptorType::STORAGE_TEXEL_BUFFER,
    FluentDescriptorType::UNIFORM_BUFFER,
    FluentDescriptorType::STORAGE_BUFFER,
    FluentDescriptorType::UNIFORM_BUFFER_DYNAMIC,
    FluentDescriptorType::STORAGE_BUFFER_DYNAMIC,
    FluentDescriptorType::INPUT_ATTACHMENT,
];

bitflags::bitflags! {
    /// Indicates a particular stage of a shader, or set of stages. Bit values match
    /// VkShaderStageFlagBits
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FluentShaderStageFlags: u32 {
        const NONE = 0;
        const VERTEX = 1;
        const TESSELLATION_CONTROL = 2;
        const TESSELLATION_EVALUATION = 4;
        const GEOMETRY = 8;
        const FRAGMENT = 16;
        const COMPUTE = 32;
        const ALL_GRAPHICS = 0x1F;
    }
}

/// Contains all the individual stages
pub const ALL_SHADER_STAGE_FLAGS: [FluentShaderStageFlags; 6] = [
    FluentShaderStageFlags::VERTEX,
    FluentShaderStageFlags::TESSELLATION_CONTROL,
    FluentShaderStageFlags::TESSELLATION_EVALUATION,
    FluentShaderStageFlags::GEOMETRY,
    FluentShaderStageFlags::FRAGMENT,
    FluentShaderStageFlags::COMPUTE,
];

/// Number of MSAA samples
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentSampleCount {
    SampleCount1,
    SampleCount2,
    SampleCount4,
    SampleCount8,
    SampleCount16,
    SampleCount32,
    SampleCount64,
}

impl Default for FluentSampleCount {
    fn default() -> Self {
        FluentSampleCount::SampleCount1
    }
}

impl FluentSampleCount {
    pub fn as_u32(self) -> u32 {
        match self {
            FluentSampleCount::SampleCount1 => 1,
            FluentSampleCount::SampleCount2 => 2,
            FluentSampleCount::SampleCount4 => 4,
            FluentSampleCount::SampleCount8 => 8,
            FluentSampleCount::SampleCount16 => 16,
            FluentSampleCount::SampleCount32 => 32,
            FluentSampleCount::SampleCount64 => 64,
        }
    }
}

/// Where the contents of an attachment come from when a render pass begins. Similar to
/// VkAttachmentLoadOp
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentLoadOp {
    Load,
    Clear,
    DontCare,
}

impl Default for FluentLoadOp {
    fn default() -> Self {
        FluentLoadOp::DontCare
    }
}

/// Where an allocation should live. Mirrors the vk-mem memory usages.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentMemoryUsage {
    CpuOnly,
    GpuOnly,
    CpuCopy,
    CpuToGpu,
    GpuToCpu,
}

impl Default for FluentMemoryUsage {
    fn default() -> Self {
        FluentMemoryUsage::GpuOnly
    }
}

impl FluentMemoryUsage {
    /// True if the memory can be mapped and written by the CPU
    pub fn is_host_visible(self) -> bool {
        match self {
            FluentMemoryUsage::GpuOnly => false,
            _ => true,
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentCompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl Default for FluentCompareOp {
    fn default() -> Self {
        FluentCompareOp::Never
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentCullMode {
    None,
    Back,
    Front,
}

impl Default for FluentCullMode {
    fn default() -> Self {
        FluentCullMode::None
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentFrontFace {
    CounterClockwise,
    Clockwise,
}

impl Default for FluentFrontFace {
    fn default() -> Self {
        FluentFrontFace::CounterClockwise
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentPolygonMode {
    Fill,
    Line,
}

impl Default for FluentPolygonMode {
    fn default() -> Self {
        FluentPolygonMode::Fill
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentPrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

impl Default for FluentPrimitiveTopology {
    fn default() -> Self {
        FluentPrimitiveTopology::TriangleList
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentBlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
}

impl Default for FluentBlendFactor {
    fn default() -> Self {
        FluentBlendFactor::Zero
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentBlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl Default for FluentBlendOp {
    fn default() -> Self {
        FluentBlendOp::Add
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentFilter {
    Nearest,
    Linear,
}

impl Default for FluentFilter {
    fn default() -> Self {
        FluentFilter::Nearest
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentMipmapMode {
    Nearest,
    Linear,
}

impl Default for FluentMipmapMode {
    fn default() -> Self {
        FluentMipmapMode::Nearest
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentAddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl Default for FluentAddressMode {
    fn default() -> Self {
        FluentAddressMode::Repeat
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentVertexInputRate {
    Vertex,
    Instance,
}

impl Default for FluentVertexInputRate {
    fn default() -> Self {
        FluentVertexInputRate::Vertex
    }
}

/// The size of index buffer elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluentIndexType {
    Uint16,
    Uint32,
}

impl FluentIndexType {
    pub fn size_in_bytes(self) -> u32 {
        match self {
            FluentIndexType::Uint16 => 2,
            FluentIndexType::Uint32 => 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum FluentPipelineType {
    Graphics,
    Compute,
}

/// Result of presenting a swapchain image
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FluentPresentResult {
    Success,
    /// Presented, but the swapchain no longer matches the surface and should be resized
    SuboptimalOrOutOfDate,
}

/// Reported by `fence_status`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FluentFenceStatus {
    Complete,
    Incomplete,
}

/// A clear value for an attachment. Color attachments use `color`, depth-stencil attachments use
/// `depth` and `stencil`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FluentClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for FluentClearValue {
    fn default() -> Self {
        FluentClearValue {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl FluentClearValue {
    pub fn color(color: [f32; 4]) -> Self {
        FluentClearValue {
            color,
            ..Default::default()
        }
    }

    pub fn depth_stencil(
        depth: f32,
        stencil: u32,
    ) -> Self {
        FluentClearValue {
            depth,
            stencil,
            ..Default::default()
        }
    }
}

/// A 2d size for windows, swapchains, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentExtents2D {
    pub width: u32,
    pub height: u32,
}
