//! Translation of `FluentResourceState` into the synchronization primitives native APIs expect.
//!
//! The flag types here are backend neutral but their bit values match vulkan's, so the vulkan
//! backend converts with `from_raw` and the headless backend can use them directly to track image
//! layouts. D3D12 gets its own resource-state mapping.

use crate::{FluentQueueType, FluentResourceState};

bitflags::bitflags! {
    /// Memory access kinds. Bit values match VkAccessFlagBits.
    #[derive(Default)]
    pub struct FluentAccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 0x1;
        const INDEX_READ = 0x2;
        const VERTEX_ATTRIBUTE_READ = 0x4;
        const UNIFORM_READ = 0x8;
        const INPUT_ATTACHMENT_READ = 0x10;
        const SHADER_READ = 0x20;
        const SHADER_WRITE = 0x40;
        const COLOR_ATTACHMENT_READ = 0x80;
        const COLOR_ATTACHMENT_WRITE = 0x100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x400;
        const TRANSFER_READ = 0x800;
        const TRANSFER_WRITE = 0x1000;
        const HOST_READ = 0x2000;
        const HOST_WRITE = 0x4000;
        const MEMORY_READ = 0x8000;
        const MEMORY_WRITE = 0x10000;
    }
}

bitflags::bitflags! {
    /// Pipeline stages. Bit values match VkPipelineStageFlagBits.
    #[derive(Default)]
    pub struct FluentPipelineStageFlags: u32 {
        const TOP_OF_PIPE = 0x1;
        const DRAW_INDIRECT = 0x2;
        const VERTEX_INPUT = 0x4;
        const VERTEX_SHADER = 0x8;
        const TESSELLATION_CONTROL_SHADER = 0x10;
        const TESSELLATION_EVALUATION_SHADER = 0x20;
        const GEOMETRY_SHADER = 0x40;
        const FRAGMENT_SHADER = 0x80;
        const EARLY_FRAGMENT_TESTS = 0x100;
        const LATE_FRAGMENT_TESTS = 0x200;
        const COLOR_ATTACHMENT_OUTPUT = 0x400;
        const COMPUTE_SHADER = 0x800;
        const TRANSFER = 0x1000;
        const BOTTOM_OF_PIPE = 0x2000;
        const HOST = 0x4000;
        const ALL_GRAPHICS = 0x8000;
        const ALL_COMMANDS = 0x10000;
    }
}

bitflags::bitflags! {
    /// D3D12_RESOURCE_STATES bit values. PRESENT and COMMON are both zero in D3D12.
    #[derive(Default)]
    pub struct FluentD3D12ResourceStates: u32 {
        const COMMON = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const PRESENT = 0;
    }
}

/// Image layouts, named after the vulkan layouts they map to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FluentImageLayout {
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    DepthStencilReadOnlyOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    PresentSrc,
}

impl Default for FluentImageLayout {
    fn default() -> Self {
        FluentImageLayout::Undefined
    }
}

/// OR together the access flags of every state bit that is set
pub fn determine_access_flags(resource_state: FluentResourceState) -> FluentAccessFlags {
    let mut access_flags = FluentAccessFlags::empty();

    if resource_state.contains(FluentResourceState::GENERAL) {
        access_flags |= FluentAccessFlags::SHADER_READ | FluentAccessFlags::SHADER_WRITE;
    }

    if resource_state.contains(FluentResourceState::COLOR_ATTACHMENT) {
        access_flags |=
            FluentAccessFlags::COLOR_ATTACHMENT_READ | FluentAccessFlags::COLOR_ATTACHMENT_WRITE;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_WRITE) {
        access_flags |= FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_READ_ONLY) {
        access_flags |= FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }

    if resource_state.contains(FluentResourceState::SHADER_READ_ONLY) {
        access_flags |= FluentAccessFlags::SHADER_READ;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_SRC) {
        access_flags |= FluentAccessFlags::TRANSFER_READ;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_DST) {
        access_flags |= FluentAccessFlags::TRANSFER_WRITE;
    }

    if resource_state.contains(FluentResourceState::PRESENT) {
        access_flags |= FluentAccessFlags::MEMORY_READ;
    }

    access_flags
}

/// Derive the stage mask that covers `access_flags` on a queue of the given type.
///
/// Anything that touches render pass state (vertex input, input attachments, color or depth
/// attachments) synchronizes against ALL_COMMANDS regardless of queue type.
pub fn determine_pipeline_stage_flags(
    access_flags: FluentAccessFlags,
    queue_type: FluentQueueType,
) -> FluentPipelineStageFlags {
    let mut flags = FluentPipelineStageFlags::empty();

    let vertex_input_access =
        FluentAccessFlags::INDEX_READ | FluentAccessFlags::VERTEX_ATTRIBUTE_READ;
    let shader_access = FluentAccessFlags::UNIFORM_READ
        | FluentAccessFlags::SHADER_READ
        | FluentAccessFlags::SHADER_WRITE;
    let color_access =
        FluentAccessFlags::COLOR_ATTACHMENT_READ | FluentAccessFlags::COLOR_ATTACHMENT_WRITE;
    let depth_access = FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
        | FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

    if queue_type == FluentQueueType::Graphics {
        if access_flags.intersects(vertex_input_access) {
            flags |= FluentPipelineStageFlags::VERTEX_INPUT;
        }

        if access_flags.intersects(shader_access) {
            flags |= FluentPipelineStageFlags::VERTEX_SHADER;
            flags |= FluentPipelineStageFlags::FRAGMENT_SHADER;
        }

        if access_flags.intersects(FluentAccessFlags::INPUT_ATTACHMENT_READ) {
            flags |= FluentPipelineStageFlags::FRAGMENT_SHADER;
        }

        if access_flags.intersects(color_access) {
            flags |= FluentPipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        }

        if access_flags.intersects(depth_access) {
            flags |= FluentPipelineStageFlags::EARLY_FRAGMENT_TESTS
                | FluentPipelineStageFlags::LATE_FRAGMENT_TESTS;
        }
    }

    if access_flags.intersects(
        vertex_input_access
            | FluentAccessFlags::INPUT_ATTACHMENT_READ
            | color_access
            | depth_access,
    ) {
        return FluentPipelineStageFlags::ALL_COMMANDS;
    }

    if access_flags.intersects(shader_access) {
        flags |= FluentPipelineStageFlags::COMPUTE_SHADER;
    }

    if access_flags.intersects(FluentAccessFlags::INDIRECT_COMMAND_READ) {
        flags |= FluentPipelineStageFlags::DRAW_INDIRECT;
    }

    if access_flags.intersects(FluentAccessFlags::TRANSFER_READ | FluentAccessFlags::TRANSFER_WRITE)
    {
        flags |= FluentPipelineStageFlags::TRANSFER;
    }

    if access_flags.intersects(FluentAccessFlags::HOST_READ | FluentAccessFlags::HOST_WRITE) {
        flags |= FluentPipelineStageFlags::HOST;
    }

    if flags.is_empty() {
        flags = FluentPipelineStageFlags::TOP_OF_PIPE;
    }

    flags
}

/// Pick the image layout for a state. Only the first set bit in this order counts: General,
/// ColorAttachment, DepthStencilWrite, DepthStencilReadOnly, ShaderReadOnly, Present, TransferSrc,
/// TransferDst.
pub fn determine_image_layout(resource_state: FluentResourceState) -> FluentImageLayout {
    if resource_state.contains(FluentResourceState::GENERAL) {
        return FluentImageLayout::General;
    }

    if resource_state.contains(FluentResourceState::COLOR_ATTACHMENT) {
        return FluentImageLayout::ColorAttachmentOptimal;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_WRITE) {
        return FluentImageLayout::DepthStencilAttachmentOptimal;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_READ_ONLY) {
        return FluentImageLayout::DepthStencilReadOnlyOptimal;
    }

    if resource_state.contains(FluentResourceState::SHADER_READ_ONLY) {
        return FluentImageLayout::ShaderReadOnlyOptimal;
    }

    if resource_state.contains(FluentResourceState::PRESENT) {
        return FluentImageLayout::PresentSrc;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_SRC) {
        return FluentImageLayout::TransferSrcOptimal;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_DST) {
        return FluentImageLayout::TransferDstOptimal;
    }

    FluentImageLayout::Undefined
}

/// D3D12 equivalent of a state. Multiple bits OR their D3D12 states together.
pub fn determine_d3d12_resource_state(
    resource_state: FluentResourceState
) -> FluentD3D12ResourceStates {
    let mut states = FluentD3D12ResourceStates::COMMON;

    if resource_state.contains(FluentResourceState::GENERAL) {
        states |= FluentD3D12ResourceStates::UNORDERED_ACCESS;
    }

    if resource_state.contains(FluentResourceState::COLOR_ATTACHMENT) {
        states |= FluentD3D12ResourceStates::RENDER_TARGET;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_WRITE) {
        states |= FluentD3D12ResourceStates::DEPTH_WRITE;
    }

    if resource_state.contains(FluentResourceState::DEPTH_STENCIL_READ_ONLY) {
        states |= FluentD3D12ResourceStates::DEPTH_READ;
    }

    if resource_state.contains(FluentResourceState::SHADER_READ_ONLY) {
        states |= FluentD3D12ResourceStates::PIXEL_SHADER_RESOURCE;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_SRC) {
        states |= FluentD3D12ResourceStates::COPY_SOURCE;
    }

    if resource_state.contains(FluentResourceState::TRANSFER_DST) {
        states |= FluentD3D12ResourceStates::COPY_DEST;
    }

    if resource_state.contains(FluentResourceState::PRESENT) {
        states |= FluentD3D12ResourceStates::PRESENT;
    }

    states
}

/// Access and stage masks for one side of a barrier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FluentBarrierScope {
    pub access: FluentAccessFlags,
    pub stages: FluentPipelineStageFlags,
}

/// Combine the access flags of every state in a barrier batch, then derive stages from the union.
/// Returns the (src, dst) scopes for the whole batch.
pub fn determine_barrier_scopes<I>(
    transitions: I,
    queue_type: FluentQueueType,
) -> (FluentBarrierScope, FluentBarrierScope)
where
    I: IntoIterator<Item = (FluentResourceState, FluentResourceState)>,
{
    let mut src_access = FluentAccessFlags::empty();
    let mut dst_access = FluentAccessFlags::empty();
    for (old_state, new_state) in transitions {
        src_access |= determine_access_flags(old_state);
        dst_access |= determine_access_flags(new_state);
    }

    (
        FluentBarrierScope {
            access: src_access,
            stages: determine_pipeline_stage_flags(src_access, queue_type),
        },
        FluentBarrierScope {
            access: dst_access,
            stages: determine_pipeline_stage_flags(dst_access, queue_type),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ALL_RESOURCE_STATES;

    #[test]
    fn test_layout_per_state_bit() {
        let expected = [
            (FluentResourceState::GENERAL, FluentImageLayout::General),
            (
                FluentResourceState::COLOR_ATTACHMENT,
                FluentImageLayout::ColorAttachmentOptimal,
            ),
            (
                FluentResourceState::DEPTH_STENCIL_WRITE,
                FluentImageLayout::DepthStencilAttachmentOptimal,
            ),
            (
                FluentResourceState::DEPTH_STENCIL_READ_ONLY,
                FluentImageLayout::DepthStencilReadOnlyOptimal,
            ),
            (
                FluentResourceState::SHADER_READ_ONLY,
                FluentImageLayout::ShaderReadOnlyOptimal,
            ),
            (
                FluentResourceState::TRANSFER_SRC,
                FluentImageLayout::TransferSrcOptimal,
            ),
            (
                FluentResourceState::TRANSFER_DST,
                FluentImageLayout::TransferDstOptimal,
            ),
            (FluentResourceState::PRESENT, FluentImageLayout::PresentSrc),
        ];

        for (state, layout) in expected.iter() {
            assert_eq!(*layout, determine_image_layout(*state), "{:?}", state);
            // Same answer every time
            assert_eq!(
                determine_image_layout(*state),
                determine_image_layout(*state)
            );
        }
    }

    #[test]
    fn test_layout_undefined() {
        assert_eq!(
            FluentImageLayout::Undefined,
            determine_image_layout(FluentResourceState::UNDEFINED)
        );
    }

    #[test]
    fn test_layout_priority() {
        // General beats everything
        assert_eq!(
            FluentImageLayout::General,
            determine_image_layout(FluentResourceState::all())
        );

        assert_eq!(
            FluentImageLayout::ColorAttachmentOptimal,
            determine_image_layout(
                FluentResourceState::COLOR_ATTACHMENT | FluentResourceState::SHADER_READ_ONLY
            )
        );

        assert_eq!(
            FluentImageLayout::DepthStencilAttachmentOptimal,
            determine_image_layout(
                FluentResourceState::DEPTH_STENCIL_WRITE
                    | FluentResourceState::DEPTH_STENCIL_READ_ONLY
            )
        );

        assert_eq!(
            FluentImageLayout::DepthStencilReadOnlyOptimal,
            determine_image_layout(
                FluentResourceState::DEPTH_STENCIL_READ_ONLY
                    | FluentResourceState::SHADER_READ_ONLY
            )
        );

        assert_eq!(
            FluentImageLayout::ShaderReadOnlyOptimal,
            determine_image_layout(
                FluentResourceState::SHADER_READ_ONLY | FluentResourceState::PRESENT
            )
        );

        // Present is checked before the transfer states
        assert_eq!(
            FluentImageLayout::PresentSrc,
            determine_image_layout(
                FluentResourceState::PRESENT | FluentResourceState::TRANSFER_SRC
            )
        );

        assert_eq!(
            FluentImageLayout::TransferSrcOptimal,
            determine_image_layout(
                FluentResourceState::TRANSFER_SRC | FluentResourceState::TRANSFER_DST
            )
        );
    }

    #[test]
    fn test_layout_priority_exhaustive() {
        // For every pair of distinct bits, the layout is the one of the higher priority bit
        let priority = [
            FluentResourceState::GENERAL,
            FluentResourceState::COLOR_ATTACHMENT,
            FluentResourceState::DEPTH_STENCIL_WRITE,
            FluentResourceState::DEPTH_STENCIL_READ_ONLY,
            FluentResourceState::SHADER_READ_ONLY,
            FluentResourceState::PRESENT,
            FluentResourceState::TRANSFER_SRC,
            FluentResourceState::TRANSFER_DST,
        ];

        for (i, higher) in priority.iter().enumerate() {
            for lower in &priority[i + 1..] {
                assert_eq!(
                    determine_image_layout(*higher),
                    determine_image_layout(*higher | *lower),
                    "{:?} should win over {:?}",
                    higher,
                    lower
                );
            }
        }
    }

    #[test]
    fn test_access_flags() {
        assert_eq!(
            FluentAccessFlags::empty(),
            determine_access_flags(FluentResourceState::UNDEFINED)
        );
        assert_eq!(
            FluentAccessFlags::SHADER_READ | FluentAccessFlags::SHADER_WRITE,
            determine_access_flags(FluentResourceState::GENERAL)
        );
        assert_eq!(
            FluentAccessFlags::COLOR_ATTACHMENT_READ | FluentAccessFlags::COLOR_ATTACHMENT_WRITE,
            determine_access_flags(FluentResourceState::COLOR_ATTACHMENT)
        );
        assert_eq!(
            FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            determine_access_flags(FluentResourceState::DEPTH_STENCIL_WRITE)
        );
        assert_eq!(
            FluentAccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            determine_access_flags(FluentResourceState::DEPTH_STENCIL_READ_ONLY)
        );
        assert_eq!(
            FluentAccessFlags::SHADER_READ,
            determine_access_flags(FluentResourceState::SHADER_READ_ONLY)
        );
        assert_eq!(
            FluentAccessFlags::TRANSFER_READ,
            determine_access_flags(FluentResourceState::TRANSFER_SRC)
        );
        assert_eq!(
            FluentAccessFlags::TRANSFER_WRITE,
            determine_access_flags(FluentResourceState::TRANSFER_DST)
        );
        assert_eq!(
            FluentAccessFlags::MEMORY_READ,
            determine_access_flags(FluentResourceState::PRESENT)
        );

        // Multiple bits are OR-ed
        assert_eq!(
            FluentAccessFlags::SHADER_READ | FluentAccessFlags::TRANSFER_READ,
            determine_access_flags(
                FluentResourceState::SHADER_READ_ONLY | FluentResourceState::TRANSFER_SRC
            )
        );
    }

    #[test]
    fn test_stage_flags_undefined_is_top_of_pipe() {
        for queue_type in &[
            FluentQueueType::Graphics,
            FluentQueueType::Compute,
            FluentQueueType::Transfer,
        ] {
            assert_eq!(
                FluentPipelineStageFlags::TOP_OF_PIPE,
                determine_pipeline_stage_flags(
                    determine_access_flags(FluentResourceState::UNDEFINED),
                    *queue_type
                )
            );
        }
    }

    #[test]
    fn test_stage_flags_attachments_escalate() {
        for state in &[
            FluentResourceState::COLOR_ATTACHMENT,
            FluentResourceState::DEPTH_STENCIL_WRITE,
            FluentResourceState::DEPTH_STENCIL_READ_ONLY,
        ] {
            for queue_type in &[FluentQueueType::Graphics, FluentQueueType::Compute] {
                assert_eq!(
                    FluentPipelineStageFlags::ALL_COMMANDS,
                    determine_pipeline_stage_flags(determine_access_flags(*state), *queue_type)
                );
            }
        }

        assert_eq!(
            FluentPipelineStageFlags::ALL_COMMANDS,
            determine_pipeline_stage_flags(
                FluentAccessFlags::VERTEX_ATTRIBUTE_READ,
                FluentQueueType::Graphics
            )
        );
        assert_eq!(
            FluentPipelineStageFlags::ALL_COMMANDS,
            determine_pipeline_stage_flags(
                FluentAccessFlags::INPUT_ATTACHMENT_READ,
                FluentQueueType::Transfer
            )
        );
    }

    #[test]
    fn test_stage_flags_shader_access() {
        let access = determine_access_flags(FluentResourceState::SHADER_READ_ONLY);

        assert_eq!(
            FluentPipelineStageFlags::VERTEX_SHADER
                | FluentPipelineStageFlags::FRAGMENT_SHADER
                | FluentPipelineStageFlags::COMPUTE_SHADER,
            determine_pipeline_stage_flags(access, FluentQueueType::Graphics)
        );

        assert_eq!(
            FluentPipelineStageFlags::COMPUTE_SHADER,
            determine_pipeline_stage_flags(access, FluentQueueType::Compute)
        );
    }

    #[test]
    fn test_stage_flags_transfer_host_indirect() {
        assert_eq!(
            FluentPipelineStageFlags::TRANSFER,
            determine_pipeline_stage_flags(
                determine_access_flags(FluentResourceState::TRANSFER_DST),
                FluentQueueType::Graphics
            )
        );
        assert_eq!(
            FluentPipelineStageFlags::HOST,
            determine_pipeline_stage_flags(FluentAccessFlags::HOST_WRITE, FluentQueueType::Transfer)
        );
        assert_eq!(
            FluentPipelineStageFlags::DRAW_INDIRECT,
            determine_pipeline_stage_flags(
                FluentAccessFlags::INDIRECT_COMMAND_READ,
                FluentQueueType::Graphics
            )
        );

        // Present only has memory read access, nothing maps it to a stage
        assert_eq!(
            FluentPipelineStageFlags::TOP_OF_PIPE,
            determine_pipeline_stage_flags(
                determine_access_flags(FluentResourceState::PRESENT),
                FluentQueueType::Graphics
            )
        );
    }

    #[test]
    fn test_d3d12_states() {
        assert_eq!(
            FluentD3D12ResourceStates::COMMON,
            determine_d3d12_resource_state(FluentResourceState::UNDEFINED)
        );
        assert_eq!(
            FluentD3D12ResourceStates::UNORDERED_ACCESS,
            determine_d3d12_resource_state(FluentResourceState::GENERAL)
        );
        assert_eq!(
            FluentD3D12ResourceStates::RENDER_TARGET,
            determine_d3d12_resource_state(FluentResourceState::COLOR_ATTACHMENT)
        );
        assert_eq!(
            FluentD3D12ResourceStates::DEPTH_WRITE,
            determine_d3d12_resource_state(FluentResourceState::DEPTH_STENCIL_WRITE)
        );
        assert_eq!(
            FluentD3D12ResourceStates::DEPTH_READ,
            determine_d3d12_resource_state(FluentResourceState::DEPTH_STENCIL_READ_ONLY)
        );
        assert_eq!(
            FluentD3D12ResourceStates::PIXEL_SHADER_RESOURCE,
            determine_d3d12_resource_state(FluentResourceState::SHADER_READ_ONLY)
        );
        assert_eq!(
            FluentD3D12ResourceStates::COPY_SOURCE,
            determine_d3d12_resource_state(FluentResourceState::TRANSFER_SRC)
        );
        assert_eq!(
            FluentD3D12ResourceStates::COPY_DEST,
            determine_d3d12_resource_state(FluentResourceState::TRANSFER_DST)
        );
        assert_eq!(
            FluentD3D12ResourceStates::PRESENT,
            determine_d3d12_resource_state(FluentResourceState::PRESENT)
        );
    }

    #[test]
    fn test_every_state_has_access() {
        for state in ALL_RESOURCE_STATES.iter() {
            assert!(!determine_access_flags(*state).is_empty(), "{:?}", state);
            assert_ne!(
                FluentImageLayout::Undefined,
                determine_image_layout(*state),
                "{:?}",
                state
            );
        }
    }

    #[test]
    fn test_barrier_scopes_union() {
        let (src, dst) = determine_barrier_scopes(
            vec![
                (
                    FluentResourceState::UNDEFINED,
                    FluentResourceState::TRANSFER_DST,
                ),
                (
                    FluentResourceState::TRANSFER_DST,
                    FluentResourceState::SHADER_READ_ONLY,
                ),
            ],
            FluentQueueType::Transfer,
        );

        assert_eq!(FluentAccessFlags::TRANSFER_WRITE, src.access);
        assert_eq!(FluentPipelineStageFlags::TRANSFER, src.stages);
        assert_eq!(
            FluentAccessFlags::TRANSFER_WRITE | FluentAccessFlags::SHADER_READ,
            dst.access
        );
        assert_eq!(
            FluentPipelineStageFlags::COMPUTE_SHADER | FluentPipelineStageFlags::TRANSFER,
            dst.stages
        );
    }
}
