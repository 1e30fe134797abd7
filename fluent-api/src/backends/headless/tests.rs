use crate::reflection::tests::SpirvModuleBuilder;
use crate::*;
use std::sync::{Arc, Mutex};

struct TestContext {
    _backend: FluentBackend,
    device: FluentDevice,
    queue: FluentQueue,
    command_buffer: FluentCommandBuffer,
}

impl TestContext {
    fn new() -> Self {
        Self::with_device_info(&Default::default())
    }

    fn with_device_info(device_info: &FluentDeviceInfo) -> Self {
        let _ = env_logger::try_init();
        let backend =
            create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
        let device = backend.create_device(device_info).unwrap();
        let queue = device.create_queue(FluentQueueType::Graphics).unwrap();
        let command_pool = queue.create_command_pool().unwrap();
        let command_buffer = queue
            .create_command_buffers(&command_pool, 1)
            .unwrap()
            .pop()
            .unwrap();

        TestContext {
            _backend: backend,
            device,
            queue,
            command_buffer,
        }
    }

    fn headless(&self) -> &super::FluentDeviceHeadless {
        self.device.headless_device().unwrap()
    }

    // Record with `f` and run to completion
    fn run<F: FnOnce(&FluentCommandBuffer) -> FluentResult<()>>(
        &self,
        f: F,
    ) -> FluentResult<()> {
        self.command_buffer.begin()?;
        f(&self.command_buffer)?;
        self.command_buffer.end()?;
        self.queue.immediate_submit(&self.command_buffer)
    }

    fn color_target(
        &self,
        width: u32,
        height: u32,
        format: FluentFormat,
    ) -> FluentImage {
        self.device
            .create_image(&FluentImageInfo {
                width,
                height,
                format,
                descriptor_type: FluentDescriptorType::COLOR_ATTACHMENT
                    | FluentDescriptorType::SAMPLED_IMAGE,
                ..Default::default()
            })
            .unwrap()
    }
}

fn clear_pass(
    image: &FluentImage,
    color: [f32; 4],
) -> FluentRenderPassBeginInfo {
    FluentRenderPassBeginInfo {
        width: image.width(),
        height: image.height(),
        color_attachments: vec![FluentAttachmentInfo::color(
            image,
            FluentLoadOp::Clear,
            FluentClearValue::color(color),
        )],
        depth_attachment: None,
    }
}

struct TestWindow {
    size: Mutex<FluentExtents2D>,
}

impl TestWindow {
    fn new(
        width: u32,
        height: u32,
    ) -> Arc<Self> {
        Arc::new(TestWindow {
            size: Mutex::new(FluentExtents2D { width, height }),
        })
    }

    fn set_size(
        &self,
        width: u32,
        height: u32,
    ) {
        *self.size.lock().unwrap() = FluentExtents2D { width, height };
    }
}

impl FluentWsi for TestWindow {
    fn raw_window_handle(&self) -> raw_window_handle::RawWindowHandle {
        unreachable!("headless swapchains never create a surface")
    }

    fn window_size(&self) -> FluentExtents2D {
        *self.size.lock().unwrap()
    }

    fn framebuffer_size(&self) -> FluentExtents2D {
        *self.size.lock().unwrap()
    }
}

#[test]
fn test_clear_pass_reuses_render_pass() {
    let ctx = TestContext::new();
    let image = ctx.color_target(256, 256, FluentFormat::R8G8B8A8_UNORM);

    for (color, expected) in &[
        ([1.0, 0.0, 0.0, 1.0], [255u8, 0, 0, 255]),
        ([0.0, 0.0, 1.0, 1.0], [0, 0, 255, 255]),
    ] {
        ctx.run(|cb| {
            cb.cmd_begin_render_pass(&clear_pass(&image, *color))?;
            cb.cmd_end_render_pass()
        })
        .unwrap();

        let texels = ctx.headless().read_image(&image, 0, 0).unwrap();
        assert_eq!(256 * 256 * 4, texels.len());
        assert_eq!(&expected[..], &texels[..4]);
        assert_eq!(&expected[..], &texels[texels.len() - 4..]);
    }

    // Clear values are not part of the render pass identity
    let stats = ctx.device.pass_cache_stats();
    assert_eq!(1, stats.render_passes_created);
    assert_eq!(1, stats.render_pass_hits);
    assert_eq!(1, stats.framebuffers_created);
    assert_eq!(1, stats.framebuffer_hits);
    assert_eq!(
        FluentImageLayout::ColorAttachmentOptimal,
        ctx.headless().image_layout(&image).unwrap()
    );

    // Same formats on another image share the render pass but need a new framebuffer
    let other = ctx.color_target(256, 256, FluentFormat::R8G8B8A8_UNORM);
    ctx.run(|cb| {
        cb.cmd_begin_render_pass(&clear_pass(&other, [0.0; 4]))?;
        cb.cmd_end_render_pass()
    })
    .unwrap();

    let stats = ctx.device.pass_cache_stats();
    assert_eq!(1, stats.render_passes_created);
    assert_eq!(2, stats.framebuffers_created);
    assert_eq!(1, stats.render_pass_count);
    assert_eq!(2, stats.framebuffer_count);

    // Destroying an image drops the framebuffers built on it
    ctx.device.destroy_image(&other).unwrap();
    assert_eq!(1, ctx.device.pass_cache_stats().framebuffer_count);
    ctx.device.destroy_image(&image).unwrap();
}

#[test]
fn test_depth_attachment_changes_render_pass() {
    let ctx = TestContext::new();
    let color = ctx.color_target(64, 64, FluentFormat::B8G8R8A8_UNORM);
    let depth = ctx
        .device
        .create_image(&FluentImageInfo {
            width: 64,
            height: 64,
            format: FluentFormat::D32_SFLOAT,
            descriptor_type: FluentDescriptorType::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        })
        .unwrap();

    ctx.run(|cb| {
        cb.cmd_begin_render_pass(&clear_pass(&color, [0.0; 4]))?;
        cb.cmd_end_render_pass()?;

        let mut begin_info = clear_pass(&color, [0.0; 4]);
        begin_info.depth_attachment = Some(FluentAttachmentInfo::depth_stencil(
            &depth,
            FluentLoadOp::Clear,
            FluentClearValue::depth_stencil(0.5, 0),
        ));
        cb.cmd_begin_render_pass(&begin_info)?;
        cb.cmd_end_render_pass()
    })
    .unwrap();

    assert_eq!(2, ctx.device.pass_cache_stats().render_passes_created);
    let depth_texels = ctx.headless().read_image(&depth, 0, 0).unwrap();
    assert_eq!(&0.5f32.to_le_bytes()[..], &depth_texels[..4]);
}

#[test]
fn test_clear_d24_depth_to_far_plane() {
    let ctx = TestContext::new();
    let depth = ctx
        .device
        .create_image(&FluentImageInfo {
            width: 4,
            height: 4,
            format: FluentFormat::D24_UNORM_S8_UINT,
            descriptor_type: FluentDescriptorType::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        })
        .unwrap();

    ctx.run(|cb| {
        cb.cmd_begin_render_pass(&FluentRenderPassBeginInfo {
            width: 4,
            height: 4,
            color_attachments: vec![],
            depth_attachment: Some(FluentAttachmentInfo::depth_stencil(
                &depth,
                FluentLoadOp::Clear,
                FluentClearValue::depth_stencil(1.0, 0),
            )),
        })?;
        cb.cmd_end_render_pass()
    })
    .unwrap();

    let texels = ctx.headless().read_image(&depth, 0, 0).unwrap();
    assert_eq!(4 * 4 * 4, texels.len());
    assert!(texels.chunks_exact(4).all(|x| x == [0xff, 0xff, 0xff, 0]));
}

#[test]
fn test_swapchain_resize_flushes_framebuffers() {
    let ctx = TestContext::new();
    let window = TestWindow::new(800, 600);
    let wsi: Arc<dyn FluentWsi> = window.clone();
    let mut swapchain = ctx
        .device
        .create_swapchain(&FluentSwapchainInfo {
            queue: &ctx.queue,
            width: 800,
            height: 600,
            format: FluentFormat::B8G8R8A8_SRGB,
            vsync: true,
            min_image_count: 3,
            wsi: Some(wsi),
        })
        .unwrap();
    assert_eq!(3, swapchain.image_count());
    assert_eq!((800, 600), (swapchain.width(), swapchain.height()));

    let image_acquired = ctx.device.create_semaphore().unwrap();
    let render_finished = ctx.device.create_semaphore().unwrap();
    let frame_fence = ctx.device.create_fence().unwrap();

    let render_frame = |swapchain: &FluentSwapchain| -> FluentResult<FluentPresentResult> {
        let image_index = swapchain.acquire_next_image(Some(&image_acquired), None)?;
        let image = swapchain.image(image_index);

        ctx.command_buffer.begin()?;
        ctx.command_buffer
            .cmd_begin_render_pass(&clear_pass(image, [0.2, 0.2, 0.2, 1.0]))?;
        ctx.command_buffer.cmd_end_render_pass()?;
        ctx.command_buffer.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                image,
                FluentResourceState::COLOR_ATTACHMENT,
                FluentResourceState::PRESENT,
            )],
        )?;
        ctx.command_buffer.end()?;

        ctx.device.reset_fences(&[&frame_fence])?;
        ctx.queue.submit(&FluentQueueSubmitInfo {
            wait_semaphores: vec![&image_acquired],
            command_buffers: vec![&ctx.command_buffer],
            signal_semaphores: vec![&render_finished],
            signal_fence: Some(&frame_fence),
        })?;
        ctx.device.wait_for_fences(&[&frame_fence])?;

        ctx.queue.present(&FluentQueuePresentInfo {
            wait_semaphores: vec![&render_finished],
            swapchain,
            image_index,
        })
    };

    assert_eq!(FluentPresentResult::Success, render_frame(&swapchain).unwrap());
    let stats = ctx.device.pass_cache_stats();
    assert_eq!(1, stats.render_pass_count);
    assert_eq!(1, stats.framebuffer_count);

    window.set_size(1024, 768);
    assert_eq!(
        FluentPresentResult::SuboptimalOrOutOfDate,
        render_frame(&swapchain).unwrap()
    );

    swapchain.resize(1024, 768).unwrap();
    assert_eq!((1024, 768), (swapchain.width(), swapchain.height()));
    let stats = ctx.device.pass_cache_stats();
    assert_eq!(0, stats.framebuffer_count);
    assert_eq!(1, stats.render_pass_count);
    assert_eq!(1, stats.framebuffer_flushes);

    assert_eq!(FluentPresentResult::Success, render_frame(&swapchain).unwrap());
    let stats = ctx.device.pass_cache_stats();
    assert_eq!(1, stats.render_passes_created);
    assert_eq!(1, stats.framebuffer_count);
    assert_eq!(3, ctx.headless().stats().presents);

    ctx.device.destroy_swapchain(&swapchain).unwrap();
    assert_eq!(0, ctx.device.pass_cache_stats().framebuffer_count);
}

#[test]
fn test_swapchain_image_count_clamped() {
    let ctx = TestContext::new();
    let swapchain = ctx
        .device
        .create_swapchain(&FluentSwapchainInfo {
            queue: &ctx.queue,
            width: 32,
            height: 32,
            format: FluentFormat::D32_SFLOAT,
            vsync: false,
            min_image_count: 1,
            wsi: None,
        })
        .unwrap();

    assert_eq!(2, swapchain.image_count());
    assert_eq!(FluentFormat::B8G8R8A8_SRGB, swapchain.format());
    assert!(swapchain.images().iter().all(|x| x.is_swapchain_image()));
    assert_eq!(0, swapchain.acquire_next_image(None, None).unwrap());
    assert_eq!(1, swapchain.acquire_next_image(None, None).unwrap());
    assert_eq!(0, swapchain.acquire_next_image(None, None).unwrap());
}

#[test]
fn test_present_requires_present_state() {
    let ctx = TestContext::new();
    let swapchain = ctx
        .device
        .create_swapchain(&FluentSwapchainInfo {
            queue: &ctx.queue,
            width: 32,
            height: 32,
            format: FluentFormat::B8G8R8A8_UNORM,
            vsync: true,
            min_image_count: 2,
            wsi: None,
        })
        .unwrap();

    let image_index = swapchain.acquire_next_image(None, None).unwrap();
    let result = ctx.queue.present(&FluentQueuePresentInfo {
        wait_semaphores: vec![],
        swapchain: &swapchain,
        image_index,
    });
    assert!(result.is_err());
}

fn uniform_buffer_shader(ctx: &TestContext) -> FluentShader {
    let mut builder = SpirvModuleBuilder::new();
    builder.uniform_buffer("PerObject", "per_object", 0, 0);
    let bytes = builder.bytes();
    ctx.device
        .create_shader(&FluentShaderInfo {
            vertex: Some(&bytes),
            ..Default::default()
        })
        .unwrap()
}

#[test]
fn test_conflicting_stages_rejected_at_shader_creation() {
    use crate::reflection::tests::{DIM_2D, STORAGE_CLASS_UNIFORM_CONSTANT};

    let ctx = TestContext::new();
    let mut vertex = SpirvModuleBuilder::new();
    vertex.uniform_buffer("PerFrame", "per_frame", 0, 0);
    let mut fragment = SpirvModuleBuilder::new();
    let image = fragment.image_type(DIM_2D, 1);
    fragment.variable(image, STORAGE_CLASS_UNIFORM_CONSTANT, "albedo", Some(0), Some(0));
    let vertex = vertex.bytes();
    let fragment = fragment.bytes();

    let result = ctx.device.create_shader(&FluentShaderInfo {
        vertex: Some(&vertex),
        fragment: Some(&fragment),
        ..Default::default()
    });
    assert!(matches!(result, Err(FluentError::ReflectionError(_))));
}

#[test]
fn test_descriptor_pool_exhaustion() {
    let ctx = TestContext::new();
    let shader = uniform_buffer_shader(&ctx);
    let layout = ctx.device.create_descriptor_set_layout(&shader).unwrap();
    let set_info = FluentDescriptorSetInfo {
        descriptor_set_layout: &layout,
        set: 0,
    };

    let mut descriptor_sets = Vec::default();
    for _ in 0..DESCRIPTOR_POOL_DESCRIPTORS_PER_TYPE {
        descriptor_sets.push(ctx.device.create_descriptor_set(&set_info).unwrap());
    }

    // Out of uniform buffer descriptors, long before running out of sets
    assert!(ctx.device.create_descriptor_set(&set_info).is_err());
    assert_eq!(
        DESCRIPTOR_POOL_DESCRIPTORS_PER_TYPE,
        ctx.headless().allocated_descriptor_set_count()
    );

    let freed = descriptor_sets.pop().unwrap();
    ctx.device.destroy_descriptor_set(&freed).unwrap();
    ctx.device.create_descriptor_set(&set_info).unwrap();
}

#[test]
fn test_update_descriptor_set_by_name() {
    let ctx = TestContext::new();
    let shader = uniform_buffer_shader(&ctx);
    let layout = ctx.device.create_descriptor_set_layout(&shader).unwrap();
    let descriptor_set = ctx
        .device
        .create_descriptor_set(&FluentDescriptorSetInfo {
            descriptor_set_layout: &layout,
            set: 0,
        })
        .unwrap();
    let buffer = ctx
        .device
        .create_buffer(&FluentBufferInfo {
            size: 64,
            descriptor_type: FluentDescriptorType::UNIFORM_BUFFER,
            memory_usage: FluentMemoryUsage::CpuToGpu,
        })
        .unwrap();

    let write = |name: &'static str| FluentDescriptorWrite {
        descriptor_name: name,
        descriptor_count: 1,
        descriptors: FluentDescriptors::Buffers(vec![FluentBufferDescriptor {
            buffer: &buffer,
            offset: 0,
            range: 0,
        }]),
    };

    ctx.device
        .update_descriptor_set(&descriptor_set, &[write("PerObject")])
        .unwrap();
    assert!(ctx
        .device
        .update_descriptor_set(&descriptor_set, &[write("PerFrame")])
        .is_err());

    // A destroyed buffer can't be written
    ctx.device.destroy_buffer(&buffer).unwrap();
    assert!(ctx
        .device
        .update_descriptor_set(&descriptor_set, &[write("PerObject")])
        .is_err());
}

#[test]
fn test_stale_handles() {
    let ctx = TestContext::new();
    let buffer = ctx
        .device
        .create_buffer(&FluentBufferInfo::for_staging_buffer(16))
        .unwrap();
    ctx.device.destroy_buffer(&buffer).unwrap();
    match ctx.device.destroy_buffer(&buffer) {
        Err(FluentError::StaleHandle(kind)) => assert_eq!("buffer", kind),
        _ => panic!("destroying a buffer twice must fail"),
    }
    assert!(ctx.device.map_buffer(&buffer).is_err());

    let image = ctx.color_target(4, 4, FluentFormat::R8G8B8A8_UNORM);
    ctx.device.destroy_image(&image).unwrap();
    ctx.command_buffer.begin().unwrap();
    assert!(ctx
        .command_buffer
        .cmd_begin_render_pass(&clear_pass(&image, [0.0; 4]))
        .is_err());
    assert!(ctx.headless().read_image(&image, 0, 0).is_err());

    let fence = ctx.device.create_fence().unwrap();
    ctx.device.destroy_fence(&fence).unwrap();
    assert!(ctx.device.fence_status(&fence).is_err());
}

#[test]
fn test_copy_buffer_readback() {
    let ctx = TestContext::new();
    let staging = ctx
        .device
        .create_buffer(&FluentBufferInfo::for_staging_buffer(16))
        .unwrap();
    let data: Vec<u8> = (1..=16).collect();
    ctx.device
        .copy_to_host_visible_buffer(&staging, &data)
        .unwrap();

    let readback = ctx
        .device
        .create_buffer(&FluentBufferInfo {
            size: 16,
            descriptor_type: FluentDescriptorType::STORAGE_BUFFER,
            memory_usage: FluentMemoryUsage::GpuToCpu,
        })
        .unwrap();

    ctx.run(|cb| cb.cmd_copy_buffer(&staging, 4, &readback, 0, 8))
        .unwrap();

    let result = ctx.device.read_host_visible_buffer(&readback).unwrap();
    assert_eq!(&[5u8, 6, 7, 8, 9, 10, 11, 12], &result[..8]);
    assert_eq!(&[0u8; 8], &result[8..]);
    assert_eq!(1, ctx.headless().stats().submits);
}

#[test]
fn test_upload_and_generate_mipmaps() {
    let ctx = TestContext::new();
    let image = ctx
        .device
        .create_image(&FluentImageInfo {
            width: 4,
            height: 4,
            format: FluentFormat::R8_UNORM,
            mip_levels: 3,
            ..Default::default()
        })
        .unwrap();
    let staging = ctx
        .device
        .create_buffer(&FluentBufferInfo::for_staging_buffer(16))
        .unwrap();
    let texels: Vec<u8> = (0..16).map(|x| x * 4).collect();
    ctx.device
        .copy_to_host_visible_buffer(&staging, &texels)
        .unwrap();

    ctx.run(|cb| {
        cb.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &image,
                FluentResourceState::UNDEFINED,
                FluentResourceState::TRANSFER_DST,
            )],
        )?;
        cb.cmd_copy_buffer_to_image(&staging, &image, &Default::default())?;
        cb.cmd_generate_mipmaps(&image, FluentResourceState::TRANSFER_DST)?;
        cb.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &image,
                FluentResourceState::TRANSFER_DST,
                FluentResourceState::SHADER_READ_ONLY,
            )],
        )
    })
    .unwrap();

    let headless = ctx.headless();
    assert_eq!(texels, headless.read_image(&image, 0, 0).unwrap());
    assert_eq!(vec![10u8, 18, 42, 50], headless.read_image(&image, 0, 1).unwrap());
    assert_eq!(vec![30u8], headless.read_image(&image, 0, 2).unwrap());
    assert_eq!(
        FluentImageLayout::ShaderReadOnlyOptimal,
        headless.image_layout(&image).unwrap()
    );
}

#[test]
fn test_clear_color_image_restores_state() {
    let ctx = TestContext::new();
    let image = ctx
        .device
        .create_image(&FluentImageInfo {
            width: 2,
            height: 2,
            format: FluentFormat::R8G8B8A8_UNORM,
            mip_levels: 2,
            ..Default::default()
        })
        .unwrap();

    ctx.run(|cb| {
        cb.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &image,
                FluentResourceState::UNDEFINED,
                FluentResourceState::SHADER_READ_ONLY,
            )],
        )?;
        cb.cmd_clear_color_image(
            &image,
            FluentResourceState::SHADER_READ_ONLY,
            [0.0, 1.0, 0.0, 1.0],
        )
    })
    .unwrap();

    let headless = ctx.headless();
    assert_eq!(vec![0u8, 255, 0, 255], headless.read_image(&image, 0, 1).unwrap());
    assert_eq!(
        FluentImageLayout::ShaderReadOnlyOptimal,
        headless.image_layout(&image).unwrap()
    );
}

#[test]
fn test_mismatched_barrier_fails_at_submit() {
    let ctx = TestContext::new();
    let image = ctx.color_target(4, 4, FluentFormat::R8G8B8A8_UNORM);

    // The image is still undefined, so claiming it is a transfer source is wrong
    let result = ctx.run(|cb| {
        cb.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &image,
                FluentResourceState::TRANSFER_SRC,
                FluentResourceState::SHADER_READ_ONLY,
            )],
        )
    });
    assert!(result.is_err());
    assert_eq!(
        FluentImageLayout::Undefined,
        ctx.headless().image_layout(&image).unwrap()
    );
}

#[test]
fn test_recording_rules() {
    let ctx = TestContext::new();
    let image = ctx.color_target(4, 4, FluentFormat::R8G8B8A8_UNORM);
    let buffer = ctx
        .device
        .create_buffer(&FluentBufferInfo::for_staging_buffer(16))
        .unwrap();
    let cb = &ctx.command_buffer;

    // Not recording yet
    assert!(cb.cmd_end_render_pass().is_err());
    assert!(cb.end().is_err());

    cb.begin().unwrap();
    assert!(cb.begin().is_err());
    assert!(cb.cmd_draw(3, 0).is_err());
    assert!(cb.cmd_dispatch(1, 1, 1).is_err());

    cb.cmd_begin_render_pass(&clear_pass(&image, [0.0; 4]))
        .unwrap();
    assert!(cb
        .cmd_begin_render_pass(&clear_pass(&image, [0.0; 4]))
        .is_err());
    assert!(cb.cmd_copy_buffer(&buffer, 0, &buffer, 8, 8).is_err());
    // No pipeline bound
    assert!(cb.cmd_draw(3, 0).is_err());
    assert!(cb.end().is_err());
    cb.cmd_end_render_pass().unwrap();
    cb.end().unwrap();

    // Unended command buffers can't be submitted
    cb.begin().unwrap();
    assert!(ctx.queue.immediate_submit(cb).is_err());
}

#[test]
fn test_pipeline_shares_render_pass_with_begin() {
    let ctx = TestContext::new();
    let shader = uniform_buffer_shader(&ctx);
    let layout = ctx.device.create_descriptor_set_layout(&shader).unwrap();
    let pipeline = ctx
        .device
        .create_graphics_pipeline(&FluentPipelineInfo {
            shader: &shader,
            descriptor_set_layout: &layout,
            vertex_layout: Default::default(),
            rasterizer_info: Default::default(),
            depth_state_info: Default::default(),
            blend_state_info: Default::default(),
            topology: Default::default(),
            sample_count: FluentSampleCount::SampleCount1,
            color_attachment_formats: vec![FluentFormat::R8G8B8A8_UNORM],
            depth_stencil_format: FluentFormat::UNDEFINED,
        })
        .unwrap();
    assert_eq!(1, ctx.device.pass_cache_stats().render_passes_created);

    let image = ctx.color_target(16, 16, FluentFormat::R8G8B8A8_UNORM);
    let begin_info = FluentRenderPassBeginInfo {
        width: 16,
        height: 16,
        color_attachments: vec![FluentAttachmentInfo::color(
            &image,
            FluentLoadOp::DontCare,
            Default::default(),
        )],
        depth_attachment: None,
    };

    ctx.run(|cb| {
        cb.cmd_begin_render_pass(&begin_info)?;
        cb.cmd_bind_pipeline(&pipeline)?;
        cb.cmd_set_viewport(0.0, 0.0, 16.0, 16.0, 0.0, 1.0)?;
        cb.cmd_set_scissor(0, 0, 16, 16)?;
        cb.cmd_draw(3, 0)?;
        cb.cmd_draw(3, 3)?;
        cb.cmd_end_render_pass()
    })
    .unwrap();

    let stats = ctx.device.pass_cache_stats();
    assert_eq!(1, stats.render_passes_created);
    assert_eq!(1, stats.render_pass_hits);
    assert_eq!(2, ctx.headless().stats().draws);
}

#[test]
fn test_unsignaled_fence_wait_fails() {
    let ctx = TestContext::new();
    let fence = ctx.device.create_fence().unwrap();
    assert_eq!(
        FluentFenceStatus::Incomplete,
        ctx.device.fence_status(&fence).unwrap()
    );
    assert!(ctx.device.wait_for_fences(&[&fence]).is_err());

    ctx.run(|_| Ok(())).unwrap();
    ctx.queue
        .submit(&FluentQueueSubmitInfo {
            command_buffers: vec![&ctx.command_buffer],
            signal_fence: Some(&fence),
            ..Default::default()
        })
        .unwrap();
    ctx.device.wait_for_fences(&[&fence]).unwrap();
    assert_eq!(
        FluentFenceStatus::Complete,
        ctx.device.fence_status(&fence).unwrap()
    );
}

#[test]
fn test_small_device_info() {
    let ctx = TestContext::with_device_info(&FluentDeviceInfo {
        max_descriptor_sets: 2,
        descriptors_per_type: 16,
    });
    let shader = uniform_buffer_shader(&ctx);
    let layout = ctx.device.create_descriptor_set_layout(&shader).unwrap();
    let set_info = FluentDescriptorSetInfo {
        descriptor_set_layout: &layout,
        set: 0,
    };

    ctx.device.create_descriptor_set(&set_info).unwrap();
    ctx.device.create_descriptor_set(&set_info).unwrap();
    assert!(ctx.device.create_descriptor_set(&set_info).is_err());
}
