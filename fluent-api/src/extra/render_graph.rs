//! A small render graph built on the public command buffer API.
//!
//! Passes run in the order they were added. Each pass declares the images it writes as color or
//! depth-stencil outputs, and the images it samples. `build` works out the load op of every output
//! (clear or discard for the first writer, load after that) and allocates the images. `execute`
//! records the barriers between passes, begins each pass and calls its callback. One image name is
//! the backbuffer source: it is never allocated, the image passed to `execute` is used in its place
//! and left in the PRESENT state.
//!
//! Render passes and framebuffers come from the device's pass cache. A swapchain resize recreates
//! the images sized to the swapchain, which only costs new framebuffers.

use crate::*;
use fnv::FnvHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FluentRenderGraphPassId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FluentRenderGraphExtents {
    /// Follows `set_swapchain_dimensions`
    MatchSwapchain,
    Fixed(FluentExtents2D),
}

/// An image written by a pass
#[derive(Copy, Clone, Debug)]
pub struct FluentRenderGraphImageInfo {
    pub format: FluentFormat,
    pub sample_count: FluentSampleCount,
    pub extents: FluentRenderGraphExtents,
    /// Used by the first pass that writes the image. Without one its contents start undefined.
    pub clear_value: Option<FluentClearValue>,
}

impl Default for FluentRenderGraphImageInfo {
    fn default() -> Self {
        FluentRenderGraphImageInfo {
            format: FluentFormat::UNDEFINED,
            sample_count: FluentSampleCount::SampleCount1,
            extents: FluentRenderGraphExtents::MatchSwapchain,
            clear_value: None,
        }
    }
}

pub type FluentRenderGraphPassCallback =
    Box<dyn FnMut(&FluentCommandBuffer, &FluentRenderGraphResources) -> FluentResult<()> + Send>;

/// Images visible to pass callbacks, looked up by name
pub struct FluentRenderGraphResources<'a> {
    image_indices: &'a FnvHashMap<String, usize>,
    images: &'a [GraphImage],
    backbuffer_index: Option<usize>,
    backbuffer: &'a FluentImage,
}

impl<'a> FluentRenderGraphResources<'a> {
    pub fn image(
        &self,
        name: &str,
    ) -> Option<&'a FluentImage> {
        let index = *self.image_indices.get(name)?;
        resolve_image(self.images, self.backbuffer_index, self.backbuffer, index).ok()
    }
}

struct GraphImage {
    name: String,
    // None until some pass writes the image
    info: Option<FluentRenderGraphImageInfo>,
    sampled: bool,
    image: Option<FluentImage>,
    state: FluentResourceState,
}

struct GraphPass {
    name: String,
    color_outputs: Vec<usize>,
    depth_stencil_output: Option<usize>,
    sampled_inputs: Vec<usize>,
    callback: Option<FluentRenderGraphPassCallback>,
    color_load_ops: Vec<FluentLoadOp>,
    depth_stencil_load_op: FluentLoadOp,
}

fn resolve_image<'a>(
    images: &'a [GraphImage],
    backbuffer_index: Option<usize>,
    backbuffer: &'a FluentImage,
    index: usize,
) -> FluentResult<&'a FluentImage> {
    if backbuffer_index == Some(index) {
        return Ok(backbuffer);
    }

    images[index].image.as_ref().ok_or_else(|| {
        format!(
            "render graph image {} has not been allocated",
            images[index].name
        )
        .into()
    })
}

fn load_op_for_first_write(info: &FluentRenderGraphImageInfo) -> FluentLoadOp {
    if info.clear_value.is_some() {
        FluentLoadOp::Clear
    } else {
        FluentLoadOp::DontCare
    }
}

pub struct FluentRenderGraph {
    device: FluentDevice,
    passes: Vec<GraphPass>,
    images: Vec<GraphImage>,
    image_indices: FnvHashMap<String, usize>,
    backbuffer_index: Option<usize>,
    swapchain_extents: FluentExtents2D,
    built: bool,
}

impl FluentRenderGraph {
    pub fn new(device: &FluentDevice) -> Self {
        FluentRenderGraph {
            device: device.clone(),
            passes: Default::default(),
            images: Default::default(),
            image_indices: Default::default(),
            backbuffer_index: None,
            swapchain_extents: Default::default(),
            built: false,
        }
    }

    fn image_index(
        &mut self,
        name: &str,
    ) -> usize {
        if let Some(index) = self.image_indices.get(name) {
            return *index;
        }

        let index = self.images.len();
        self.images.push(GraphImage {
            name: name.to_string(),
            info: None,
            sampled: false,
            image: None,
            state: FluentResourceState::UNDEFINED,
        });
        self.image_indices.insert(name.to_string(), index);
        index
    }

    fn declare_output(
        &mut self,
        name: &str,
        info: &FluentRenderGraphImageInfo,
    ) -> FluentResult<usize> {
        let index = self.image_index(name);
        let image = &mut self.images[index];
        match image.info {
            None => image.info = Some(*info),
            Some(existing) => {
                if existing.format != info.format
                    || existing.sample_count != info.sample_count
                    || existing.extents != info.extents
                {
                    Err(format!(
                        "render graph image {} was declared as {:?} and redeclared as {:?}",
                        name, existing, info
                    ))?;
                }
            }
        }

        self.built = false;
        Ok(index)
    }

    pub fn add_pass(
        &mut self,
        name: &str,
    ) -> FluentRenderGraphPassId {
        self.built = false;
        self.passes.push(GraphPass {
            name: name.to_string(),
            color_outputs: Default::default(),
            depth_stencil_output: None,
            sampled_inputs: Default::default(),
            callback: None,
            color_load_ops: Default::default(),
            depth_stencil_load_op: FluentLoadOp::DontCare,
        });
        FluentRenderGraphPassId(self.passes.len() - 1)
    }

    /// Color outputs are attached in the order they are added
    pub fn add_color_output(
        &mut self,
        pass: FluentRenderGraphPassId,
        name: &str,
        info: &FluentRenderGraphImageInfo,
    ) -> FluentResult<()> {
        if info.format.is_depth_or_stencil() {
            Err(format!(
                "color output {} can't use depth format {:?}",
                name, info.format
            ))?;
        }

        let index = self.declare_output(name, info)?;
        self.passes[pass.0].color_outputs.push(index);
        Ok(())
    }

    pub fn add_depth_stencil_output(
        &mut self,
        pass: FluentRenderGraphPassId,
        name: &str,
        info: &FluentRenderGraphImageInfo,
    ) -> FluentResult<()> {
        if !info.format.is_depth_or_stencil() {
            Err(format!(
                "depth-stencil output {} can't use color format {:?}",
                name, info.format
            ))?;
        }

        if self.passes[pass.0].depth_stencil_output.is_some() {
            Err(format!(
                "pass {} already has a depth-stencil output",
                self.passes[pass.0].name
            ))?;
        }

        let index = self.declare_output(name, info)?;
        self.passes[pass.0].depth_stencil_output = Some(index);
        Ok(())
    }

    /// Read an image written by an earlier pass from shaders
    pub fn add_sampled_input(
        &mut self,
        pass: FluentRenderGraphPassId,
        name: &str,
    ) {
        let index = self.image_index(name);
        self.images[index].sampled = true;
        self.passes[pass.0].sampled_inputs.push(index);
        self.built = false;
    }

    /// Record draws for a pass. It runs between the pass's begin and end.
    pub fn set_pass_callback(
        &mut self,
        pass: FluentRenderGraphPassId,
        callback: FluentRenderGraphPassCallback,
    ) {
        self.passes[pass.0].callback = Some(callback);
    }

    /// The named image is the one presented. The image passed to `execute` takes its place.
    pub fn set_backbuffer_source(
        &mut self,
        name: &str,
    ) {
        self.backbuffer_index = Some(self.image_index(name));
        self.built = false;
    }

    pub fn swapchain_dimensions(&self) -> FluentExtents2D {
        self.swapchain_extents
    }

    /// Recreate the images sized to the swapchain, if the graph is built. None of the graph's
    /// images may still be in use by the GPU.
    pub fn set_swapchain_dimensions(
        &mut self,
        width: u32,
        height: u32,
    ) -> FluentResult<()> {
        let extents = FluentExtents2D { width, height };
        if extents == self.swapchain_extents {
            return Ok(());
        }

        log::debug!(
            "Render graph swapchain dimensions changed from {:?} to {:?}",
            self.swapchain_extents,
            extents
        );
        self.swapchain_extents = extents;

        if self.built {
            self.setup_attachments(|info| {
                info.extents == FluentRenderGraphExtents::MatchSwapchain
            })?;
        }

        Ok(())
    }

    /// Validate the graph, derive load ops and allocate every image it needs
    pub fn build(&mut self) -> FluentResult<()> {
        profiling::scope!("FluentRenderGraph::build");
        let backbuffer_index = self
            .backbuffer_index
            .ok_or("render graph has no backbuffer source")?;

        if self.swapchain_extents.width == 0 || self.swapchain_extents.height == 0 {
            Err("render graph needs swapchain dimensions before it is built")?;
        }

        let FluentRenderGraph { passes, images, .. } = &mut *self;
        let images: &[GraphImage] = images;
        let mut written = vec![false; images.len()];
        for pass in passes.iter_mut() {
            if pass.color_outputs.len() > MAX_ATTACHMENTS_COUNT {
                Err(format!(
                    "pass {} has {} color outputs, max is {}",
                    pass.name,
                    pass.color_outputs.len(),
                    MAX_ATTACHMENTS_COUNT
                ))?;
            }

            if pass.color_outputs.is_empty() && pass.depth_stencil_output.is_none() {
                Err(format!("pass {} has no outputs", pass.name))?;
            }

            for &input in &pass.sampled_inputs {
                let image = &images[input];
                if !written[input] {
                    Err(format!(
                        "pass {} samples {} before any pass writes it",
                        pass.name, image.name
                    ))?;
                }

                let is_output = pass.color_outputs.contains(&input)
                    || pass.depth_stencil_output == Some(input);
                if is_output {
                    Err(format!(
                        "pass {} both samples and writes {}",
                        pass.name, image.name
                    ))?;
                }
            }

            let outputs = pass
                .color_outputs
                .iter()
                .chain(pass.depth_stencil_output.iter());
            let mut pass_extents = None;
            for &output in outputs {
                let image = &images[output];
                let extents = image
                    .info
                    .as_ref()
                    .map(|x| x.extents)
                    .ok_or_else(|| format!("render graph image {} has no info", image.name))?;
                if *pass_extents.get_or_insert(extents) != extents {
                    Err(format!(
                        "outputs of pass {} don't share the same extents",
                        pass.name
                    ))?;
                }
            }

            let mut load_op = |index: usize| -> FluentLoadOp {
                if written[index] {
                    return FluentLoadOp::Load;
                }

                written[index] = true;
                images[index]
                    .info
                    .as_ref()
                    .map(load_op_for_first_write)
                    .unwrap_or(FluentLoadOp::DontCare)
            };

            pass.color_load_ops = pass.color_outputs.iter().map(|&x| load_op(x)).collect();
            pass.depth_stencil_load_op = pass
                .depth_stencil_output
                .map(|x| load_op(x))
                .unwrap_or(FluentLoadOp::DontCare);
        }

        let backbuffer = &self.images[backbuffer_index];
        if !written[backbuffer_index] {
            Err(format!(
                "backbuffer source {} is never written",
                backbuffer.name
            ))?;
        }

        if let Some(info) = &backbuffer.info {
            if info.format.is_depth_or_stencil() {
                Err(format!(
                    "backbuffer source {} is a depth-stencil image",
                    backbuffer.name
                ))?;
            }

            if info.extents != FluentRenderGraphExtents::MatchSwapchain {
                Err(format!(
                    "backbuffer source {} must match the swapchain size",
                    backbuffer.name
                ))?;
            }
        }

        self.setup_attachments(|_| true)?;
        self.built = true;

        log::debug!(
            "Built render graph with {} passes and {} images",
            self.passes.len(),
            self.images.len()
        );
        Ok(())
    }

    // (Re)create the allocated images whose info passes the filter
    fn setup_attachments<F: Fn(&FluentRenderGraphImageInfo) -> bool>(
        &mut self,
        filter: F,
    ) -> FluentResult<()> {
        for (index, image) in self.images.iter_mut().enumerate() {
            if self.backbuffer_index == Some(index) {
                continue;
            }

            let info = match &image.info {
                Some(info) if filter(info) => *info,
                _ => continue,
            };

            if let Some(old_image) = image.image.take() {
                self.device.destroy_image(&old_image)?;
            }

            let extents = match info.extents {
                FluentRenderGraphExtents::MatchSwapchain => self.swapchain_extents,
                FluentRenderGraphExtents::Fixed(extents) => extents,
            };

            let mut descriptor_type = if info.format.is_depth_or_stencil() {
                FluentDescriptorType::DEPTH_STENCIL_ATTACHMENT
            } else {
                FluentDescriptorType::COLOR_ATTACHMENT
            };
            if image.sampled {
                descriptor_type |= FluentDescriptorType::SAMPLED_IMAGE;
            }

            log::trace!(
                "Allocating render graph image {} ({}x{} {:?})",
                image.name,
                extents.width,
                extents.height,
                info.format
            );
            image.image = Some(self.device.create_image(&FluentImageInfo {
                width: extents.width,
                height: extents.height,
                format: info.format,
                sample_count: info.sample_count,
                descriptor_type,
                ..Default::default()
            })?);
            image.state = FluentResourceState::UNDEFINED;
        }

        Ok(())
    }

    /// The image allocated for `name`. The backbuffer source has none.
    pub fn image(
        &self,
        name: &str,
    ) -> Option<&FluentImage> {
        let index = *self.image_indices.get(name)?;
        self.images[index].image.as_ref()
    }

    /// Record every pass into `command_buffer`, rendering the backbuffer source into `backbuffer`.
    /// The previous contents of `backbuffer` are discarded, and it ends up in the PRESENT state.
    pub fn execute(
        &mut self,
        command_buffer: &FluentCommandBuffer,
        backbuffer: &FluentImage,
    ) -> FluentResult<()> {
        profiling::scope!("FluentRenderGraph::execute");
        if !self.built {
            Err("render graph must be built before it is executed")?;
        }

        let backbuffer_index = self
            .backbuffer_index
            .ok_or("render graph has no backbuffer source")?;
        if backbuffer.width() != self.swapchain_extents.width
            || backbuffer.height() != self.swapchain_extents.height
        {
            Err(format!(
                "backbuffer is {}x{} but the render graph expects {}x{}",
                backbuffer.width(),
                backbuffer.height(),
                self.swapchain_extents.width,
                self.swapchain_extents.height
            ))?;
        }

        if let Some(info) = &self.images[backbuffer_index].info {
            if info.format != backbuffer.format() {
                Err(format!(
                    "backbuffer format is {:?} but the render graph expects {:?}",
                    backbuffer.format(),
                    info.format
                ))?;
            }
        }

        let FluentRenderGraph {
            passes,
            images,
            image_indices,
            backbuffer_index: backbuffer_slot,
            ..
        } = &mut *self;
        let images: &[GraphImage] = images;
        let backbuffer_slot = *backbuffer_slot;
        let resolve = |index: usize| resolve_image(images, backbuffer_slot, backbuffer, index);
        let clear_value = |index: usize| {
            images[index]
                .info
                .and_then(|x| x.clear_value)
                .unwrap_or_default()
        };

        let mut states: Vec<_> = images.iter().map(|x| x.state).collect();
        states[backbuffer_index] = FluentResourceState::UNDEFINED;

        let resources = FluentRenderGraphResources {
            image_indices,
            images,
            backbuffer_index: backbuffer_slot,
            backbuffer,
        };

        for pass in passes.iter_mut() {
            let required_states = pass
                .sampled_inputs
                .iter()
                .map(|&x| (x, FluentResourceState::SHADER_READ_ONLY))
                .chain(
                    pass.color_outputs
                        .iter()
                        .map(|&x| (x, FluentResourceState::COLOR_ATTACHMENT)),
                )
                .chain(
                    pass.depth_stencil_output
                        .map(|x| (x, FluentResourceState::DEPTH_STENCIL_WRITE)),
                );

            let mut barriers = Vec::new();
            for (index, new_state) in required_states {
                if states[index] != new_state {
                    barriers.push(FluentImageBarrier::state_transition(
                        resolve(index)?,
                        states[index],
                        new_state,
                    ));
                    states[index] = new_state;
                }
            }
            command_buffer.cmd_barrier(&[], &barriers)?;

            let mut color_attachments = Vec::with_capacity(pass.color_outputs.len());
            for (&index, &load_op) in pass.color_outputs.iter().zip(&pass.color_load_ops) {
                color_attachments.push(FluentAttachmentInfo::color(
                    resolve(index)?,
                    load_op,
                    clear_value(index),
                ));
            }

            let depth_attachment = match pass.depth_stencil_output {
                Some(index) => Some(FluentAttachmentInfo::depth_stencil(
                    resolve(index)?,
                    pass.depth_stencil_load_op,
                    clear_value(index),
                )),
                None => None,
            };

            let first_attachment = color_attachments
                .first()
                .or_else(|| depth_attachment.as_ref())
                .map(|x| x.image)
                .ok_or_else(|| format!("pass {} has no outputs", pass.name))?;

            let begin_info = FluentRenderPassBeginInfo {
                width: first_attachment.width(),
                height: first_attachment.height(),
                color_attachments,
                depth_attachment,
            };

            log::trace!("Executing render graph pass {}", pass.name);
            command_buffer.cmd_begin_render_pass(&begin_info)?;
            if let Some(callback) = &mut pass.callback {
                (**callback)(command_buffer, &resources)?;
            }
            command_buffer.cmd_end_render_pass()?;
        }

        command_buffer.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                backbuffer,
                states[backbuffer_index],
                FluentResourceState::PRESENT,
            )],
        )?;

        for (image, state) in self.images.iter_mut().zip(states) {
            image.state = state;
        }

        Ok(())
    }

    /// Destroy every image the graph allocated
    pub fn destroy(&mut self) -> FluentResult<()> {
        for image in &mut self.images {
            if let Some(image) = image.image.take() {
                self.device.destroy_image(&image)?;
            }
        }

        self.built = false;
        Ok(())
    }
}

impl Drop for FluentRenderGraph {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::warn!("Failed to destroy render graph images: {}", e);
        }
    }
}

#[cfg(all(test, feature = "fluent-headless"))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const COLOR_FORMAT: FluentFormat = FluentFormat::R8G8B8A8_UNORM;

    struct TestContext {
        _backend: FluentBackend,
        device: FluentDevice,
        queue: FluentQueue,
        command_buffer: FluentCommandBuffer,
    }

    impl TestContext {
        fn new() -> Self {
            let _ = env_logger::try_init();
            let backend =
                create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
            let device = backend.create_device(&Default::default()).unwrap();
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

        fn backbuffer(
            &self,
            width: u32,
            height: u32,
        ) -> FluentImage {
            self.device
                .create_image(&FluentImageInfo {
                    width,
                    height,
                    format: COLOR_FORMAT,
                    descriptor_type: FluentDescriptorType::COLOR_ATTACHMENT,
                    ..Default::default()
                })
                .unwrap()
        }

        fn execute(
            &self,
            graph: &mut FluentRenderGraph,
            backbuffer: &FluentImage,
        ) -> FluentResult<()> {
            self.command_buffer.begin()?;
            graph.execute(&self.command_buffer, backbuffer)?;
            self.command_buffer.end()?;
            self.queue.immediate_submit(&self.command_buffer)
        }
    }

    fn color_output(clear_color: [f32; 4]) -> FluentRenderGraphImageInfo {
        FluentRenderGraphImageInfo {
            format: COLOR_FORMAT,
            clear_value: Some(FluentClearValue::color(clear_color)),
            ..Default::default()
        }
    }

    // "scene" renders color and depth, "final" samples the scene color into the backbuffer
    fn two_pass_graph(
        device: &FluentDevice,
        executed_passes: &Arc<AtomicUsize>,
    ) -> FluentRenderGraph {
        let mut graph = FluentRenderGraph::new(device);

        let scene = graph.add_pass("scene");
        graph
            .add_color_output(scene, "scene_color", &color_output([1.0, 0.0, 0.0, 1.0]))
            .unwrap();
        graph
            .add_depth_stencil_output(
                scene,
                "depth",
                &FluentRenderGraphImageInfo {
                    format: FluentFormat::D32_SFLOAT,
                    clear_value: Some(FluentClearValue::depth_stencil(1.0, 0)),
                    ..Default::default()
                },
            )
            .unwrap();
        let counter = executed_passes.clone();
        graph.set_pass_callback(
            scene,
            Box::new(
                move |_: &FluentCommandBuffer,
                      _: &FluentRenderGraphResources|
                      -> FluentResult<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            ),
        );

        let final_pass = graph.add_pass("final");
        graph.add_sampled_input(final_pass, "scene_color");
        graph
            .add_color_output(final_pass, "backbuffer", &color_output([0.0, 0.0, 1.0, 1.0]))
            .unwrap();
        let counter = executed_passes.clone();
        graph.set_pass_callback(
            final_pass,
            Box::new(
                move |_: &FluentCommandBuffer,
                      resources: &FluentRenderGraphResources|
                      -> FluentResult<()> {
                    assert!(resources.image("scene_color").is_some());
                    assert!(resources.image("backbuffer").is_some());
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            ),
        );

        graph.set_backbuffer_source("backbuffer");
        graph
    }

    #[test]
    fn test_two_pass_graph() {
        let ctx = TestContext::new();
        let executed_passes = Arc::new(AtomicUsize::new(0));
        let mut graph = two_pass_graph(&ctx.device, &executed_passes);
        graph.set_swapchain_dimensions(4, 4).unwrap();
        graph.build().unwrap();

        let backbuffer = ctx.backbuffer(4, 4);
        ctx.execute(&mut graph, &backbuffer).unwrap();
        assert_eq!(2, executed_passes.load(Ordering::SeqCst));

        let headless = ctx.device.headless_device().unwrap();
        let scene_color = graph.image("scene_color").unwrap();
        for texel in headless.read_image(scene_color, 0, 0).unwrap().chunks(4) {
            assert_eq!([255, 0, 0, 255], texel);
        }
        for texel in headless.read_image(&backbuffer, 0, 0).unwrap().chunks(4) {
            assert_eq!([0, 0, 255, 255], texel);
        }

        assert_eq!(
            FluentImageLayout::ShaderReadOnlyOptimal,
            headless.image_layout(scene_color).unwrap()
        );
        assert_eq!(
            FluentImageLayout::PresentSrc,
            headless.image_layout(&backbuffer).unwrap()
        );
        assert!(graph.image("backbuffer").is_none());

        let stats = ctx.device.pass_cache_stats();
        assert_eq!(2, stats.render_passes_created);
        assert_eq!(2, stats.framebuffers_created);

        // The scene color goes back from SHADER_READ_ONLY to COLOR_ATTACHMENT
        ctx.execute(&mut graph, &backbuffer).unwrap();
        assert_eq!(4, executed_passes.load(Ordering::SeqCst));
        let stats = ctx.device.pass_cache_stats();
        assert_eq!(2, stats.render_passes_created);
        assert_eq!(2, stats.framebuffers_created);
    }

    #[test]
    fn test_resize_recreates_framebuffers_only() {
        let ctx = TestContext::new();
        let executed_passes = Arc::new(AtomicUsize::new(0));
        let mut graph = two_pass_graph(&ctx.device, &executed_passes);
        graph.set_swapchain_dimensions(8, 8).unwrap();
        graph.build().unwrap();

        let backbuffer = ctx.backbuffer(8, 8);
        ctx.execute(&mut graph, &backbuffer).unwrap();
        let before = ctx.device.pass_cache_stats();
        assert_eq!(2, before.render_pass_count);
        assert_eq!(2, before.framebuffer_count);

        graph.set_swapchain_dimensions(16, 16).unwrap();
        assert_eq!(16, graph.image("scene_color").unwrap().width());
        assert_eq!(16, graph.image("depth").unwrap().height());

        // A backbuffer of the old size is rejected
        ctx.command_buffer.begin().unwrap();
        assert!(graph.execute(&ctx.command_buffer, &backbuffer).is_err());
        ctx.command_buffer.end().unwrap();

        ctx.device.destroy_image(&backbuffer).unwrap();
        let backbuffer = ctx.backbuffer(16, 16);
        ctx.execute(&mut graph, &backbuffer).unwrap();

        let after = ctx.device.pass_cache_stats();
        assert_eq!(before.render_passes_created, after.render_passes_created);
        assert_eq!(2, after.render_pass_count);
        assert_eq!(before.framebuffers_created + 2, after.framebuffers_created);
        assert_eq!(2, after.framebuffer_count);

        let headless = ctx.device.headless_device().unwrap();
        let contents = headless.read_image(&backbuffer, 0, 0).unwrap();
        assert_eq!(16 * 16 * 4, contents.len());
    }

    #[test]
    fn test_second_writer_loads() {
        let ctx = TestContext::new();
        let mut graph = FluentRenderGraph::new(&ctx.device);

        let first = graph.add_pass("first");
        graph
            .add_color_output(first, "backbuffer", &color_output([0.0, 1.0, 0.0, 1.0]))
            .unwrap();
        let second = graph.add_pass("second");
        graph
            .add_color_output(second, "backbuffer", &color_output([1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        graph.set_backbuffer_source("backbuffer");
        graph.set_swapchain_dimensions(2, 2).unwrap();
        graph.build().unwrap();

        assert_eq!(vec![FluentLoadOp::Clear], graph.passes[0].color_load_ops);
        assert_eq!(vec![FluentLoadOp::Load], graph.passes[1].color_load_ops);

        // The second pass keeps what the first one cleared
        let backbuffer = ctx.backbuffer(2, 2);
        ctx.execute(&mut graph, &backbuffer).unwrap();
        let headless = ctx.device.headless_device().unwrap();
        for texel in headless.read_image(&backbuffer, 0, 0).unwrap().chunks(4) {
            assert_eq!([0, 255, 0, 255], texel);
        }
    }

    #[test]
    fn test_build_errors() {
        let ctx = TestContext::new();

        let mut graph = FluentRenderGraph::new(&ctx.device);
        let pass = graph.add_pass("pass");
        graph
            .add_color_output(pass, "color", &color_output([0.0; 4]))
            .unwrap();
        graph.set_swapchain_dimensions(4, 4).unwrap();
        assert!(graph.build().is_err());

        graph.set_backbuffer_source("color");
        graph.build().unwrap();

        let mut graph = FluentRenderGraph::new(&ctx.device);
        let pass = graph.add_pass("pass");
        graph.add_sampled_input(pass, "missing");
        graph
            .add_color_output(pass, "backbuffer", &color_output([0.0; 4]))
            .unwrap();
        graph.set_backbuffer_source("backbuffer");
        graph.set_swapchain_dimensions(4, 4).unwrap();
        assert!(graph.build().is_err());

        let mut graph = FluentRenderGraph::new(&ctx.device);
        let pass = graph.add_pass("pass");
        assert!(graph
            .add_color_output(
                pass,
                "depth",
                &FluentRenderGraphImageInfo {
                    format: FluentFormat::D32_SFLOAT,
                    ..Default::default()
                }
            )
            .is_err());
        graph
            .add_color_output(pass, "backbuffer", &color_output([0.0; 4]))
            .unwrap();
        graph.set_backbuffer_source("backbuffer");
        assert!(graph.build().is_err());
    }
}
