//! Memoizes render passes and framebuffers by the structure of the attachments they are built for.
//!
//! Backends with retained pass objects (vulkan) own one `FluentPassCache` per device. Render pass
//! identity covers format, sample count, load op and state of every attachment. Framebuffer
//! identity adds the concrete images and the extent.

use crate::{FluentImageHandle, FluentRenderPassBeginInfo, FluentResult};
use crate::{FluentFormat, FluentLoadOp, FluentResourceState, FluentSampleCount};
use fnv::FnvHashMap;

/// The parts of one attachment that affect render pass compatibility
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FluentAttachmentKey {
    pub format: FluentFormat,
    pub sample_count: FluentSampleCount,
    pub load_op: FluentLoadOp,
    pub state: FluentResourceState,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FluentRenderPassKey {
    pub color_attachments: Vec<FluentAttachmentKey>,
    pub depth_attachment: Option<FluentAttachmentKey>,
}

impl FluentRenderPassKey {
    /// Clear values and image identity are deliberately not part of the key
    pub fn from_begin_info(begin_info: &FluentRenderPassBeginInfo) -> Self {
        let color_attachments = begin_info
            .color_attachments
            .iter()
            .map(|x| FluentAttachmentKey {
                format: x.image.info().format,
                sample_count: x.image.info().sample_count,
                load_op: x.load_op,
                state: x.state,
            })
            .collect();

        let depth_attachment = begin_info
            .depth_attachment
            .as_ref()
            .map(|x| FluentAttachmentKey {
                format: x.image.info().format,
                sample_count: x.image.info().sample_count,
                load_op: x.load_op,
                state: x.state,
            });

        FluentRenderPassKey {
            color_attachments,
            depth_attachment,
        }
    }

    /// A render pass compatible with any begin info that uses these formats. Pipelines are created
    /// against one of these since compatibility ignores load ops.
    pub fn for_pipeline(
        color_formats: &[FluentFormat],
        depth_stencil_format: FluentFormat,
        sample_count: FluentSampleCount,
    ) -> Self {
        let color_attachments = color_formats
            .iter()
            .map(|&format| FluentAttachmentKey {
                format,
                sample_count,
                load_op: FluentLoadOp::DontCare,
                state: FluentResourceState::COLOR_ATTACHMENT,
            })
            .collect();

        let depth_attachment = if depth_stencil_format != FluentFormat::UNDEFINED {
            Some(FluentAttachmentKey {
                format: depth_stencil_format,
                sample_count,
                load_op: FluentLoadOp::DontCare,
                state: FluentResourceState::DEPTH_STENCIL_WRITE,
            })
        } else {
            None
        };

        FluentRenderPassKey {
            color_attachments,
            depth_attachment,
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len() + self.depth_attachment.is_some() as usize
    }

    /// Sample count of the pass. Every attachment of a pass shares one.
    pub fn sample_count(&self) -> FluentSampleCount {
        self.depth_attachment
            .iter()
            .chain(self.color_attachments.iter())
            .next()
            .map(|x| x.sample_count)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FluentFramebufferKey {
    pub render_pass: FluentRenderPassKey,
    /// Color images in attachment order, then the depth image if any
    pub images: Vec<FluentImageHandle>,
    pub width: u32,
    pub height: u32,
}

impl FluentFramebufferKey {
    pub fn from_begin_info(
        render_pass: FluentRenderPassKey,
        begin_info: &FluentRenderPassBeginInfo,
    ) -> Self {
        let images = begin_info
            .color_attachments
            .iter()
            .chain(begin_info.depth_attachment.iter())
            .map(|x| x.image.handle())
            .collect();

        FluentFramebufferKey {
            render_pass,
            images,
            width: begin_info.width,
            height: begin_info.height,
        }
    }

    pub fn references_image(
        &self,
        image: FluentImageHandle,
    ) -> bool {
        self.images.contains(&image)
    }
}

/// Counters describing how well the pass cache is working
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FluentPassCacheStats {
    /// Render passes currently cached
    pub render_pass_count: usize,
    /// Framebuffers currently cached
    pub framebuffer_count: usize,
    pub render_passes_created: u64,
    pub framebuffers_created: u64,
    pub render_pass_hits: u64,
    pub framebuffer_hits: u64,
    /// Number of times the framebuffer cache was flushed (usually by a swapchain resize)
    pub framebuffer_flushes: u64,
}

/// Retrieve-or-create cache for render passes (`R`) and framebuffers (`F`). Values are native
/// handles, cloned out on every hit.
///
/// Render passes live until `drain`. Framebuffers additionally go away on `clear_framebuffers`,
/// since they hold on to specific images.
pub struct FluentPassCache<R: Clone, F: Clone> {
    render_passes: FnvHashMap<FluentRenderPassKey, R>,
    framebuffers: FnvHashMap<FluentFramebufferKey, F>,
    stats: FluentPassCacheStats,
}

impl<R: Clone, F: Clone> Default for FluentPassCache<R, F> {
    fn default() -> Self {
        FluentPassCache {
            render_passes: Default::default(),
            framebuffers: Default::default(),
            stats: Default::default(),
        }
    }
}

impl<R: Clone, F: Clone> FluentPassCache<R, F> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get_or_create_render_pass<CreateFn: FnOnce(&FluentRenderPassKey) -> FluentResult<R>>(
        &mut self,
        key: &FluentRenderPassKey,
        create_fn: CreateFn,
    ) -> FluentResult<R> {
        if let Some(render_pass) = self.render_passes.get(key) {
            self.stats.render_pass_hits += 1;
            return Ok(render_pass.clone());
        }

        let render_pass = (create_fn)(key)?;
        log::trace!(
            "Created render pass with {} attachments",
            key.attachment_count()
        );
        self.stats.render_passes_created += 1;
        self.render_passes.insert(key.clone(), render_pass.clone());
        Ok(render_pass)
    }

    pub fn get_or_create_framebuffer<CreateFn: FnOnce(&FluentFramebufferKey) -> FluentResult<F>>(
        &mut self,
        key: &FluentFramebufferKey,
        create_fn: CreateFn,
    ) -> FluentResult<F> {
        if let Some(framebuffer) = self.framebuffers.get(key) {
            self.stats.framebuffer_hits += 1;
            return Ok(framebuffer.clone());
        }

        let framebuffer = (create_fn)(key)?;
        log::trace!(
            "Created {}x{} framebuffer for {} images",
            key.width,
            key.height,
            key.images.len()
        );
        self.stats.framebuffers_created += 1;
        self.framebuffers.insert(key.clone(), framebuffer.clone());
        Ok(framebuffer)
    }

    /// Remove every cached framebuffer and hand them back for destruction. Render passes stay.
    pub fn clear_framebuffers(&mut self) -> Vec<F> {
        self.stats.framebuffer_flushes += 1;
        log::debug!("Flushing {} cached framebuffers", self.framebuffers.len());
        self.framebuffers.drain().map(|(_, x)| x).collect()
    }

    /// Remove the framebuffers that reference `image` and hand them back for destruction
    pub fn remove_framebuffers_referencing(
        &mut self,
        image: FluentImageHandle,
    ) -> Vec<F> {
        let keys: Vec<_> = self
            .framebuffers
            .keys()
            .filter(|key| key.references_image(image))
            .cloned()
            .collect();

        keys.iter()
            .filter_map(|key| self.framebuffers.remove(key))
            .collect()
    }

    /// Empty both caches, returning everything for destruction
    pub fn drain(&mut self) -> (Vec<R>, Vec<F>) {
        let render_passes = self.render_passes.drain().map(|(_, x)| x).collect();
        let framebuffers = self.framebuffers.drain().map(|(_, x)| x).collect();
        (render_passes, framebuffers)
    }

    pub fn stats(&self) -> FluentPassCacheStats {
        FluentPassCacheStats {
            render_pass_count: self.render_passes.len(),
            framebuffer_count: self.framebuffers.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluent_base::slab::{GenerationIndex, SlabKey};

    fn image_handle(index: u32) -> FluentImageHandle {
        FluentImageHandle::new(SlabKey::new(index, GenerationIndex::new(0)))
    }

    fn color_key(load_op: FluentLoadOp) -> FluentRenderPassKey {
        FluentRenderPassKey {
            color_attachments: vec![FluentAttachmentKey {
                format: FluentFormat::R8G8B8A8_UNORM,
                sample_count: FluentSampleCount::SampleCount1,
                load_op,
                state: FluentResourceState::COLOR_ATTACHMENT,
            }],
            depth_attachment: None,
        }
    }

    fn framebuffer_key(
        render_pass: &FluentRenderPassKey,
        image: FluentImageHandle,
    ) -> FluentFramebufferKey {
        FluentFramebufferKey {
            render_pass: render_pass.clone(),
            images: vec![image],
            width: 256,
            height: 256,
        }
    }

    #[test]
    fn test_render_pass_hit() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let mut next_id = 0;
        let mut create = |_: &FluentRenderPassKey| {
            next_id += 1;
            Ok(next_id)
        };

        let a = cache
            .get_or_create_render_pass(&color_key(FluentLoadOp::Clear), &mut create)
            .unwrap();
        let b = cache
            .get_or_create_render_pass(&color_key(FluentLoadOp::Clear), &mut create)
            .unwrap();
        assert_eq!(a, b);

        let stats = cache.stats();
        assert_eq!(1, stats.render_passes_created);
        assert_eq!(1, stats.render_pass_hits);
        assert_eq!(1, stats.render_pass_count);
    }

    #[test]
    fn test_render_pass_miss_on_structure() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let mut next_id = 0;
        let mut create = |_: &FluentRenderPassKey| {
            next_id += 1;
            Ok(next_id)
        };

        let clear = cache
            .get_or_create_render_pass(&color_key(FluentLoadOp::Clear), &mut create)
            .unwrap();
        let load = cache
            .get_or_create_render_pass(&color_key(FluentLoadOp::Load), &mut create)
            .unwrap();
        assert_ne!(clear, load);

        let mut msaa = color_key(FluentLoadOp::Clear);
        msaa.color_attachments[0].sample_count = FluentSampleCount::SampleCount4;
        let msaa = cache
            .get_or_create_render_pass(&msaa, &mut create)
            .unwrap();
        assert_ne!(clear, msaa);

        let mut with_depth = color_key(FluentLoadOp::Clear);
        with_depth.depth_attachment = Some(FluentAttachmentKey {
            format: FluentFormat::D32_SFLOAT,
            sample_count: FluentSampleCount::SampleCount1,
            load_op: FluentLoadOp::Clear,
            state: FluentResourceState::DEPTH_STENCIL_WRITE,
        });
        let with_depth = cache
            .get_or_create_render_pass(&with_depth, &mut create)
            .unwrap();
        assert_ne!(clear, with_depth);

        assert_eq!(4, cache.stats().render_passes_created);
    }

    #[test]
    fn test_framebuffer_depends_on_images() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let render_pass = color_key(FluentLoadOp::Clear);
        let mut next_id = 100;
        let mut create = |_: &FluentFramebufferKey| {
            next_id += 1;
            Ok(next_id)
        };

        let a = cache
            .get_or_create_framebuffer(&framebuffer_key(&render_pass, image_handle(0)), &mut create)
            .unwrap();
        let b = cache
            .get_or_create_framebuffer(&framebuffer_key(&render_pass, image_handle(1)), &mut create)
            .unwrap();
        let a_again = cache
            .get_or_create_framebuffer(&framebuffer_key(&render_pass, image_handle(0)), &mut create)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(a, a_again);
        assert_eq!(2, cache.stats().framebuffers_created);
        assert_eq!(1, cache.stats().framebuffer_hits);
    }

    #[test]
    fn test_clear_framebuffers_keeps_render_passes() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let render_pass_key = color_key(FluentLoadOp::Clear);

        let render_pass = cache
            .get_or_create_render_pass(&render_pass_key, |_| Ok(1))
            .unwrap();
        let framebuffer_key = framebuffer_key(&render_pass_key, image_handle(0));
        let framebuffer = cache
            .get_or_create_framebuffer(&framebuffer_key, |_| Ok(10))
            .unwrap();

        let flushed = cache.clear_framebuffers();
        assert_eq!(vec![framebuffer], flushed);
        assert_eq!(0, cache.stats().framebuffer_count);
        assert_eq!(1, cache.stats().framebuffer_flushes);

        // Equivalent key after the flush creates a new framebuffer
        let recreated = cache
            .get_or_create_framebuffer(&framebuffer_key, |_| Ok(11))
            .unwrap();
        assert_eq!(11, recreated);

        // The render pass survives
        let render_pass_again = cache
            .get_or_create_render_pass(&render_pass_key, |_| panic!("render pass was recreated"))
            .unwrap();
        assert_eq!(render_pass, render_pass_again);
    }

    #[test]
    fn test_remove_framebuffers_referencing() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let render_pass_key = color_key(FluentLoadOp::Clear);

        cache
            .get_or_create_framebuffer(&framebuffer_key(&render_pass_key, image_handle(0)), |_| {
                Ok(1)
            })
            .unwrap();
        cache
            .get_or_create_framebuffer(&framebuffer_key(&render_pass_key, image_handle(1)), |_| {
                Ok(2)
            })
            .unwrap();

        assert_eq!(
            vec![2],
            cache.remove_framebuffers_referencing(image_handle(1))
        );
        assert_eq!(1, cache.stats().framebuffer_count);
    }

    #[test]
    fn test_create_error_is_not_cached() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let key = color_key(FluentLoadOp::Clear);

        assert!(cache
            .get_or_create_render_pass(&key, |_| Err("out of memory".into()))
            .is_err());
        assert_eq!(0, cache.stats().render_pass_count);
        assert_eq!(5, cache.get_or_create_render_pass(&key, |_| Ok(5)).unwrap());
    }

    #[test]
    fn test_drain() {
        let mut cache = FluentPassCache::<u64, u64>::new();
        let key = color_key(FluentLoadOp::Clear);
        cache.get_or_create_render_pass(&key, |_| Ok(1)).unwrap();
        cache
            .get_or_create_framebuffer(&framebuffer_key(&key, image_handle(0)), |_| Ok(2))
            .unwrap();

        let (render_passes, framebuffers) = cache.drain();
        assert_eq!(vec![1], render_passes);
        assert_eq!(vec![2], framebuffers);
        assert_eq!(0, cache.stats().render_pass_count);
        assert_eq!(0, cache.stats().framebuffer_count);
    }

    #[test]
    fn test_pipeline_key() {
        let key = FluentRenderPassKey::for_pipeline(
            &[FluentFormat::B8G8R8A8_SRGB],
            FluentFormat::D32_SFLOAT,
            FluentSampleCount::SampleCount4,
        );
        assert_eq!(2, key.attachment_count());
        assert_eq!(FluentSampleCount::SampleCount4, key.sample_count());

        let no_depth = FluentRenderPassKey::for_pipeline(
            &[FluentFormat::B8G8R8A8_SRGB],
            FluentFormat::UNDEFINED,
            FluentSampleCount::SampleCount1,
        );
        assert!(no_depth.depth_attachment.is_none());
    }
}
