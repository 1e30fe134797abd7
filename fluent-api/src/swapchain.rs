use crate::backend::FluentSwapchainImages;
use crate::*;

/// The presentable images of a window surface.
///
/// The images belong to the swapchain. They are recreated together on `resize`, which also drops
/// every cached framebuffer of the device. Render passes survive a resize.
pub struct FluentSwapchain {
    device: FluentDevice,
    handle: FluentSwapchainHandle,
    images: FluentSwapchainImages,
}

impl std::fmt::Debug for FluentSwapchain {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FluentSwapchain")
            .field("handle", &self.handle)
            .field("width", &self.images.width)
            .field("height", &self.images.height)
            .field("format", &self.images.format)
            .field("image_count", &self.images.images.len())
            .finish()
    }
}

impl FluentSwapchain {
    pub(crate) fn new(
        device: FluentDevice,
        handle: FluentSwapchainHandle,
        images: FluentSwapchainImages,
    ) -> Self {
        FluentSwapchain {
            device,
            handle,
            images,
        }
    }

    pub fn handle(&self) -> FluentSwapchainHandle {
        self.handle
    }

    pub fn format(&self) -> FluentFormat {
        self.images.format
    }

    pub fn width(&self) -> u32 {
        self.images.width
    }

    pub fn height(&self) -> u32 {
        self.images.height
    }

    pub fn image_count(&self) -> usize {
        self.images.images.len()
    }

    pub fn image(
        &self,
        index: u32,
    ) -> &FluentImage {
        &self.images.images[index as usize]
    }

    pub fn images(&self) -> &[FluentImage] {
        &self.images.images
    }

    /// Get the index of the next image to render to. Blocks until one is available. The semaphore
    /// and fence, if given, are signaled when the image is ready to be written.
    pub fn acquire_next_image(
        &self,
        semaphore: Option<&FluentSemaphore>,
        fence: Option<&FluentFence>,
    ) -> FluentResult<u32> {
        profiling::scope!("FluentSwapchain::acquire_next_image");
        self.device.inner().acquire_next_image(
            self.handle,
            semaphore.map(|x| x.handle()),
            fence.map(|x| x.handle()),
        )
    }

    /// Recreate the swapchain images at a new size. Previously returned images and framebuffers
    /// that reference them must not be used afterwards.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
    ) -> FluentResult<()> {
        assert!(width > 0 && height > 0, "swapchain extent must be non-zero");
        self.images = self
            .device
            .inner()
            .resize_swapchain(self.handle, width, height)?;
        log::info!(
            "Resized swapchain to {}x{}",
            self.images.width,
            self.images.height
        );
        Ok(())
    }
}
