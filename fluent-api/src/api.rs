use crate::backend::FluentBackendImpl;
use crate::*;

/// Primary entry point to using the API. Create one with `create_renderer_backend`.
///
/// Several backends may exist in one process at the same time. Every device created through a
/// backend, and every object created through those devices, must be destroyed before the backend
/// is destroyed.
pub struct FluentBackend {
    inner: Box<dyn FluentBackendImpl>,
    destroyed: bool,
}

impl FluentBackend {
    pub fn api_type(&self) -> FluentApiType {
        self.inner.api_type()
    }

    /// Create a device. Most of the interaction with the graphics backend is done through the
    /// returned `FluentDevice`, which may be cloned and shared across threads.
    pub fn create_device(
        &self,
        device_info: &FluentDeviceInfo,
    ) -> FluentResult<FluentDevice> {
        assert!(!self.destroyed, "backend was already destroyed");
        assert!(device_info.max_descriptor_sets > 0);
        assert!(device_info.descriptors_per_type > 0);

        let device = self.inner.create_device(device_info)?;
        log::info!("Created {} device", self.api_type().name());
        Ok(FluentDevice::new(device))
    }

    /// Destroys the backend. This is called automatically on drop if it was not called already.
    pub fn destroy(&mut self) -> FluentResult<()> {
        if self.destroyed {
            return Ok(());
        }

        self.destroyed = true;
        log::info!("Destroying {} backend", self.api_type().name());
        self.inner.destroy()
    }
}

impl Drop for FluentBackend {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("Error destroying backend: {}", e);
        }
    }
}

/// Instantiate the backend for `api`. Panics with "unsupported api" if that backend was not
/// compiled in (see the `fluent-*` cargo features).
#[allow(unreachable_code)]
pub fn create_renderer_backend(
    api: FluentApiType,
    backend_info: &FluentBackendInfo,
) -> FluentResult<FluentBackend> {
    log::info!(
        "Creating {} backend for {}",
        api.name(),
        backend_info.app_name
    );

    let inner: Box<dyn FluentBackendImpl> = match api {
        #[cfg(feature = "fluent-headless")]
        FluentApiType::Headless => Box::new(crate::headless::FluentBackendHeadless::new(
            backend_info,
        )?),
        #[cfg(feature = "fluent-vulkan")]
        FluentApiType::Vulkan => Box::new(crate::vulkan::FluentBackendVulkan::new(
            backend_info,
        )?),
        #[cfg(feature = "fluent-dx12")]
        FluentApiType::D3D12 => Box::new(crate::dx12::FluentBackendDx12::new(backend_info)?),
        #[cfg(feature = "fluent-metal")]
        FluentApiType::Metal => Box::new(crate::metal::FluentBackendMetal::new(backend_info)?),
        #[allow(unreachable_patterns)]
        _ => panic!(
            "unsupported api: {} backend was not compiled in",
            api.name()
        ),
    };

    Ok(FluentBackend {
        inner,
        destroyed: false,
    })
}

#[cfg(all(test, feature = "fluent-headless"))]
mod tests {
    use super::*;

    #[test]
    fn test_create_headless() {
        let backend =
            create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
        assert_eq!(FluentApiType::Headless, backend.api_type());
        let device = backend.create_device(&Default::default()).unwrap();
        assert_eq!(FluentApiType::Headless, device.api_type());
        device.destroy().unwrap();
    }

    #[test]
    fn test_backends_coexist() {
        let a = create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
        let b = create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
        let device_a = a.create_device(&Default::default()).unwrap();
        let device_b = b.create_device(&Default::default()).unwrap();

        let buffer = device_a
            .create_buffer(&FluentBufferInfo::for_staging_buffer(16))
            .unwrap();
        // Handles from one device are meaningless on another
        assert!(device_b.destroy_buffer(&buffer).is_err());
        device_a.destroy_buffer(&buffer).unwrap();
    }

    #[cfg(not(feature = "fluent-metal"))]
    #[test]
    #[should_panic(expected = "unsupported api")]
    fn test_unsupported_api() {
        let _ = create_renderer_backend(FluentApiType::Metal, &Default::default());
    }
}
