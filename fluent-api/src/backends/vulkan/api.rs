use super::device::FluentDeviceVulkan;
use super::internal::instance::VkInstance;
use crate::backend::{FluentBackendImpl, FluentDeviceImpl};
use crate::*;
use std::sync::Arc;

/// Loads vulkan and creates the instance. Devices created from it keep the instance alive.
pub struct FluentBackendVulkan {
    instance: Arc<VkInstance>,
    wsi: Option<Arc<dyn FluentWsi>>,
}

impl FluentBackendVulkan {
    pub fn new(backend_info: &FluentBackendInfo) -> FluentResult<Self> {
        let window = backend_info.wsi.as_ref().map(|x| x.raw_window_handle());
        if window.is_none() {
            log::info!("No window was provided, swapchains will not be available");
        }

        let instance = VkInstance::new(
            &backend_info.app_name,
            window,
            backend_info.validation_mode,
        )?;

        Ok(FluentBackendVulkan {
            instance: Arc::new(instance),
            wsi: backend_info.wsi.clone(),
        })
    }
}

impl FluentBackendImpl for FluentBackendVulkan {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::Vulkan
    }

    fn create_device(
        &self,
        device_info: &FluentDeviceInfo,
    ) -> FluentResult<Arc<dyn FluentDeviceImpl>> {
        let device = FluentDeviceVulkan::new(self.instance.clone(), self.wsi.clone(), device_info)?;
        Ok(Arc::new(device))
    }
}
