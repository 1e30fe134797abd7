use super::FluentDeviceHeadless;
use crate::backend::{FluentBackendImpl, FluentDeviceImpl};
use crate::*;
use std::sync::Arc;

/// Backend that creates `FluentDeviceHeadless` devices. Creation never fails, no GPU or window
/// system is touched.
pub struct FluentBackendHeadless {
    app_name: String,
}

impl FluentBackendHeadless {
    pub fn new(backend_info: &FluentBackendInfo) -> FluentResult<Self> {
        if backend_info.validation_mode == FluentValidationMode::Enabled {
            log::debug!("Headless backend always validates, validation mode is ignored");
        }

        Ok(FluentBackendHeadless {
            app_name: backend_info.app_name.clone(),
        })
    }
}

impl FluentBackendImpl for FluentBackendHeadless {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::Headless
    }

    fn create_device(
        &self,
        device_info: &FluentDeviceInfo,
    ) -> FluentResult<Arc<dyn FluentDeviceImpl>> {
        log::debug!("Creating headless device for {}", self.app_name);
        Ok(Arc::new(FluentDeviceHeadless::new(device_info)))
    }
}
