//! Placeholder for a D3D12 backend.
//!
//! Only the api type is reported. Creating a device, and every other operation, fails with
//! `FluentError::Unsupported`. Resource states already translate to D3D12 state bits through
//! `determine_d3d12_resource_state`.

use crate::backend::FluentBackendImpl;
use crate::*;

pub struct FluentBackendDx12;

impl FluentBackendDx12 {
    pub fn new(backend_info: &FluentBackendInfo) -> FluentResult<Self> {
        log::warn!(
            "The D3D12 backend for {} is a placeholder, devices can't be created",
            backend_info.app_name
        );
        Ok(FluentBackendDx12)
    }
}

impl FluentBackendImpl for FluentBackendDx12 {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::D3D12
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_create_device_unsupported() {
        let backend = create_renderer_backend(FluentApiType::D3D12, &Default::default()).unwrap();
        assert_eq!(FluentApiType::D3D12, backend.api_type());
        match backend.create_device(&Default::default()) {
            Err(FluentError::Unsupported { api, operation }) => {
                assert_eq!(FluentApiType::D3D12, api);
                assert_eq!("create_device", operation);
            }
            _ => panic!("expected an unsupported error"),
        }
    }
}
