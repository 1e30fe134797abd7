//! Placeholder for a Metal backend. Only the api type is reported, creating a device fails with
//! `FluentError::Unsupported`.

use crate::backend::FluentBackendImpl;
use crate::*;

pub struct FluentBackendMetal;

impl FluentBackendMetal {
    pub fn new(backend_info: &FluentBackendInfo) -> FluentResult<Self> {
        log::warn!(
            "The Metal backend for {} is a placeholder, devices can't be created",
            backend_info.app_name
        );
        Ok(FluentBackendMetal)
    }
}

impl FluentBackendImpl for FluentBackendMetal {
    fn api_type(&self) -> FluentApiType {
        FluentApiType::Metal
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_create_device_unsupported() {
        let backend = create_renderer_backend(FluentApiType::Metal, &Default::default()).unwrap();
        assert_eq!(FluentApiType::Metal, backend.api_type());
        match backend.create_device(&Default::default()) {
            Err(FluentError::Unsupported { api, operation }) => {
                assert_eq!(FluentApiType::Metal, api);
                assert_eq!("create_device", operation);
            }
            _ => panic!("expected an unsupported error"),
        }
    }
}
