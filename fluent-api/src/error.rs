use crate::FluentApiType;
#[cfg(feature = "fluent-vulkan")]
use ash::vk;
use std::sync::Arc;

pub type FluentResult<T> = Result<T, FluentError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
#[derive(Debug, Clone)]
pub enum FluentError {
    StringError(String),
    IoError(Arc<std::io::Error>),
    /// The selected backend does not implement this operation
    Unsupported {
        api: FluentApiType,
        operation: &'static str,
    },
    /// A handle was used after the object it referred to was destroyed
    StaleHandle(&'static str),
    /// Shader bytecode could not be reflected, or reflected bindings conflict
    ReflectionError(String),
    #[cfg(feature = "fluent-vulkan")]
    VkError(vk::Result),
    #[cfg(feature = "fluent-vulkan")]
    VkLoadingError(Arc<ash::LoadingError>),
    #[cfg(feature = "fluent-vulkan")]
    VkInstanceError(Arc<ash::InstanceError>),
    #[cfg(feature = "fluent-vulkan")]
    VkMemError(Arc<vk_mem::Error>),
}

impl std::error::Error for FluentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            FluentError::StringError(_) => None,
            FluentError::IoError(ref e) => Some(&**e),
            FluentError::Unsupported { .. } => None,
            FluentError::StaleHandle(_) => None,
            FluentError::ReflectionError(_) => None,

            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkError(ref e) => Some(e),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkLoadingError(ref e) => Some(&**e),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkInstanceError(ref e) => Some(&**e),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkMemError(ref e) => Some(&**e),
        }
    }
}

impl core::fmt::Display for FluentError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            FluentError::StringError(ref e) => e.fmt(fmt),
            FluentError::IoError(ref e) => e.fmt(fmt),
            FluentError::Unsupported { api, operation } => {
                write!(fmt, "{} is not supported by the {} backend", operation, api.name())
            }
            FluentError::StaleHandle(kind) => {
                write!(fmt, "{} handle refers to an object that was destroyed", kind)
            }
            FluentError::ReflectionError(ref e) => write!(fmt, "shader reflection failed: {}", e),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkError(ref e) => e.fmt(fmt),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkLoadingError(ref e) => e.fmt(fmt),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkInstanceError(ref e) => e.fmt(fmt),
            #[cfg(feature = "fluent-vulkan")]
            FluentError::VkMemError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for FluentError {
    fn from(str: &str) -> Self {
        FluentError::StringError(str.to_string())
    }
}

impl From<String> for FluentError {
    fn from(string: String) -> Self {
        FluentError::StringError(string)
    }
}

impl From<std::io::Error> for FluentError {
    fn from(error: std::io::Error) -> Self {
        FluentError::IoError(Arc::new(error))
    }
}

#[cfg(feature = "fluent-vulkan")]
impl From<vk::Result> for FluentError {
    fn from(result: vk::Result) -> Self {
        FluentError::VkError(result)
    }
}

#[cfg(feature = "fluent-vulkan")]
impl From<ash::LoadingError> for FluentError {
    fn from(result: ash::LoadingError) -> Self {
        FluentError::VkLoadingError(Arc::new(result))
    }
}

#[cfg(feature = "fluent-vulkan")]
impl From<ash::InstanceError> for FluentError {
    fn from(result: ash::InstanceError) -> Self {
        FluentError::VkInstanceError(Arc::new(result))
    }
}

#[cfg(feature = "fluent-vulkan")]
impl From<vk_mem::Error> for FluentError {
    fn from(error: vk_mem::Error) -> Self {
        FluentError::VkMemError(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails_with_str() -> FluentResult<()> {
        Err("something went wrong")?;
        Ok(())
    }

    #[test]
    fn test_str_conversion() {
        match fails_with_str() {
            Err(FluentError::StringError(message)) => assert_eq!("something went wrong", message),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_display() {
        let error = FluentError::Unsupported {
            api: FluentApiType::Metal,
            operation: "create_buffer",
        };
        assert_eq!(
            "create_buffer is not supported by the metal backend",
            format!("{}", error)
        );
    }
}
