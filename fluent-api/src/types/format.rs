#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Pixel/vertex formats. Names follow the vulkan spelling; every backend maps these to its own
/// native format.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FluentFormat {
    UNDEFINED,
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16_SFLOAT,
    R16G16_SFLOAT,
    R16G16B16A16_SFLOAT,
    R32_UINT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    D32_SFLOAT,
    S8_UINT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl Default for FluentFormat {
    fn default() -> Self {
        FluentFormat::UNDEFINED
    }
}

impl FluentFormat {
    pub fn has_depth_aspect(self) -> bool {
        match self {
            FluentFormat::D16_UNORM
            | FluentFormat::D32_SFLOAT
            | FluentFormat::D16_UNORM_S8_UINT
            | FluentFormat::D24_UNORM_S8_UINT
            | FluentFormat::D32_SFLOAT_S8_UINT => true,
            _ => false,
        }
    }

    pub fn has_stencil_aspect(self) -> bool {
        match self {
            FluentFormat::S8_UINT
            | FluentFormat::D16_UNORM_S8_UINT
            | FluentFormat::D24_UNORM_S8_UINT
            | FluentFormat::D32_SFLOAT_S8_UINT => true,
            _ => false,
        }
    }

    pub fn is_depth_or_stencil(self) -> bool {
        self.has_depth_aspect() || self.has_stencil_aspect()
    }

    pub fn is_srgb(self) -> bool {
        match self {
            FluentFormat::R8G8B8A8_SRGB | FluentFormat::B8G8R8A8_SRGB => true,
            _ => false,
        }
    }

    /// Size of one texel/element in bytes. Zero for UNDEFINED.
    pub fn block_size_in_bytes(self) -> u32 {
        match self {
            FluentFormat::UNDEFINED => 0,
            FluentFormat::R8_UNORM | FluentFormat::S8_UINT => 1,
            FluentFormat::R8G8_UNORM | FluentFormat::R16_SFLOAT | FluentFormat::D16_UNORM => 2,
            FluentFormat::D16_UNORM_S8_UINT => 3,
            FluentFormat::R8G8B8A8_UNORM
            | FluentFormat::R8G8B8A8_SRGB
            | FluentFormat::B8G8R8A8_UNORM
            | FluentFormat::B8G8R8A8_SRGB
            | FluentFormat::R16G16_SFLOAT
            | FluentFormat::R32_UINT
            | FluentFormat::R32_SFLOAT
            | FluentFormat::D32_SFLOAT
            | FluentFormat::D24_UNORM_S8_UINT => 4,
            FluentFormat::D32_SFLOAT_S8_UINT => 5,
            FluentFormat::R16G16B16A16_SFLOAT | FluentFormat::R32G32_SFLOAT => 8,
            FluentFormat::R32G32B32_SFLOAT => 12,
            FluentFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stencil_aspects() {
        assert!(FluentFormat::D32_SFLOAT.has_depth_aspect());
        assert!(!FluentFormat::D32_SFLOAT.has_stencil_aspect());

        assert!(FluentFormat::D24_UNORM_S8_UINT.has_depth_aspect());
        assert!(FluentFormat::D24_UNORM_S8_UINT.has_stencil_aspect());

        assert!(!FluentFormat::S8_UINT.has_depth_aspect());
        assert!(FluentFormat::S8_UINT.has_stencil_aspect());

        assert!(!FluentFormat::R8G8B8A8_UNORM.is_depth_or_stencil());
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(4, FluentFormat::R8G8B8A8_UNORM.block_size_in_bytes());
        assert_eq!(16, FluentFormat::R32G32B32A32_SFLOAT.block_size_in_bytes());
        assert_eq!(0, FluentFormat::UNDEFINED.block_size_in_bytes());
    }
}
