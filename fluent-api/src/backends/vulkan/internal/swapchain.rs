use super::conversions::format_from_vk;
use super::instance::WsiWindowHandle;
use crate::{FluentFormat, FluentResult};
use ash::extensions::khr;
use ash::vk;
use raw_window_handle::RawWindowHandle;

// Used when the surface accepts any format
const FALLBACK_SURFACE_FORMAT: FluentFormat = FluentFormat::B8G8R8A8_SRGB;

pub struct VkSwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

pub fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: RawWindowHandle,
) -> FluentResult<vk::SurfaceKHR> {
    let surface =
        unsafe { ash_window::create_surface(entry, instance, &WsiWindowHandle(window), None)? };
    Ok(surface)
}

pub fn query_swapchain_support(
    surface_loader: &khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> FluentResult<VkSwapchainSupport> {
    unsafe {
        let capabilities =
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?;
        let formats =
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?;
        let present_modes =
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?;

        Ok(VkSwapchainSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

/// The requested format if the surface supports it in sRGB-nonlinear color space, then
/// B8G8R8A8_SRGB, then the first format we have a name for
pub fn choose_surface_format(
    available_formats: &[vk::SurfaceFormatKHR],
    preferred_format: FluentFormat,
) -> FluentResult<(FluentFormat, vk::SurfaceFormatKHR)> {
    // A single UNDEFINED entry means the surface has no preference
    if available_formats.len() == 1 && available_formats[0].format == vk::Format::UNDEFINED {
        let format = if preferred_format == FluentFormat::UNDEFINED
            || preferred_format.is_depth_or_stencil()
        {
            FALLBACK_SURFACE_FORMAT
        } else {
            preferred_format
        };

        return Ok((
            format,
            vk::SurfaceFormatKHR {
                format: format.into(),
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ));
    }

    let find = |format: FluentFormat| {
        let vk_format: vk::Format = format.into();
        available_formats.iter().find(|x| {
            x.format == vk_format && x.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    };

    if let Some(surface_format) = find(preferred_format).or_else(|| find(FALLBACK_SURFACE_FORMAT)) {
        if let Some(format) = format_from_vk(surface_format.format) {
            return Ok((format, *surface_format));
        }
    }

    let (format, surface_format) = available_formats
        .iter()
        .filter_map(|x| format_from_vk(x.format).map(|format| (format, *x)))
        .next()
        .ok_or("surface supports no known format")?;

    log::warn!(
        "Surface does not support {:?}, using {:?}",
        preferred_format,
        format
    );
    Ok((format, surface_format))
}

/// FIFO with vsync. Otherwise the lowest latency mode available, falling back to FIFO since it
/// is always supported.
pub fn choose_present_mode(
    available_present_modes: &[vk::PresentModeKHR],
    vsync: bool,
) -> vk::PresentModeKHR {
    let preferred_present_modes: &[vk::PresentModeKHR] = if vsync {
        &[vk::PresentModeKHR::FIFO]
    } else {
        &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
    };

    for preferred_present_mode in preferred_present_modes {
        if available_present_modes.contains(preferred_present_mode) {
            return *preferred_present_mode;
        }
    }

    vk::PresentModeKHR::FIFO
}

/// The surface dictates the extent unless it reports u32::MAX, then the requested size is
/// clamped to what the surface allows
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != std::u32::MAX {
        capabilities.current_extent
    } else {
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        vk::Extent2D {
            width: width.max(min.width).min(max.width),
            height: height.max(min.height).min(max.height),
        }
    }
}

/// A max_image_count of 0 means there is no upper limit
pub fn choose_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    min_image_count: u32,
) -> u32 {
    let image_count = min_image_count.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn capabilities(
        current_extent: vk::Extent2D,
        min_image_count: u32,
        max_image_count: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count,
            max_image_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_preferred_format_wins() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB),
            surface_format(vk::Format::R8G8B8A8_UNORM),
        ];

        let (format, _) = choose_surface_format(&formats, FluentFormat::R8G8B8A8_UNORM).unwrap();
        assert_eq!(FluentFormat::R8G8B8A8_UNORM, format);

        let (format, _) = choose_surface_format(&formats, FluentFormat::R16_SFLOAT).unwrap();
        assert_eq!(FluentFormat::B8G8R8A8_SRGB, format);
    }

    #[test]
    fn test_format_fallbacks() {
        let formats = [
            surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
        ];
        let (format, surface_format) =
            choose_surface_format(&formats, FluentFormat::B8G8R8A8_SRGB).unwrap();
        assert_eq!(FluentFormat::R16G16B16A16_SFLOAT, format);
        assert_eq!(vk::Format::R16G16B16A16_SFLOAT, surface_format.format);

        let unknown = [surface_format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert!(choose_surface_format(&unknown, FluentFormat::B8G8R8A8_SRGB).is_err());

        let any = [surface_format(vk::Format::UNDEFINED)];
        let (format, _) = choose_surface_format(&any, FluentFormat::D32_SFLOAT).unwrap();
        assert_eq!(FluentFormat::B8G8R8A8_SRGB, format);
    }

    #[test]
    fn test_present_modes() {
        let all = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(vk::PresentModeKHR::FIFO, choose_present_mode(&all, true));
        assert_eq!(vk::PresentModeKHR::MAILBOX, choose_present_mode(&all, false));
        assert_eq!(
            vk::PresentModeKHR::IMMEDIATE,
            choose_present_mode(&all[..1], false)
        );
        assert_eq!(
            vk::PresentModeKHR::FIFO,
            choose_present_mode(&[vk::PresentModeKHR::FIFO], false)
        );
    }

    #[test]
    fn test_extent() {
        let fixed = capabilities(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            2,
            3,
        );
        assert_eq!(
            vk::Extent2D {
                width: 800,
                height: 600
            },
            choose_extent(&fixed, 1024, 768)
        );

        let free = capabilities(
            vk::Extent2D {
                width: std::u32::MAX,
                height: std::u32::MAX,
            },
            2,
            3,
        );
        assert_eq!(
            vk::Extent2D {
                width: 4096,
                height: 300
            },
            choose_extent(&free, 10000, 300)
        );
    }

    #[test]
    fn test_image_count() {
        let extent = vk::Extent2D {
            width: 1,
            height: 1,
        };
        assert_eq!(2, choose_image_count(&capabilities(extent, 2, 3), 1));
        assert_eq!(3, choose_image_count(&capabilities(extent, 2, 3), 5));
        assert_eq!(5, choose_image_count(&capabilities(extent, 2, 0), 5));
    }
}
