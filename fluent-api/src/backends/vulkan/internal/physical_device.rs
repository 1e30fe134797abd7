use crate::{FluentQueueType, FluentResult};
use ash::extensions::khr;
use ash::version::InstanceV1_0;
use ash::vk;
use std::ffi::CStr;

// Device types we prefer, best first. Anything else still works but scores lower.
const PHYSICAL_DEVICE_TYPE_PRIORITY: [vk::PhysicalDeviceType; 2] = [
    vk::PhysicalDeviceType::DISCRETE_GPU,
    vk::PhysicalDeviceType::INTEGRATED_GPU,
];

fn khr_portability_subset_extension_name() -> &'static CStr {
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_KHR_portability_subset\0") }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VkQueueFamilyIndices {
    pub graphics_queue_family_index: u32,
    pub compute_queue_family_index: u32,
    pub transfer_queue_family_index: u32,
}

impl VkQueueFamilyIndices {
    pub fn family_index(
        &self,
        queue_type: FluentQueueType,
    ) -> u32 {
        match queue_type {
            FluentQueueType::Graphics => self.graphics_queue_family_index,
            FluentQueueType::Compute => self.compute_queue_family_index,
            FluentQueueType::Transfer => self.transfer_queue_family_index,
        }
    }

    /// Distinct family indices, each listed once
    pub fn unique_family_indices(&self) -> Vec<u32> {
        let mut indices = vec![
            self.graphics_queue_family_index,
            self.compute_queue_family_index,
            self.transfer_queue_family_index,
        ];
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub score: i32,
    pub device_name: String,
    pub queue_family_indices: VkQueueFamilyIndices,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub extension_properties: Vec<vk::ExtensionProperties>,
}

pub fn choose_physical_device(
    instance: &ash::Instance
) -> FluentResult<(vk::PhysicalDevice, PhysicalDeviceInfo)> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    if physical_devices.is_empty() {
        Err("Could not find a physical device")?;
    }

    let mut best: Option<(vk::PhysicalDevice, PhysicalDeviceInfo)> = None;
    for physical_device in physical_devices {
        if let Some(info) = query_physical_device_info(instance, physical_device)? {
            let is_better = best
                .as_ref()
                .map(|(_, best_info)| info.score > best_info.score)
                .unwrap_or(true);
            if is_better {
                best = Some((physical_device, info));
            }
        }
    }

    let (physical_device, info) = best.ok_or("Could not find a suitable physical device")?;
    log::info!(
        "Using physical device '{}' (score {})",
        info.device_name,
        info.score
    );
    Ok((physical_device, info))
}

fn vk_version_to_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::version_major(version),
        vk::version_minor(version),
        vk::version_patch(version)
    )
}

fn query_physical_device_info(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> FluentResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned()
    };

    let extension_properties = unsafe { instance.enumerate_device_extension_properties(device)? };
    let features = unsafe { instance.get_physical_device_features(device) };
    let all_queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(device) };

    let has_swapchain_extension = extension_properties.iter().any(|extension| unsafe {
        CStr::from_ptr(extension.extension_name.as_ptr()) == khr::Swapchain::name()
    });

    let queue_family_indices = match find_queue_families(&all_queue_families) {
        Some(queue_family_indices) if has_swapchain_extension => queue_family_indices,
        _ => {
            log::info!(
                "Found unsuitable device '{}' API: {} DriverVersion: {}",
                device_name,
                vk_version_to_string(properties.api_version),
                vk_version_to_string(properties.driver_version)
            );
            return Ok(None);
        }
    };

    let rank = PHYSICAL_DEVICE_TYPE_PRIORITY
        .iter()
        .position(|x| *x == properties.device_type)
        .map(|index| PHYSICAL_DEVICE_TYPE_PRIORITY.len() - index)
        .unwrap_or(0) as i32;
    let score = rank * 100;

    log::info!(
        "Found suitable device '{}' API: {} DriverVersion: {} Score = {}",
        device_name,
        vk_version_to_string(properties.api_version),
        vk_version_to_string(properties.driver_version),
        score
    );

    Ok(Some(PhysicalDeviceInfo {
        score,
        device_name,
        queue_family_indices,
        properties,
        features,
        extension_properties,
    }))
}

/// Graphics uses the first graphics family. Compute and transfer prefer dedicated families, then
/// any other family that is not already claimed, then fall back to the graphics family.
pub fn find_queue_families(
    all_queue_families: &[vk::QueueFamilyProperties]
) -> Option<VkQueueFamilyIndices> {
    let supports = |queue_family: &vk::QueueFamilyProperties, flags: vk::QueueFlags| {
        queue_family.queue_count > 0 && queue_family.queue_flags.contains(flags)
    };

    let graphics_queue_family_index = all_queue_families
        .iter()
        .position(|x| supports(x, vk::QueueFlags::GRAPHICS))? as u32;

    let mut compute_queue_family_index = None;
    for (index, queue_family) in all_queue_families.iter().enumerate() {
        let index = index as u32;
        if !supports(queue_family, vk::QueueFlags::COMPUTE) {
            continue;
        }

        if !supports(queue_family, vk::QueueFlags::GRAPHICS) {
            compute_queue_family_index = Some(index);
            break;
        } else if compute_queue_family_index.is_none() && index != graphics_queue_family_index {
            compute_queue_family_index = Some(index);
        }
    }
    let compute_queue_family_index =
        compute_queue_family_index.unwrap_or(graphics_queue_family_index);

    let mut transfer_queue_family_index = None;
    for (index, queue_family) in all_queue_families.iter().enumerate() {
        let index = index as u32;
        // Graphics and compute families support transfers even if they don't say so
        let supports_transfer = supports(queue_family, vk::QueueFlags::TRANSFER)
            || supports(queue_family, vk::QueueFlags::GRAPHICS)
            || supports(queue_family, vk::QueueFlags::COMPUTE);
        if !supports_transfer {
            continue;
        }

        let dedicated = !supports(queue_family, vk::QueueFlags::GRAPHICS)
            && !supports(queue_family, vk::QueueFlags::COMPUTE);
        if dedicated {
            transfer_queue_family_index = Some(index);
            break;
        } else if transfer_queue_family_index.is_none()
            && index != graphics_queue_family_index
            && index != compute_queue_family_index
        {
            transfer_queue_family_index = Some(index);
        }
    }
    let transfer_queue_family_index =
        transfer_queue_family_index.unwrap_or(graphics_queue_family_index);

    log::info!(
        "Graphics QF: {}  Compute QF: {}  Transfer QF: {}",
        graphics_queue_family_index,
        compute_queue_family_index,
        transfer_queue_family_index
    );

    Some(VkQueueFamilyIndices {
        graphics_queue_family_index,
        compute_queue_family_index,
        transfer_queue_family_index,
    })
}

/// One queue from each family that was picked
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    physical_device_info: &PhysicalDeviceInfo,
) -> FluentResult<ash::Device> {
    let mut device_extension_names = vec![khr::Swapchain::name().as_ptr()];

    // Mandatory when the implementation exposes it
    let has_portability_subset = physical_device_info
        .extension_properties
        .iter()
        .any(|extension| unsafe {
            CStr::from_ptr(extension.extension_name.as_ptr())
                == khr_portability_subset_extension_name()
        });
    if has_portability_subset {
        device_extension_names.push(khr_portability_subset_extension_name().as_ptr());
    }

    let supported = &physical_device_info.features;
    let features = vk::PhysicalDeviceFeatures::builder()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);

    let priorities = [1.0];
    let queue_infos: Vec<_> = physical_device_info
        .queue_family_indices
        .unique_family_indices()
        .into_iter()
        .map(|queue_family_index| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(queue_family_index)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let device_create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&device_extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_family(
        queue_flags: vk::QueueFlags,
        queue_count: u32,
    ) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_family_is_shared() {
        let families = [queue_family(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            16,
        )];

        let indices = find_queue_families(&families).unwrap();
        assert_eq!(VkQueueFamilyIndices::default(), indices);
        assert_eq!(vec![0], indices.unique_family_indices());
    }

    #[test]
    fn test_dedicated_families_preferred() {
        let families = [
            queue_family(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                16,
            ),
            queue_family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 2),
            queue_family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
            queue_family(vk::QueueFlags::TRANSFER, 2),
        ];

        let indices = find_queue_families(&families).unwrap();
        assert_eq!(0, indices.family_index(FluentQueueType::Graphics));
        assert_eq!(2, indices.family_index(FluentQueueType::Compute));
        assert_eq!(3, indices.family_index(FluentQueueType::Transfer));
        assert_eq!(vec![0, 2, 3], indices.unique_family_indices());
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let families = [
            queue_family(vk::QueueFlags::GRAPHICS, 0),
            queue_family(vk::QueueFlags::COMPUTE, 1),
        ];
        assert_eq!(None, find_queue_families(&families));
    }
}
