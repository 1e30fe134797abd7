use std::ffi::{CStr, CString};

use super::debug_reporter::{vulkan_debug_callback, VkDebugReporter};
use crate::{FluentResult, FluentValidationMode};
use ash::extensions::ext::DebugReport;
use ash::version::{EntryV1_0, InstanceV1_0};
use ash::vk;
use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};

/// Adapts a raw handle reported by a `FluentWsi` to what ash-window expects
pub(crate) struct WsiWindowHandle(pub RawWindowHandle);

unsafe impl HasRawWindowHandle for WsiWindowHandle {
    fn raw_window_handle(&self) -> RawWindowHandle {
        self.0
    }
}

fn khronos_validation_layer_name() -> &'static CStr {
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") }
}

fn lunarg_validation_layer_name() -> &'static CStr {
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_LUNARG_standard_validation\0") }
}

/// Owns the loaded library, the instance and the optional debug callback. Shared by the backend
/// and every device created from it.
pub struct VkInstance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    debug_reporter: Option<VkDebugReporter>,
}

impl VkInstance {
    /// `window` decides which surface extensions get enabled. Without one, swapchains can't be
    /// created from this instance.
    pub fn new(
        app_name: &str,
        window: Option<RawWindowHandle>,
        validation_mode: FluentValidationMode,
    ) -> FluentResult<VkInstance> {
        let entry = unsafe { ash::Entry::new()? };

        let vulkan_version = match entry.try_enumerate_instance_version()? {
            Some(version) => version,
            None => vk::make_version(1, 0, 0),
        };

        log::info!(
            "Found Vulkan version: {}.{}.{}",
            vk::version_major(vulkan_version),
            vk::version_minor(vulkan_version),
            vk::version_patch(vulkan_version)
        );

        // Queue family ownership transfers and maintenance1 are assumed
        if vulkan_version < vk::make_version(1, 1, 0) {
            return Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER.into());
        }

        let layers = entry.enumerate_instance_layer_properties()?;
        log::debug!("Available Layers: {:#?}", layers);
        let extensions = entry.enumerate_instance_extension_properties()?;
        log::debug!("Available Extensions: {:#?}", extensions);

        let app_name = CString::new(app_name).map_err(|_| "app name contains a nul byte")?;
        let appinfo = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(0)
            .engine_name(&app_name)
            .engine_version(0)
            .api_version(vulkan_version);

        let mut layer_names = vec![];
        let mut extension_names = match window {
            Some(window) => ash_window::enumerate_required_extensions(&WsiWindowHandle(window))?,
            None => vec![],
        };

        let validation_enabled = validation_mode != FluentValidationMode::Disabled;
        let validation_required = validation_mode == FluentValidationMode::Enabled;
        let mut debug_report_enabled = false;
        if validation_enabled {
            let best_validation_layer = find_best_validation_layer(&layers);
            let has_debug_extension = extensions.iter().any(|extension| unsafe {
                DebugReport::name() == CStr::from_ptr(extension.extension_name.as_ptr())
            });

            match (best_validation_layer, has_debug_extension) {
                (Some(best_validation_layer), true) => {
                    layer_names.push(best_validation_layer);
                    extension_names.push(DebugReport::name());
                    debug_report_enabled = true;
                }
                _ if validation_required => {
                    log::error!("Could not find a validation layer and the debug report extension. Check that the vulkan SDK has been installed or disable validation.");
                    return Err(vk::Result::ERROR_LAYER_NOT_PRESENT.into());
                }
                _ => {
                    log::warn!("Could not find a validation layer and the debug report extension. Continuing without validation.");
                }
            }
        }

        log::debug!("Using layers: {:?}", layer_names);
        log::debug!("Using extensions: {:?}", extension_names);

        let layer_names: Vec<_> = layer_names.iter().map(|x| x.as_ptr()).collect();
        let extension_names: Vec<_> = extension_names.iter().map(|x| x.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&appinfo)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        log::info!("Creating vulkan instance");
        let instance: ash::Instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug_reporter = if debug_report_enabled {
            match setup_vulkan_debug_callback(&entry, &instance) {
                Ok(debug_reporter) => Some(debug_reporter),
                Err(e) => {
                    unsafe {
                        instance.destroy_instance(None);
                    }
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(VkInstance {
            entry,
            instance,
            debug_reporter,
        })
    }
}

fn find_best_validation_layer(layers: &[vk::LayerProperties]) -> Option<&'static CStr> {
    let mut best_available_layer = None;
    for layer in layers {
        let layer_name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        if layer_name == khronos_validation_layer_name() {
            best_available_layer = Some(khronos_validation_layer_name());
            break;
        }

        if layer_name == lunarg_validation_layer_name() {
            best_available_layer = Some(lunarg_validation_layer_name());
        }
    }

    best_available_layer
}

fn setup_vulkan_debug_callback(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<VkDebugReporter, vk::Result> {
    log::info!("Setting up vulkan debug callback");
    let debug_info = vk::DebugReportCallbackCreateInfoEXT::builder()
        .flags(
            vk::DebugReportFlagsEXT::ERROR
                | vk::DebugReportFlagsEXT::WARNING
                | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
        )
        .pfn_callback(Some(vulkan_debug_callback));

    let debug_report_loader = DebugReport::new(entry, instance);
    let debug_callback =
        unsafe { debug_report_loader.create_debug_report_callback(&debug_info, None)? };

    Ok(VkDebugReporter {
        debug_report_loader,
        debug_callback,
    })
}

impl Drop for VkInstance {
    fn drop(&mut self) {
        log::trace!("destroying VkInstance");
        std::mem::drop(self.debug_reporter.take());

        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}
