// Vulkan instance - API entry point
//
// Responsibilities:
// - Validating requested layers/extensions against what the platform reports
// - Instance creation
// - Debug messenger setup when validation is enabled
// - Surface creation (RAII wrapper, owned by the caller)

use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::RenderError;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Process-wide Vulkan entry object. Owns the debug channel and must outlive
/// every other API object, which callers guarantee by holding it in an `Arc`.
pub struct Instance {
    pub surface_fn: ash::extensions::khr::Surface,
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub handle: ash::Instance,
    entry: Entry,
}

impl Instance {
    pub fn new(
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<Arc<Self>, RenderError> {
        let entry = unsafe { Entry::load() }?;

        // Validate layers before asking for them
        let required_layers: Vec<&CStr> = if enable_validation {
            vec![VALIDATION_LAYER]
        } else {
            Vec::new()
        };

        let available_layers = unsafe { entry.enumerate_instance_layer_properties() }?;
        if let Some(missing) = find_missing_layer(&available_layers, &required_layers) {
            return Err(RenderError::MissingLayer(
                missing.to_string_lossy().into_owned(),
            ));
        }

        // Surface extensions for this platform, plus debug utils if requested
        let mut extensions: Vec<*const c_char> =
            ash_window::enumerate_required_extensions(display_handle)?.to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let available_extensions =
            unsafe { entry.enumerate_instance_extension_properties(None) }?;
        if let Some(missing) = find_missing_extension(&available_extensions, &extensions) {
            return Err(RenderError::MissingInstanceExtension(missing));
        }

        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = CString::new("No Engine").unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let layer_ptrs: Vec<*const c_char> =
            required_layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extensions);

        let handle = unsafe { entry.create_instance(&create_info, None) }?;

        let debug_utils = if enable_validation {
            Some(Self::create_debug_messenger(&entry, &handle)?)
        } else {
            None
        };

        let surface_fn = ash::extensions::khr::Surface::new(&entry, &handle);

        Ok(Arc::new(Self {
            surface_fn,
            debug_utils,
            handle,
            entry,
        }))
    }

    fn create_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT), RenderError>
    {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger =
            unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    /// Create a presentable surface for the given window.
    pub fn create_surface(
        self: &Arc<Self>,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<Surface, RenderError> {
        let handle = unsafe {
            ash_window::create_surface(
                &self.entry,
                &self.handle,
                display_handle,
                window_handle,
                None,
            )
        }?;

        Ok(Surface {
            handle,
            instance: self.clone(),
        })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.handle.destroy_instance(None);
        }
    }
}

/// Window surface handle. Destroyed before the instance (enforced by the
/// `Arc<Instance>` it holds).
pub struct Surface {
    pub handle: vk::SurfaceKHR,
    instance: Arc<Instance>,
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.instance.surface_fn.destroy_surface(self.handle, None);
        }
    }
}

fn find_missing_layer<'a>(
    available: &[vk::LayerProperties],
    required: &[&'a CStr],
) -> Option<&'a CStr> {
    required
        .iter()
        .find(|&&layer| {
            !available
                .iter()
                .any(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) } == layer)
        })
        .copied()
}

fn find_missing_extension(
    available: &[vk::ExtensionProperties],
    required: &[*const c_char],
) -> Option<String> {
    required
        .iter()
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .find(|&ext| {
            !available
                .iter()
                .any(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) } == ext)
        })
        .map(|ext| ext.to_string_lossy().into_owned())
}

// Validation layer callback. Forwards everything to the log and never
// suppresses the triggering operation.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (i, b) in name.bytes().enumerate() {
            props.layer_name[i] = b as c_char;
        }
        props
    }

    fn extension(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (i, b) in name.bytes().enumerate() {
            props.extension_name[i] = b as c_char;
        }
        props
    }

    #[test]
    fn validation_layer_found_when_present() {
        let available = [layer("VK_LAYER_KHRONOS_validation"), layer("VK_LAYER_other")];
        assert!(find_missing_layer(&available, &[VALIDATION_LAYER]).is_none());
    }

    #[test]
    fn missing_layer_is_reported() {
        let available = [layer("VK_LAYER_other")];
        let missing = find_missing_layer(&available, &[VALIDATION_LAYER]);
        assert_eq!(missing, Some(VALIDATION_LAYER));
    }

    #[test]
    fn no_required_layers_is_always_satisfied() {
        assert!(find_missing_layer(&[], &[]).is_none());
    }

    #[test]
    fn missing_extension_is_reported_by_name() {
        let available = [extension("VK_KHR_surface")];
        let required = [
            c"VK_KHR_surface".as_ptr(),
            c"VK_EXT_debug_utils".as_ptr(),
        ];
        assert_eq!(
            find_missing_extension(&available, &required),
            Some("VK_EXT_debug_utils".to_string())
        );
    }

    #[test]
    fn all_extensions_present() {
        let available = [extension("VK_KHR_surface"), extension("VK_EXT_debug_utils")];
        let required = [c"VK_KHR_surface".as_ptr()];
        assert!(find_missing_extension(&available, &required).is_none());
    }
}
