// Vulkan device - GPU selection and logical device creation
//
// Responsibilities:
// - Physical device selection (first adapter passing the filters)
// - Graphics/present queue family lookup
// - Logical device creation with dynamic rendering + synchronization2

use std::ffi::{c_char, CStr};
use std::sync::Arc;

use ash::vk;

use super::instance::{Instance, Surface};
use crate::error::RenderError;

/// Device extensions every adapter must cover. SPIR-V 1.4 and
/// synchronization2 carry create-renderpass2 as a dependency.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 4] = [
    vk::KhrSwapchainFn::name(),
    vk::KhrSpirv14Fn::name(),
    vk::KhrSynchronization2Fn::name(),
    vk::KhrCreateRenderpass2Fn::name(),
];

pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Logical device wrapper. Owns the `ash::Device`; queues are borrowed
/// handles valid for the device's lifetime. Destroying this waits for the
/// GPU to go idle first.
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
    pub properties: vk::PhysicalDeviceProperties,
    pub instance: Arc<Instance>,
}

impl VulkanDevice {
    pub fn new(instance: Arc<Instance>, surface: &Surface) -> Result<Arc<Self>, RenderError> {
        let physical_device = pick_physical_device(&instance)?;
        let properties = unsafe {
            instance
                .handle
                .get_physical_device_properties(physical_device)
        };

        log::info!(
            "Selected GPU: {} (API {}.{}.{})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version),
        );

        let (graphics_queue_family, present_queue_family) =
            find_queue_families(&instance, physical_device, surface.handle)?;

        // One queue per distinct family, priority 1.0
        let queue_priorities = [1.0];
        let mut queue_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build()];
        if present_queue_family != graphics_queue_family {
            queue_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(present_queue_family)
                    .queue_priorities(&queue_priorities)
                    .build(),
            );
        }

        let extension_ptrs: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::builder()
            .dynamic_rendering(true)
            .synchronization2(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .push_next(&mut vulkan13_features);

        let device = unsafe {
            instance
                .handle
                .create_device(physical_device, &create_info, None)
        }?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

        Ok(Arc::new(Self {
            device,
            physical_device,
            graphics_queue,
            present_queue,
            graphics_queue_family,
            present_queue_family,
            properties,
            instance,
        }))
    }

    /// Wait for all GPU work on this device to finish.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device");
        let _ = self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

/// Enumerate adapters in platform order and take the first one that passes
/// every filter. No scoring.
fn pick_physical_device(instance: &Instance) -> Result<vk::PhysicalDevice, RenderError> {
    let devices = unsafe { instance.handle.enumerate_physical_devices() }?;

    for physical_device in devices {
        let properties = unsafe {
            instance
                .handle
                .get_physical_device_properties(physical_device)
        };
        let queue_families = unsafe {
            instance
                .handle
                .get_physical_device_queue_family_properties(physical_device)
        };
        let extensions = unsafe {
            instance
                .handle
                .enumerate_device_extension_properties(physical_device)
        }?;

        if adapter_is_suitable(properties.api_version, &queue_families, &extensions) {
            return Ok(physical_device);
        }

        log::debug!(
            "Skipping adapter {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
    }

    Err(RenderError::NoSuitableDevice)
}

/// Find the graphics family, then a family able to present to `surface`.
/// Prefers a single family serving both; falls back to scanning the whole
/// family table.
fn find_queue_families(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<(u32, u32), RenderError> {
    let queue_families = unsafe {
        instance
            .handle
            .get_physical_device_queue_family_properties(physical_device)
    };

    let graphics = find_graphics_family(&queue_families).ok_or(RenderError::NoGraphicsQueue)?;

    let supports_present = |index: u32| -> Result<bool, RenderError> {
        Ok(unsafe {
            instance.surface_fn.get_physical_device_surface_support(
                physical_device,
                index,
                surface,
            )
        }?)
    };

    if supports_present(graphics)? {
        return Ok((graphics, graphics));
    }

    // Another family doing both graphics and present beats splitting them
    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && supports_present(index)? {
            return Ok((index, index));
        }
    }

    for index in 0..queue_families.len() as u32 {
        if supports_present(index)? {
            return Ok((graphics, index));
        }
    }

    Err(RenderError::NoPresentQueue)
}

pub(crate) fn find_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

pub(crate) fn missing_device_extension(
    available: &[vk::ExtensionProperties],
    required: &[&CStr],
) -> Option<String> {
    required
        .iter()
        .find(|&&ext| {
            !available
                .iter()
                .any(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) } == ext)
        })
        .map(|ext| ext.to_string_lossy().into_owned())
}

pub(crate) fn adapter_is_suitable(
    api_version: u32,
    families: &[vk::QueueFamilyProperties],
    extensions: &[vk::ExtensionProperties],
) -> bool {
    api_version >= MIN_API_VERSION
        && find_graphics_family(families).is_some()
        && missing_device_extension(extensions, &REQUIRED_DEVICE_EXTENSIONS).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (i, b) in name.to_bytes().iter().enumerate() {
            props.extension_name[i] = *b as c_char;
        }
        props
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn all_required_extensions() -> Vec<vk::ExtensionProperties> {
        REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| extension(ext))
            .collect()
    }

    #[test]
    fn graphics_family_found_by_index() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }

    #[test]
    fn no_graphics_family_on_compute_only_adapter() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        assert_eq!(find_graphics_family(&families), None);
    }

    #[test]
    fn full_extension_coverage_passes() {
        assert!(missing_device_extension(
            &all_required_extensions(),
            &REQUIRED_DEVICE_EXTENSIONS
        )
        .is_none());
    }

    #[test]
    fn absent_extension_rejects_adapter() {
        // Everything but synchronization2
        let available: Vec<_> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .filter(|&&ext| ext != vk::KhrSynchronization2Fn::name())
            .map(|ext| extension(ext))
            .collect();

        assert_eq!(
            missing_device_extension(&available, &REQUIRED_DEVICE_EXTENSIONS),
            Some("VK_KHR_synchronization2".to_string())
        );
        assert!(!adapter_is_suitable(
            MIN_API_VERSION,
            &[family(vk::QueueFlags::GRAPHICS)],
            &available
        ));
    }

    #[test]
    fn qualifying_adapter_is_accepted() {
        assert!(adapter_is_suitable(
            MIN_API_VERSION,
            &[family(vk::QueueFlags::GRAPHICS)],
            &all_required_extensions()
        ));
    }

    #[test]
    fn old_api_version_rejects_adapter() {
        assert!(!adapter_is_suitable(
            vk::API_VERSION_1_2,
            &[family(vk::QueueFlags::GRAPHICS)],
            &all_required_extensions()
        ));
    }
}
