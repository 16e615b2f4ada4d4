// Swapchain - presentable image chain
//
// Negotiates surface format, present mode, extent and image count with the
// platform, then owns the resulting image views. The images themselves are
// driver-managed and only borrowed here.
//
// No recreation path: out-of-date/suboptimal results are surfaced to the
// caller but the window is fixed-size, so they are not expected in practice.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanDevice;
use super::instance::Surface;
use crate::error::RenderError;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_fn: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: &Surface,
        framebuffer_width: u32,
        framebuffer_height: u32,
    ) -> Result<Self, RenderError> {
        let instance = &device.instance;

        let capabilities = unsafe {
            instance.surface_fn.get_physical_device_surface_capabilities(
                device.physical_device,
                surface.handle,
            )
        }?;
        let formats = unsafe {
            instance
                .surface_fn
                .get_physical_device_surface_formats(device.physical_device, surface.handle)
        }?;
        let present_modes = unsafe {
            instance.surface_fn.get_physical_device_surface_present_modes(
                device.physical_device,
                surface.handle,
            )
        }?;

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: framebuffer_width,
                height: framebuffer_height,
            },
        );
        let image_count = choose_image_count(&capabilities);

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count
        );

        let swapchain_fn =
            ash::extensions::khr::Swapchain::new(&instance.handle, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_fn.create_swapchain(&create_info, None) }?;

        let images = unsafe { swapchain_fn.get_swapchain_images(swapchain) }?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match unsafe { device.device.create_image_view(&view_info, None) } {
                Ok(view) => view,
                Err(e) => {
                    // Unwind the views created so far before the error
                    // propagates; the swapchain itself is released below.
                    for &created in &image_views {
                        unsafe { device.device.destroy_image_view(created, None) };
                    }
                    unsafe { swapchain_fn.destroy_swapchain(swapchain, None) };
                    return Err(e.into());
                }
            };
            image_views.push(view);
        }

        Ok(Self {
            swapchain,
            swapchain_fn,
            images,
            image_views,
            format: surface_format.format,
            extent,
            device,
        })
    }

    /// Acquire the next presentable image, signaling `semaphore` once the
    /// image is ready to be written. Returns the image index and whether the
    /// driver flagged the swapchain suboptimal.
    pub fn acquire_next_image(
        &self,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), RenderError> {
        let result = unsafe {
            self.swapchain_fn.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }?;
        Ok(result)
    }

    /// Present `image_index` on `queue` once `wait_semaphores` signal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool, RenderError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe { self.swapchain_fn.queue_present(queue, &present_info) }?;
        Ok(suboptimal)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.swapchain_fn.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefer 8-bit BGRA sRGB with the non-linear color space; otherwise take
/// whatever the platform lists first.
pub(crate) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, RenderError> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or(RenderError::NoSurfaceFormats)
}

/// MAILBOX when offered (low-latency triple buffering), else FIFO, which
/// every implementation must support.
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface dictates the extent when it reports a fixed one; otherwise
/// the framebuffer size is clamped into the supported range.
pub(crate) fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// At least 3 images for smooth presentation, within the surface's bounds.
/// A max of 0 means unbounded.
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count.max(3);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_bgra_srgb_regardless_of_position() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first_listed() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];

        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(RenderError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let chosen =
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]);
        assert_eq!(chosen, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let chosen = choose_present_mode(&[vk::PresentModeKHR::FIFO]);
        assert_eq!(chosen, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_surface_fixes_it() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        };

        let chosen = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!(chosen.width, 1024);
        assert_eq!(chosen.height, 768);
    }

    #[test]
    fn extent_derives_from_framebuffer_when_unfixed() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let chosen = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!(chosen.width, 800);
        assert_eq!(chosen.height, 600);
    }

    #[test]
    fn extent_clamps_into_supported_range() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        let chosen = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 4000,
                height: 200,
            },
        );
        assert_eq!(chosen.width, 1920);
        assert_eq!(chosen.height, 480);
    }

    #[test]
    fn image_count_requests_three_when_unbounded() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_respects_higher_minimum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 4);
    }

    #[test]
    fn image_count_clamped_to_surface_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        let count = choose_image_count(&capabilities);
        assert_eq!(count, 3);
        assert!(count >= capabilities.min_image_count);
        assert!(count <= capabilities.max_image_count);
    }
}
