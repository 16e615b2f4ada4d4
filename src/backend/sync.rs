// Synchronization primitives for the single in-flight frame
//
// Two binary semaphores order GPU work (acquire -> render -> present); the
// fence lets the host observe frame completion before the command buffer is
// rerecorded. The fence starts signaled so the first wait is a no-op.

use std::sync::Arc;

use ash::vk;

use super::device::VulkanDevice;
use crate::error::RenderError;

pub struct FrameSync {
    pub image_acquired: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub frame_done: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self, RenderError> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            let image_acquired = device.device.create_semaphore(&semaphore_info, None)?;
            let render_finished = match device.device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.device.destroy_semaphore(image_acquired, None);
                    return Err(e.into());
                }
            };
            let frame_done = match device.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.device.destroy_semaphore(image_acquired, None);
                    device.device.destroy_semaphore(render_finished, None);
                    return Err(e.into());
                }
            };

            Ok(Self {
                image_acquired,
                render_finished,
                frame_done,
                device,
            })
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.image_acquired, None);
            self.device.device.destroy_semaphore(self.render_finished, None);
            self.device.device.destroy_fence(self.frame_done, None);
        }
    }
}
