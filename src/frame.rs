// Frame engine - the per-frame hot loop
//
// One frame in flight: a single command buffer is rerecorded every frame,
// guarded by the frame-done fence. Host/GPU ordering runs entirely through
// the semaphore/fence pair; the coarse queue-idle wait at the top keeps the
// protocol simple rather than fast.

use std::sync::Arc;

use ash::vk;

use crate::backend::device::VulkanDevice;
use crate::backend::pipeline::Pipeline;
use crate::backend::swapchain::Swapchain;
use crate::backend::sync::FrameSync;
use crate::error::RenderError;

pub struct FrameRenderer {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
    clear_color: [f32; 4],
    device: Arc<VulkanDevice>,
}

impl FrameRenderer {
    pub fn new(device: Arc<VulkanDevice>, clear_color: [f32; 4]) -> Result<Self, RenderError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = match unsafe { device.device.allocate_command_buffers(&alloc_info) }
        {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.device.destroy_command_pool(command_pool, None) };
                return Err(e.into());
            }
        };

        let sync = match FrameSync::new(device.clone()) {
            Ok(sync) => sync,
            Err(e) => {
                unsafe { device.device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        Ok(Self {
            command_pool,
            command_buffer,
            sync,
            clear_color,
            device,
        })
    }

    /// Render and present one frame: acquire -> record -> submit -> present.
    pub fn draw(&mut self, swapchain: &Swapchain, pipeline: &Pipeline) -> Result<(), RenderError> {
        let device = &self.device.device;

        // Coarse serialization against any still-running GPU work
        unsafe { device.queue_wait_idle(self.device.graphics_queue) }?;

        let (image_index, _suboptimal) =
            swapchain.acquire_next_image(u64::MAX, self.sync.image_acquired)?;

        self.record_commands(swapchain, pipeline, image_index)?;

        unsafe { device.reset_fences(&[self.sync.frame_done]) }?;

        let wait_semaphores = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(self.sync.image_acquired)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build()];
        let command_buffers = [vk::CommandBufferSubmitInfo::builder()
            .command_buffer(self.command_buffer)
            .build()];
        let signal_semaphores = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(self.sync.render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .build()];

        let submit_info = vk::SubmitInfo2::builder()
            .wait_semaphore_infos(&wait_semaphores)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signal_semaphores)
            .build();

        unsafe {
            device.queue_submit2(
                self.device.graphics_queue,
                &[submit_info],
                self.sync.frame_done,
            )
        }?;

        // The command buffer must not be rerecorded while the GPU still
        // executes it; poll until the fence reports completion.
        loop {
            match unsafe { device.wait_for_fences(&[self.sync.frame_done], true, u64::MAX) } {
                Ok(()) => break,
                Err(vk::Result::TIMEOUT) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let _suboptimal = swapchain.present(
            self.device.present_queue,
            image_index,
            &[self.sync.render_finished],
        )?;

        Ok(())
    }

    fn record_commands(
        &self,
        swapchain: &Swapchain,
        pipeline: &Pipeline,
        image_index: u32,
    ) -> Result<(), RenderError> {
        let device = &self.device.device;
        let cmd = self.command_buffer;
        let image = swapchain.images[image_index as usize];
        let extent = swapchain.extent;

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(cmd, &begin_info)?;

            // Prior contents are irrelevant; no wait on earlier work
            self.transition_image_layout(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::AccessFlags2::empty(),
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags2::TOP_OF_PIPE,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            );

            let clear_value = vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            };
            let color_attachments = [vk::RenderingAttachmentInfo::builder()
                .image_view(swapchain.image_views[image_index as usize])
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_value)
                .build()];
            let rendering_info = vk::RenderingInfo::builder()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .layer_count(1)
                .color_attachments(&color_attachments);

            device.cmd_begin_rendering(cmd, &rendering_info);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(cmd, 0, &[scissor]);

            device.cmd_draw(cmd, 3, 1, 0, 0);
            device.cmd_end_rendering(cmd);

            self.transition_image_layout(
                image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags2::empty(),
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            );

            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    unsafe fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src_access: vk::AccessFlags2,
        dst_access: vk::AccessFlags2,
        src_stage: vk::PipelineStageFlags2,
        dst_stage: vk::PipelineStageFlags2,
    ) {
        let barriers = [vk::ImageMemoryBarrier2::builder()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build()];

        let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&barriers);

        self.device
            .device
            .cmd_pipeline_barrier2(self.command_buffer, &dependency_info);
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer with it
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}
