use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

/// command buffer 封装
///
/// 记录类方法失败意味着帧循环已经无法继续，直接 panic。
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_cmd: vk::CommandBuffer,
    device: Rc<GfxDevice>,
}

impl GfxCommandBuffer {
    pub(crate) fn new(device: Rc<GfxDevice>, vk_cmd: vk::CommandBuffer) -> Self {
        Self { vk_cmd, device }
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_cmd
    }
}

// 记录生命周期
impl GfxCommandBuffer {
    pub fn reset(&self) {
        unsafe {
            self.device.reset_command_buffer(self.vk_cmd, vk::CommandBufferResetFlags::empty()).unwrap();
        }
    }

    pub fn begin(&self, usage_flags: vk::CommandBufferUsageFlags) {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_cmd, &vk::CommandBufferBeginInfo::default().flags(usage_flags))
                .unwrap();
        }
    }

    pub fn end(&self) {
        unsafe {
            self.device.end_command_buffer(self.vk_cmd).unwrap();
        }
    }
}

// 常用命令
impl GfxCommandBuffer {
    /// 粗粒度的 layout 转换
    ///
    /// stage/access mask 都使用 ALL_COMMANDS + MEMORY_R/W，
    /// 每帧 layout 转换次数很少时，这种写法足够，且不易出错。
    pub fn transition_image(&self, image: vk::Image, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) {
        let aspect_mask = if new_layout == vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let image_barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            )
            .image(image);

        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&image_barrier));
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_cmd, &dependency_info);
        }
    }

    /// 将 src 整张 image blit 到 dst，尺寸不同时做线性缩放
    ///
    /// 要求 src 处于 TRANSFER_SRC_OPTIMAL，dst 处于 TRANSFER_DST_OPTIMAL
    pub fn blit_image_to_image(
        &self,
        src: vk::Image,
        dst: vk::Image,
        src_extent: vk::Extent2D,
        dst_extent: vk::Extent2D,
    ) {
        let blit_region = vk::ImageBlit2::default()
            .src_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: src_extent.width as i32,
                    y: src_extent.height as i32,
                    z: 1,
                },
            ])
            .dst_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: dst_extent.width as i32,
                    y: dst_extent.height as i32,
                    z: 1,
                },
            ])
            .src_subresource(
                vk::ImageSubresourceLayers::default().aspect_mask(vk::ImageAspectFlags::COLOR).layer_count(1),
            )
            .dst_subresource(
                vk::ImageSubresourceLayers::default().aspect_mask(vk::ImageAspectFlags::COLOR).layer_count(1),
            );

        let blit_info = vk::BlitImageInfo2::default()
            .src_image(src)
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(dst)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .filter(vk::Filter::LINEAR)
            .regions(std::slice::from_ref(&blit_region));
        unsafe {
            self.device.cmd_blit_image2(self.vk_cmd, &blit_info);
        }
    }

    /// 清屏。要求 image 处于 GENERAL layout
    pub fn clear_color_image(&self, image: vk::Image, clear_value: vk::ClearColorValue) {
        let clear_range = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .level_count(vk::REMAINING_MIP_LEVELS)
            .layer_count(vk::REMAINING_ARRAY_LAYERS);
        unsafe {
            self.device.cmd_clear_color_image(
                self.vk_cmd,
                image,
                vk::ImageLayout::GENERAL,
                &clear_value,
                std::slice::from_ref(&clear_range),
            );
        }
    }
}
