use std::rc::Rc;

use ash::vk;

use crate::commands::fence::FENCE_TIMEOUT_NS;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::GfxError;
use crate::foundation::device::GfxDevice;
use crate::foundation::physical_device::GfxPhysicalDevice;
use crate::swapchain::surface::Surface;

/// 优先 sRGB 格式 + 非线性色彩空间，没有就用第一个
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// MAILBOX 延迟最低且不撕裂；FIFO 是规范保证一定存在的兜底
pub(crate) fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// surface 给出确定尺寸时直接使用；
/// current_extent 为 u32::MAX 哨兵值时表示由应用自己决定，
/// 此时将窗口尺寸 clamp 到 surface 支持的范围内
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window_extent.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// acquire 结果到帧协议语义的映射
///
/// suboptimal 的 image 依然可以使用，本帧照常渲染；
/// OUT_OF_DATE 可恢复；TIMEOUT 意味着驱动在超时上限内没有给出
/// image，没有恢复手段，panic 带出 vk 错误码
pub(crate) fn map_acquire_result(result: Result<(u32, bool), vk::Result>) -> Result<u32, GfxError> {
    match result {
        Ok((image_index, _suboptimal)) => Ok(image_index),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(GfxError::SwapchainStale),
        Err(e @ vk::Result::TIMEOUT) => panic!("acquire_next_image timed out: {e}"),
        Err(e) => Err(GfxError::Vk(e)),
    }
}

/// 最小数量 +1，避免等待驱动释放 image；max 为 0 表示不限制
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        image_count = caps.max_image_count;
    }
    image_count
}

pub struct SwapchainImage {
    pub vk_image: vk::Image,
    pub view: vk::ImageView,

    /// 按 image 而非按 frame slot 分配：acquire 返回的 image 下标与
    /// 帧环下标无关，present 等待的信号必须跟着 image 走
    pub render_finished: GfxSemaphore,
}

/// swapchain 封装
///
/// 窗口尺寸变化后整个对象作废，由上层 wait idle 后销毁重建。
pub struct RenderSwapchain {
    vk_swapchain: vk::SwapchainKHR,
    images: Vec<SwapchainImage>,

    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,

    device: Rc<GfxDevice>,
}

// 创建与销毁
impl RenderSwapchain {
    pub fn new(
        device: Rc<GfxDevice>,
        physical_device: &GfxPhysicalDevice,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self, GfxError> {
        let support = surface.query_swapchain_support(physical_device.vk_handle())?;

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = choose_image_count(&support.capabilities);

        log::info!(
            "swapchain: {:?} {:?} {}x{}, {} images",
            surface_format.format,
            present_mode,
            extent.width,
            extent.height,
            image_count
        );

        let mut swapchain_ci = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.vk_handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // 输出既可能是直接渲染的 color attachment，也可能是 blit 的目标
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        // graphics 和 present 不在同一个 family 时，image 需要跨 family 共享
        let indices = physical_device.queue_family_indices();
        let graphics = indices.graphics.expect("graphics queue family was validated during selection");
        let present = indices.present.expect("present queue family was validated during selection");
        let shared_families = [graphics, present];
        if graphics != present {
            swapchain_ci = swapchain_ci
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared_families);
        } else {
            swapchain_ci = swapchain_ci.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let vk_swapchain = unsafe { device.swapchain().create_swapchain(&swapchain_ci, None)? };
        let vk_images = unsafe { device.swapchain().get_swapchain_images(vk_swapchain)? };

        let images = vk_images
            .iter()
            .enumerate()
            .map(|(idx, &vk_image)| -> Result<SwapchainImage, GfxError> {
                device.set_object_debug_name(vk_image, format!("swapchain-image-{idx}"));

                let view_ci = vk::ImageViewCreateInfo::default()
                    .image(vk_image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .level_count(1)
                            .layer_count(1),
                    );
                let view = unsafe { device.create_image_view(&view_ci, None)? };
                device.set_object_debug_name(view, format!("swapchain-view-{idx}"));

                Ok(SwapchainImage {
                    vk_image,
                    view,
                    render_finished: GfxSemaphore::new(device.clone(), format!("render-finished-{idx}"))?,
                })
            })
            .collect::<Result<Vec<_>, GfxError>>()?;

        Ok(Self {
            vk_swapchain,
            images,
            format: surface_format,
            extent,
            device,
        })
    }

    /// 尺寸变化后原地重建
    ///
    /// 调用方必须先保证 GPU idle。失败时旧资源已经销毁，
    /// 错误向上传播后应用只能放弃。
    pub fn rebuild(
        &mut self,
        physical_device: &GfxPhysicalDevice,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<(), GfxError> {
        unsafe {
            for image in self.images.drain(..) {
                self.device.destroy_image_view(image.view, None);
                image.render_finished.destroy();
            }
            self.device.swapchain().destroy_swapchain(self.vk_swapchain, None);
        }

        *self = Self::new(self.device.clone(), physical_device, surface, window_extent)?;
        Ok(())
    }

    pub fn destroy(self) {
        log::info!("Destroying RenderSwapchain");
        unsafe {
            for image in self.images {
                self.device.destroy_image_view(image.view, None);
                image.render_finished.destroy();
            }
            self.device.swapchain().destroy_swapchain(self.vk_swapchain, None);
        }
    }
}

// tools
impl RenderSwapchain {
    /// 请求下一张可用的 image
    ///
    /// 超时上限与 fence 等待一致，超时视为驱动挂死，直接 panic。
    ///
    /// # return
    /// image 下标；swapchain 已过期时返回 [`GfxError::SwapchainStale`]，
    /// 此时没有任何 image 被获取，调用方应当重建 swapchain 后重试
    pub fn acquire_next_image(&self, image_available: &GfxSemaphore) -> Result<u32, GfxError> {
        let result = unsafe {
            self.device.swapchain().acquire_next_image(
                self.vk_swapchain,
                FENCE_TIMEOUT_NS,
                image_available.vk_handle(),
                vk::Fence::null(),
            )
        };

        map_acquire_result(result)
    }

    /// 提交 present 请求，等待该 image 的 render-finished semaphore
    ///
    /// OUT_OF_DATE 和 SUBOPTIMAL 都映射为 [`GfxError::SwapchainStale`]：
    /// present 之后这张 image 已经交还给驱动，重建不会丢帧
    pub fn present(&self, present_queue: vk::Queue, image_index: u32) -> Result<(), GfxError> {
        let wait_semaphore = self.images[image_index as usize].render_finished.vk_handle();

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(std::slice::from_ref(&wait_semaphore))
            .swapchains(std::slice::from_ref(&self.vk_swapchain))
            .image_indices(std::slice::from_ref(&image_index));

        let result = unsafe { self.device.swapchain().queue_present(present_queue, &present_info) };
        match result {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(GfxError::SwapchainStale),
            Err(e) => Err(GfxError::Vk(e)),
        }
    }
}

// getters
impl RenderSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image(&self, index: u32) -> &SwapchainImage {
        &self.images[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn format_prefers_bgra_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_reported_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 800, height: 600 },
            ..Default::default()
        };
        let window = vk::Extent2D { width: 1920, height: 1080 };
        assert_eq!(choose_extent(&caps, window), caps.current_extent);
    }

    #[test]
    fn extent_sentinel_clamps_window_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 100, height: 100 },
            max_image_extent: vk::Extent2D { width: 1000, height: 1000 },
            ..Default::default()
        };

        let oversized = vk::Extent2D { width: 4000, height: 50 };
        assert_eq!(choose_extent(&caps, oversized), vk::Extent2D { width: 1000, height: 100 });

        let in_range = vk::Extent2D { width: 640, height: 480 };
        assert_eq!(choose_extent(&caps, in_range), in_range);
    }

    #[test]
    fn image_count_is_min_plus_one() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_respects_max() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn acquire_success_yields_image_index() {
        assert!(matches!(map_acquire_result(Ok((1, false))), Ok(1)));
    }

    #[test]
    fn acquire_suboptimal_image_is_still_usable() {
        assert!(matches!(map_acquire_result(Ok((0, true))), Ok(0)));
    }

    #[test]
    fn acquire_out_of_date_is_recoverable() {
        let result = map_acquire_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert!(matches!(result, Err(GfxError::SwapchainStale)));
    }

    #[test]
    #[should_panic(expected = "acquire_next_image timed out")]
    fn acquire_timeout_is_fatal() {
        let _ = map_acquire_result(Err(vk::Result::TIMEOUT));
    }

    #[test]
    fn acquire_device_loss_is_not_stale() {
        let result = map_acquire_result(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(result, Err(GfxError::Vk(vk::Result::ERROR_DEVICE_LOST))));
    }

    #[test]
    fn image_count_zero_max_means_unbounded() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 5);
    }
}
