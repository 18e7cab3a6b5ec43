use std::rc::Rc;

use ash::vk;

use anser_gfx::commands::command_buffer::GfxCommandBuffer;
use anser_gfx::error::GfxError;
use anser_gfx::foundation::device::GfxDevice;
use anser_gfx::gfx_context::GfxContext;
use anser_gfx::swapchain::render_swapchain::RenderSwapchain;
use anser_gfx::swapchain::surface::Surface;

use crate::cleanup::CleanupStack;
use crate::frame::{FrameRing, FrameSlot, MAX_FRAMES_IN_FLIGHT};
use crate::immediate::ImmediateCtx;

/// begin_frame 交给调用方的单帧视图
pub struct FrameCtx {
    pub cmd: GfxCommandBuffer,

    /// 本帧写入的 swapchain image
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub image_index: u32,
}

/// 帧循环的核心对象：swapchain + 帧环 + 即时提交 + 清理栈
///
/// 协议是严格的 begin_frame / 录制 / end_frame 交替，
/// 单线程使用。CPU 与 GPU 的重叠完全由帧环的 fence 控制。
pub struct RenderContext {
    swapchain: RenderSwapchain,
    frames: Vec<FrameSlot>,
    immediate: ImmediateCtx,

    ring: FrameRing,

    /// begin_frame 和 end_frame 之间为 Some，用于捕获协议违规
    acquired_image: Option<u32>,

    cleanup_stack: CleanupStack<GfxContext>,

    device: Rc<GfxDevice>,
}

// 创建与销毁
impl RenderContext {
    pub fn new(gfx: &GfxContext, surface: &Surface, window_extent: vk::Extent2D) -> Result<Self, GfxError> {
        let device = gfx.device().clone();

        let swapchain = RenderSwapchain::new(device.clone(), gfx.physical_device(), surface, window_extent)?;

        let graphics_family = device.queue_families().graphics.index;
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|idx| FrameSlot::new(device.clone(), graphics_family, idx))
            .collect::<Result<Vec<_>, _>>()?;

        let immediate = ImmediateCtx::new(device.clone(), graphics_family)?;

        Ok(Self {
            swapchain,
            frames,
            immediate,
            ring: FrameRing::new(MAX_FRAMES_IN_FLIGHT),
            acquired_image: None,
            cleanup_stack: CleanupStack::new(),
            device,
        })
    }

    /// teardown：等 GPU idle，倒序执行清理回调，再销毁自身的资源
    ///
    /// GfxContext 本身（allocator/device/instance）之后由应用销毁
    pub fn destroy(mut self, gfx: &GfxContext) {
        log::info!("Destroying RenderContext");
        self.device.wait_idle();

        self.cleanup_stack.flush(gfx);

        self.immediate.destroy();
        for frame in self.frames {
            frame.destroy();
        }
        self.swapchain.destroy();
    }
}

// 帧协议
impl RenderContext {
    /// 开始录制新的一帧
    ///
    /// 等待当前 slot 的 fence，获取 swapchain image，
    /// 重置并开启 slot 的 command buffer。
    ///
    /// # return
    /// swapchain 过期时返回 [`GfxError::SwapchainStale`]，此时帧未开始，
    /// fence 保持 signaled，调用方 resize 之后重试不会死锁
    pub fn begin_frame(&mut self) -> Result<FrameCtx, GfxError> {
        assert!(self.acquired_image.is_none(), "begin_frame called twice without end_frame");

        let slot = &self.frames[self.ring.current()];
        slot.in_flight().wait();

        let image_index = self.swapchain.acquire_next_image(slot.image_available())?;

        // acquire 成功后才 reset，失败路径上 fence 保持 signaled
        slot.in_flight().reset();

        slot.cmd().reset();
        slot.cmd().begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        self.acquired_image = Some(image_index);

        let image = self.swapchain.image(image_index);
        Ok(FrameCtx {
            cmd: slot.cmd().clone(),
            image: image.vk_image,
            image_view: image.view,
            extent: self.swapchain.extent(),
            image_index,
        })
    }

    /// 结束录制，提交并 present
    ///
    /// 提交等待 image_available，signal 该 image 的 render_finished
    /// 和 slot 的 fence；present 等待同一个 render_finished。
    ///
    /// # return
    /// present 时发现 swapchain 过期返回 [`GfxError::SwapchainStale`]；
    /// 本帧的工作已经提交，不会丢失，调用方只需 resize
    pub fn end_frame(&mut self) -> Result<(), GfxError> {
        let image_index = self.acquired_image.take().expect("end_frame called without begin_frame");

        let slot = &self.frames[self.ring.current()];
        slot.cmd().end();

        let wait_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(slot.image_available().vk_handle())
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        let signal_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(self.swapchain.image(image_index).render_finished.vk_handle())
            .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS);
        let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(slot.cmd().vk_handle());

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(std::slice::from_ref(&wait_info))
            .command_buffer_infos(std::slice::from_ref(&cmd_info))
            .signal_semaphore_infos(std::slice::from_ref(&signal_info));

        unsafe {
            self.device
                .queue_submit2(
                    self.device.graphics_queue(),
                    std::slice::from_ref(&submit_info),
                    slot.in_flight().vk_handle(),
                )
                .unwrap();
        }

        // 提交已经完成，无论 present 结果如何帧环都前进
        self.ring.advance();

        match self.swapchain.present(self.device.present_queue(), image_index) {
            Ok(()) => Ok(()),
            Err(GfxError::SwapchainStale) => Err(GfxError::SwapchainStale),
            Err(e) => panic!("queue_present failed: {e}"),
        }
    }
}

// tools
impl RenderContext {
    /// 注册 teardown 时执行的清理回调，执行顺序与注册相反
    pub fn add_cleanup(&mut self, callback: impl FnOnce(&GfxContext) + 'static) {
        self.cleanup_stack.push(callback);
    }

    /// 窗口尺寸变化后重建 swapchain
    ///
    /// 内部先等 GPU idle，因此不会和 in-flight 帧冲突
    pub fn resize(
        &mut self,
        gfx: &GfxContext,
        surface: &Surface,
        new_extent: vk::Extent2D,
    ) -> Result<(), GfxError> {
        assert!(self.acquired_image.is_none(), "resize called inside a frame");

        log::info!("resize to {}x{}", new_extent.width, new_extent.height);
        self.device.wait_idle();
        self.swapchain.rebuild(gfx.physical_device(), surface, new_extent)
    }

    /// 帧环之外的同步提交，用于初始化阶段的上传
    pub fn immediate_submit(&self, record: impl FnOnce(&GfxCommandBuffer)) {
        self.immediate.submit(self.device.graphics_queue(), record);
    }
}

// getters
impl RenderContext {
    #[inline]
    pub fn swapchain(&self) -> &RenderSwapchain {
        &self.swapchain
    }

    #[inline]
    pub fn frame_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}
