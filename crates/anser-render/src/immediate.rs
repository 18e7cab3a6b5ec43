use std::rc::Rc;

use ash::vk;

use anser_gfx::commands::command_buffer::GfxCommandBuffer;
use anser_gfx::commands::command_pool::GfxCommandPool;
use anser_gfx::commands::fence::GfxFence;
use anser_gfx::error::GfxError;
use anser_gfx::foundation::device::GfxDevice;

/// 一次性上传的超时远大于单帧预算
const IMMEDIATE_TIMEOUT_NS: u64 = 10_000_000_000;

/// 帧环之外的同步提交通道
///
/// 用于初始化阶段的资源上传：录制、提交、阻塞等待完成，
/// 不涉及任何 semaphore。不要在帧循环内使用。
pub struct ImmediateCtx {
    command_pool: GfxCommandPool,
    cmd: GfxCommandBuffer,
    fence: GfxFence,

    device: Rc<GfxDevice>,
}

impl ImmediateCtx {
    pub fn new(device: Rc<GfxDevice>, graphics_family_index: u32) -> Result<Self, GfxError> {
        let command_pool = GfxCommandPool::new(
            device.clone(),
            graphics_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "immediate",
        )?;
        let cmd = command_pool.alloc_command_buffer("immediate")?;
        let fence = GfxFence::new(device.clone(), false, "immediate")?;

        Ok(Self {
            command_pool,
            cmd,
            fence,
            device,
        })
    }

    /// 录制并提交闭包中的命令，阻塞直到 GPU 执行完毕
    ///
    /// command buffer 和 fence 每次调用前重置，可以反复使用
    pub fn submit(&self, queue: vk::Queue, record: impl FnOnce(&GfxCommandBuffer)) {
        self.fence.reset();
        self.cmd.reset();

        self.cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        record(&self.cmd);
        self.cmd.end();

        let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(self.cmd.vk_handle());
        let submit_info = vk::SubmitInfo2::default().command_buffer_infos(std::slice::from_ref(&cmd_info));
        unsafe {
            self.device
                .queue_submit2(queue, std::slice::from_ref(&submit_info), self.fence.vk_handle())
                .unwrap();
        }

        self.fence.wait_for(IMMEDIATE_TIMEOUT_NS);
    }

    pub fn destroy(self) {
        self.fence.destroy();
        self.command_pool.destroy();
    }
}
