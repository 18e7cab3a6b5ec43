use std::rc::Rc;

use ash::vk;

use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::GfxDevice;

/// fence 和 swapchain acquire 共用的等待超时。
///
/// 正常情况下一帧的 GPU 工作远小于 1s，超时意味着 GPU 挂死或者
/// 同步逻辑出错，此时继续等待没有意义。
pub const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// CPU-GPU 同步原语
pub struct GfxFence {
    vk_fence: vk::Fence,
    device: Rc<GfxDevice>,
}

impl GfxFence {
    /// # Parameters
    /// - `signaled`: 初始为 signaled 状态，首次 wait 立即返回
    pub fn new(device: Rc<GfxDevice>, signaled: bool, debug_name: impl AsRef<str>) -> Result<Self, GfxError> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence =
            unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };

        let fence = Self {
            vk_fence: fence,
            device,
        };
        fence.device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::Fence {
        self.vk_fence
    }

    /// 阻塞等待 fence 进入 signaled 状态
    ///
    /// 帧循环内部的同步失败没有恢复手段，超时或设备错误直接 panic
    pub fn wait(&self) {
        self.wait_for(FENCE_TIMEOUT_NS);
    }

    /// 同 [`Self::wait`]，但使用自定义超时，用于一次性上传等耗时提交
    pub fn wait_for(&self, timeout_ns: u64) {
        unsafe {
            self.device
                .wait_for_fences(std::slice::from_ref(&self.vk_fence), true, timeout_ns)
                .unwrap();
        }
    }

    pub fn reset(&self) {
        unsafe {
            self.device.reset_fences(std::slice::from_ref(&self.vk_fence)).unwrap();
        }
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_fence(self.vk_fence, None);
        }
    }
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_fence
    }
}
