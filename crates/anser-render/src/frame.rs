use std::rc::Rc;

use ash::vk;

use anser_gfx::commands::command_buffer::GfxCommandBuffer;
use anser_gfx::commands::command_pool::GfxCommandPool;
use anser_gfx::commands::fence::GfxFence;
use anser_gfx::commands::semaphore::GfxSemaphore;
use anser_gfx::error::GfxError;
use anser_gfx::foundation::device::GfxDevice;

/// CPU 最多领先 GPU 的帧数
///
/// 2 意味着录制第 N 帧时，GPU 可能还在执行第 N-1 帧。
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// 帧环的下标推进，与 vulkan 无关，单独拆出来便于测试
///
/// 不变量：current == 已提交帧数 mod slot_count
#[derive(Debug)]
pub struct FrameRing {
    current: usize,
    slot_count: usize,
}

impl FrameRing {
    pub fn new(slot_count: usize) -> Self {
        Self { current: 0, slot_count }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slot_count;
    }
}

/// 每个 in-flight 帧独占的一组录制和同步资源
///
/// 生命周期内只创建一次，每 N 帧复用，teardown 时统一销毁。
pub struct FrameSlot {
    command_pool: GfxCommandPool,
    cmd: GfxCommandBuffer,

    /// GPU 完成本 slot 上一次提交时 signal；初始为 signaled，
    /// 第一次 begin_frame 的等待立即通过
    in_flight: GfxFence,

    /// swapchain image 可供渲染时 signal
    image_available: GfxSemaphore,
}

impl FrameSlot {
    pub fn new(device: Rc<GfxDevice>, graphics_family_index: u32, slot_index: usize) -> Result<Self, GfxError> {
        let command_pool = GfxCommandPool::new(
            device.clone(),
            graphics_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            format!("frame-{slot_index}"),
        )?;
        let cmd = command_pool.alloc_command_buffer(format!("frame-{slot_index}"))?;

        let in_flight = GfxFence::new(device.clone(), true, format!("frame-in-flight-{slot_index}"))?;
        let image_available = GfxSemaphore::new(device, format!("image-available-{slot_index}"))?;

        Ok(Self {
            command_pool,
            cmd,
            in_flight,
            image_available,
        })
    }

    pub fn destroy(self) {
        self.image_available.destroy();
        self.in_flight.destroy();
        self.command_pool.destroy();
    }
}

// getters
impl FrameSlot {
    #[inline]
    pub fn cmd(&self) -> &GfxCommandBuffer {
        &self.cmd
    }

    #[inline]
    pub fn in_flight(&self) -> &GfxFence {
        &self.in_flight
    }

    #[inline]
    pub fn image_available(&self) -> &GfxSemaphore {
        &self.image_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_starts_at_zero() {
        let ring = FrameRing::new(MAX_FRAMES_IN_FLIGHT);
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn ring_wraps_at_slot_count() {
        let mut ring = FrameRing::new(2);
        ring.advance();
        assert_eq!(ring.current(), 1);
        ring.advance();
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn ring_tracks_submission_count_mod_n() {
        let mut ring = FrameRing::new(MAX_FRAMES_IN_FLIGHT);
        for submissions in 0..10usize {
            assert_eq!(ring.current(), submissions % MAX_FRAMES_IN_FLIGHT);
            ring.advance();
        }
    }

    #[test]
    fn back_to_back_frames_use_different_slots() {
        let mut ring = FrameRing::new(2);
        let first = ring.current();
        ring.advance();
        assert_ne!(first, ring.current());
    }
}
