use std::rc::Rc;

use ash::vk;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::GfxDevice;

pub struct GfxCommandPool {
    vk_pool: vk::CommandPool,
    queue_family_index: u32,
    device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: impl AsRef<str>,
    ) -> Result<Self, GfxError> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags),
                None,
            )?
        };

        let pool = Self {
            vk_pool: pool,
            queue_family_index,
            device,
        };
        pool.device.set_debug_name(&pool, debug_name);
        Ok(pool)
    }

    /// 销毁 pool，同时释放从中分配的所有 command buffer
    pub fn destroy(self) {
        unsafe {
            self.device.destroy_command_pool(self.vk_pool, None);
        }
    }
}

// tools
impl GfxCommandPool {
    pub fn alloc_command_buffer(&self, debug_name: impl AsRef<str>) -> Result<GfxCommandBuffer, GfxError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.vk_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe { self.device.allocate_command_buffers(&alloc_info)?[0] };
        self.device.set_object_debug_name(cmd, format!("GfxCommandBuffer::{}", debug_name.as_ref()));

        Ok(GfxCommandBuffer::new(self.device.clone(), cmd))
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandPool {
        self.vk_pool
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_pool
    }
}
