use std::rc::Rc;

use ash::vk;

use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::GfxDevice;

/// binary semaphore，用于 GPU 内部的跨 queue/跨阶段同步
pub struct GfxSemaphore {
    vk_semaphore: vk::Semaphore,
    device: Rc<GfxDevice>,
}

impl GfxSemaphore {
    pub fn new(device: Rc<GfxDevice>, debug_name: impl AsRef<str>) -> Result<Self, GfxError> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };

        let semaphore = Self {
            vk_semaphore: semaphore,
            device,
        };
        semaphore.device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::Semaphore {
        self.vk_semaphore
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_semaphore(self.vk_semaphore, None);
        }
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_semaphore
    }
}
