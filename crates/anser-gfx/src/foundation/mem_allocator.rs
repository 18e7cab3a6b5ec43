use std::ops::Deref;

use ash::vk;

use crate::error::GfxError;

/// vma allocator 封装
///
/// vma 内部持有 instance 和 device 的函数指针，
/// 必须在 device 销毁之前销毁 allocator。
pub struct MemAllocator {
    inner: vk_mem::Allocator,
}

impl MemAllocator {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Result<Self, GfxError> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        vma_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci)? };

        Ok(Self { inner: vma })
    }

    pub fn destroy(self) {
        log::info!("Destroying MemAllocator");
        // 通过 drop 触发销毁
    }
}

impl Deref for MemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
