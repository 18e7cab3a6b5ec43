use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::GfxError;

/// surface 能力查询结果，swapchain 的协商输入
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// 窗口 surface 封装
///
/// 生命周期位于 instance 和 device 之间：
/// 在 instance 之后创建，在 instance 之前销毁。
pub struct Surface {
    pub(crate) vk_surface_instance: ash::khr::surface::Instance,
    pub(crate) vk_surface: vk::SurfaceKHR,
}

// 创建与销毁
impl Surface {
    pub fn new(
        vk_entry: &ash::Entry,
        instance: &ash::Instance,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<Self, GfxError> {
        let vk_surface =
            unsafe { ash_window::create_surface(vk_entry, instance, display_handle, window_handle, None)? };

        let vk_surface_instance = ash::khr::surface::Instance::new(vk_entry, instance);

        Ok(Self {
            vk_surface_instance,
            vk_surface,
        })
    }

    pub fn destroy(self) {
        log::info!("Destroying Surface");
        unsafe {
            self.vk_surface_instance.destroy_surface(self.vk_surface, None);
        }
    }
}

// tools
impl Surface {
    /// 指定的 queue family 能否向本 surface 执行 present
    pub fn supports_present(&self, gpu: vk::PhysicalDevice, queue_family_index: u32) -> Result<bool, GfxError> {
        let supported = unsafe {
            self.vk_surface_instance
                .get_physical_device_surface_support(gpu, queue_family_index, self.vk_surface)?
        };
        Ok(supported)
    }

    /// 查询 surface 的 capabilities、formats 和 present modes
    pub fn query_swapchain_support(&self, gpu: vk::PhysicalDevice) -> Result<SwapchainSupport, GfxError> {
        unsafe {
            Ok(SwapchainSupport {
                capabilities: self
                    .vk_surface_instance
                    .get_physical_device_surface_capabilities(gpu, self.vk_surface)?,
                formats: self.vk_surface_instance.get_physical_device_surface_formats(gpu, self.vk_surface)?,
                present_modes: self
                    .vk_surface_instance
                    .get_physical_device_surface_present_modes(gpu, self.vk_surface)?,
            })
        }
    }
}

// getters
impl Surface {
    #[inline]
    pub fn vk_handle(&self) -> vk::SurfaceKHR {
        self.vk_surface
    }
}
