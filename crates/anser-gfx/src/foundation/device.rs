use std::cell::Cell;
use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use ash::vk;
use itertools::Itertools;

use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::physical_device::{GfxPhysicalDevice, QueueFamilyIndices};

/// 一个 queue family 以及从中取出的 queues
#[derive(Clone)]
pub struct QueueFamily {
    pub index: u32,
    pub queues: Vec<vk::Queue>,
}

pub struct QueueFamilies {
    pub graphics: QueueFamily,
    pub present: QueueFamily,
    pub compute: Option<QueueFamily>,
}

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及各种扩展的函数指针（交换链、动态渲染、调试工具）。
/// 这些函数指针在应用生命周期中保持不变，可以安全共享。
///
/// 使用 Rc<GfxDevice> 共享是合理的，因为：
/// 1. 多个组件需要相同的设备函数指针（swapchain、command pool 等）
/// 2. 函数指针本身很轻量，共享比传递更高效
/// 3. 设备生命周期需要精确控制，Rc 确保在所有引用者销毁前设备不被销毁
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,
    /// 调试工具扩展 API
    debug_utils: ash::ext::debug_utils::Device,

    queue_families: QueueFamilies,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

/// 按 family index 去重，生成 queue create info 所需的下标列表
///
/// graphics 和 present 常常是同一个 family，不能重复请求。
/// 输出是有序的，保证创建顺序稳定。
pub(crate) fn unique_queue_family_indices(indices: &QueueFamilyIndices) -> Vec<u32> {
    let mut families: Vec<u32> =
        [indices.graphics, indices.present, indices.compute].iter().flatten().copied().collect();
    families.sort_unstable();
    families.dedup();
    families
}

// 构造与销毁
impl GfxDevice {
    /// 必要的 device extensions
    pub fn basic_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }

    /// 创建逻辑设备，每个去重后的 family 取一个 queue
    ///
    /// 开启的 features：显式同步原语 (synchronization2) 和动态渲染目标绑定
    /// (dynamic rendering)，对应 Vulkan 1.3 的能力级别。
    pub fn new(instance: &ash::Instance, physical_device: &GfxPhysicalDevice) -> Result<Self, GfxError> {
        let indices = physical_device.queue_family_indices();

        let queue_priorities = [1.0_f32];
        let queue_create_infos = unique_queue_family_indices(&indices)
            .into_iter()
            .map(|family_index| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family_index)
                    .queue_priorities(&queue_priorities)
            })
            .collect_vec();

        let device_exts = Self::basic_device_exts().iter().map(|e| e.as_ptr()).collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        let mut features_12 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .buffer_device_address(true);
        let mut features_13 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_exts)
            .push_next(&mut features_12)
            .push_next(&mut features_13);

        let device = unsafe {
            instance
                .create_device(physical_device.vk_handle(), &device_create_info, None)
                .map_err(GfxError::DeviceCreation)?
        };

        let vk_swapchain = ash::khr::swapchain::Device::new(instance, &device);
        let vk_debug_utils = ash::ext::debug_utils::Device::new(instance, &device);

        // 每个角色的 family 各取第一个 queue；family 相同则拿到同一个 queue
        let get_family = |index: u32| QueueFamily {
            index,
            queues: vec![unsafe { device.get_device_queue(index, 0) }],
        };
        let queue_families = QueueFamilies {
            graphics: get_family(indices.graphics.expect("graphics queue family was validated during selection")),
            present: get_family(indices.present.expect("present queue family was validated during selection")),
            compute: indices.compute.map(get_family),
        };

        Ok(Self {
            device,
            swapchain: vk_swapchain,
            debug_utils: vk_debug_utils,
            queue_families,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("Destroying GfxDevice");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.queue_families.graphics.queues[0]
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.queue_families.present.queues[0]
    }
}

// tools
impl GfxDevice {
    #[inline]
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let name = CString::new(name.as_ref()).unwrap();
        unsafe {
            self.debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
                )
                .unwrap();
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let debug_name = CString::new(debug_name.as_str()).unwrap();
        unsafe {
            self.debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default()
                        .object_name(debug_name.as_c_str())
                        .object_handle(handle.vk_handle()),
                )
                .unwrap();
        }
    }

    #[inline]
    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().unwrap();
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}

impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_graphics_and_present_family_yields_one_entry() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
            compute: Some(0),
        };
        assert_eq!(unique_queue_family_indices(&indices), vec![0]);
    }

    #[test]
    fn distinct_families_are_all_requested() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(2),
            compute: Some(1),
        };
        assert_eq!(unique_queue_family_indices(&indices), vec![0, 1, 2]);
    }

    #[test]
    fn missing_compute_family_is_skipped() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(1),
            compute: None,
        };
        assert_eq!(unique_queue_family_indices(&indices), vec![0, 1]);
    }
}
