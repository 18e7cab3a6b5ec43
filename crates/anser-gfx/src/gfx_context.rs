use std::rc::Rc;

use crate::error::GfxError;
use crate::foundation::device::GfxDevice;
use crate::foundation::instance::GfxInstance;
use crate::foundation::mem_allocator::MemAllocator;
use crate::foundation::physical_device::GfxPhysicalDevice;
use crate::swapchain::surface::Surface;

/// 图形后端的根对象，聚合 instance、physical device、device 和 allocator
///
/// 构造顺序是固定的三段式，因为 surface 依赖 instance，
/// 而 GPU 选择又依赖 surface：
///
/// ```ignore
/// let vk_entry = GfxContext::load_entry()?;
/// let instance = GfxInstance::new(&vk_entry, "app", surface_exts)?;
/// let surface = Surface::new(&vk_entry, instance.ash_instance(), display, window)?;
/// let gfx = GfxContext::new(vk_entry, instance, &surface)?;
/// ```
///
/// 销毁顺序与构造相反，surface 由调用方在 destroy 之前销毁。
pub struct GfxContext {
    /// vulkan library 的加载句柄，在所有对象之后释放
    _vk_entry: ash::Entry,

    instance: GfxInstance,
    physical_device: GfxPhysicalDevice,
    device: Rc<GfxDevice>,
    allocator: MemAllocator,
}

// 创建与销毁
impl GfxContext {
    /// 动态加载 vulkan library
    pub fn load_entry() -> Result<ash::Entry, GfxError> {
        let entry = unsafe { ash::Entry::load()? };
        Ok(entry)
    }

    /// 根据 surface 选择 GPU，创建 device 和 allocator
    pub fn new(vk_entry: ash::Entry, instance: GfxInstance, surface: &Surface) -> Result<Self, GfxError> {
        let physical_device =
            GfxPhysicalDevice::select(instance.ash_instance(), surface, &GfxDevice::basic_device_exts())?;
        log::info!("physical device: {}", physical_device.name());

        let device = Rc::new(GfxDevice::new(instance.ash_instance(), &physical_device)?);

        let allocator =
            MemAllocator::new(instance.ash_instance(), physical_device.vk_handle(), &device)?;

        Ok(Self {
            _vk_entry: vk_entry,
            instance,
            physical_device,
            device,
            allocator,
        })
    }

    /// 与构造相反的顺序销毁：allocator -> device -> instance
    ///
    /// 调用方必须保证此时 GPU 已经 idle，且 device 的其他 Rc
    /// 持有者（swapchain、command pool 等）都已销毁。
    pub fn destroy(self) {
        log::info!("Destroying GfxContext");

        self.allocator.destroy();
        self.device.destroy();
        self.instance.destroy();
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn allocator(&self) -> &MemAllocator {
        &self.allocator
    }
}
