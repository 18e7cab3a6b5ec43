use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::error::GfxError;
use crate::foundation::device::GfxDevice;
use crate::foundation::mem_allocator::MemAllocator;

/// 2D image 的创建参数
///
/// builder 方法消耗并返回 Self，配置一旦 build 就不再变化。
#[derive(Clone)]
pub struct GfxImageDesc {
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
}

impl GfxImageDesc {
    pub fn new_2d(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::empty(),
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = extent;
        self
    }

    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }

    pub fn add_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage |= usage;
        self
    }

    pub fn remove_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage &= !usage;
        self
    }

    pub fn add_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect |= aspect;
        self
    }

    pub fn remove_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect &= !aspect;
        self
    }

    /// 分配 device local 内存并创建 image 和默认的 view
    pub fn build(
        self,
        device: Rc<GfxDevice>,
        allocator: &MemAllocator,
        debug_name: impl AsRef<str>,
    ) -> Result<GfxImage, GfxError> {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage);

        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            required_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            ..Default::default()
        };

        let (vk_image, allocation) = unsafe { allocator.create_image(&image_ci, &alloc_ci)? };
        device.set_object_debug_name(vk_image, format!("GfxImage::{}", debug_name.as_ref()));

        let view_ci = vk::ImageViewCreateInfo::default()
            .image(vk_image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(
                vk::ImageSubresourceRange::default().aspect_mask(self.aspect).level_count(1).layer_count(1),
            );
        let view = unsafe { device.create_image_view(&view_ci, None)? };
        device.set_object_debug_name(view, format!("GfxImageView::{}", debug_name.as_ref()));

        Ok(GfxImage {
            vk_image,
            view,
            allocation,
            extent: self.extent,
            format: self.format,
            device,
        })
    }
}

/// 由 vma 分配内存的 image，以及配套的默认 view
pub struct GfxImage {
    vk_image: vk::Image,
    view: vk::ImageView,
    allocation: vk_mem::Allocation,

    extent: vk::Extent2D,
    format: vk::Format,

    device: Rc<GfxDevice>,
}

impl GfxImage {
    /// 先销毁 view，再释放 image 和它的内存
    pub fn destroy(mut self, allocator: &MemAllocator) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            allocator.destroy_image(self.vk_image, &mut self.allocation);
        }
    }
}

// getters
impl GfxImage {
    #[inline]
    pub fn vk_handle(&self) -> vk::Image {
        self.vk_image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desc_accumulates_usage_flags() {
        let desc = GfxImageDesc::new_2d(vk::Extent2D { width: 4, height: 4 }, vk::Format::R16G16B16A16_SFLOAT)
            .add_usage(vk::ImageUsageFlags::TRANSFER_SRC)
            .add_usage(vk::ImageUsageFlags::STORAGE);
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::STORAGE));
    }

    #[test]
    fn desc_remove_usage_clears_only_named_flag() {
        let desc = GfxImageDesc::new_2d(vk::Extent2D { width: 4, height: 4 }, vk::Format::R16G16B16A16_SFLOAT)
            .add_usage(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::STORAGE)
            .remove_usage(vk::ImageUsageFlags::STORAGE);
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(!desc.usage.contains(vk::ImageUsageFlags::STORAGE));
    }

    #[test]
    fn desc_aspect_defaults_to_color() {
        let desc = GfxImageDesc::new_2d(vk::Extent2D { width: 4, height: 4 }, vk::Format::D32_SFLOAT);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::COLOR);

        let desc = desc.remove_aspect(vk::ImageAspectFlags::COLOR).add_aspect(vk::ImageAspectFlags::DEPTH);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::DEPTH);
    }
}
