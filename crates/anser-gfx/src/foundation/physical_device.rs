use std::{collections::HashSet, ffi::CStr};

use ash::vk;

use crate::error::GfxError;
use crate::swapchain::surface::Surface;

/// 每种角色的 queue family 在某些硬件上可能不存在，
/// 因此全部用 Option 表示，使用前做一次整体的完整性检查。
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// graphics 和 present 是必需的；compute 是可选角色
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }
}

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) queue_family_indices: QueueFamilyIndices,
}

/// 候选显卡的选择依据，从 vulkan 查询结果中抽取出来，便于单独测试选择逻辑
pub(crate) struct GpuCandidate {
    pub score: u32,
    pub queue_families_complete: bool,
    pub extensions_supported: bool,
    pub surface_supported: bool,
}

/// 在所有候选中选出得分最高的合格显卡，返回其下标
///
/// 得分必须严格大于当前最优才会替换，因此同分时先枚举到的获胜。
pub(crate) fn select_gpu(candidates: &[GpuCandidate]) -> Option<usize> {
    let mut chosen = None;
    let mut chosen_score = 0;

    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.score > chosen_score
            && candidate.queue_families_complete
            && candidate.extensions_supported
            && candidate.surface_supported
        {
            chosen = Some(idx);
            chosen_score = candidate.score;
        }
    }

    chosen
}

/// 显卡类型打分：独显优先于集显，集显优先于其他
pub(crate) fn score_gpu(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        _ => 0,
    }
}

impl GfxPhysicalDevice {
    /// 针对给定 surface 选出最合适的物理显卡
    ///
    /// 合格条件：queue family 完整（graphics + present），所需 device
    /// extension 全部可用，surface 至少报告一种 format 和一种 present mode。
    pub fn select(
        instance: &ash::Instance,
        surface: &Surface,
        required_extensions: &[&'static CStr],
    ) -> Result<Self, GfxError> {
        let gpus = unsafe { instance.enumerate_physical_devices()? };

        let mut props = Vec::with_capacity(gpus.len());
        let mut indices = Vec::with_capacity(gpus.len());
        let mut candidates = Vec::with_capacity(gpus.len());

        for gpu in &gpus {
            let gpu_props = unsafe { instance.get_physical_device_properties(*gpu) };
            let gpu_name = unsafe { CStr::from_ptr(gpu_props.device_name.as_ptr()) };
            log::info!("Checking GPU: {:?}", gpu_name);

            let gpu_indices = Self::find_queue_family_indices(instance, *gpu, surface)?;
            let swapchain_support = surface.query_swapchain_support(*gpu)?;

            candidates.push(GpuCandidate {
                score: score_gpu(gpu_props.device_type),
                queue_families_complete: gpu_indices.is_complete(),
                extensions_supported: Self::check_extension_support(instance, *gpu, required_extensions)?,
                surface_supported: !swapchain_support.formats.is_empty()
                    && !swapchain_support.present_modes.is_empty(),
            });
            props.push(gpu_props);
            indices.push(gpu_indices);
        }

        let chosen = select_gpu(&candidates).ok_or(GfxError::NoSuitableDevice)?;
        let chosen_name = unsafe { CStr::from_ptr(props[chosen].device_name.as_ptr()) };
        log::info!("Using GPU: {:?}", chosen_name);

        Ok(Self {
            vk_handle: gpus[chosen],
            basic_props: props[chosen],
            queue_family_indices: indices[chosen],
        })
    }

    /// 扫描 queue family properties，找到各角色的 family index
    ///
    /// present 能力是针对具体 surface 判断的
    fn find_queue_family_indices(
        instance: &ash::Instance,
        gpu: vk::PhysicalDevice,
        surface: &Surface,
    ) -> Result<QueueFamilyIndices, GfxError> {
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(gpu) };

        let mut indices = QueueFamilyIndices::default();
        for (i, family) in queue_families.iter().enumerate() {
            let i = i as u32;

            if indices.present.is_none() && surface.supports_present(gpu, i)? {
                indices.present = Some(i);
            }
            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(i);
            }
            if indices.compute.is_none() && family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                indices.compute = Some(i);
            }
        }

        Ok(indices)
    }

    fn check_extension_support(
        instance: &ash::Instance,
        gpu: vk::PhysicalDevice,
        extensions: &[&'static CStr],
    ) -> Result<bool, GfxError> {
        let available = unsafe { instance.enumerate_device_extension_properties(gpu)? };
        let available: HashSet<&CStr> =
            available.iter().map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }).collect();

        Ok(extensions.iter().all(|ext| available.contains(ext)))
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.queue_family_indices
    }

    #[inline]
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()).to_string_lossy().into_owned() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: u32) -> GpuCandidate {
        GpuCandidate {
            score,
            queue_families_complete: true,
            extensions_supported: true,
            surface_supported: true,
        }
    }

    #[test]
    fn score_prefers_discrete_over_integrated() {
        assert!(score_gpu(vk::PhysicalDeviceType::DISCRETE_GPU) > score_gpu(vk::PhysicalDeviceType::INTEGRATED_GPU));
        assert!(score_gpu(vk::PhysicalDeviceType::INTEGRATED_GPU) > score_gpu(vk::PhysicalDeviceType::CPU));
    }

    #[test]
    fn select_picks_highest_score() {
        let candidates = vec![candidate(1), candidate(10), candidate(1)];
        assert_eq!(select_gpu(&candidates), Some(1));
    }

    #[test]
    fn select_breaks_ties_by_enumeration_order() {
        let candidates = vec![candidate(10), candidate(10)];
        assert_eq!(select_gpu(&candidates), Some(0));
    }

    #[test]
    fn select_rejects_incomplete_queue_families() {
        let mut best = candidate(10);
        best.queue_families_complete = false;
        let candidates = vec![best, candidate(1)];
        assert_eq!(select_gpu(&candidates), Some(1));
    }

    #[test]
    fn select_fails_when_no_candidate_qualifies() {
        let mut only = candidate(10);
        only.surface_supported = false;
        assert_eq!(select_gpu(&[only]), None);
    }

    #[test]
    fn indices_complete_requires_graphics_and_present() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics = Some(0);
        assert!(!indices.is_complete());

        indices.present = Some(0);
        assert!(indices.is_complete());
    }
}
