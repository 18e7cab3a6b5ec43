use std::{
    collections::HashSet,
    ffi::{CStr, CString, c_char},
};

use ash::vk;
use itertools::Itertools;

use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugMsger;

/// Vulkan instance 封装
///
/// 进程内只创建一次，销毁一次，不会重建。
pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,

    /// debug messenger 仅在 debug 构建中创建
    debug_messenger: Option<DebugMsger>,
}

// 创建与销毁
impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// # Parameters
    /// - `extra_exts`: 平台相关的 surface 扩展，由窗口层提供
    pub fn new(vk_entry: &ash::Entry, app_name: &str, extra_exts: &[*const c_char]) -> Result<Self, GfxError> {
        let app_name = CString::new(app_name).unwrap();
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_ref())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Anser")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, extra_exts)?;
        let mut enabled_extensions_str = String::new();
        for ext in &enabled_extensions {
            enabled_extensions_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance extensions: {}", enabled_extensions_str);

        let enabled_layers = Self::get_layers(vk_entry)?;
        let mut enabled_layers_str = String::new();
        for layer in &enabled_layers {
            enabled_layers_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*layer) }));
        }
        log::info!("instance layers: {}", enabled_layers_str);

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions)
            .enabled_layer_names(&enabled_layers);

        // 让 instance 的创建过程本身也能被 debug messenger 捕获
        let mut debug_utils_messenger_ci = DebugMsger::debug_utils_messenger_ci();
        if cfg!(debug_assertions) {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None)? };

        let debug_messenger = if cfg!(debug_assertions) {
            Some(DebugMsger::new(vk_entry, &handle))
        } else {
            None
        };

        Ok(Self {
            ash_instance: handle,
            debug_messenger,
        })
    }

    pub fn destroy(mut self) {
        log::info!("Destroying GfxInstance");
        if let Some(messenger) = self.debug_messenger.take() {
            messenger.destroy();
        }
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 构造过程
impl GfxInstance {
    /// instance 所需的所有 extension
    ///
    /// # return
    /// instance 所需的，且受支持的 extension；缺少必需项视为 setup 错误
    fn get_extensions(vk_entry: &ash::Entry, extra_exts: &[*const c_char]) -> Result<Vec<*const c_char>, GfxError> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };
        let mut enabled_extensions: HashSet<&CStr> = HashSet::new();

        // 检查某个 instance ext 并启用
        let mut enable_ext = |ext: &'static CStr| -> Result<(), GfxError> {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| ext == unsafe { CStr::from_ptr(supported_ext.extension_name.as_ptr()) });
            if supported {
                enabled_extensions.insert(ext);
                Ok(())
            } else {
                log::error!("Required instance extension ({:?}) is missing", ext);
                Err(GfxError::Vk(vk::Result::ERROR_EXTENSION_NOT_PRESENT))
            }
        };

        // 外部传入的 surface 扩展
        for ext in extra_exts {
            enable_ext(unsafe { CStr::from_ptr(*ext) })?;
        }

        for ext in Self::basic_instance_exts() {
            enable_ext(ext)?;
        }

        Ok(enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec())
    }

    /// instance 所需的所有 layers
    fn get_layers(vk_entry: &ash::Entry) -> Result<Vec<*const c_char>, GfxError> {
        let all_layer_props = unsafe { vk_entry.enumerate_instance_layer_properties()? };

        let mut valid_layers = Vec::new();
        for layer in Self::basic_instance_layers() {
            let is_layer_supported = all_layer_props
                .iter()
                .any(|available_layer| layer == unsafe { CStr::from_ptr(available_layer.layer_name.as_ptr()) });
            if is_layer_supported {
                valid_layers.push(layer);
            } else {
                log::error!("Required instance layer ({:?}) is missing", layer);
                return Err(GfxError::Vk(vk::Result::ERROR_LAYER_NOT_PRESENT));
            }
        }

        Ok(valid_layers.iter().map(|layer| layer.as_ptr()).collect_vec())
    }

    /// 必须要开启的 instance layers
    fn basic_instance_layers() -> Vec<&'static CStr> {
        if cfg!(debug_assertions) {
            vec![c"VK_LAYER_KHRONOS_validation"]
        } else {
            Vec::new()
        }
    }

    /// 必须要开启的 instance extensions
    fn basic_instance_exts() -> Vec<&'static CStr> {
        // debug utils 可以和 validation layer 配合使用，提供更详细的信息；
        // 同时用于给 vulkan object 设置 debug name
        vec![vk::EXT_DEBUG_UTILS_NAME]
    }
}
