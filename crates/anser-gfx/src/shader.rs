use std::{fs::File, path::Path, rc::Rc};

use ash::vk;

use crate::error::GfxError;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::GfxDevice;

/// 从文件读取 SPIR-V 字节码
///
/// 文件长度必须是 4 的倍数，并按 host 字节序解释为 u32 words
pub fn read_spirv_file(path: impl AsRef<Path>) -> Result<Vec<u32>, GfxError> {
    let mut file = File::open(path.as_ref())?;
    let words = ash::util::read_spv(&mut file)?;
    Ok(words)
}

pub struct GfxShaderModule {
    vk_shader_module: vk::ShaderModule,
    device: Rc<GfxDevice>,
}

impl GfxShaderModule {
    pub fn new(device: Rc<GfxDevice>, path: impl AsRef<Path>) -> Result<Self, GfxError> {
        let words = read_spirv_file(path.as_ref())?;

        let shader_module = unsafe {
            device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&words), None)?
        };

        let shader_module = Self {
            vk_shader_module: shader_module,
            device,
        };
        shader_module.device.set_debug_name(&shader_module, path.as_ref().to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::ShaderModule {
        self.vk_shader_module
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_shader_module(self.vk_shader_module, None);
        }
    }
}

impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_shader_module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn read_spirv_parses_words() {
        // SPIR-V magic number 后接一个任意 word
        let path = temp_file("anser-shader-ok.spv", &[0x03, 0x02, 0x23, 0x07, 0x00, 0x01, 0x02, 0x03]);
        let words = read_spirv_file(&path).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], 0x0723_0203);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn read_spirv_rejects_misaligned_file() {
        let path = temp_file("anser-shader-bad.spv", &[0x03, 0x02, 0x23]);
        assert!(read_spirv_file(&path).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn read_spirv_missing_file_is_io_error() {
        let result = read_spirv_file("/nonexistent/anser.spv");
        assert!(matches!(result, Err(GfxError::Io(_))));
    }
}
