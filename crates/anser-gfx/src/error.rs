use ash::vk;

/// 初始化阶段的错误通过 Result 向上传播，让调用方可以干净地放弃启动。
///
/// 帧循环内部的错误（submit/present 失败、fence 超时）不走这条路径，
/// 直接 panic，因为当前设计中不存在"跳过这一帧"的恢复手段。
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to load vulkan library: {0}")]
    EntryLoad(#[from] ash::LoadingError),

    #[error("no suitable GPU found")]
    NoSuitableDevice,

    #[error("failed to create logical device: {0}")]
    DeviceCreation(vk::Result),

    /// swapchain 已经和 surface 不匹配（窗口尺寸变化等），
    /// 需要 resize 之后重试，不是致命错误
    #[error("swapchain is out of date")]
    SwapchainStale,

    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
