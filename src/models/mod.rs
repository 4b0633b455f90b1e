// 数据模型模块 - 定义配置相关的数据结构

use serde::{Deserialize, Serialize};

/// 默认上传地址
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://recipe.glubina.org/upload";

/// 应用配置（部分更新，所有字段可选）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    pub upload: Option<UploadSettings>,
    /// 拍照配置
    pub capture: Option<CaptureSettings>,
    /// 相机权限重新请求策略
    pub permission_policy: Option<PermissionPolicy>,
}

/// 上传设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// 上传接口（绝对地址）
    pub endpoint: String,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 读取超时（秒）
    pub read_timeout_secs: u64,
    /// 写入超时（秒）
    pub write_timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

/// 拍照设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// 预览与拍照的边长（正方形）
    pub resolution: u32,
    /// 图片质量(1-100)
    pub image_quality: u8,
    /// 相机设备（Linux 为 /dev/videoN，macOS 为设备序号，Windows 为设备名）
    pub device: String,
    /// ffmpeg 输入格式（v4l2 / avfoundation / dshow）
    pub input_format: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let (input_format, device) = if cfg!(target_os = "macos") {
            ("avfoundation", "0")
        } else if cfg!(target_os = "windows") {
            ("dshow", "video=Integrated Camera")
        } else {
            ("v4l2", "/dev/video0")
        };

        Self {
            resolution: 512,
            image_quality: 85,
            device: device.to_string(),
            input_format: input_format.to_string(),
        }
    }
}

/// 相机权限被拒绝后，再次进入拍照流程时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// 每次进入拍照流程都重新请求
    #[default]
    EveryEntry,
    /// 进程生命周期内只请求一次，被拒绝后不再询问
    OncePerProcess,
}

/// 持久化的应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedAppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadSettings,
    /// 拍照配置
    #[serde(default)]
    pub capture: CaptureSettings,
    /// 相机权限重新请求策略
    #[serde(default)]
    pub permission_policy: PermissionPolicy,
}
