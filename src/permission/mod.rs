// 相机权限模块 - 进入拍照流程前检查并请求相机权限

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::models::{CaptureSettings, PermissionPolicy};

/// 权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    NotDetermined,
}

/// 平台权限接口
///
/// 每次检查都传入当前的拍照配置，配置修改后下次进入拍照屏幕即生效
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// 查询当前权限状态
    async fn status(&self, settings: &CaptureSettings) -> PermissionStatus;

    /// 向平台发起一次权限请求，返回是否授权
    async fn request(&self, settings: &CaptureSettings) -> Result<bool>;
}

/// 权限门 - 每个进程一个，由流程 Actor 独占
pub struct PermissionGate {
    provider: Box<dyn PermissionProvider>,
    denied_once: bool,
}

impl PermissionGate {
    pub fn new(provider: Box<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            denied_once: false,
        }
    }

    pub async fn check(&self, settings: &CaptureSettings) -> PermissionStatus {
        self.provider.status(settings).await
    }

    /// 确保已获得相机权限
    ///
    /// 已授权时直接返回；否则最多请求一次，拒绝即失败，不重试
    pub async fn ensure(
        &mut self,
        policy: PermissionPolicy,
        settings: &CaptureSettings,
    ) -> Result<(), FlowError> {
        if self.provider.status(settings).await == PermissionStatus::Granted {
            return Ok(());
        }

        if policy == PermissionPolicy::OncePerProcess && self.denied_once {
            info!("相机权限此前已被拒绝，不再重复请求");
            return Err(FlowError::PermissionDenied);
        }

        let granted = match self.provider.request(settings).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("请求相机权限失败: {}", e);
                false
            }
        };

        if granted {
            info!("相机权限已授予");
            Ok(())
        } else {
            self.denied_once = true;
            warn!("相机权限被拒绝");
            Err(FlowError::PermissionDenied)
        }
    }
}

/// 桌面平台的权限实现 - 通过尝试打开相机设备判断
///
/// 桌面系统没有统一的权限弹窗，请求即重新探测设备。
/// 只有系统明确拒绝访问才算未授权；设备不存在或被占用交给相机绑定报错
#[derive(Debug, Default, Clone, Copy)]
pub struct DevicePermission;

impl DevicePermission {
    pub fn new() -> Self {
        Self
    }

    fn open_device(settings: &CaptureSettings) -> PermissionStatus {
        // 只有 v4l2 的设备是可直接打开的文件节点
        if settings.input_format != "v4l2" {
            return PermissionStatus::Granted;
        }

        let device = Path::new(&settings.device);
        match std::fs::OpenOptions::new().read(true).open(device) {
            Ok(_) => PermissionStatus::Granted,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                PermissionStatus::Denied
            }
            Err(e) => {
                debug!("相机设备 {:?} 暂不可用，由绑定阶段处理: {}", device, e);
                PermissionStatus::Granted
            }
        }
    }
}

#[async_trait]
impl PermissionProvider for DevicePermission {
    async fn status(&self, settings: &CaptureSettings) -> PermissionStatus {
        Self::open_device(settings)
    }

    async fn request(&self, settings: &CaptureSettings) -> Result<bool> {
        info!("请求相机权限: {}", settings.device);
        Ok(Self::open_device(settings) == PermissionStatus::Granted)
    }
}
