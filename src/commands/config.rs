//! 配置管理命令
//!
//! 提供应用配置的读取和更新接口，以及日志目录的查看

use tauri_plugin_opener::OpenerExt;
use tracing::info;

use crate::event_bus::AppEvent;
use crate::logger;
use crate::models::{AppConfig, PersistedAppConfig};
use crate::AppState;

/// 获取应用配置
#[tauri::command]
pub async fn get_app_config(
    state: tauri::State<'_, AppState>,
) -> Result<PersistedAppConfig, String> {
    Ok(state.settings.get().await)
}

/// 更新配置
///
/// 新配置在下次进入拍照屏幕或下次上传时生效
#[tauri::command]
pub async fn update_config(
    state: tauri::State<'_, AppState>,
    config: AppConfig,
) -> Result<PersistedAppConfig, String> {
    let updated = state
        .settings
        .update(config)
        .await
        .map_err(|e| e.to_string())?;

    info!(
        "配置已更新: 上传地址 {}, 分辨率 {}",
        updated.upload.endpoint, updated.capture.resolution
    );
    state.event_bus.publish(AppEvent::ConfigUpdated);
    Ok(updated)
}

/// 获取日志目录路径
#[tauri::command]
pub fn get_log_dir() -> Result<String, String> {
    Ok(logger::log_dir().to_string_lossy().to_string())
}

/// 打开日志文件夹
#[tauri::command]
pub fn open_log_folder(app: tauri::AppHandle) -> Result<(), String> {
    let log_dir = logger::log_dir();
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir).map_err(|e| format!("创建目录失败: {}", e))?;
    }

    info!("打开日志文件夹: {:?}", log_dir);
    app.opener()
        .open_path(log_dir.to_string_lossy(), None::<&str>)
        .map_err(|e| format!("无法打开文件夹: {}", e))
}
