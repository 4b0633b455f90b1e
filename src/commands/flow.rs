//! 屏幕流程命令
//!
//! 所有命令只是把请求转发给流程 Actor，状态变化同时通过 `flow-changed` 事件推送

use base64::{engine::general_purpose, Engine as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::actors::FlowSnapshot;
use crate::capture::CapturedPhoto;
use crate::error::FlowError;
use crate::upload::IMAGE_MIME;
use crate::AppState;

fn jpeg_data_url(bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        IMAGE_MIME,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// 获取当前屏幕状态
#[tauri::command]
pub async fn get_flow_state(state: tauri::State<'_, AppState>) -> Result<FlowSnapshot, String> {
    state.flow.get().await.map_err(|e| e.to_string())
}

/// 按路由跳转
///
/// # 参数
/// - `route`: 路由字符串，如 `camera`、`preview/<编码后的照片URI>`
#[tauri::command]
pub async fn navigate_to(
    state: tauri::State<'_, AppState>,
    route: String,
) -> Result<FlowSnapshot, String> {
    debug!("导航请求: {}", route);
    state
        .flow
        .navigate_route(&route)
        .await
        .map_err(|e| e.to_string())
}

/// 返回上一屏
#[tauri::command]
pub async fn navigate_back(state: tauri::State<'_, AppState>) -> Result<FlowSnapshot, String> {
    state.flow.back().await.map_err(|e| e.to_string())
}

/// 按下快门，等待拍照结束后返回最终状态
#[tauri::command]
pub async fn take_photo(state: tauri::State<'_, AppState>) -> Result<FlowSnapshot, String> {
    let dispatch = state.flow.shutter().await.map_err(|e| e.to_string())?;
    match dispatch.settle().await {
        Some(snapshot) => Ok(snapshot),
        None => state.flow.get().await.map_err(|e| e.to_string()),
    }
}

/// 最近一帧相机预览（data URL）
#[tauri::command]
pub async fn camera_preview_frame(state: tauri::State<'_, AppState>) -> Result<String, String> {
    let frame = state
        .flow
        .preview_frame()
        .await
        .map_err(|e| e.to_string())?;
    Ok(jpeg_data_url(&frame))
}

/// 读取照片目录中的照片，目录之外的路径一律拒绝
async fn read_photo(photos_dir: &Path, photo_uri: &str) -> Result<Vec<u8>, FlowError> {
    let photo = CapturedPhoto::from_uri(photo_uri)
        .ok_or_else(|| FlowError::FileNotFound(PathBuf::from(photo_uri)))?;
    let not_found = || FlowError::FileNotFound(photo.path().to_path_buf());

    let path = tokio::fs::canonicalize(photo.path())
        .await
        .map_err(|_| not_found())?;
    let root = tokio::fs::canonicalize(photos_dir)
        .await
        .map_err(|_| not_found())?;
    if !path.starts_with(&root) {
        warn!("拒绝读取照片目录之外的文件: {:?}", path);
        return Err(FlowError::InvalidState("файл вне каталога фотографий"));
    }

    tokio::fs::read(&path).await.map_err(|_| not_found())
}

/// 读取照片用于显示（data URL）
#[tauri::command]
pub async fn photo_data_url(
    state: tauri::State<'_, AppState>,
    photo_uri: String,
) -> Result<String, String> {
    let bytes = read_photo(&state.photos_dir, &photo_uri)
        .await
        .map_err(|e| e.to_string())?;
    Ok(jpeg_data_url(&bytes))
}

/// 编辑备注
#[tauri::command]
pub async fn set_caption(
    state: tauri::State<'_, AppState>,
    caption: String,
) -> Result<FlowSnapshot, String> {
    state
        .flow
        .set_caption(caption)
        .await
        .map_err(|e| e.to_string())
}

/// 提交照片，等待上传结束后返回最终状态
#[tauri::command]
pub async fn submit_photo(state: tauri::State<'_, AppState>) -> Result<FlowSnapshot, String> {
    let dispatch = state.flow.submit().await.map_err(|e| e.to_string())?;
    match dispatch.settle().await {
        Some(snapshot) => Ok(snapshot),
        None => state.flow.get().await.map_err(|e| e.to_string()),
    }
}
