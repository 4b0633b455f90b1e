//! 应用程序初始化和启动
//!
//! 负责 Tauri 应用的完整启动流程，包括：
//! - 日志系统初始化
//! - 配置、相机、上传组件初始化
//! - 流程 Actor 启动与事件转发
//! - Tauri Builder 配置与命令注册

use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::actors::FlowActor;
use crate::capture::{CaptureSession, FfmpegCamera};
use crate::commands::*;
use crate::error::FlowError;
use crate::event_bus::{AppEvent, EventBus};
use crate::logger;
use crate::permission::{DevicePermission, PermissionGate};
use crate::settings::SettingsManager;
use crate::upload::HttpUploader;
use crate::AppState;

/// 全局错误提示
#[derive(Clone, Debug, serde::Serialize)]
struct ErrorNotice {
    message: String,
}

/// 应用程序入口点
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let log_broadcaster = Arc::new(logger::LogBroadcaster::new());

    if let Err(e) = logger::init_with_broadcaster(log_broadcaster.clone()) {
        eprintln!("日志系统初始化失败: {}", e);
    }

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            info!("初始化菜谱相机...");
            log_broadcaster.set_app_handle(app.handle().clone());

            let app_dir = app.path().app_data_dir()?;
            let state =
                tauri::async_runtime::block_on(init_state(app.handle().clone(), app_dir))?;
            app.manage(state);

            info!("初始化完成");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_flow_state,
            navigate_to,
            navigate_back,
            take_photo,
            camera_preview_frame,
            photo_data_url,
            set_caption,
            submit_photo,
            get_app_config,
            update_config,
            get_log_dir,
            open_log_folder,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

/// 创建各组件并启动流程 Actor
async fn init_state(app: AppHandle, app_dir: PathBuf) -> anyhow::Result<AppState> {
    let settings = Arc::new(SettingsManager::new(app_dir.join("config.json")).await?);
    let config = settings.get().await;
    info!("上传地址: {}", config.upload.endpoint);

    let photos_dir = app_dir.join("photos");
    tokio::fs::create_dir_all(&photos_dir).await?;
    info!("照片目录: {:?}", photos_dir);

    let event_bus = Arc::new(EventBus::new(64));

    let error_app = app.clone();
    let on_error = Arc::new(move |error: &FlowError| {
        let notice = ErrorNotice {
            message: error.to_string(),
        };
        if let Err(e) = error_app.emit("app-error", &notice) {
            warn!("发送错误提示失败: {}", e);
        }
    });

    let (actor, flow) = FlowActor::new(
        PermissionGate::new(Box::new(DevicePermission::new())),
        CaptureSession::new(Arc::new(FfmpegCamera::new()), photos_dir.clone()),
        Arc::new(HttpUploader::new()),
        settings.clone(),
        event_bus.clone(),
        on_error,
    );
    tauri::async_runtime::spawn(actor.run());

    spawn_event_forwarder(app, &event_bus);

    Ok(AppState {
        flow,
        settings,
        event_bus,
        photos_dir,
    })
}

/// 把事件总线上的事件转发给前端
fn spawn_event_forwarder(app: AppHandle, event_bus: &EventBus) {
    let mut receiver = event_bus.subscribe();

    tauri::async_runtime::spawn(async move {
        loop {
            let result = match receiver.recv().await {
                Ok(AppEvent::FlowChanged(snapshot)) => {
                    debug!("屏幕状态: {}", snapshot.route);
                    app.emit("flow-changed", &snapshot)
                }
                Ok(AppEvent::ConfigUpdated) => app.emit("config-updated", ()),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("事件转发滞后，跳过 {} 条事件", skipped);
                    Ok(())
                }
                Err(RecvError::Closed) => break,
            };

            if let Err(e) = result {
                warn!("转发事件失败: {}", e);
            }
        }
    });
}
