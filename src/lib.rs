// 菜谱相机 - Tauri应用主库
//
// 拍一张菜品照片，连同可选的备注上传到菜谱服务，显示返回的菜谱

// 声明模块
pub mod actors;
pub mod app;
pub mod capture;
pub mod commands;
pub mod error;
pub mod event_bus;
pub mod logger;
pub mod models;
pub mod navigation;
pub mod permission;
pub mod recipe;
pub mod settings;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use actors::FlowHandle;
use event_bus::EventBus;
use settings::SettingsManager;

pub use app::run;

/// 应用状态
///
/// 屏幕状态全部在流程 Actor 内部，这里只保存与之通信的 Handle
#[derive(Clone)]
pub struct AppState {
    /// 流程 Actor 的 Handle
    pub flow: FlowHandle,
    /// 配置管理器
    pub settings: Arc<SettingsManager>,
    /// 事件总线
    pub event_bus: Arc<EventBus>,
    /// 照片目录，前端只能读取其中的文件
    pub photos_dir: PathBuf,
}
