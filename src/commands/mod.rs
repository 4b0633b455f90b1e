//! Tauri 命令模块
//!
//! 提供前端调用的所有 Tauri 命令接口，按功能分组：
//! - flow: 屏幕流程命令（导航、拍照、上传）
//! - config: 配置与日志目录命令

pub mod config;
pub mod flow;

// 重新导出所有命令
pub use config::*;
pub use flow::*;
