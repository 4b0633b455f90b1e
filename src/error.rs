// 错误类型 - 拍照上传流程中所有可恢复的错误
//
// Display 输出即为展示给用户的提示文本（俄语界面）

use std::path::PathBuf;
use thiserror::Error;

/// 权限被拒绝时的固定提示
pub const PERMISSION_DENIED_MESSAGE: &str = "Разрешение на использование камеры не предоставлено";

/// 流程错误
///
/// 所有错误都在屏幕级别恢复，不会导致应用退出
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    /// 相机权限被拒绝，本次拍照尝试终止
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,

    /// 相机绑定失败
    #[error("Ошибка камеры: {0}")]
    CameraBind(String),

    /// 拍照失败，可以再次按下快门
    #[error("Ошибка съёмки: {0}")]
    Capture(String),

    /// 照片文件不存在，不会发起网络请求
    #[error("Файл не найден: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 网络传输失败（超时、连接错误等）
    #[error("Ошибка сети: {kind} - {message}")]
    Network { kind: String, message: String },

    /// 服务器返回非 2xx 状态码
    #[error("Ошибка отправки: код {status}, ответ: {body}")]
    Server { status: u16, body: String },

    /// 无法解析的路由
    #[error("Неизвестный маршрут: {0}")]
    InvalidRoute(String),

    /// 当前屏幕不支持该操作
    #[error("Недопустимое действие: {0}")]
    InvalidState(&'static str),
}

impl FlowError {
    /// 从 reqwest 错误构造网络错误
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "Timeout"
        } else if err.is_connect() {
            "ConnectError"
        } else if err.is_body() || err.is_decode() {
            "BodyError"
        } else {
            "RequestError"
        };

        let message = err.to_string();
        Self::Network {
            kind: kind.to_string(),
            message: if message.is_empty() {
                "неизвестная ошибка".to_string()
            } else {
                message
            },
        }
    }
}
