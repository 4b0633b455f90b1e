// 上传模块 - 将照片和可选的备注以 multipart 表单发送到菜谱服务

use async_trait::async_trait;
use reqwest::{multipart, Client};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::capture::CapturedPhoto;
use crate::error::FlowError;
use crate::models::UploadSettings;

pub mod preview;

pub use preview::{PreviewSession, PreviewSnapshot, UploadState};

/// 图片字段名
pub const IMAGE_FIELD: &str = "image";
/// 备注字段名
pub const CAPTION_FIELD: &str = "caption";
/// 图片 MIME 类型
pub const IMAGE_MIME: &str = "image/jpeg";

/// 空白备注（空串或全是空白字符）视为没有备注
pub fn normalize_caption(caption: &str) -> Option<&str> {
    if caption.trim().is_empty() {
        None
    } else {
        Some(caption)
    }
}

/// 上传表单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub file_name: String,
    pub image: Vec<u8>,
    pub caption: Option<String>,
}

impl UploadForm {
    pub fn new(file_name: impl Into<String>, image: Vec<u8>, caption: &str) -> Self {
        Self {
            file_name: file_name.into(),
            image,
            caption: normalize_caption(caption).map(str::to_string),
        }
    }

    /// 读取照片文件构建表单；文件不存在时不做任何网络请求
    pub async fn from_photo(photo: &CapturedPhoto, caption: &str) -> Result<Self, FlowError> {
        let not_found = || FlowError::FileNotFound(photo.path().to_path_buf());

        match tokio::fs::metadata(photo.path()).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                warn!("文件不存在: {:?}", photo.path());
                return Err(not_found());
            }
        }

        let image = tokio::fs::read(photo.path()).await.map_err(|e| {
            warn!("读取照片失败: {}", e);
            not_found()
        })?;

        Ok(Self::new(photo.file_name(), image, caption))
    }

    /// 表单中的字段名（按顺序）
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec![IMAGE_FIELD];
        if self.caption.is_some() {
            names.push(CAPTION_FIELD);
        }
        names
    }

    /// 转换为 reqwest 的 multipart 表单
    pub fn into_multipart(self) -> Result<multipart::Form, FlowError> {
        let image = multipart::Part::bytes(self.image)
            .file_name(self.file_name)
            .mime_str(IMAGE_MIME)
            .map_err(|e| FlowError::from_transport(&e))?;

        let mut form = multipart::Form::new().part(IMAGE_FIELD, image);
        if let Some(caption) = self.caption {
            form = form.text(CAPTION_FIELD, caption);
        }
        Ok(form)
    }
}

/// 菜谱上传接口
#[async_trait]
pub trait RecipeUploader: Send + Sync {
    /// 发送一次上传请求，成功时返回响应文本
    async fn upload(&self, settings: &UploadSettings, form: UploadForm) -> Result<String, FlowError>;
}

/// 基于 reqwest 的上传实现
///
/// reqwest 0.11 没有读/写超时，按阶段分别计时：
/// - 连接：`connect_timeout`
/// - 发送表单并等待响应头：写超时 + 读超时
/// - 读取响应体：每次读取之间不超过读超时
#[derive(Debug, Default, Clone)]
pub struct HttpUploader;

impl HttpUploader {
    pub fn new() -> Self {
        Self
    }

    fn client(settings: &UploadSettings) -> Result<Client, FlowError> {
        Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| FlowError::from_transport(&e))
    }

    /// 逐块读取响应体，任意两次读取之间超过读超时即失败
    async fn read_body(
        mut response: reqwest::Response,
        read_timeout: Duration,
    ) -> Result<String, FlowError> {
        let mut body = Vec::new();
        loop {
            let chunk = tokio::time::timeout(read_timeout, response.chunk())
                .await
                .map_err(|_| phase_timeout("чтение ответа", read_timeout))?
                .map_err(|e| FlowError::from_transport(&e))?;
            match chunk {
                Some(bytes) => body.extend_from_slice(&bytes),
                None => break,
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn phase_timeout(phase: &str, limit: Duration) -> FlowError {
    FlowError::Network {
        kind: "Timeout".to_string(),
        message: format!("{}: нет данных за {} с", phase, limit.as_secs()),
    }
}

#[async_trait]
impl RecipeUploader for HttpUploader {
    async fn upload(&self, settings: &UploadSettings, form: UploadForm) -> Result<String, FlowError> {
        info!(
            "发送文件: {}, 地址: {}, 备注: {:?}",
            form.file_name, settings.endpoint, form.caption
        );

        let read_timeout = Duration::from_secs(settings.read_timeout_secs);
        let send_timeout = Duration::from_secs(settings.write_timeout_secs) + read_timeout;

        let client = Self::client(settings)?;
        let request = client
            .post(&settings.endpoint)
            .multipart(form.into_multipart()?)
            .send();
        let response = tokio::time::timeout(send_timeout, request)
            .await
            .map_err(|_| phase_timeout("отправка", send_timeout))?
            .map_err(|e| FlowError::from_transport(&e))?;

        let status = response.status();
        debug!("响应状态码: {}", status);

        let body = Self::read_body(response, read_timeout).await?;
        debug!("响应内容: {}", body);

        if status.is_success() {
            info!("文件发送成功");
            Ok(body)
        } else {
            Err(FlowError::Server {
                status: status.as_u16(),
                body,
            })
        }
    }
}
