// 拍照模块 - 绑定相机预览并在按下快门时保存一张 JPEG

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::FlowError;
use crate::models::CaptureSettings;

pub mod ffmpeg;

pub use ffmpeg::FfmpegCamera;

/// 相机后端
///
/// 预览和拍照共用同一个相机会话，按固定分辨率绑定
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// 启动相机会话
    async fn bind(&self, settings: &CaptureSettings) -> Result<()>;

    /// 释放相机
    async fn unbind(&self);

    /// 最近一帧预览（JPEG）
    async fn preview_frame(&self) -> Result<Vec<u8>>;

    /// 拍摄一张照片写入 `dest`
    async fn capture_still(&self, dest: &Path, settings: &CaptureSettings) -> Result<()>;
}

/// 已拍摄的照片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    path: PathBuf,
}

impl CapturedPhoto {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 从 `file://` URI 或普通路径还原
    pub fn from_uri(uri: &str) -> Option<Self> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.is_empty() {
            return None;
        }
        Some(Self::new(PathBuf::from(path)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uri(&self) -> String {
        format!("file://{}", self.path.to_string_lossy())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "photo.jpg".to_string())
    }
}

/// 照片文件名：IMG_yyyyMMdd_HHmmss.jpg
pub fn photo_file_name(now: DateTime<Local>) -> String {
    format!("IMG_{}.jpg", now.format("%Y%m%d_%H%M%S"))
}

/// 居中裁剪为正方形并缩放到指定边长
pub fn square_frame(img: DynamicImage, side: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let crop = width.min(height);
    let cropped = if width == height {
        img
    } else {
        img.crop_imm((width - crop) / 2, (height - crop) / 2, crop, crop)
    };

    if cropped.width() == side {
        cropped
    } else {
        cropped.resize_exact(side, side, image::imageops::FilterType::Lanczos3)
    }
}

/// 将相机帧处理为正方形照片并保存为 JPEG
pub fn write_still(frame: &[u8], dest: &Path, side: u32, quality: u8) -> Result<()> {
    let img = image::load_from_memory(frame)
        .map_err(|e| anyhow::anyhow!("解码相机帧失败: {}", e))?;
    let rgb = square_frame(img, side).to_rgb8();

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let output_file = File::create(dest).map_err(|e| anyhow::anyhow!("创建文件失败: {}", e))?;
    let writer = BufWriter::new(output_file);
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
    Ok(())
}

/// 一次待执行的拍照
pub struct PendingShot {
    pub path: PathBuf,
    backend: Arc<dyn CameraBackend>,
    settings: CaptureSettings,
}

impl PendingShot {
    /// 异步写入照片
    pub async fn run(self) -> Result<CapturedPhoto, FlowError> {
        match self.backend.capture_still(&self.path, &self.settings).await {
            Ok(()) => {
                info!("照片已保存: {:?}", self.path);
                Ok(CapturedPhoto::new(self.path))
            }
            Err(e) => {
                warn!("拍照失败: {}", e);
                Err(FlowError::Capture(e.to_string()))
            }
        }
    }
}

/// 拍照会话 - 拍照屏幕可见期间独占相机
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    photos_dir: PathBuf,
    settings: Option<CaptureSettings>,
    shot_in_flight: bool,
}

impl CaptureSession {
    pub fn new(backend: Arc<dyn CameraBackend>, photos_dir: PathBuf) -> Self {
        Self {
            backend,
            photos_dir,
            settings: None,
            shot_in_flight: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.settings.is_some()
    }

    pub fn shot_in_flight(&self) -> bool {
        self.shot_in_flight
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    /// 绑定相机
    pub async fn bind(&mut self, settings: CaptureSettings) -> Result<(), FlowError> {
        if self.is_bound() {
            self.backend.unbind().await;
        }

        self.backend.bind(&settings).await.map_err(|e| {
            warn!("相机绑定失败: {}", e);
            FlowError::CameraBind(e.to_string())
        })?;

        info!(
            "相机已绑定: {} ({}x{})",
            settings.device, settings.resolution, settings.resolution
        );
        self.settings = Some(settings);
        Ok(())
    }

    /// 释放相机
    pub async fn unbind(&mut self) {
        if self.settings.take().is_some() {
            self.backend.unbind().await;
            info!("相机已释放");
        }
    }

    /// 最近一帧预览
    pub async fn preview_frame(&self) -> Result<Vec<u8>, FlowError> {
        if !self.is_bound() {
            return Err(FlowError::InvalidState("камера не подключена"));
        }
        self.backend
            .preview_frame()
            .await
            .map_err(|e| FlowError::CameraBind(e.to_string()))
    }

    /// 按下快门：同步生成目标路径，返回待执行的拍照任务
    ///
    /// 已有拍照在进行中时返回 None
    pub fn begin_shot(&mut self, now: DateTime<Local>) -> Result<Option<PendingShot>, FlowError> {
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| FlowError::Capture("камера не подключена".to_string()))?;

        if self.shot_in_flight {
            return Ok(None);
        }

        self.shot_in_flight = true;
        Ok(Some(PendingShot {
            path: self.photos_dir.join(photo_file_name(now)),
            backend: self.backend.clone(),
            settings,
        }))
    }

    /// 拍照结束（无论成功与否）
    pub fn finish_shot(&mut self) {
        self.shot_in_flight = false;
    }
}
