// FFmpeg 相机后端 - 通过一个 ffmpeg 进程读取相机的 MJPEG 流
//
// 预览和拍照共用同一个进程，始终保留最近一帧

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{write_still, CameraBackend};
use crate::models::CaptureSettings;

/// 等待第一帧的最长时间
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// 获取FFmpeg可执行文件的路径
pub fn get_ffmpeg_path() -> Result<PathBuf> {
    let common_paths = vec![
        "/opt/homebrew/bin/ffmpeg", // Apple Silicon Homebrew
        "/usr/local/bin/ffmpeg",    // Intel Homebrew
        "/opt/local/bin/ffmpeg",    // MacPorts
        "/usr/bin/ffmpeg",
    ];

    for path_str in &common_paths {
        let path = PathBuf::from(path_str);
        if path.exists() && ffmpeg_runs(&path) {
            info!("使用系统FFmpeg: {:?}", path);
            return Ok(path);
        }
    }

    // 尝试 PATH 环境变量中的 ffmpeg
    let path = PathBuf::from("ffmpeg");
    if ffmpeg_runs(&path) {
        info!("使用PATH中的FFmpeg");
        return Ok(path);
    }

    Err(anyhow!("未找到FFmpeg，无法访问相机"))
}

fn ffmpeg_runs(path: &Path) -> bool {
    let mut command = std::process::Command::new(path);
    command.arg("-version");

    // Windows下隐藏控制台窗口
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    command
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// 按 SOI/EOI 标记切分连续的 MJPEG 字节流
#[derive(Default)]
pub struct MjpegSplitter {
    buffer: Vec<u8>,
}

impl MjpegSplitter {
    /// 追加数据，返回其中完整的帧
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buffer, 0xD8, 0) else {
                // 没有帧头，只保留最后一个字节（可能是半个标记）
                let keep = self.buffer.len().min(1);
                self.buffer.drain(..self.buffer.len() - keep);
                break;
            };
            let Some(end) = find_marker(&self.buffer, 0xD9, start + 2) else {
                self.buffer.drain(..start);
                break;
            };

            frames.push(self.buffer[start..end + 2].to_vec());
            self.buffer.drain(..end + 2);
        }

        frames
    }
}

fn find_marker(data: &[u8], marker: u8, from: usize) -> Option<usize> {
    if data.len() < 2 || from >= data.len() - 1 {
        return None;
    }
    (from..data.len() - 1).find(|&i| data[i] == 0xFF && data[i + 1] == marker)
}

struct Stream {
    child: Child,
    reader: JoinHandle<()>,
}

/// FFmpeg 相机
pub struct FfmpegCamera {
    stream: tokio::sync::Mutex<Option<Stream>>,
    latest: Arc<Mutex<Option<Vec<u8>>>>,
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self {
            stream: tokio::sync::Mutex::new(None),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    fn build_command(ffmpeg: &Path, settings: &CaptureSettings) -> Command {
        let side = settings.resolution;
        let mut command = Command::new(ffmpeg);
        command
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(["-f", &settings.input_format])
            .args(["-i", &settings.device])
            .args([
                "-vf",
                &format!("crop='min(iw,ih)':'min(iw,ih)',scale={}:{}", side, side),
            ])
            .args(["-f", "image2pipe", "-vcodec", "mjpeg", "-q:v", "3", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
    }

    fn latest_frame(&self) -> Option<Vec<u8>> {
        self.latest.lock().ok().and_then(|frame| frame.clone())
    }
}

#[async_trait]
impl CameraBackend for FfmpegCamera {
    async fn bind(&self, settings: &CaptureSettings) -> Result<()> {
        let mut stream = self.stream.lock().await;
        if let Some(mut old) = stream.take() {
            let _ = old.child.kill().await;
            old.reader.abort();
        }
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }

        let ffmpeg = get_ffmpeg_path()?;
        let mut child = Self::build_command(&ffmpeg, settings)
            .spawn()
            .map_err(|e| anyhow!("启动 ffmpeg 失败: {}", e))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("无法读取 ffmpeg 输出"))?;

        let latest = self.latest.clone();
        let (first_tx, first_rx) = tokio::sync::oneshot::channel::<()>();
        let reader = tokio::spawn(async move {
            let mut splitter = MjpegSplitter::default();
            let mut first_tx = Some(first_tx);
            let mut buf = vec![0u8; 64 * 1024];

            loop {
                let n = match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!("读取相机数据失败: {}", e);
                        break;
                    }
                };

                if let Some(frame) = splitter.push(&buf[..n]).pop() {
                    if let Ok(mut slot) = latest.lock() {
                        *slot = Some(frame);
                    }
                    if let Some(tx) = first_tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
            debug!("相机数据流结束");
        });

        match tokio::time::timeout(FIRST_FRAME_TIMEOUT, first_rx).await {
            Ok(Ok(())) => {
                *stream = Some(Stream { child, reader });
                Ok(())
            }
            _ => {
                let _ = child.kill().await;
                reader.abort();
                Err(anyhow!("相机 {} 没有输出画面", settings.device))
            }
        }
    }

    async fn unbind(&self) {
        if let Some(mut stream) = self.stream.lock().await.take() {
            if let Err(e) = stream.child.kill().await {
                warn!("停止 ffmpeg 失败: {}", e);
            }
            stream.reader.abort();
        }
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }

    async fn preview_frame(&self) -> Result<Vec<u8>> {
        self.latest_frame().ok_or_else(|| anyhow!("暂无预览画面"))
    }

    async fn capture_still(&self, dest: &Path, settings: &CaptureSettings) -> Result<()> {
        let frame = self
            .latest_frame()
            .ok_or_else(|| anyhow!("相机尚未输出画面"))?;
        let dest = dest.to_path_buf();
        let side = settings.resolution;
        let quality = settings.image_quality;

        tokio::task::spawn_blocking(move || write_still(&frame, &dest, side, quality))
            .await
            .map_err(|e| anyhow!("拍照任务异常退出: {}", e))?
    }
}
