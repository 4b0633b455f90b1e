//! 预览屏幕状态
//!
//! 每次进入预览屏幕创建一个新的会话，离开时丢弃。
//! 会话内最多只有一个上传在进行中。

use serde::Serialize;
use uuid::Uuid;

use crate::error::FlowError;

/// 上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Sending,
    Succeeded,
    Failed,
}

/// 预览屏幕的可序列化视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewSnapshot {
    pub session_id: Uuid,
    pub photo_uri: String,
    pub caption: String,
    pub state: UploadState,
    pub notice: Option<String>,
    pub submit_enabled: bool,
}

/// 预览会话
#[derive(Debug, Clone)]
pub struct PreviewSession {
    id: Uuid,
    photo_uri: String,
    caption: String,
    state: UploadState,
    notice: Option<String>,
}

impl PreviewSession {
    pub fn new(photo_uri: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            photo_uri,
            caption: String::new(),
            state: UploadState::Idle,
            notice: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn photo_uri(&self) -> &str {
        &self.photo_uri
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == UploadState::Sending
    }

    /// 编辑备注；发送中时输入框不可用
    pub fn set_caption(&mut self, caption: String) -> bool {
        if self.is_sending() {
            return false;
        }
        self.caption = caption;
        true
    }

    /// 进入发送状态；已在发送中则返回 false
    pub fn begin_submit(&mut self) -> bool {
        if self.is_sending() {
            return false;
        }
        self.state = UploadState::Sending;
        self.notice = None;
        true
    }

    /// 上传结束
    pub fn complete(&mut self, result: &Result<String, FlowError>) {
        match result {
            Ok(_) => {
                self.state = UploadState::Succeeded;
                self.notice = None;
            }
            Err(e) => self.fail(e),
        }
    }

    /// 失败后回到可再次提交的状态，并显示提示
    pub fn fail(&mut self, error: &FlowError) {
        self.state = UploadState::Failed;
        self.notice = Some(error.to_string());
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        PreviewSnapshot {
            session_id: self.id,
            photo_uri: self.photo_uri.clone(),
            caption: self.caption.clone(),
            state: self.state,
            notice: self.notice.clone(),
            submit_enabled: !self.is_sending(),
        }
    }
}
