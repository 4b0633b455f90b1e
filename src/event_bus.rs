// 事件总线 - 流程 Actor 与界面之间的解耦通信
//
// 使用 tokio::sync::broadcast 实现发布/订阅，应用层订阅后转发给前端

use tokio::sync::broadcast;

use crate::actors::FlowSnapshot;

/// 应用事件
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// 屏幕状态变化（导航、拍照完成、上传状态变化等）
    FlowChanged(FlowSnapshot),

    /// 配置更新
    ConfigUpdated,
}

/// 事件总线
///
/// 支持多个订阅者同时接收事件
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    ///
    /// # 参数
    /// - `capacity`: 事件缓冲区大小
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件，没有订阅者时事件被丢弃
    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("事件已发布，订阅者数量: {}", receiver_count);
            }
            Err(_) => {
                tracing::trace!("事件已发布但无订阅者");
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}
