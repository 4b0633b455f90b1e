// Actor模块 - 使用Actor模式管理流程状态
//
// 所有屏幕状态由单个 Actor 持有，界面通过 Handle 发送消息，
// 后台任务完成后也通过消息把结果交还给 Actor

pub mod flow;

pub use flow::{Dispatch, ErrorCallback, FlowActor, FlowCommand, FlowHandle, FlowSnapshot};
