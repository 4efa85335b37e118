//! 路由事件记录（用于离线分析/回放）
//!
//! 设计目标：
//! - **结构化**：用 JSON 事件而不是解析文本日志
//! - **同步**：每条事件在引起它的动作内写入，不批量、不重排
//! - **可回放**：第一条事件为拓扑元信息，其后按仿真时间有序

mod types;

pub use types::{DropReason, TraceEvent, TraceEventKind, TraceLinkInfo, TraceLogger, TraceNodeInfo};
