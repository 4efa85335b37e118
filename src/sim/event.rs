//! 事件 trait
//!
//! 路由通告、定时器、接口翻转、数据包到达都实现同一个接口。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
///
/// 周期性动作（例如路由协议的定时通告）在 `execute` 中把自己重新调度一次。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);

    /// 日志中显示的事件名，默认取类型名的最后一段
    fn label(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}
