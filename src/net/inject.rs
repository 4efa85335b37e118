//! 拓扑变更注入
//!
//! 在指定时刻把某个接口置为 Up/Down。变更严格按时间顺序生效，生效后一直保持，
//! 直到另一条注入的变更把它改回来。

use tracing::warn;

use super::id::{IfIndex, NodeId};
use super::interface::IfState;
use super::net_world::NetWorld;
use super::network::Network;
use crate::error::ConfigError;
use crate::sim::{Event, EventId, SimTime, Simulator, World};

/// 一次性事件：修改接口运行状态
#[derive(Debug, Clone, Copy)]
pub struct LinkStateChange {
    pub node: NodeId,
    pub ifindex: IfIndex,
    pub state: IfState,
}

impl Event for LinkStateChange {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let LinkStateChange {
            node,
            ifindex,
            state,
        } = *self;
        let w = NetWorld::from_world(world);
        // 引用在注册时已校验过，这里失败只可能是调用方绕过了校验
        if let Err(e) = w.net.set_interface_state(sim, node, ifindex, state) {
            warn!(error = %e, "忽略无效的拓扑变更");
        }
    }
}

/// 注册一次接口状态变更。节点/接口引用在仿真开始前校验。
pub fn schedule_link_state_change(
    sim: &mut Simulator,
    net: &Network,
    at: SimTime,
    node: NodeId,
    ifindex: IfIndex,
    state: IfState,
) -> Result<EventId, ConfigError> {
    let iface = net.check_interface(node, ifindex)?;
    if iface.is_loopback() {
        return Err(ConfigError::LoopbackInterface { node, ifindex });
    }
    sim.try_schedule(
        at,
        LinkStateChange {
            node,
            ifindex,
            state,
        },
    )
    .map_err(|e| ConfigError::InvalidScenario(e.to_string()))
}
