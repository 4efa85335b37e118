//! 距离向量协议的调度事件
//!
//! 每个事件都只是把调用转交给目标节点上的协议实例；节点未运行协议时静默忽略。

use ipnet::Ipv4Net;
use tracing::trace;

use super::advert::Advertisement;
use crate::net::{IfIndex, LinkId, NetWorld, NodeId};
use crate::sim::{Event, Simulator, World};

/// 周期通告。执行后按配置的间隔把自己重新放回队列。
#[derive(Debug, Clone, Copy)]
pub struct DvPeriodicUpdate {
    pub node: NodeId,
}

impl Event for DvPeriodicUpdate {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let node = self.node;
        let w = NetWorld::from_world(world);
        if let Some(interval) = w.net.with_dv(node, |dv, net| dv.on_periodic(sim, net)) {
            sim.schedule_in(interval, *self);
        }
    }
}

/// 触发更新
#[derive(Debug, Clone, Copy)]
pub struct DvTriggeredUpdate {
    pub node: NodeId,
}

impl Event for DvTriggeredUpdate {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::from_world(world);
        w.net.with_dv(self.node, |dv, net| dv.on_triggered(sim, net));
    }
}

/// 路由超时检查
#[derive(Debug, Clone, Copy)]
pub struct DvRouteTimeout {
    pub node: NodeId,
    pub dest: Ipv4Net,
}

impl Event for DvRouteTimeout {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DvRouteTimeout { node, dest } = *self;
        let w = NetWorld::from_world(world);
        w.net.with_dv(node, |dv, net| dv.on_timeout(sim, net, dest));
    }
}

/// 垃圾回收到期
#[derive(Debug, Clone, Copy)]
pub struct DvGarbageCollect {
    pub node: NodeId,
    pub dest: Ipv4Net,
}

impl Event for DvGarbageCollect {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DvGarbageCollect { node, dest } = *self;
        let w = NetWorld::from_world(world);
        w.net.with_dv(node, |dv, net| dv.on_garbage_collect(sim, net, dest));
    }
}

/// 事件：一份通告经过链路时延后到达邻居的接口
#[derive(Debug)]
pub struct DeliverAdvertisement {
    pub to: NodeId,
    pub ifindex: IfIndex,
    pub link: LinkId,
    pub adv: Advertisement,
}

impl Event for DeliverAdvertisement {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverAdvertisement {
            to,
            ifindex,
            link,
            adv,
        } = *self;
        let w = NetWorld::from_world(world);
        let handled = w
            .net
            .with_dv(to, |dv, net| dv.on_advertisement(sim, net, ifindex, link, adv));
        if handled.is_none() {
            trace!(?to, "节点未运行距离向量协议，丢弃通告");
        }
    }
}
