//! 回显流量
//!
//! 周期性发送回显请求，用于从外部观察路由收敛前后的连通性。

use std::net::Ipv4Addr;

use tracing::debug;

use super::id::NodeId;
use super::net_world::NetWorld;
use crate::sim::{Event, SimTime, Simulator, World};

/// 回显客户端事件：发出一个请求，若还有剩余则按间隔重新调度自己
#[derive(Debug, Clone)]
pub struct EchoClient {
    pub flow_id: u64,
    pub src: NodeId,
    pub dst: Ipv4Addr,
    pub pkt_bytes: u32,
    pub remaining: u64,
    pub interval: SimTime,
}

impl Event for EchoClient {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let mut me = *self;
        let w = NetWorld::from_world(world);

        if me.remaining == 0 {
            return;
        }

        // 源地址取出接口的地址；没有路由时请求在源节点就被丢弃
        let src_addr = match w.net.fib(me.src).resolve(me.dst) {
            Ok(route) => w.net.nodes()[me.src.0].interfaces[route.iface.0].addr,
            Err(_) => w.net.nodes()[me.src.0].router_addr(),
        };
        let pkt = w
            .net
            .make_echo_request(me.flow_id, me.pkt_bytes, src_addr, me.dst, sim.now());
        w.net.stats.echo_requests += 1;
        debug!(flow_id = me.flow_id, dst = %me.dst, "发送回显请求");
        w.net.forward_from(me.src, pkt, sim);

        me.remaining -= 1;
        if me.remaining > 0 {
            sim.schedule_in(me.interval, me);
        }
    }
}
