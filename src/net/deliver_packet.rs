//! 数据包交付与逐跳转发
//!
//! 数据面只做一件事：在每个节点上按转发表最长前缀匹配选出口与下一跳。

use std::net::Ipv4Addr;

use tracing::{debug, info, trace};

use super::fib::RouteSource;
use super::id::NodeId;
use super::net_world::NetWorld;
use super::network::Network;
use super::packet::{Packet, PacketKind};
use crate::sim::{Event, SimTime, Simulator, World};
use crate::trace::{DropReason, TraceEventKind};

/// 事件：把一个 packet 交给某个节点处理。
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: NodeId,
    pub pkt: Packet,
}

impl Event for DeliverPacket {
    #[tracing::instrument(skip(self, sim, world), fields(pkt_id = self.pkt.id, flow_id = self.pkt.flow_id, to = ?self.to))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, pkt } = *self;
        trace!(now = ?sim.now(), dst = %pkt.dst, hops_taken = pkt.hops_taken, "数据包到达节点");
        NetWorld::from_world(world).net.deliver(to, pkt, sim);
    }
}

impl Network {
    /// 创建一个回显请求
    pub fn make_echo_request(
        &mut self,
        flow_id: u64,
        size_bytes: u32,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        now: SimTime,
    ) -> Packet {
        Packet {
            id: self.next_packet_id(),
            flow_id,
            src,
            dst,
            size_bytes,
            ttl: super::packet::DEFAULT_TTL,
            kind: PacketKind::EchoRequest,
            sent_at: now,
            hops_taken: 0,
        }
    }

    /// 将数据包交付给节点处理：目的地址属于本节点则收下，否则继续转发
    pub fn deliver(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        if self.nodes()[at.0].owns_addr(pkt.dst) {
            self.on_delivered(at, pkt, sim);
        } else {
            self.forward_from(at, pkt, sim);
        }
    }

    /// 从指定节点转发数据包
    #[tracing::instrument(skip(self, sim), fields(pkt_id = pkt.id, from = ?from))]
    pub fn forward_from(&mut self, from: NodeId, mut pkt: Packet, sim: &mut Simulator) {
        if pkt.ttl == 0 {
            self.drop_packet(from, &pkt, DropReason::TtlExpired, sim.now());
            return;
        }
        pkt.ttl -= 1;

        let route = match self.fib(from).resolve(pkt.dst) {
            Ok(r) => r.clone(),
            Err(e) => {
                debug!(error = %e, "查表失败");
                self.drop_packet(from, &pkt, DropReason::NoRoute, sim.now());
                return;
            }
        };
        trace!(route = %route, "命中路由");

        if !self.interface_operational(from, route.iface) {
            self.drop_packet(from, &pkt, DropReason::LinkDown, sim.now());
            return;
        }
        let Some(link_id) = self.nodes()[from.0].interfaces[route.iface.0].link else {
            // 指向 loopback 的路由只会匹配本机地址，走不到这里
            self.drop_packet(from, &pkt, DropReason::NoRoute, sim.now());
            return;
        };
        // 直连网段的下一跳是目的地址本身
        let next_addr = match (route.source, route.gateway) {
            (RouteSource::Direct, _) | (_, None) => pkt.dst,
            (_, Some(gw)) => gw,
        };
        let link = &self.links()[link_id.0];
        let delay = link.delivery_delay(pkt.size_bytes);
        let next = link.peers_of(from).find(|&(n, i)| {
            let iface = &self.nodes()[n.0].interfaces[i.0];
            iface.is_up() && iface.addr == next_addr
        });
        let Some((to, _)) = next else {
            self.drop_packet(from, &pkt, DropReason::NoRoute, sim.now());
            return;
        };

        let arrive = sim.now().saturating_add(delay);
        pkt.hops_taken += 1;
        debug!(?to, ?arrive, "调度数据包到达事件");
        sim.schedule(arrive, DeliverPacket { to, pkt });
    }

    fn drop_packet(&mut self, at: NodeId, pkt: &Packet, reason: DropReason, now: SimTime) {
        debug!(?at, ?reason, dst = %pkt.dst, "❌ 丢弃数据包");
        match reason {
            DropReason::NoRoute => self.stats.dropped_no_route += 1,
            DropReason::LinkDown => self.stats.dropped_link_down += 1,
            DropReason::TtlExpired => self.stats.dropped_ttl += 1,
        }
        self.trace_event(
            now,
            TraceEventKind::PacketDropped {
                node: at.0,
                pkt_id: pkt.id,
                flow_id: pkt.flow_id,
                reason,
            },
        );
    }

    /// 数据包送达目的地时的处理：回显请求就地生成应答
    fn on_delivered(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bytes += pkt.size_bytes as u64;
        self.trace_event(
            sim.now(),
            TraceEventKind::PacketDelivered {
                node: at.0,
                pkt_id: pkt.id,
                flow_id: pkt.flow_id,
                pkt_kind: pkt.kind,
                hops: pkt.hops_taken,
            },
        );

        match pkt.kind {
            PacketKind::EchoRequest => {
                let reply = Packet {
                    id: self.next_packet_id(),
                    src: pkt.dst,
                    dst: pkt.src,
                    kind: PacketKind::EchoReply,
                    ttl: super::packet::DEFAULT_TTL,
                    hops_taken: 0,
                    ..pkt
                };
                self.forward_from(at, reply, sim);
            }
            PacketKind::EchoReply => {
                self.stats.echo_replies += 1;
                let rtt = sim.now().saturating_sub(pkt.sent_at);
                info!(
                    flow_id = pkt.flow_id,
                    from = %pkt.src,
                    rtt_ms = rtt.as_secs_f64() * 1e3,
                    hops = pkt.hops_taken,
                    "🏓 收到回显应答"
                );
            }
        }
    }
}
