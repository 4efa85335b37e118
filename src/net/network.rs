//! 网络拓扑管理
//!
//! 节点与链路存放在 arena（`Vec`）中，接口通过下标引用所属节点与链路，不存在引用环。
//! 拓扑在构建完成后只有接口的运行状态会变化，由拓扑变更注入器驱动。

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info, trace};

use super::fib::{FibChange, ForwardingTable, NoRoute, Route, RouteSource};
use super::id::{IfIndex, LinkId, NodeId};
use super::interface::{IfState, Interface};
use super::link::{Link, LinkKind};
use super::node::{Node, NodeKind};
use super::stats::Stats;
use crate::error::ConfigError;
use crate::routing::dv::{DistanceVector, DvConfig};
use crate::routing::global::GlobalRouting;
use crate::sim::{SimTime, Simulator};
use crate::trace::{TraceEvent, TraceEventKind, TraceLinkInfo, TraceLogger, TraceNodeInfo};

/// 一次接口状态翻转的描述，分发给当前生效的路由引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyChange {
    pub at: SimTime,
    pub node: NodeId,
    pub ifindex: IfIndex,
    pub link: Option<LinkId>,
    pub state: IfState,
    /// 翻转之后链路是否可用
    pub link_up: bool,
}

/// 网络拓扑
#[derive(Default)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    global: Option<GlobalRouting>,
    next_pkt_id: u64,
    pub stats: Stats,
    trace: Option<TraceLogger>,
}

/// 第 n 个节点的 loopback 地址：10.255.x.y/32
fn router_id_net(id: NodeId) -> Ipv4Net {
    let n = id.0 + 1;
    let addr = Ipv4Addr::new(10, 255, ((n >> 8) & 0xff) as u8, (n & 0xff) as u8);
    Ipv4Net::from(addr)
}

impl Network {
    /// 添加路由器节点
    pub fn add_router(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeKind::Router)
    }

    /// 添加主机节点
    pub fn add_host(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeKind::Host)
    }

    fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let lo = Interface::new(id, IfIndex::LOOPBACK, None, router_id_net(id));
        let mut node = Node::new(id, name, kind, lo);
        node.fib
            .install(Route::direct(router_id_net(id), IfIndex::LOOPBACK));
        self.nodes.push(node);
        id
    }

    /// 用点到点链路连接两个节点。`prefix` 中的前两个主机地址依次分给 `a`、`b`。
    pub fn connect(
        &mut self,
        a: NodeId,
        b: NodeId,
        prefix: Ipv4Net,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> Result<LinkId, ConfigError> {
        self.attach(LinkKind::PointToPoint, &[a, b], prefix, latency, bandwidth_bps)
    }

    /// 用共享介质连接多个节点
    pub fn connect_shared(
        &mut self,
        members: &[NodeId],
        prefix: Ipv4Net,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> Result<LinkId, ConfigError> {
        self.attach(LinkKind::Shared, members, prefix, latency, bandwidth_bps)
    }

    fn attach(
        &mut self,
        kind: LinkKind,
        members: &[NodeId],
        prefix: Ipv4Net,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> Result<LinkId, ConfigError> {
        if members.len() < 2 {
            return Err(ConfigError::TooFewEndpoints(members.len()));
        }
        if let Some(&bad) = members.iter().find(|m| m.0 >= self.nodes.len()) {
            return Err(ConfigError::UnknownNode(bad));
        }
        let prefix = prefix.trunc();
        let addrs: Vec<Ipv4Addr> = prefix.hosts().take(members.len()).collect();
        if addrs.len() < members.len() {
            return Err(ConfigError::InvalidScenario(format!(
                "prefix {prefix} cannot address {} interfaces",
                members.len()
            )));
        }

        let id = LinkId(self.links.len());
        let mut ends = Vec::with_capacity(members.len());
        for (&node_id, addr) in members.iter().zip(addrs) {
            let node = &mut self.nodes[node_id.0];
            let ifindex = IfIndex(node.interfaces.len());
            let net = Ipv4Net::new(addr, prefix.prefix_len())
                .map_err(|e| ConfigError::InvalidScenario(e.to_string()))?;
            node.interfaces
                .push(Interface::new(node_id, ifindex, Some(id), net));
            node.fib.install(Route::direct(prefix, ifindex));
            ends.push((node_id, ifindex));
        }
        debug!(link = ?id, ?kind, %prefix, ends = ?ends, "创建链路");
        self.links
            .push(Link::new(id, kind, ends, latency, bandwidth_bps));
        Ok(id)
    }

    /// 设置链路的路由开销
    pub fn set_link_cost(&mut self, link: LinkId, cost: u32) -> Result<(), ConfigError> {
        let l = self
            .links
            .get_mut(link.0)
            .ok_or_else(|| ConfigError::InvalidScenario(format!("link {link:?} does not exist")))?;
        l.cost = cost;
        Ok(())
    }

    /// 把接口排除在距离向量报文交换之外
    pub fn exclude_interface(&mut self, node: NodeId, ifindex: IfIndex) -> Result<(), ConfigError> {
        self.check_interface(node, ifindex)?;
        self.nodes[node.0].interfaces[ifindex.0].dv_excluded = true;
        Ok(())
    }

    /// 添加静态路由（`dest` 为 0.0.0.0/0 时即默认路由）
    pub fn add_static_route(
        &mut self,
        node: NodeId,
        dest: Ipv4Net,
        gateway: Ipv4Addr,
        ifindex: IfIndex,
    ) -> Result<(), ConfigError> {
        self.check_interface(node, ifindex)?;
        let route = Route::via(dest, gateway, ifindex, 1, RouteSource::Static);
        self.fib_install(node, route, SimTime::ZERO);
        Ok(())
    }

    /// 在节点上启用距离向量协议
    pub fn enable_distance_vector(
        &mut self,
        sim: &mut Simulator,
        node: NodeId,
        cfg: DvConfig,
    ) -> Result<(), ConfigError> {
        self.check_node(node)?;
        let changes = self.nodes[node.0]
            .fib
            .replace_source(RouteSource::Global, Vec::new());
        self.record_fib_changes(node, changes, sim.now());

        let mut dv = DistanceVector::new(node, cfg);
        dv.start(sim, self);
        self.nodes[node.0].dv = Some(dv);
        info!(node = %self.nodes[node.0].name, "启用距离向量路由");
        Ok(())
    }

    /// 启用全局路由（链路状态 oracle），并立即做一次全量计算
    pub fn enable_global_routing(&mut self, now: SimTime) {
        let mut g = GlobalRouting::default();
        g.recompute(self, now);
        self.global = Some(g);
        info!("启用全局路由");
    }

    pub fn global_routing(&self) -> Option<&GlobalRouting> {
        self.global.as_ref()
    }

    /// 开启追踪记录，写入拓扑元信息作为第一条事件
    pub fn enable_trace(&mut self, now: SimTime) {
        let nodes = self
            .nodes
            .iter()
            .map(|n| TraceNodeInfo {
                id: n.id.0,
                name: n.name.clone(),
                kind: n.kind,
                router_addr: n.router_addr().to_string(),
            })
            .collect();
        let links = self
            .links
            .iter()
            .map(|l| TraceLinkInfo {
                id: l.id.0,
                kind: l.kind,
                ends: l.ends.iter().map(|&(n, i)| (n.0, i.0)).collect(),
                prefix: l
                    .ends
                    .first()
                    .map(|&(n, i)| self.nodes[n.0].interfaces[i.0].prefix.to_string())
                    .unwrap_or_default(),
                bandwidth_bps: l.bandwidth_bps,
                latency_ns: l.latency.0,
                cost: l.cost,
            })
            .collect();
        let mut logger = TraceLogger::default();
        logger.push(TraceEvent {
            t_ns: now.0,
            kind: TraceEventKind::Meta { nodes, links },
        });
        self.trace = Some(logger);
    }

    pub fn trace(&self) -> Option<&TraceLogger> {
        self.trace.as_ref()
    }

    pub fn take_trace(&mut self) -> Option<TraceLogger> {
        self.trace.take()
    }

    pub(crate) fn trace_event(&mut self, now: SimTime, kind: TraceEventKind) {
        if let Some(t) = self.trace.as_mut() {
            t.push(TraceEvent { t_ns: now.0, kind });
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn fib(&self, node: NodeId) -> &ForwardingTable {
        &self.nodes[node.0].fib
    }

    /// 查询某节点到目的网段的路由
    pub fn lookup(&self, node: NodeId, dest: &Ipv4Net) -> Result<&Route, NoRoute> {
        self.nodes[node.0].fib.lookup(dest)
    }

    pub fn interface(&self, node: NodeId, ifindex: IfIndex) -> Option<&Interface> {
        self.nodes.get(node.0)?.interface(ifindex)
    }

    pub(crate) fn check_node(&self, node: NodeId) -> Result<&Node, ConfigError> {
        self.nodes.get(node.0).ok_or(ConfigError::UnknownNode(node))
    }

    pub(crate) fn check_interface(
        &self,
        node: NodeId,
        ifindex: IfIndex,
    ) -> Result<&Interface, ConfigError> {
        self.check_node(node)?
            .interface(ifindex)
            .ok_or(ConfigError::UnknownInterface { node, ifindex })
    }

    /// 链路可用当且仅当所有端点接口都为 Up
    pub fn is_link_up(&self, link: LinkId) -> bool {
        let Some(l) = self.links.get(link.0) else {
            return false;
        };
        l.ends
            .iter()
            .all(|&(n, i)| self.nodes[n.0].interfaces[i.0].is_up())
    }

    /// 接口可用于收发：自身 Up，且所挂链路可用（loopback 只看自身）
    pub fn interface_operational(&self, node: NodeId, ifindex: IfIndex) -> bool {
        let Some(iface) = self.interface(node, ifindex) else {
            return false;
        };
        iface.is_up() && iface.link.is_none_or(|l| self.is_link_up(l))
    }

    /// 翻转接口运行状态，并把拓扑变化通知给当前生效的路由引擎。
    ///
    /// 状态未变化时返回 `Ok(None)`，不产生任何通知。
    #[tracing::instrument(skip(self, sim), fields(now = ?sim.now()))]
    pub fn set_interface_state(
        &mut self,
        sim: &mut Simulator,
        node: NodeId,
        ifindex: IfIndex,
        state: IfState,
    ) -> Result<Option<TopologyChange>, ConfigError> {
        let iface = self.check_interface(node, ifindex)?;
        if iface.is_loopback() {
            return Err(ConfigError::LoopbackInterface { node, ifindex });
        }
        if iface.state == state {
            trace!("接口状态未变化");
            return Ok(None);
        }
        let link = iface.link;
        let prefix = iface.prefix;
        let now = sim.now();

        self.nodes[node.0].interfaces[ifindex.0].state = state;

        // 直连路由随接口状态进出转发表
        match state {
            IfState::Up => {
                self.fib_install(node, Route::direct(prefix, ifindex), now);
            }
            IfState::Down => {
                let is_own_direct = self.nodes[node.0]
                    .fib
                    .get(&prefix)
                    .is_some_and(|r| r.source == RouteSource::Direct && r.iface == ifindex);
                if is_own_direct {
                    self.fib_remove(node, &prefix, now);
                }
            }
        }

        let change = TopologyChange {
            at: now,
            node,
            ifindex,
            link,
            state,
            link_up: link.is_some_and(|l| self.is_link_up(l)),
        };
        info!(
            node = %self.nodes[node.0].name,
            ifindex = ifindex.0,
            %state,
            link_up = change.link_up,
            "🔌 拓扑变化"
        );
        self.trace_event(
            now,
            TraceEventKind::TopologyChanged {
                node: node.0,
                ifindex: ifindex.0,
                link: link.map(|l| l.0),
                state,
                link_up: change.link_up,
            },
        );

        self.dispatch_topology_change(sim, &change);
        Ok(Some(change))
    }

    /// 把拓扑变化分发给路由引擎：
    /// - 链路上所有运行距离向量的端点都会收到（载波丢失两端都能感知）；
    /// - 全局路由同步重算。
    fn dispatch_topology_change(&mut self, sim: &mut Simulator, change: &TopologyChange) {
        let mut targets = vec![(change.node, change.ifindex)];
        if let Some(l) = change.link {
            targets.extend(
                self.links[l.0]
                    .ends
                    .iter()
                    .copied()
                    .filter(|&(n, _)| n != change.node),
            );
        }
        for (n, i) in targets {
            self.with_dv(n, |dv, net| dv.on_interface_change(sim, net, i));
        }

        if let Some(mut g) = self.global.take() {
            g.recompute(self, sim.now());
            self.global = Some(g);
        }
    }

    /// 暂时把节点的距离向量实例取出来，避免 &mut self 与 &mut dv 的重叠借用。
    /// 节点未运行距离向量时返回 None。
    pub(crate) fn with_dv<F, R>(&mut self, node: NodeId, f: F) -> Option<R>
    where
        F: FnOnce(&mut DistanceVector, &mut Network) -> R,
    {
        let mut dv = self.nodes.get_mut(node.0)?.dv.take()?;
        let result = f(&mut dv, self);
        self.nodes[node.0].dv = Some(dv);
        Some(result)
    }

    /// 写入路由并在成功时发出追踪事件
    pub(crate) fn fib_install(&mut self, node: NodeId, route: Route, now: SimTime) -> bool {
        let installed = self.nodes[node.0].fib.install(route.clone());
        if installed {
            debug!(node = %self.nodes[node.0].name, route = %route, "转发表写入");
            self.trace_event(
                now,
                TraceEventKind::RouteInstalled {
                    node: node.0,
                    route,
                },
            );
        }
        installed
    }

    /// 删除路由并在成功时发出追踪事件
    pub(crate) fn fib_remove(&mut self, node: NodeId, dest: &Ipv4Net, now: SimTime) -> Option<Route> {
        let removed = self.nodes[node.0].fib.remove(dest)?;
        debug!(node = %self.nodes[node.0].name, route = %removed, "转发表删除");
        self.trace_event(
            now,
            TraceEventKind::RouteRemoved {
                node: node.0,
                route: removed.clone(),
            },
        );
        Some(removed)
    }

    /// 整体替换某节点某来源的路由，返回变更条数
    pub(crate) fn replace_routes(
        &mut self,
        node: NodeId,
        source: RouteSource,
        routes: Vec<Route>,
        now: SimTime,
    ) -> usize {
        let changes = self.nodes[node.0].fib.replace_source(source, routes);
        let n = changes.len();
        self.record_fib_changes(node, changes, now);
        n
    }

    fn record_fib_changes(&mut self, node: NodeId, changes: Vec<FibChange>, now: SimTime) {
        for change in changes {
            let kind = match change {
                FibChange::Installed(route) => {
                    debug!(node = %self.nodes[node.0].name, route = %route, "转发表写入");
                    TraceEventKind::RouteInstalled {
                        node: node.0,
                        route,
                    }
                }
                FibChange::Removed(route) => {
                    debug!(node = %self.nodes[node.0].name, route = %route, "转发表删除");
                    TraceEventKind::RouteRemoved {
                        node: node.0,
                        route,
                    }
                }
            };
            self.trace_event(now, kind);
        }
    }

    pub(crate) fn next_packet_id(&mut self) -> u64 {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        id
    }
}
