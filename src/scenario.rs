//! 场景描述与装配
//!
//! 一个场景 = 拓扑 + 路由方式 + 预定的接口翻转 + 回显流量 + 打印路由表的时刻。
//! 可以从 JSON 读入，也可以用内置预设构造；装配失败在仿真开始前以 [`ConfigError`] 报告。

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::net::{
    EchoClient, IfIndex, IfState, NetWorld, Network, NodeId, NodeKind, PacketKind,
    schedule_link_state_change,
};
use crate::routing::dv::{DvConfig, SplitHorizon};
use crate::sim::{Event, SimTime, Simulator, World};
use crate::topo::{LinkOpts, build_chain, build_ring, build_square};
use crate::trace::TraceEventKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub topology: TopologySpec,
    #[serde(default)]
    pub link: Option<LinkSpec>,
    pub routing: RoutingSpec,
    #[serde(default)]
    pub changes: Vec<ChangeSpec>,
    #[serde(default)]
    pub pings: Vec<PingSpec>,
    #[serde(default)]
    pub print_tables_at_s: Vec<f64>,
    #[serde(default)]
    pub until_s: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Chain {
        #[serde(default = "default_chain_routers")]
        routers: usize,
    },
    Ring {
        #[serde(default = "default_ring_routers")]
        routers: usize,
    },
    Square,
}

fn default_chain_routers() -> usize {
    3
}

fn default_ring_routers() -> usize {
    4
}

impl FromStr for TopologySpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chain" => Ok(TopologySpec::Chain {
                routers: default_chain_routers(),
            }),
            "ring" => Ok(TopologySpec::Ring {
                routers: default_ring_routers(),
            }),
            "square" => Ok(TopologySpec::Square),
            _ => Err(ConfigError::UnknownTopology(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub bandwidth_bps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingSpec {
    DistanceVector {
        /// NoSplitHorizon / SplitHorizon / PoisonReverse
        #[serde(default)]
        split_horizon: Option<String>,
        #[serde(default)]
        update_interval_s: Option<f64>,
        #[serde(default)]
        timeout_s: Option<f64>,
        #[serde(default)]
        gc_delay_s: Option<f64>,
    },
    LinkState,
}

impl RoutingSpec {
    pub fn distance_vector(split_horizon: SplitHorizon) -> Self {
        RoutingSpec::DistanceVector {
            split_horizon: Some(split_horizon.to_string()),
            update_interval_s: None,
            timeout_s: None,
            gc_delay_s: None,
        }
    }

    fn dv_config(&self) -> Result<Option<DvConfig>, ConfigError> {
        let RoutingSpec::DistanceVector {
            split_horizon,
            update_interval_s,
            timeout_s,
            gc_delay_s,
        } = self
        else {
            return Ok(None);
        };
        let mut cfg = DvConfig::default();
        if let Some(s) = split_horizon {
            cfg.split_horizon = s.parse()?;
        }
        if let Some(s) = update_interval_s {
            cfg.update_interval = positive_secs("update_interval_s", *s)?;
        }
        if let Some(s) = timeout_s {
            cfg.timeout = positive_secs("timeout_s", *s)?;
        }
        if let Some(s) = gc_delay_s {
            cfg.gc_delay = positive_secs("gc_delay_s", *s)?;
        }
        Ok(Some(cfg))
    }
}

fn positive_secs(field: &str, s: f64) -> Result<SimTime, ConfigError> {
    if !(s.is_finite() && s > 0.0) {
        return Err(ConfigError::InvalidScenario(format!(
            "{field} must be a positive number of seconds, got {s}"
        )));
    }
    Ok(SimTime::from_secs_f64(s))
}

fn non_negative_secs(field: &str, s: f64) -> Result<SimTime, ConfigError> {
    if !(s.is_finite() && s >= 0.0) {
        return Err(ConfigError::InvalidScenario(format!(
            "{field} must be a non-negative number of seconds, got {s}"
        )));
    }
    Ok(SimTime::from_secs_f64(s))
}

/// 在 `at_s` 秒把节点 `node` 的接口 `ifindex` 置为 `state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSpec {
    pub at_s: f64,
    pub node: String,
    pub ifindex: usize,
    pub state: IfState,
}

/// 从 `from` 向 `to` 的某个接口地址周期发送回显请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingSpec {
    pub from: String,
    pub to: String,
    /// 目的接口；缺省时取第一个非 loopback 接口
    #[serde(default)]
    pub to_if: Option<usize>,
    #[serde(default = "default_ping_start")]
    pub start_s: f64,
    #[serde(default = "default_ping_interval")]
    pub interval_s: f64,
    #[serde(default = "default_ping_count")]
    pub count: u64,
    #[serde(default = "default_ping_bytes")]
    pub pkt_bytes: u32,
}

fn default_ping_start() -> f64 {
    2.0
}

fn default_ping_interval() -> f64 {
    1.0
}

fn default_ping_count() -> u64 {
    300
}

fn default_ping_bytes() -> u32 {
    1024
}

impl PingSpec {
    fn new(from: &str, to: &str, to_if: usize, start_s: f64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            to_if: Some(to_if),
            start_s,
            interval_s: default_ping_interval(),
            count: default_ping_count(),
            pkt_bytes: default_ping_bytes(),
        }
    }
}

fn change(at_s: f64, node: &str, ifindex: usize, state: IfState) -> ChangeSpec {
    ChangeSpec {
        at_s,
        node: node.to_string(),
        ifindex,
        state,
    }
}

impl ScenarioSpec {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// 内置预设：每种拓扑一套经典的故障/恢复时间表和回显流量。
    ///
    /// - square：B 的 if1 在 30 s 断开、40 s 恢复，D 的 if1 在 70 s 断开、90 s 恢复；
    ///   T 向 R 的两个接口发回显，运行 300 s；
    /// - chain：A 的 if2 在 30 s 断开、40 s 恢复；src 向 dst 发回显，运行 131 s；
    /// - ring：A 的 if1（A-B）在 30 s 断开、40 s 恢复；A 向对面路由器的 loopback 发回显，运行 300 s。
    pub fn preset(topology: TopologySpec, routing: RoutingSpec) -> Self {
        let (changes, pings, until_s) = match &topology {
            TopologySpec::Square => (
                vec![
                    change(30.0, "B", 1, IfState::Down),
                    change(40.0, "B", 1, IfState::Up),
                    change(70.0, "D", 1, IfState::Down),
                    change(90.0, "D", 1, IfState::Up),
                ],
                vec![PingSpec::new("T", "R", 1, 2.0), PingSpec::new("T", "R", 2, 1.5)],
                300.0,
            ),
            TopologySpec::Chain { .. } => (
                vec![
                    change(30.0, "A", 2, IfState::Down),
                    change(40.0, "A", 2, IfState::Up),
                ],
                vec![PingSpec::new("src", "dst", 1, 2.0)],
                131.0,
            ),
            TopologySpec::Ring { routers } => (
                vec![
                    change(30.0, "A", 1, IfState::Down),
                    change(40.0, "A", 1, IfState::Up),
                ],
                vec![PingSpec::new(
                    "A",
                    &crate::topo::router_name(routers / 2),
                    0,
                    2.0,
                )],
                300.0,
            ),
        };
        Self {
            topology,
            link: None,
            routing,
            changes,
            pings,
            print_tables_at_s: Vec::new(),
            until_s: Some(until_s),
        }
    }

    fn link_opts(&self) -> Result<LinkOpts, ConfigError> {
        let mut opts = LinkOpts::default();
        if let Some(link) = &self.link {
            if let Some(ms) = link.latency_ms {
                opts.latency = non_negative_secs("latency_ms", ms / 1e3)?;
            }
            if let Some(bps) = link.bandwidth_bps {
                if bps == 0 {
                    return Err(ConfigError::InvalidScenario(
                        "bandwidth_bps must be positive".to_string(),
                    ));
                }
                opts.bandwidth_bps = bps;
            }
        }
        Ok(opts)
    }

    pub fn until(&self) -> Result<SimTime, ConfigError> {
        non_negative_secs("until_s", self.until_s.unwrap_or(300.0))
    }
}

/// 装配完成、可以直接运行的场景
pub struct Scenario {
    pub sim: Simulator,
    pub world: NetWorld,
    pub until: SimTime,
}

impl Scenario {
    /// 运行到结束时刻
    pub fn run(&mut self) {
        self.sim.run_until(self.until, &mut self.world);
    }

    /// 一行统计摘要
    pub fn summary(&self) -> String {
        let st = &self.world.net.stats;
        format!(
            "done @ {}, echo_requests={}, echo_replies={}, delivered_pkts={}, dropped_pkts={} (no_route={}, link_down={}, ttl={}), dv_messages={}, dv_malformed={}",
            self.sim.now(),
            st.echo_requests,
            st.echo_replies,
            st.delivered_pkts,
            st.dropped_pkts(),
            st.dropped_no_route,
            st.dropped_link_down,
            st.dropped_ttl,
            st.dv_messages,
            st.dv_malformed,
        )
    }

    /// 追踪中记录的回显应答：(时刻, flow_id, 跳数)
    pub fn echo_replies(&self) -> Vec<(SimTime, u64, u32)> {
        let Some(trace) = self.world.net.trace() else {
            return Vec::new();
        };
        trace
            .events
            .iter()
            .filter_map(|ev| match ev.kind {
                TraceEventKind::PacketDelivered {
                    flow_id,
                    pkt_kind: PacketKind::EchoReply,
                    hops,
                    ..
                } => Some((SimTime(ev.t_ns), flow_id, hops)),
                _ => None,
            })
            .collect()
    }

    /// 把追踪事件写成 JSON 数组（第一条为拓扑元信息）
    pub fn write_trace(&self, path: impl AsRef<Path>) -> Result<usize, ConfigError> {
        let Some(trace) = self.world.net.trace() else {
            return Ok(0);
        };
        let json = serde_json::to_string_pretty(&trace.events)?;
        fs::write(path, json)?;
        Ok(trace.events.len())
    }
}

fn resolve_node(net: &Network, name: &str) -> Result<NodeId, ConfigError> {
    net.node_by_name(name)
        .ok_or_else(|| ConfigError::UnknownNodeName(name.to_string()))
}

/// 按描述装配场景。`trace` 为真时在拓扑建好后立即开启追踪（元信息为第一条事件）。
#[tracing::instrument(skip(spec), fields(topology = ?spec.topology))]
pub fn build(spec: &ScenarioSpec, trace: bool) -> Result<Scenario, ConfigError> {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let opts = spec.link_opts()?;
    let until = spec.until()?;

    match spec.topology {
        TopologySpec::Chain { routers } => {
            build_chain(&mut world, routers, &opts)?;
        }
        TopologySpec::Ring { routers } => {
            build_ring(&mut world, routers, &opts)?;
        }
        TopologySpec::Square => {
            build_square(&mut world, &opts)?;
        }
    }
    if trace {
        world.net.enable_trace(sim.now());
    }

    let net = &mut world.net;
    match spec.routing.dv_config()? {
        Some(cfg) => {
            let routers: Vec<NodeId> = net
                .nodes()
                .iter()
                .filter(|n| n.kind == NodeKind::Router)
                .map(|n| n.id)
                .collect();
            for r in routers {
                net.enable_distance_vector(&mut sim, r, cfg.clone())?;
            }
        }
        None => net.enable_global_routing(sim.now()),
    }

    for c in &spec.changes {
        let node = resolve_node(net, &c.node)?;
        let at = non_negative_secs("at_s", c.at_s)?;
        schedule_link_state_change(&mut sim, net, at, node, IfIndex(c.ifindex), c.state)?;
    }

    for (i, p) in spec.pings.iter().enumerate() {
        let src = resolve_node(net, &p.from)?;
        let dst_node = resolve_node(net, &p.to)?;
        let to_if = p.to_if.unwrap_or_else(|| {
            let n = net.nodes()[dst_node.0].interfaces.len();
            if n > 1 { 1 } else { 0 }
        });
        let dst = net
            .interface(dst_node, IfIndex(to_if))
            .ok_or(ConfigError::UnknownInterface {
                node: dst_node,
                ifindex: IfIndex(to_if),
            })?
            .addr;
        let start = non_negative_secs("start_s", p.start_s)?;
        let interval = positive_secs("interval_s", p.interval_s)?;
        sim.schedule(
            start,
            EchoClient {
                flow_id: i as u64 + 1,
                src,
                dst,
                pkt_bytes: p.pkt_bytes,
                remaining: p.count,
                interval,
            },
        );
    }

    let routers: Vec<NodeId> = net
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::Router)
        .map(|n| n.id)
        .collect();
    for &t in &spec.print_tables_at_s {
        let at = non_negative_secs("print_tables_at_s", t)?;
        sim.schedule(
            at,
            RoutingTableDump {
                nodes: routers.clone(),
            },
        );
    }

    info!(
        nodes = net.nodes().len(),
        links = net.links().len(),
        changes = spec.changes.len(),
        pings = spec.pings.len(),
        until = %until,
        "场景装配完成"
    );
    Ok(Scenario { sim, world, until })
}

/// 把若干节点的转发表渲染成文本
pub fn render_routing_tables(net: &Network, nodes: &[NodeId], now: SimTime) -> String {
    let mut out = String::new();
    for &id in nodes {
        let Some(node) = net.node(id) else {
            continue;
        };
        out.push_str(&format!(
            "Node: {}, Time: {:.3}s, Routing table\n",
            node.name,
            now.as_secs_f64()
        ));
        out.push_str(&node.fib.to_string());
        out.push('\n');
    }
    out
}

/// 一次性事件：把指定节点当前的转发表打印到标准输出
#[derive(Debug, Clone)]
pub struct RoutingTableDump {
    pub nodes: Vec<NodeId>,
}

impl Event for RoutingTableDump {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = NetWorld::from_world(world);
        print!("{}", render_routing_tables(&w.net, &self.nodes, sim.now()));
    }
}
