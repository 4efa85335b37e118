use serde::{Deserialize, Serialize};

use crate::net::{IfState, LinkKind, NodeKind, PacketKind, Route};

/// 路由追踪事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// 拓扑元信息（作为第一条事件）
    Meta {
        nodes: Vec<TraceNodeInfo>,
        links: Vec<TraceLinkInfo>,
    },
    /// 转发表写入（新增或替换）
    RouteInstalled { node: usize, route: Route },
    /// 转发表删除
    RouteRemoved { node: usize, route: Route },
    /// 接口状态翻转
    TopologyChanged {
        node: usize,
        ifindex: usize,
        link: Option<usize>,
        state: IfState,
        link_up: bool,
    },
    /// 数据包到达目的节点
    PacketDelivered {
        node: usize,
        pkt_id: u64,
        flow_id: u64,
        pkt_kind: PacketKind,
        hops: u32,
    },
    /// 数据包被丢弃
    PacketDropped {
        node: usize,
        pkt_id: u64,
        flow_id: u64,
        reason: DropReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NoRoute,
    LinkDown,
    TtlExpired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceNodeInfo {
    pub id: usize,
    pub name: String,
    pub kind: NodeKind,
    pub router_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLinkInfo {
    pub id: usize,
    pub kind: LinkKind,
    /// 端点 (节点, 接口序号)
    pub ends: Vec<(usize, usize)>,
    pub prefix: String,
    pub bandwidth_bps: u64,
    /// 单向传播时延（ns）
    pub latency_ns: u64,
    pub cost: u32,
}

/// 一条追踪事件（JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// 仿真时间（纳秒，和 `SimTime.0` 同口径）
    pub t_ns: u64,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// 一个简单的事件收集器（存内存，仿真结束写 JSON 文件）
#[derive(Debug, Default)]
pub struct TraceLogger {
    pub events: Vec<TraceEvent>,
}

impl TraceLogger {
    pub fn push(&mut self, ev: TraceEvent) {
        self.events.push(ev);
    }
}
