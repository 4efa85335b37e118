//! 链路类型
//!
//! 定义网络链路及其传输时延计算。链路速率与时延只影响收敛时间，不影响路由正确性。

use serde::{Deserialize, Serialize};

use super::id::{IfIndex, LinkId, NodeId};
use crate::sim::SimTime;

/// 链路介质类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// 点到点，恰好两个端点
    PointToPoint,
    /// 共享介质（类似 CSMA），N 个端点
    Shared,
}

/// 网络链路
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    /// 按连接顺序排列的端点 (节点, 接口)
    pub ends: Vec<(NodeId, IfIndex)>,
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    /// 路由开销（距离向量的链路代价、全局路由的边权）
    pub cost: u32,
}

impl Link {
    /// 创建新链路
    pub fn new(
        id: LinkId,
        kind: LinkKind,
        ends: Vec<(NodeId, IfIndex)>,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> Self {
        Self {
            id,
            kind,
            ends,
            latency,
            bandwidth_bps,
            cost: 1,
        }
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128)
            + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    /// 发送 `bytes` 字节从开始序列化到对端收到的总时延
    pub(crate) fn delivery_delay(&self, bytes: u32) -> SimTime {
        self.tx_time(bytes).saturating_add(self.latency)
    }

    /// 链路是否连接了该节点的该接口
    pub fn attaches(&self, node: NodeId, ifindex: IfIndex) -> bool {
        self.ends.contains(&(node, ifindex))
    }

    /// 除 `node` 以外的其它端点
    pub fn peers_of(&self, node: NodeId) -> impl Iterator<Item = (NodeId, IfIndex)> + '_ {
        self.ends.iter().copied().filter(move |&(n, _)| n != node)
    }
}
